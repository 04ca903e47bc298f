//! The timed run and its artifacts.
//!
//! - `timefile.dat` (working directory, fast mode only): the measured wall time with 10 significant digits;
//! - `<dir>/elapsed.dat` (rank 0 only): the elapsed time reported by the engine.
//!
//! A run that does not complete still writes its artifacts before the abort is propagated.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::BenchmarkConfig;
use crate::engine::SimulationEngine;
use crate::error::BenchError;

/// Default location of the high-precision timing file.
pub const TIMEFILE: &str = "timefile.dat";
/// Name of the elapsed time file written by rank 0 in the output directory.
pub const ELAPSED_FILE: &str = "elapsed.dat";

/// Error code passed to the abort when the run does not complete.
const RUN_FAILURE_CODE: i32 = 1;

/// The outcome of a timed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingResult {
    /// Wall-clock seconds measured around the run.
    pub elapsed: f64,
    /// Wall-clock seconds reported by the engine for its last run.
    pub last_elapsed_time: f64,
    /// Whether the engine completed the run.
    pub completed: bool,
}

/// Format a duration with 10 significant digits.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.9e}", seconds)
}

/// Write an artifact; failures are reported but do not invalidate the measurement.
fn write_artifact(path: &Path, content: &str) -> bool {
    match fs::write(path, content) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Cannot write {}: {}", path.display(), e);
            false
        }
    }
}

#[derive(Debug)]
pub struct BenchmarkRunner<'a> {
    config: &'a BenchmarkConfig,
    timefile: PathBuf,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(config: &'a BenchmarkConfig) -> Self {
        BenchmarkRunner {
            config,
            timefile: PathBuf::from(TIMEFILE),
        }
    }

    /// Write the high-precision timing file to `path` instead of the working directory.
    pub fn with_timefile(mut self, path: PathBuf) -> Self {
        self.timefile = path;
        self
    }

    /// Returns the path of the elapsed time file.
    pub fn elapsed_path(&self) -> PathBuf {
        self.config.dir().join(ELAPSED_FILE)
    }

    /// Run the engine for the configured simulated time and write the timing artifacts.
    /// Returns an `EngineFailure` (after the artifacts were written and the abort issued) if the run did
    /// not complete.
    pub fn run<E: SimulationEngine + ?Sized>(
        &self,
        engine: &mut E,
    ) -> Result<TimingResult, BenchError> {
        log::info!("Simulating ...");
        let start = Instant::now();
        let completed = engine.run(self.config.simtime());
        let elapsed = start.elapsed().as_secs_f64();

        let timing = TimingResult {
            elapsed,
            last_elapsed_time: engine.last_elapsed_time(),
            completed,
        };
        log::info!(
            "Run {} after {:.3}s of wall time ({} simulated seconds)",
            if completed { "completed" } else { "failed" },
            elapsed,
            self.config.simtime()
        );

        if self.config.fast() {
            write_artifact(&self.timefile, &format_seconds(elapsed));
        }

        if engine.rank() == 0 {
            log::info!("Saving elapsed time ...");
            write_artifact(
                &self.elapsed_path(),
                &format!("{}\n", timing.last_elapsed_time),
            );
        }

        if !completed {
            engine.abort(RUN_FAILURE_CODE);
            return Err(BenchError::EngineFailure(RUN_FAILURE_CODE));
        }
        Ok(timing)
    }
}
