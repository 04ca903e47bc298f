//! Spike recording.
//!
//! Without `--fast`, every rank writes the spikes of the neurons it owns to `<dir>/coba.<rank>.e.ras` and
//! `<dir>/coba.<rank>.i.ras`, one `<time> <neuron>` line per spike.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::BenchmarkConfig;
use crate::engine::{SimulationEngine, SpikeObserver};
use crate::error::BenchError;
use crate::network::population::PopulationKind;

/// Returns the path of the spike file of a population for a given rank.
pub fn ras_path(dir: &Path, rank: usize, kind: PopulationKind) -> PathBuf {
    dir.join(format!("coba.{}.{}.ras", rank, kind.tag()))
}

/// Appends every observed spike to a file. Spikes are buffered, never dropped.
#[derive(Debug)]
pub struct SpikeRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    num_spikes: usize,
    failed: bool,
}

impl SpikeRecorder {
    /// Create (or truncate) the spike file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(SpikeRecorder {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            num_spikes: 0,
            failed: false,
        })
    }

    /// Returns the number of spikes recorded so far.
    pub fn num_spikes(&self) -> usize {
        self.num_spikes
    }
}

impl SpikeObserver for SpikeRecorder {
    fn observe(&mut self, time: f64, neuron_id: usize) {
        if let Err(e) = writeln!(self.writer, "{:.4} {}", time, neuron_id) {
            // report once, the measurement itself is not affected
            if !self.failed {
                log::error!("Failed to record spikes to {}: {}", self.path.display(), e);
                self.failed = true;
            }
            return;
        }
        self.num_spikes += 1;
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Attaches the spike recorders, unless spike recording is disabled by the fast flag.
#[derive(Debug)]
pub struct MonitorAttacher<'a> {
    config: &'a BenchmarkConfig,
}

impl<'a> MonitorAttacher<'a> {
    pub fn new(config: &'a BenchmarkConfig) -> Self {
        MonitorAttacher { config }
    }

    /// Attach one recorder per population to the engine and return the paths of the spike files.
    ///
    /// In fast mode nothing is attached and the engine is made quiet. A spike file that cannot be created is
    /// reported and skipped.
    pub fn attach<E: SimulationEngine + ?Sized>(
        &self,
        engine: &mut E,
    ) -> Result<Vec<PathBuf>, BenchError> {
        if self.config.fast() {
            log::warn!(
                "Spike recording is disabled (--fast): no spike files are written during this run"
            );
            engine.set_quiet(true);
            return Ok(vec![]);
        }

        log::warn!("Use --fast option to turn off IO for benchmarking!");
        log::info!("Setting up monitors ...");

        let mut paths = Vec::with_capacity(2);
        for kind in [PopulationKind::Excitatory, PopulationKind::Inhibitory] {
            let path = ras_path(self.config.dir(), engine.rank(), kind);
            match SpikeRecorder::create(&path) {
                Ok(recorder) => {
                    engine.attach_observer(kind, Box::new(recorder))?;
                    paths.push(path);
                }
                Err(e) => log::error!(
                    "Cannot create spike file {}: {}; {:?} spikes are not recorded",
                    path.display(),
                    e,
                    kind
                ),
            }
        }
        Ok(paths)
    }
}
