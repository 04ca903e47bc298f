//! The benchmark pipeline.
//!
//! Scaling, network construction, optional saving, optional spike recording and the timed run happen in this
//! fixed order on the calling thread. Configuration and loading errors stop the pipeline before the engine
//! runs and before the output directory is created; a failed run is reported once its artifacts are written.
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;

use crate::config::BenchmarkConfig;
use crate::engine::SimulationEngine;
use crate::error::BenchError;
use crate::monitor::MonitorAttacher;
use crate::network::population::PopulationKind;
use crate::network::topology::TopologyBuilder;
use crate::persistence::{self, Snapshot};
use crate::runner::{BenchmarkRunner, TimingResult, TIMEFILE};

/// Summary of a completed benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub num_neurons: usize,
    pub num_synapses: usize,
    /// The files written by [`persistence::save`], if saving was requested and this is rank 0.
    pub saved_files: Vec<PathBuf>,
    /// The spike files of this rank, empty in fast mode.
    pub spike_files: Vec<PathBuf>,
    pub timing: TimingResult,
}

#[derive(Debug)]
pub struct Benchmark<'a> {
    config: &'a BenchmarkConfig,
    timefile: PathBuf,
}

impl<'a> Benchmark<'a> {
    pub fn new(config: &'a BenchmarkConfig) -> Self {
        Benchmark {
            config,
            timefile: PathBuf::from(TIMEFILE),
        }
    }

    /// Write the high-precision timing file to `path` instead of the working directory.
    pub fn with_timefile(mut self, path: PathBuf) -> Self {
        self.timefile = path;
        self
    }

    /// Build the network on the engine and run the timed simulation.
    pub fn run<E: SimulationEngine + ?Sized>(
        &self,
        engine: &mut E,
    ) -> Result<BenchmarkReport, BenchError> {
        let config = self.config;

        let scale = config.scale();
        log::info!(
            "Multiplying the network size (and dividing connectivity) by {}",
            scale.scale_factor()
        );
        log::info!(
            "Network connections are {} sparse ({} inputs per neuron on average)",
            scale.sparseness(),
            scale.mean_in_degree()
        );

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
        let network = TopologyBuilder::new(config, scale).build(&mut rng)?;

        if let Err(e) = fs::create_dir_all(config.dir()) {
            log::error!(
                "Cannot create output directory {}: {}",
                config.dir().display(),
                e
            );
        }

        engine.add_population(network.population(PopulationKind::Excitatory))?;
        engine.add_population(network.population(PopulationKind::Inhibitory))?;
        for projection in network.projections_iter() {
            engine.add_projection(projection)?;
        }

        let num_neurons = network.num_neurons();
        let num_synapses = network.num_synapses();

        // every rank holds the same network, rank 0 writes it
        let saved_files = match config.save_path() {
            Some(path) if engine.rank() == 0 => {
                let states = [PopulationKind::Excitatory, PopulationKind::Inhibitory]
                    .into_iter()
                    .filter_map(|kind| engine.state(kind))
                    .collect();
                let snapshot = Snapshot::build(network, config.seed(), config.simtime(), states)?;
                persistence::save(path, &snapshot)?
            }
            Some(_) => {
                log::info!("Rank {} leaves saving the network to rank 0", engine.rank());
                vec![]
            }
            None => vec![],
        };

        let spike_files = MonitorAttacher::new(config).attach(engine)?;

        let timing = BenchmarkRunner::new(config)
            .with_timefile(self.timefile.clone())
            .run(engine)?;

        Ok(BenchmarkReport {
            num_neurons,
            num_synapses,
            saved_files,
            spike_files,
            timing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOptions;
    use crate::runner::tests::MockEngine;
    use std::path::Path;
    use tempfile::tempdir;

    fn config(dir: &Path, options: ConfigOptions) -> BenchmarkConfig {
        BenchmarkConfig::build(ConfigOptions {
            dir: dir.to_path_buf(),
            simtime: 0.01,
            ..options
        })
        .unwrap()
    }

    #[test]
    fn test_pipeline_with_mock_engine() {
        let dir = tempdir().unwrap();
        let config = config(
            dir.path(),
            ConfigOptions {
                networkscale: 2,
                ..ConfigOptions::default()
            },
        );
        let mut engine = MockEngine::default();

        let report = Benchmark::new(&config)
            .with_timefile(dir.path().join(TIMEFILE))
            .run(&mut engine)
            .unwrap();

        assert_eq!(report.num_neurons, 8000);
        assert!((report.num_synapses as f64 / 8000.0 - 80.0).abs() < 1.0);
        assert_eq!(report.spike_files.len(), 2);
        assert!(report.saved_files.is_empty());
        assert_eq!(engine.simulated, 0.01);
    }

    #[test]
    fn test_pipeline_load_error_stops_before_run() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let config = config(
            &out,
            ConfigOptions {
                fii: Some(dir.path().join("missing.wmat")),
                ..ConfigOptions::default()
            },
        );
        let mut engine = MockEngine::default();

        assert!(matches!(
            Benchmark::new(&config)
                .with_timefile(dir.path().join(TIMEFILE))
                .run(&mut engine),
            Err(BenchError::LoadError(_))
        ));
        assert_eq!(engine.simulated, 0.0);
        assert!(!out.exists());
        assert!(!dir.path().join(TIMEFILE).exists());
    }

    #[test]
    fn test_pipeline_creates_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let config = config(&out, ConfigOptions::default());

        let report = Benchmark::new(&config)
            .with_timefile(dir.path().join(TIMEFILE))
            .run(&mut MockEngine::default())
            .unwrap();
        assert!(out.is_dir());
        assert!(out.join("elapsed.dat").exists());
        assert!(report.spike_files.iter().all(|p| p.starts_with(&out)));
    }

    #[test]
    fn test_only_rank_zero_saves() {
        let dir = tempdir().unwrap();
        let save = dir.path().join("net.json");
        let config = config(
            dir.path(),
            ConfigOptions {
                fast: true,
                save: Some(save.clone()),
                ..ConfigOptions::default()
            },
        );

        let mut engine = MockEngine {
            rank: 1,
            ..MockEngine::default()
        };
        let report = Benchmark::new(&config)
            .with_timefile(dir.path().join(TIMEFILE))
            .run(&mut engine)
            .unwrap();
        assert!(report.saved_files.is_empty());
        assert!(!save.exists());

        let mut engine = MockEngine::default();
        let report = Benchmark::new(&config)
            .with_timefile(dir.path().join(TIMEFILE))
            .run(&mut engine)
            .unwrap();
        assert_eq!(report.saved_files.len(), 5);

        let snapshot = persistence::load_snapshot(&save).unwrap();
        assert_eq!(snapshot.seed(), config.seed());
        assert_eq!(snapshot.simtime(), config.simtime());
        assert_eq!(snapshot.network().num_synapses(), report.num_synapses);
        // the mock engine exposes no neuron state
        assert!(snapshot.state(PopulationKind::Excitatory).is_none());
    }
}
