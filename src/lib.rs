//! This crate configures and runs a weak-scaling benchmark of the Vogels-Abbott balanced network of
//! conductance-based (COBA) integrate-and-fire neurons, following Brette et al. (2007).
//!
//! # Weak scaling
//!
//! At scale `k`, the network has `3200k` excitatory and `800k` inhibitory neurons, connected at random with
//! probability `0.02 / k`. Every neuron thus receives 80 inputs on average at every scale.
//!
//! ```rust
//! use coba_bench::network::scaler::NetworkScale;
//!
//! let scale = NetworkScale::new(2, 0.02).unwrap();
//! assert_eq!(scale.num_neurons(), 8000);
//! assert!((scale.mean_in_degree() - 80.0).abs() < 1e-9);
//! ```
//!
//! # Running a benchmark
//!
//! ```rust
//! use coba_bench::benchmark::Benchmark;
//! use coba_bench::config::{BenchmarkConfig, ConfigOptions};
//! use coba_bench::engine::local::LocalEngine;
//! use coba_bench::engine::EngineGuard;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let options = ConfigOptions {
//!     simtime: 0.005,
//!     fast: true,
//!     dir: dir.path().to_path_buf(),
//!     ..ConfigOptions::default()
//! };
//! let config = BenchmarkConfig::build(options).unwrap();
//!
//! let mut engine = EngineGuard::new(LocalEngine::new(0, 1, config.seed()).unwrap());
//! let report = Benchmark::new(&config)
//!     .with_timefile(dir.path().join("timefile.dat"))
//!     .run(&mut *engine)
//!     .unwrap();
//!
//! assert_eq!(report.num_neurons, 4000);
//! assert!(report.spike_files.is_empty());
//! ```

pub mod benchmark;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod network;
pub mod persistence;
pub mod runner;
