//! Validated, immutable benchmark configuration.
//!
//! The raw options (as parsed from the command line) are collected in [`ConfigOptions`] and turned into a
//! [`BenchmarkConfig`] by the fallible [`BenchmarkConfig::build`]. Nothing in the benchmark is constructed
//! before this validation succeeded.
//!
//! # Examples
//!
//! ```rust
//! use coba_bench::config::{BenchmarkConfig, ConfigOptions};
//!
//! let options = ConfigOptions { networkscale: 2, fast: true, ..ConfigOptions::default() };
//! let config = BenchmarkConfig::build(options).unwrap();
//!
//! assert_eq!(config.scale_factor(), 2);
//! assert!(config.fast());
//!
//! let options = ConfigOptions { networkscale: 0, ..ConfigOptions::default() };
//! assert!(BenchmarkConfig::build(options).is_err());
//! ```
use std::path::{Path, PathBuf};

use crate::error::BenchError;
use crate::network::projection::ProjectionId;
use crate::network::scaler::NetworkScale;

/// The default simulated duration (in seconds).
pub const DEFAULT_SIMTIME: f64 = 20.0;
/// The default excitatory weight (in units of the leak conductance).
pub const DEFAULT_EXC_WEIGHT: f64 = 0.4;
/// The default inhibitory weight (in units of the leak conductance).
pub const DEFAULT_INH_WEIGHT: f64 = 5.1;
/// The connection probability of the network at scale 1.
pub const BASE_SPARSENESS: f64 = 0.02;
/// The absolute refractory period of all neurons (in seconds).
pub const REFRACTORY_PERIOD: f64 = 5.0e-3;
/// The background current driving all neurons.
pub const BACKGROUND_CURRENT: f64 = 2.0e-2;
/// The default output directory.
pub const DEFAULT_DIR: &str = "/tmp";

/// Raw, unvalidated benchmark options.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOptions {
    /// Simulated duration in seconds.
    pub simtime: f64,
    /// Network scale, relative to 4000 neurons.
    pub networkscale: i64,
    /// Synaptic delay in timesteps.
    pub num_timesteps_delay: i64,
    /// Disable spike recording.
    pub fast: bool,
    /// Basename of the network snapshot, if any.
    pub save: Option<PathBuf>,
    /// Output directory.
    pub dir: PathBuf,
    pub fee: Option<PathBuf>,
    pub fei: Option<PathBuf>,
    pub fie: Option<PathBuf>,
    pub fii: Option<PathBuf>,
    /// Seed of the topology and initial state generators.
    pub seed: u64,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        ConfigOptions {
            simtime: DEFAULT_SIMTIME,
            networkscale: 1,
            num_timesteps_delay: 1,
            fast: false,
            save: None,
            dir: PathBuf::from(DEFAULT_DIR),
            fee: None,
            fei: None,
            fie: None,
            fii: None,
            seed: 1,
        }
    }
}

/// The benchmark configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    scale: NetworkScale,
    exc_weight: f64,
    inh_weight: f64,
    base_sparseness: f64,
    simtime: f64,
    delay: usize,
    refractory_period: f64,
    background_current: f64,
    fast: bool,
    dir: PathBuf,
    save: Option<PathBuf>,
    load_paths: [Option<PathBuf>; 4],
    seed: u64,
}

/// Empty paths are treated as absent.
fn non_empty(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

impl BenchmarkConfig {
    /// Validate the options and build the configuration.
    /// The function returns a `ConfigError` for a non-positive or oversized network scale, a non-positive delay,
    /// a non-positive or non-finite simulation time, or connectivity files combined with a network scale
    /// greater than 1.
    pub fn build(options: ConfigOptions) -> Result<Self, BenchError> {
        if options.networkscale < 1 {
            return Err(BenchError::ConfigError(format!(
                "network scale must be a positive integer, got {}",
                options.networkscale
            )));
        }
        let scale_factor = usize::try_from(options.networkscale)
            .map_err(|e| BenchError::ConfigError(format!("network scale out of range: {}", e)))?;
        let scale = NetworkScale::new(scale_factor, BASE_SPARSENESS)?;

        if !options.simtime.is_finite() || options.simtime <= 0.0 {
            return Err(BenchError::ConfigError(format!(
                "simulation time must be positive and finite, got {}",
                options.simtime
            )));
        }

        if options.num_timesteps_delay < 1 {
            return Err(BenchError::ConfigError(format!(
                "synaptic delay must be at least one timestep, got {}",
                options.num_timesteps_delay
            )));
        }
        let delay = usize::try_from(options.num_timesteps_delay)
            .map_err(|e| BenchError::ConfigError(format!("synaptic delay out of range: {}", e)))?;

        if options.dir.as_os_str().is_empty() {
            return Err(BenchError::ConfigError(
                "output directory must not be empty".to_string(),
            ));
        }

        let load_paths = [
            non_empty(options.fee),
            non_empty(options.fei),
            non_empty(options.fie),
            non_empty(options.fii),
        ];
        if scale_factor > 1 && load_paths.iter().any(Option::is_some) {
            return Err(BenchError::ConfigError(format!(
                "connectivity files are only defined at network scale 1, got scale {}",
                scale_factor
            )));
        }

        Ok(BenchmarkConfig {
            scale,
            exc_weight: DEFAULT_EXC_WEIGHT,
            inh_weight: DEFAULT_INH_WEIGHT,
            base_sparseness: BASE_SPARSENESS,
            simtime: options.simtime,
            delay,
            refractory_period: REFRACTORY_PERIOD,
            background_current: BACKGROUND_CURRENT,
            fast: options.fast,
            dir: options.dir,
            save: non_empty(options.save),
            load_paths,
            seed: options.seed,
        })
    }

    /// Returns the network scale factor (at least 1).
    pub fn scale_factor(&self) -> usize {
        self.scale.scale_factor()
    }

    /// Returns the population sizes and connection probability at this scale.
    pub fn scale(&self) -> NetworkScale {
        self.scale
    }

    /// Returns the weight of the excitatory projections.
    pub fn exc_weight(&self) -> f64 {
        self.exc_weight
    }

    /// Returns the weight of the inhibitory projections.
    pub fn inh_weight(&self) -> f64 {
        self.inh_weight
    }

    /// Returns the connection probability at scale 1.
    pub fn base_sparseness(&self) -> f64 {
        self.base_sparseness
    }

    /// Returns the simulated duration in seconds.
    pub fn simtime(&self) -> f64 {
        self.simtime
    }

    /// Returns the synaptic delay in timesteps.
    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn refractory_period(&self) -> f64 {
        self.refractory_period
    }

    pub fn background_current(&self) -> f64 {
        self.background_current
    }

    /// Returns true if spike recording is disabled.
    pub fn fast(&self) -> bool {
        self.fast
    }

    /// Returns the output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the snapshot basename, if saving was requested.
    pub fn save_path(&self) -> Option<&Path> {
        self.save.as_deref()
    }

    /// Returns the connectivity file supplied for a projection, if any.
    pub fn load_path(&self, id: ProjectionId) -> Option<&Path> {
        self.load_paths[id.index()].as_deref()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let config = BenchmarkConfig::build(ConfigOptions::default()).unwrap();
        assert_eq!(config.scale_factor(), 1);
        assert_eq!(config.simtime(), DEFAULT_SIMTIME);
        assert_eq!(config.delay(), 1);
        assert_eq!(config.exc_weight(), 0.4);
        assert_eq!(config.inh_weight(), 5.1);
        assert_eq!(config.dir(), Path::new("/tmp"));
        assert!(!config.fast());
        assert!(config.save_path().is_none());
        for id in ProjectionId::ALL {
            assert!(config.load_path(id).is_none());
        }
    }

    #[test]
    fn test_build_invalid_scale() {
        for networkscale in [0, -1] {
            let options = ConfigOptions {
                networkscale,
                ..ConfigOptions::default()
            };
            assert!(matches!(
                BenchmarkConfig::build(options),
                Err(BenchError::ConfigError(_))
            ));
        }
    }

    #[test]
    fn test_build_oversized_scale() {
        let options = ConfigOptions {
            networkscale: i64::MAX,
            ..ConfigOptions::default()
        };
        assert!(matches!(
            BenchmarkConfig::build(options),
            Err(BenchError::ConfigError(_))
        ));

        let options = ConfigOptions {
            networkscale: 4,
            ..ConfigOptions::default()
        };
        let scale = BenchmarkConfig::build(options).unwrap().scale();
        assert_eq!(scale.num_neurons(), 16000);
        assert!((scale.sparseness() - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_build_invalid_simtime_and_delay() {
        for simtime in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let options = ConfigOptions {
                simtime,
                ..ConfigOptions::default()
            };
            assert!(matches!(
                BenchmarkConfig::build(options),
                Err(BenchError::ConfigError(_))
            ));
        }

        let options = ConfigOptions {
            num_timesteps_delay: 0,
            ..ConfigOptions::default()
        };
        assert!(matches!(
            BenchmarkConfig::build(options),
            Err(BenchError::ConfigError(_))
        ));
    }

    #[test]
    fn test_build_load_paths() {
        let options = ConfigOptions {
            fei: Some(PathBuf::from("ei.wmat")),
            fii: Some(PathBuf::new()),
            ..ConfigOptions::default()
        };
        let config = BenchmarkConfig::build(options).unwrap();
        assert_eq!(config.load_path(ProjectionId::EI), Some(Path::new("ei.wmat")));
        assert!(config.load_path(ProjectionId::II).is_none());
        assert!(config.load_path(ProjectionId::EE).is_none());
    }

    #[test]
    fn test_build_load_paths_rejected_above_base_scale() {
        let options = ConfigOptions {
            networkscale: 2,
            fee: Some(PathBuf::from("ee.wmat")),
            ..ConfigOptions::default()
        };
        assert!(matches!(
            BenchmarkConfig::build(options),
            Err(BenchError::ConfigError(_))
        ));

        // empty paths do not count as supplied files
        let options = ConfigOptions {
            networkscale: 2,
            fee: Some(PathBuf::new()),
            ..ConfigOptions::default()
        };
        assert!(BenchmarkConfig::build(options).is_ok());
    }
}
