//! Weak-scaling of the network size.
//!
//! Scaling the network by a factor `k` multiplies the number of neurons by `k` and divides the connection
//! probability by `k`, so that the expected number of inputs per neuron stays the same.
//!
//! # Examples
//!
//! ```rust
//! use coba_bench::network::scaler::NetworkScale;
//!
//! let scale = NetworkScale::new(4, 0.02).unwrap();
//! assert_eq!(scale.num_exc(), 12800);
//! assert_eq!(scale.num_inh(), 3200);
//! assert!((scale.mean_in_degree() - 80.0).abs() < 1e-9);
//! ```
use crate::error::BenchError;

/// Number of excitatory neurons at scale 1.
pub const BASE_NUM_EXC: usize = 3200;
/// Number of inhibitory neurons at scale 1.
pub const BASE_NUM_INH: usize = 800;

/// Population sizes and connection probability derived from a scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkScale {
    scale_factor: usize,
    num_exc: usize,
    num_inh: usize,
    sparseness: f64,
}

impl NetworkScale {
    /// Scale the base network by `scale_factor`.
    /// The function returns a `ConfigError` if the scale factor is zero, the scaled network size overflows, or
    /// the base sparseness is not a probability.
    pub fn new(scale_factor: usize, base_sparseness: f64) -> Result<Self, BenchError> {
        if scale_factor == 0 {
            return Err(BenchError::ConfigError(
                "network scale must be a positive integer".to_string(),
            ));
        }
        if !(base_sparseness > 0.0 && base_sparseness <= 1.0) {
            return Err(BenchError::ConfigError(format!(
                "sparseness must lie in (0, 1], got {}",
                base_sparseness
            )));
        }

        let out_of_range = || {
            BenchError::ConfigError(format!(
                "network scale {} is out of range: the network size overflows",
                scale_factor
            ))
        };
        let num_exc = BASE_NUM_EXC
            .checked_mul(scale_factor)
            .ok_or_else(out_of_range)?;
        let num_inh = BASE_NUM_INH
            .checked_mul(scale_factor)
            .ok_or_else(out_of_range)?;
        num_exc.checked_add(num_inh).ok_or_else(out_of_range)?;

        Ok(NetworkScale {
            scale_factor,
            num_exc,
            num_inh,
            sparseness: base_sparseness / scale_factor as f64,
        })
    }

    pub fn scale_factor(&self) -> usize {
        self.scale_factor
    }

    /// Returns the number of excitatory neurons.
    pub fn num_exc(&self) -> usize {
        self.num_exc
    }

    /// Returns the number of inhibitory neurons.
    pub fn num_inh(&self) -> usize {
        self.num_inh
    }

    /// Returns the total number of neurons.
    pub fn num_neurons(&self) -> usize {
        self.num_exc + self.num_inh
    }

    /// Returns the scaled connection probability.
    pub fn sparseness(&self) -> f64 {
        self.sparseness
    }

    /// Returns the expected number of inputs per neuron, which does not depend on the scale factor.
    pub fn mean_in_degree(&self) -> f64 {
        self.sparseness * self.num_neurons() as f64
    }
}
