//! Module implementing the neuron populations of the network.

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// The biological type of a population.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum PopulationKind {
    Excitatory,
    Inhibitory,
}

impl PopulationKind {
    /// Short tag used in file names, e.g., `coba.0.e.ras`.
    pub fn tag(&self) -> &'static str {
        match self {
            PopulationKind::Excitatory => "e",
            PopulationKind::Inhibitory => "i",
        }
    }
}

/// Represents a homogeneous population of conductance-based integrate-and-fire neurons.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NeuronPopulation {
    /// The type of the population.
    kind: PopulationKind,
    /// The number of neurons.
    size: usize,
    /// The axonal delay (in timesteps) of the spikes emitted by the population.
    delay: usize,
    /// The absolute refractory period (in seconds).
    refractory_period: f64,
    /// The background current driving every neuron.
    background_current: f64,
}

impl NeuronPopulation {
    /// Create a population with the specified parameters.
    /// Returns an error for an empty population, a zero delay or a negative refractory period.
    pub fn build(
        kind: PopulationKind,
        size: usize,
        delay: usize,
        refractory_period: f64,
        background_current: f64,
    ) -> Result<Self, BenchError> {
        if size == 0 {
            return Err(BenchError::ConfigError(
                "population size must be positive".to_string(),
            ));
        }
        if delay == 0 {
            return Err(BenchError::ConfigError(
                "population delay must be at least one timestep".to_string(),
            ));
        }
        if !(refractory_period >= 0.0) {
            return Err(BenchError::ConfigError(
                "refractory period must be non-negative".to_string(),
            ));
        }

        Ok(NeuronPopulation {
            kind,
            size,
            delay,
            refractory_period,
            background_current,
        })
    }

    pub fn kind(&self) -> PopulationKind {
        self.kind
    }

    /// Returns the number of neurons in the population.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the delay in timesteps.
    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn refractory_period(&self) -> f64 {
        self.refractory_period
    }

    pub fn background_current(&self) -> f64 {
        self.background_current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_build() {
        let population =
            NeuronPopulation::build(PopulationKind::Inhibitory, 800, 2, 5e-3, 2e-2).unwrap();
        assert_eq!(population.kind(), PopulationKind::Inhibitory);
        assert_eq!(population.size(), 800);
        assert_eq!(population.delay(), 2);
        assert_eq!(population.kind().tag(), "i");
    }

    #[test]
    fn test_population_build_invalid() {
        assert!(NeuronPopulation::build(PopulationKind::Excitatory, 0, 1, 5e-3, 2e-2).is_err());
        assert!(NeuronPopulation::build(PopulationKind::Excitatory, 10, 0, 5e-3, 2e-2).is_err());
        assert!(NeuronPopulation::build(PopulationKind::Excitatory, 10, 1, -1.0, 2e-2).is_err());
    }
}
