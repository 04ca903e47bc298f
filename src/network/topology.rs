//! Construction of the benchmark network.
//!
//! # Examples
//!
//! ```rust
//! use coba_bench::config::{BenchmarkConfig, ConfigOptions};
//! use coba_bench::network::projection::ProjectionId;
//! use coba_bench::network::scaler::NetworkScale;
//! use coba_bench::network::topology::TopologyBuilder;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let config = BenchmarkConfig::build(ConfigOptions::default()).unwrap();
//! let scale = NetworkScale::new(config.scale_factor(), config.base_sparseness()).unwrap();
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
//! let network = TopologyBuilder::new(&config, scale).build(&mut rng).unwrap();
//!
//! assert_eq!(network.num_neurons(), 4000);
//! assert_eq!(network.projection(ProjectionId::IE).weight(), 5.1);
//! ```
use rand::Rng;

use super::network::Network;
use super::population::{NeuronPopulation, PopulationKind};
use super::projection::{Projection, ProjectionId, ProjectionOrigin, TransmitterKind};
use super::scaler::NetworkScale;
use crate::config::BenchmarkConfig;
use crate::error::BenchError;
use crate::persistence;

/// Builds the two populations and the four projections of the network.
#[derive(Debug)]
pub struct TopologyBuilder<'a> {
    config: &'a BenchmarkConfig,
    scale: NetworkScale,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(config: &'a BenchmarkConfig, scale: NetworkScale) -> Self {
        TopologyBuilder { config, scale }
    }

    /// The nominal weight of the projections emitted by a population of the given type.
    pub fn weight(&self, source: PopulationKind) -> f64 {
        match source {
            PopulationKind::Excitatory => self.config.exc_weight(),
            PopulationKind::Inhibitory => self.config.inh_weight(),
        }
    }

    fn population(&self, kind: PopulationKind) -> Result<NeuronPopulation, BenchError> {
        let size = match kind {
            PopulationKind::Excitatory => self.scale.num_exc(),
            PopulationKind::Inhibitory => self.scale.num_inh(),
        };
        NeuronPopulation::build(
            kind,
            size,
            self.config.delay(),
            self.config.refractory_period(),
            self.config.background_current(),
        )
    }

    /// Build the network.
    ///
    /// At scale 1, a projection for which a connectivity file is configured is read from that file instead of
    /// being sampled. The file is loaded entirely before it replaces anything, so a failing load leaves no
    /// half-built projection behind.
    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<Network, BenchError> {
        log::info!("Setting up neuron groups ...");
        let exc = self.population(PopulationKind::Excitatory)?;
        let inh = self.population(PopulationKind::Inhibitory)?;

        let mut projections = Vec::with_capacity(ProjectionId::ALL.len());
        for id in ProjectionId::ALL {
            if id == ProjectionId::EE {
                log::info!("Setting up E connections ...");
            } else if id == ProjectionId::IE {
                log::info!("Setting up I connections ...");
            }
            projections.push(self.projection(id, &exc, &inh, rng)?);
        }

        let network = Network::build(exc, inh, projections)?;
        log::info!(
            "Network set up: {} neurons, {} synapses",
            network.num_neurons(),
            network.num_synapses()
        );
        Ok(network)
    }

    fn projection<R: Rng>(
        &self,
        id: ProjectionId,
        exc: &NeuronPopulation,
        inh: &NeuronPopulation,
        rng: &mut R,
    ) -> Result<Projection, BenchError> {
        let size = |kind: PopulationKind| match kind {
            PopulationKind::Excitatory => exc.size(),
            PopulationKind::Inhibitory => inh.size(),
        };
        let (source_size, target_size) = (size(id.source()), size(id.target()));
        let weight = self.weight(id.source());

        let file = match self.config.load_path(id) {
            Some(path) if self.scale.scale_factor() == 1 => Some(path),
            _ => None,
        };

        match file {
            Some(path) => {
                log::info!(
                    "Loading {} connectivity from file {}",
                    id.tag(),
                    path.display()
                );
                let synapses = persistence::load(path, source_size, target_size, weight)?;
                Projection::build(
                    id,
                    weight,
                    TransmitterKind::of_source(id.source()),
                    ProjectionOrigin::File {
                        path: path.to_path_buf(),
                    },
                    synapses,
                )
            }
            None => Projection::rand(
                id,
                source_size,
                target_size,
                weight,
                self.scale.sparseness(),
                rng,
            ),
        }
    }
}
