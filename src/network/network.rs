//! The benchmark network: two populations and the four projections between them.
use serde::{Deserialize, Serialize};

use super::population::{NeuronPopulation, PopulationKind};
use super::projection::{Projection, ProjectionId};
use crate::error::BenchError;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Network {
    exc: NeuronPopulation,
    inh: NeuronPopulation,
    /// The projections, ordered as [`ProjectionId::ALL`].
    projections: Vec<Projection>,
}

impl Network {
    /// Create a network from its populations and projections.
    /// The function returns an error if the populations have the wrong type, a projection is missing or
    /// duplicated, or a synapse refers to a neuron outside its population.
    pub fn build(
        exc: NeuronPopulation,
        inh: NeuronPopulation,
        projections: Vec<Projection>,
    ) -> Result<Self, BenchError> {
        if exc.kind() != PopulationKind::Excitatory || inh.kind() != PopulationKind::Inhibitory {
            return Err(BenchError::ConfigError(
                "populations must be given as (excitatory, inhibitory)".to_string(),
            ));
        }

        let mut projections = projections;
        projections.sort_by_key(|p| p.id().index());
        let ids: Vec<ProjectionId> = projections.iter().map(|p| p.id()).collect();
        if ids != ProjectionId::ALL {
            return Err(BenchError::ConfigError(format!(
                "expected exactly one projection of each kind, got {:?}",
                ids
            )));
        }

        let network = Network {
            exc,
            inh,
            projections,
        };

        for projection in network.projections.iter() {
            let source_size = network.population(projection.id().source()).size();
            let target_size = network.population(projection.id().target()).size();
            if let Some(synapse) = projection
                .synapses()
                .iter()
                .find(|s| s.pre() >= source_size || s.post() >= target_size)
            {
                return Err(BenchError::ConfigError(format!(
                    "synapse {:?} of projection {:?} is out of bounds ({} x {})",
                    synapse,
                    projection.id(),
                    source_size,
                    target_size
                )));
            }
        }

        Ok(network)
    }

    /// Returns the population of the given type.
    pub fn population(&self, kind: PopulationKind) -> &NeuronPopulation {
        match kind {
            PopulationKind::Excitatory => &self.exc,
            PopulationKind::Inhibitory => &self.inh,
        }
    }

    /// Returns the projection with the given identifier.
    pub fn projection(&self, id: ProjectionId) -> &Projection {
        &self.projections[id.index()]
    }

    /// An iterator over the projections, in [`ProjectionId::ALL`] order.
    pub fn projections_iter(&self) -> impl Iterator<Item = &Projection> + '_ {
        self.projections.iter()
    }

    /// Returns the total number of neurons.
    pub fn num_neurons(&self) -> usize {
        self.exc.size() + self.inh.size()
    }

    /// Returns the total number of synapses.
    pub fn num_synapses(&self) -> usize {
        self.projections.iter().map(|p| p.num_synapses()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::projection::{ProjectionOrigin, Synapse, TransmitterKind};

    fn populations() -> (NeuronPopulation, NeuronPopulation) {
        (
            NeuronPopulation::build(PopulationKind::Excitatory, 4, 1, 5e-3, 2e-2).unwrap(),
            NeuronPopulation::build(PopulationKind::Inhibitory, 2, 1, 5e-3, 2e-2).unwrap(),
        )
    }

    fn projection(id: ProjectionId, synapses: Vec<Synapse>) -> Projection {
        Projection::build(
            id,
            1.0,
            TransmitterKind::of_source(id.source()),
            ProjectionOrigin::Random { sparseness: 0.5 },
            synapses,
        )
        .unwrap()
    }

    #[test]
    fn test_network_build() {
        let (exc, inh) = populations();
        let network = Network::build(
            exc,
            inh,
            vec![
                projection(ProjectionId::II, vec![Synapse::new(1, 1, 1.0)]),
                projection(ProjectionId::EE, vec![Synapse::new(0, 3, 1.0)]),
                projection(ProjectionId::IE, vec![Synapse::new(1, 3, 1.0)]),
                projection(ProjectionId::EI, vec![]),
            ],
        )
        .unwrap();

        assert_eq!(network.num_neurons(), 6);
        assert_eq!(network.num_synapses(), 3);
        let ids: Vec<ProjectionId> = network.projections_iter().map(|p| p.id()).collect();
        assert_eq!(ids, ProjectionId::ALL);
    }

    #[test]
    fn test_network_build_invalid() {
        let (exc, inh) = populations();
        assert!(Network::build(
            exc.clone(),
            inh.clone(),
            vec![
                projection(ProjectionId::EE, vec![]),
                projection(ProjectionId::EE, vec![]),
                projection(ProjectionId::IE, vec![]),
                projection(ProjectionId::II, vec![]),
            ],
        )
        .is_err());

        // post index 2 does not exist in the inhibitory population
        assert!(Network::build(
            exc,
            inh,
            vec![
                projection(ProjectionId::EE, vec![]),
                projection(ProjectionId::EI, vec![Synapse::new(3, 2, 1.0)]),
                projection(ProjectionId::IE, vec![]),
                projection(ProjectionId::II, vec![]),
            ],
        )
        .is_err());
    }
}
