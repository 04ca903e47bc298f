//! Module implementing the projections (directed synapse sets) between populations.

use itertools::Itertools;
use rand::Rng;
use rand_distr::{Distribution, Geometric};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::population::PopulationKind;
use crate::error::BenchError;

/// The class of post-synaptic effect of a projection.
/// Consumed by the simulation engine, which decides which conductance a spike acts upon.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum TransmitterKind {
    Excitatory,
    Inhibitory,
}

impl TransmitterKind {
    /// The only transmitter kind a population of the given type may emit.
    pub fn of_source(kind: PopulationKind) -> Self {
        match kind {
            PopulationKind::Excitatory => TransmitterKind::Excitatory,
            PopulationKind::Inhibitory => TransmitterKind::Inhibitory,
        }
    }
}

/// Identifies one of the four projections of the network.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum ProjectionId {
    EE,
    EI,
    IE,
    II,
}

impl ProjectionId {
    /// All projections, in construction order.
    pub const ALL: [ProjectionId; 4] = [
        ProjectionId::EE,
        ProjectionId::EI,
        ProjectionId::IE,
        ProjectionId::II,
    ];

    pub fn index(&self) -> usize {
        match self {
            ProjectionId::EE => 0,
            ProjectionId::EI => 1,
            ProjectionId::IE => 2,
            ProjectionId::II => 3,
        }
    }

    /// Returns the type of the presynaptic population.
    pub fn source(&self) -> PopulationKind {
        match self {
            ProjectionId::EE | ProjectionId::EI => PopulationKind::Excitatory,
            ProjectionId::IE | ProjectionId::II => PopulationKind::Inhibitory,
        }
    }

    /// Returns the type of the postsynaptic population.
    pub fn target(&self) -> PopulationKind {
        match self {
            ProjectionId::EE | ProjectionId::IE => PopulationKind::Excitatory,
            ProjectionId::EI | ProjectionId::II => PopulationKind::Inhibitory,
        }
    }

    /// Short tag used in file names, e.g., `net.ee.wmat`.
    pub fn tag(&self) -> &'static str {
        match self {
            ProjectionId::EE => "ee",
            ProjectionId::EI => "ei",
            ProjectionId::IE => "ie",
            ProjectionId::II => "ii",
        }
    }
}

/// A synapse from neuron `pre` of the source population to neuron `post` of the target population.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Synapse {
    pre: usize,
    post: usize,
    weight: f64,
}

impl Synapse {
    pub fn new(pre: usize, post: usize, weight: f64) -> Self {
        Synapse { pre, post, weight }
    }

    /// Returns the index of the presynaptic neuron (within the source population).
    pub fn pre(&self) -> usize {
        self.pre
    }

    /// Returns the index of the postsynaptic neuron (within the target population).
    pub fn post(&self) -> usize {
        self.post
    }

    /// Returns the weight of the synapse.
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// A set of synapses of one projection.
pub type EdgeSet = Vec<Synapse>;

/// Where the synapses of a projection come from.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum ProjectionOrigin {
    /// Every ordered neuron pair is connected independently with the given probability.
    Random { sparseness: f64 },
    /// The synapses were read from a connectivity file.
    File { path: PathBuf },
}

/// Represents a directed projection between two populations.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Projection {
    id: ProjectionId,
    weight: f64,
    transmitter: TransmitterKind,
    origin: ProjectionOrigin,
    synapses: EdgeSet,
}

impl Projection {
    /// Create a projection with the specified synapses.
    /// Returns an error if the transmitter kind does not match the type of the source population.
    pub fn build(
        id: ProjectionId,
        weight: f64,
        transmitter: TransmitterKind,
        origin: ProjectionOrigin,
        synapses: EdgeSet,
    ) -> Result<Self, BenchError> {
        if transmitter != TransmitterKind::of_source(id.source()) {
            return Err(BenchError::ConfigError(format!(
                "projection {:?} cannot carry {:?} transmission from a {:?} population",
                id,
                transmitter,
                id.source()
            )));
        }

        Ok(Projection {
            id,
            weight,
            transmitter,
            origin,
            synapses,
        })
    }

    /// Sample a random projection: every (pre, post) pair is connected independently with probability
    /// `sparseness`, each synapse carrying `weight`.
    ///
    /// The dense index space is walked with geometrically distributed gaps, which yields the same
    /// distribution as one Bernoulli draw per pair at a cost proportional to the number of synapses.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use coba_bench::network::projection::{Projection, ProjectionId};
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    ///
    /// let mut rng = ChaCha8Rng::seed_from_u64(42);
    /// let projection = Projection::rand(ProjectionId::EI, 100, 50, 0.4, 0.1, &mut rng).unwrap();
    ///
    /// assert!(projection.synapses().iter().all(|s| s.pre() < 100 && s.post() < 50));
    /// assert!(projection.num_synapses() > 0);
    /// ```
    pub fn rand<R: Rng>(
        id: ProjectionId,
        source_size: usize,
        target_size: usize,
        weight: f64,
        sparseness: f64,
        rng: &mut R,
    ) -> Result<Self, BenchError> {
        let geometric = Geometric::new(sparseness).map_err(|e| {
            BenchError::ConfigError(format!("Invalid sparseness {}: {}", sparseness, e))
        })?;

        let num_pairs = (source_size as u64) * (target_size as u64);
        let expected = (sparseness * num_pairs as f64).ceil() as usize;
        let mut synapses = Vec::with_capacity(expected);

        let mut index: u64 = 0;
        if sparseness > 0.0 {
            loop {
                index = index.saturating_add(geometric.sample(rng));
                if index >= num_pairs {
                    break;
                }
                let pre = (index / target_size as u64) as usize;
                let post = (index % target_size as u64) as usize;
                synapses.push(Synapse::new(pre, post, weight));
                index += 1;
            }
        }

        Projection::build(
            id,
            weight,
            TransmitterKind::of_source(id.source()),
            ProjectionOrigin::Random { sparseness },
            synapses,
        )
    }

    pub fn id(&self) -> ProjectionId {
        self.id
    }

    /// Returns the nominal weight of the projection.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn transmitter(&self) -> TransmitterKind {
        self.transmitter
    }

    pub fn origin(&self) -> &ProjectionOrigin {
        &self.origin
    }

    /// Returns the synapses of the projection.
    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    /// Returns the number of synapses of the projection.
    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    /// The synapses with non-zero weight, sorted by (pre, post).
    /// Two projections with the same edge set compare equal regardless of the order of their synapses.
    pub fn edge_set(&self) -> Vec<(usize, usize, f64)> {
        self.synapses
            .iter()
            .filter(|s| s.weight != 0.0)
            .map(|s| (s.pre, s.post, s.weight))
            .sorted_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)))
            .collect()
    }
}
