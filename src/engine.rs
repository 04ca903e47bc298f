//! The simulation engine seam.
//!
//! The benchmark does not integrate neurons itself: it hands populations and projections to a
//! [`SimulationEngine`], optionally attaches [`SpikeObserver`]s, and asks the engine to run. The engine also
//! tells which rank the process holds among the cooperating processes and propagates aborts to them.
//!
//! [`local::LocalEngine`] is the engine shipped with the crate.
use serde::{Deserialize, Serialize};
use std::io;
use std::ops::{Deref, DerefMut};

use crate::error::BenchError;
use crate::network::population::{NeuronPopulation, PopulationKind};
use crate::network::projection::Projection;

pub mod local;

/// Receives the spikes of one population. Observers must not influence the dynamics.
pub trait SpikeObserver {
    /// Called once per spike, in time order, with the index of the neuron within its population.
    fn observe(&mut self, time: f64, neuron_id: usize);

    /// Flush any buffered spike.
    fn flush(&mut self) -> io::Result<()>;
}

/// The dynamic state of the neurons of one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronStates {
    kind: PopulationKind,
    /// Membrane potentials (in volts).
    potentials: Vec<f64>,
    /// Excitatory conductances (in units of the leak conductance).
    g_ampa: Vec<f64>,
    /// Inhibitory conductances (in units of the leak conductance).
    g_gaba: Vec<f64>,
}

impl NeuronStates {
    /// Collect the states of a population.
    /// The function returns an error if the three state vectors do not have the same length.
    pub fn build(
        kind: PopulationKind,
        potentials: Vec<f64>,
        g_ampa: Vec<f64>,
        g_gaba: Vec<f64>,
    ) -> Result<Self, BenchError> {
        if potentials.len() != g_ampa.len() || potentials.len() != g_gaba.len() {
            return Err(BenchError::ConfigError(format!(
                "inconsistent {:?} states: {} potentials, {} and {} conductances",
                kind,
                potentials.len(),
                g_ampa.len(),
                g_gaba.len()
            )));
        }
        Ok(NeuronStates {
            kind,
            potentials,
            g_ampa,
            g_gaba,
        })
    }

    pub fn kind(&self) -> PopulationKind {
        self.kind
    }

    /// Returns the number of neurons.
    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    pub fn potentials(&self) -> &[f64] {
        &self.potentials
    }

    pub fn g_ampa(&self) -> &[f64] {
        &self.g_ampa
    }

    pub fn g_gaba(&self) -> &[f64] {
        &self.g_gaba
    }
}

pub trait SimulationEngine {
    /// The rank of this process among the cooperating processes.
    fn rank(&self) -> usize;

    /// Instantiate a population.
    fn add_population(&mut self, population: &NeuronPopulation) -> Result<(), BenchError>;

    /// Instantiate a projection. Both of its populations must have been added before.
    fn add_projection(&mut self, projection: &Projection) -> Result<(), BenchError>;

    /// Attach an observer to the spikes emitted by the neurons of a population that this rank owns.
    fn attach_observer(
        &mut self,
        kind: PopulationKind,
        observer: Box<dyn SpikeObserver>,
    ) -> Result<(), BenchError>;

    /// The current state of the neurons of a population, if the engine exposes it.
    fn state(&self, _kind: PopulationKind) -> Option<NeuronStates> {
        None
    }

    /// Silence progress reporting during runs.
    fn set_quiet(&mut self, quiet: bool);

    /// Simulate `simtime` seconds. Returns false if the run did not complete.
    fn run(&mut self, simtime: f64) -> bool;

    /// The wall-clock duration (in seconds) of the last run, as measured by the engine.
    fn last_elapsed_time(&self) -> f64;

    /// Abort the run on all cooperating processes with the given error code.
    fn abort(&mut self, errcode: i32);

    /// Release every resource held by the engine (observers included). Must be idempotent.
    fn teardown(&mut self);
}

/// Owns an engine for the duration of a benchmark and tears it down on every exit path.
#[derive(Debug)]
pub struct EngineGuard<E: SimulationEngine> {
    engine: E,
}

impl<E: SimulationEngine> EngineGuard<E> {
    pub fn new(engine: E) -> Self {
        EngineGuard { engine }
    }
}

impl<E: SimulationEngine> Deref for EngineGuard<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

impl<E: SimulationEngine> DerefMut for EngineGuard<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: SimulationEngine> Drop for EngineGuard<E> {
    fn drop(&mut self) {
        log::info!("Freeing ...");
        self.engine.teardown();
    }
}
