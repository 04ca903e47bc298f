//! A single-process engine for conductance-based integrate-and-fire networks.
//!
//! Neurons follow the COBA dynamics of the Vogels-Abbott benchmark:
//!
//! `tau_mem dV/dt = (E_rest - V) - g_ampa V + g_gaba (E_gaba - V) + I_bg`,
//!
//! with exponentially decaying conductances (expressed in units of the leak conductance) and a fixed-step
//! forward Euler integration. Spikes are delivered after the axonal delay of the emitting population.
//!
//! Every rank simulates the whole network; observers only see the neurons owned by the rank (neuron `i` is
//! owned by rank `i % num_ranks`), so that spike files of different ranks partition the spikes.
use derivative::Derivative;
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{NeuronStates, SimulationEngine, SpikeObserver};
use crate::error::BenchError;
use crate::network::population::{NeuronPopulation, PopulationKind};
use crate::network::projection::{Projection, TransmitterKind};

/// The integration timestep (in seconds).
pub const TIMESTEP: f64 = 1e-4;
/// Minimum number of neurons to parallelize the membrane update.
pub const MIN_NEURONS_PAR: usize = 1000;

const TAU_MEM: f64 = 20e-3;
const TAU_AMPA: f64 = 5e-3;
const TAU_GABA: f64 = 10e-3;
const E_REST: f64 = -60e-3;
const E_THR: f64 = -50e-3;
const E_REV_GABA: f64 = -80e-3;

const RANK_VARS: [&str; 3] = ["OMPI_COMM_WORLD_RANK", "PMI_RANK", "SLURM_PROCID"];
const SIZE_VARS: [&str; 3] = ["OMPI_COMM_WORLD_SIZE", "PMI_SIZE", "SLURM_NTASKS"];

#[derive(Debug, Clone, Copy, PartialEq)]
struct NeuronState {
    mem: f64,
    g_ampa: f64,
    g_gaba: f64,
    refractory_until: u64,
}

impl NeuronState {
    /// Advance the neuron by one timestep. Returns true if it fired.
    fn integrate(&mut self, clock: u64, bg_current: f64, refractory_steps: u64) -> bool {
        let leak = E_REST - self.mem;
        let exc = -self.mem * self.g_ampa;
        let inh = (E_REV_GABA - self.mem) * self.g_gaba;

        if clock < self.refractory_until {
            self.mem = E_REST;
        } else {
            self.mem += (leak + exc + inh + bg_current) * TIMESTEP / TAU_MEM;
        }
        self.g_ampa *= (-TIMESTEP / TAU_AMPA).exp();
        self.g_gaba *= (-TIMESTEP / TAU_GABA).exp();

        if self.mem > E_THR {
            self.mem = E_REST;
            self.refractory_until = clock + 1 + refractory_steps;
            return true;
        }
        false
    }
}

#[derive(Debug)]
struct PopulationState {
    kind: PopulationKind,
    neurons: Vec<NeuronState>,
    bg_current: f64,
    refractory_steps: u64,
    /// Spikes in flight, one entry per timestep of delay.
    in_flight: VecDeque<Vec<usize>>,
}

/// The synapses of one projection in compressed sparse row layout, indexed by presynaptic neuron.
#[derive(Debug)]
struct SynapseTable {
    source: PopulationKind,
    target: PopulationKind,
    transmitter: TransmitterKind,
    offsets: Vec<usize>,
    targets: Vec<(usize, f64)>,
}

impl SynapseTable {
    fn new(projection: &Projection, source_size: usize) -> Self {
        let mut offsets = vec![0; source_size + 1];
        for synapse in projection.synapses() {
            offsets[synapse.pre() + 1] += 1;
        }
        for i in 0..source_size {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let mut targets = vec![(0, 0.0); projection.num_synapses()];
        for synapse in projection.synapses() {
            targets[cursor[synapse.pre()]] = (synapse.post(), synapse.weight());
            cursor[synapse.pre()] += 1;
        }

        SynapseTable {
            source: projection.id().source(),
            target: projection.id().target(),
            transmitter: projection.transmitter(),
            offsets,
            targets,
        }
    }

    fn outputs(&self, pre: usize) -> &[(usize, f64)] {
        &self.targets[self.offsets[pre]..self.offsets[pre + 1]]
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct LocalEngine {
    rank: usize,
    num_ranks: usize,
    rng: ChaCha8Rng,
    populations: Vec<PopulationState>,
    projections: Vec<SynapseTable>,
    #[derivative(Debug = "ignore")]
    observers: Vec<(PopulationKind, Box<dyn SpikeObserver>)>,
    stop: Arc<AtomicBool>,
    quiet: bool,
    clock: u64,
    last_elapsed_time: f64,
}

fn env_usize(vars: &[&str]) -> Result<Option<usize>, BenchError> {
    for var in vars {
        if let Ok(value) = env::var(var) {
            return value.trim().parse().map(Some).map_err(|e| {
                BenchError::ConfigError(format!("invalid value {:?} for {}: {}", value, var, e))
            });
        }
    }
    Ok(None)
}

impl LocalEngine {
    /// Create an engine for the given rank. The seed drives the initial membrane potentials.
    /// Returns an error if the rank is not smaller than the number of ranks.
    pub fn new(rank: usize, num_ranks: usize, seed: u64) -> Result<Self, BenchError> {
        if rank >= num_ranks {
            return Err(BenchError::ConfigError(format!(
                "rank {} is out of range for {} ranks",
                rank, num_ranks
            )));
        }

        Ok(LocalEngine {
            rank,
            num_ranks,
            rng: ChaCha8Rng::seed_from_u64(seed),
            populations: vec![],
            projections: vec![],
            observers: vec![],
            stop: Arc::new(AtomicBool::new(false)),
            quiet: false,
            clock: 0,
            last_elapsed_time: 0.0,
        })
    }

    /// Create an engine whose rank and number of ranks are read from the launcher environment
    /// (Open MPI, PMI or Slurm variables). Defaults to a single rank.
    pub fn from_env(seed: u64) -> Result<Self, BenchError> {
        let rank = env_usize(&RANK_VARS)?.unwrap_or(0);
        let num_ranks = env_usize(&SIZE_VARS)?.unwrap_or(1);
        LocalEngine::new(rank, num_ranks, seed)
    }

    /// A handle to request the current run to stop. A stopped run does not complete.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The current simulated time (in seconds).
    pub fn time(&self) -> f64 {
        self.clock as f64 * TIMESTEP
    }

    fn population_index(&self, kind: PopulationKind) -> Option<usize> {
        self.populations.iter().position(|p| p.kind == kind)
    }

    /// Advance the network by one timestep.
    /// Returns an error if a membrane potential is no longer finite.
    fn step(&mut self) -> Result<(), String> {
        let clock = self.clock;
        let time = self.time();

        let mut delivered: Vec<Vec<usize>> = Vec::with_capacity(self.populations.len());
        for population in self.populations.iter_mut() {
            let bg_current = population.bg_current;
            let refractory_steps = population.refractory_steps;

            let (spikes, unstable) = if population.neurons.len() >= MIN_NEURONS_PAR {
                let spikes: Vec<usize> = population
                    .neurons
                    .par_iter_mut()
                    .enumerate()
                    .filter_map(|(id, neuron)| {
                        neuron
                            .integrate(clock, bg_current, refractory_steps)
                            .then_some(id)
                    })
                    .collect();
                let unstable = population.neurons.par_iter().any(|n| !n.mem.is_finite());
                (spikes, unstable)
            } else {
                let spikes: Vec<usize> = population
                    .neurons
                    .iter_mut()
                    .enumerate()
                    .filter_map(|(id, neuron)| {
                        neuron
                            .integrate(clock, bg_current, refractory_steps)
                            .then_some(id)
                    })
                    .collect();
                let unstable = population.neurons.iter().any(|n| !n.mem.is_finite());
                (spikes, unstable)
            };

            if unstable {
                return Err(format!(
                    "non-finite membrane potential in the {:?} population at t={:.4}s",
                    population.kind, time
                ));
            }

            for (kind, observer) in self.observers.iter_mut() {
                if *kind == population.kind {
                    spikes
                        .iter()
                        .filter(|&&id| id % self.num_ranks == self.rank)
                        .for_each(|&id| observer.observe(time, id));
                }
            }

            population.in_flight.push_back(spikes);
            delivered.push(population.in_flight.pop_front().unwrap_or_default());
        }

        for table in self.projections.iter() {
            let (Some(source), Some(target)) = (
                self.populations.iter().position(|p| p.kind == table.source),
                self.populations.iter().position(|p| p.kind == table.target),
            ) else {
                continue;
            };
            let neurons = &mut self.populations[target].neurons;
            for &pre in delivered[source].iter() {
                for &(post, weight) in table.outputs(pre) {
                    match table.transmitter {
                        TransmitterKind::Excitatory => neurons[post].g_ampa += weight,
                        TransmitterKind::Inhibitory => neurons[post].g_gaba += weight,
                    }
                }
            }
        }

        self.clock += 1;
        Ok(())
    }

    fn flush_observers(&mut self) {
        for (kind, observer) in self.observers.iter_mut() {
            if let Err(e) = observer.flush() {
                log::error!("Failed to flush the {:?} spike observer: {}", kind, e);
            }
        }
    }
}

impl SimulationEngine for LocalEngine {
    fn rank(&self) -> usize {
        self.rank
    }

    fn add_population(&mut self, population: &NeuronPopulation) -> Result<(), BenchError> {
        if self.population_index(population.kind()).is_some() {
            return Err(BenchError::ConfigError(format!(
                "a {:?} population was already added",
                population.kind()
            )));
        }

        let uniform = Uniform::new(E_REST, E_THR);
        let neurons = (0..population.size())
            .map(|_| NeuronState {
                mem: uniform.sample(&mut self.rng),
                g_ampa: 0.0,
                g_gaba: 0.0,
                refractory_until: 0,
            })
            .collect();

        self.populations.push(PopulationState {
            kind: population.kind(),
            neurons,
            bg_current: population.background_current(),
            refractory_steps: (population.refractory_period() / TIMESTEP).round() as u64,
            in_flight: (0..population.delay()).map(|_| Vec::new()).collect(),
        });
        Ok(())
    }

    fn add_projection(&mut self, projection: &Projection) -> Result<(), BenchError> {
        let id = projection.id();
        let (Some(source), Some(target)) = (
            self.population_index(id.source()),
            self.population_index(id.target()),
        ) else {
            return Err(BenchError::ConfigError(format!(
                "the populations of projection {:?} were not added",
                id
            )));
        };

        let source_size = self.populations[source].neurons.len();
        let target_size = self.populations[target].neurons.len();
        if projection
            .synapses()
            .iter()
            .any(|s| s.pre() >= source_size || s.post() >= target_size)
        {
            return Err(BenchError::ConfigError(format!(
                "projection {:?} does not fit populations of size {} x {}",
                id, source_size, target_size
            )));
        }

        self.projections
            .push(SynapseTable::new(projection, source_size));
        Ok(())
    }

    fn attach_observer(
        &mut self,
        kind: PopulationKind,
        observer: Box<dyn SpikeObserver>,
    ) -> Result<(), BenchError> {
        if self.population_index(kind).is_none() {
            return Err(BenchError::ConfigError(format!(
                "cannot observe the missing {:?} population",
                kind
            )));
        }
        self.observers.push((kind, observer));
        Ok(())
    }

    fn state(&self, kind: PopulationKind) -> Option<NeuronStates> {
        let population = &self.populations[self.population_index(kind)?];
        NeuronStates::build(
            kind,
            population.neurons.iter().map(|n| n.mem).collect(),
            population.neurons.iter().map(|n| n.g_ampa).collect(),
            population.neurons.iter().map(|n| n.g_gaba).collect(),
        )
        .ok()
    }

    fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    fn run(&mut self, simtime: f64) -> bool {
        let num_steps = (simtime / TIMESTEP).round() as u64;
        let log_interval = (num_steps / 10).max(1);
        let start = Instant::now();

        let mut completed = true;
        for step in 0..num_steps {
            if self.stop.load(Ordering::Relaxed) {
                log::warn!("Run stopped at t={:.4}s", self.time());
                completed = false;
                break;
            }
            if let Err(e) = self.step() {
                log::error!("Run failed: {}", e);
                completed = false;
                break;
            }
            if !self.quiet && (step + 1) % log_interval == 0 {
                log::debug!(
                    "Simulation progress: {:.0}% (Time: {:.4}s)",
                    100.0 * (step + 1) as f64 / num_steps as f64,
                    self.time()
                );
            }
        }

        self.last_elapsed_time = start.elapsed().as_secs_f64();
        self.flush_observers();
        completed
    }

    fn last_elapsed_time(&self) -> f64 {
        self.last_elapsed_time
    }

    fn abort(&mut self, errcode: i32) {
        // every rank runs its own copy of the network, there is no sibling to notify
        log::error!(
            "Rank {} aborting with error code {} ({} ranks)",
            self.rank,
            errcode,
            self.num_ranks
        );
        self.flush_observers();
    }

    fn teardown(&mut self) {
        self.flush_observers();
        self.observers.clear();
        self.projections.clear();
        self.populations.clear();
    }
}
