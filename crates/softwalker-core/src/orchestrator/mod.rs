//! Generation loop: simulate, score, summarise, evolve, respawn.

pub mod clock;

pub use clock::SimClock;

use crate::batch::{self, BatchError};
use crate::config::{SimConfig, SimConfigError};
use crate::creature::{Creature, CreatureSnapshot};
use crate::evolution::fitness::evaluate_population;
use crate::evolution::{seed_population, EvolutionError, ScoredGenome};
use crate::genome::Genome;
use crate::metrics::{GenerationSummary, RunSummary};
use crate::rng::create_rng;
use crate::topology::Topology;
use crate::worker::{run_request, EvolutionWorker, EvolveRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{error::Error, fmt};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    Config(SimConfigError),
    Batch(BatchError),
    Evolution(EvolutionError),
    IncompatibleGenome { genome_id: u64 },
    TooManyGenerations { max: usize, actual: usize },
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::Config(e) => write!(f, "{e}"),
            OrchestratorError::Batch(e) => write!(f, "{e}"),
            OrchestratorError::Evolution(e) => write!(f, "{e}"),
            OrchestratorError::IncompatibleGenome { genome_id } => write!(
                f,
                "genome {genome_id} does not list one gene per topology muscle in order"
            ),
            OrchestratorError::TooManyGenerations { max, actual } => {
                write!(f, "generations ({actual}) exceed supported maximum ({max})")
            }
        }
    }
}

impl From<SimConfigError> for OrchestratorError {
    fn from(err: SimConfigError) -> Self {
        OrchestratorError::Config(err)
    }
}

impl From<BatchError> for OrchestratorError {
    fn from(err: BatchError) -> Self {
        OrchestratorError::Batch(err)
    }
}

impl From<EvolutionError> for OrchestratorError {
    fn from(err: EvolutionError) -> Self {
        OrchestratorError::Evolution(err)
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OrchestratorError::Config(e) => Some(e),
            OrchestratorError::Batch(e) => Some(e),
            OrchestratorError::Evolution(e) => Some(e),
            _ => None,
        }
    }
}

/// What one interactive frame did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub ticks: usize,
    /// Summaries of generations that finished during the frame.
    pub finished: Vec<GenerationSummary>,
    /// True when the frame stopped with whole steps still pending.
    pub over_budget: bool,
}

pub struct Orchestrator {
    config: SimConfig,
    topology: Arc<Topology>,
    creatures: Vec<Creature>,
    clock: SimClock,
    generation: u32,
    summary: RunSummary,
}

impl Orchestrator {
    pub const MAX_GENERATIONS: usize = 100_000;

    /// Validate the config and seed generation zero from `config.seed`.
    pub fn new(config: SimConfig, topology: Arc<Topology>) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let muscle_ids: Vec<_> = topology.muscle_ids().collect();
        let genomes = seed_population(
            config.evolution.population_size,
            &muscle_ids,
            &mut create_rng(config.seed),
        );
        let clock = SimClock::new(config.dt, config.max_frame_delta);
        let summary = RunSummary::new(config.seed);
        let mut orchestrator = Self {
            config,
            topology,
            creatures: Vec::new(),
            clock,
            generation: 0,
            summary,
        };
        orchestrator.start_generation(genomes)?;
        Ok(orchestrator)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn creatures(&self) -> &[Creature] {
        &self.creatures
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn snapshots(&self) -> Vec<CreatureSnapshot> {
        self.creatures.iter().map(Creature::snapshot).collect()
    }

    /// Ticks left before the current generation is scored.
    pub fn remaining_ticks(&self) -> usize {
        self.config
            .generation_ticks
            .saturating_sub(self.clock.ticks() as usize)
    }

    /// Replace the population with fresh bodies built from `genomes`. The
    /// generation counter follows the newest genome.
    pub fn start_generation(&mut self, genomes: Vec<Genome>) -> Result<(), OrchestratorError> {
        for genome in &genomes {
            if !genome.drives_muscles(self.topology.muscle_ids()) {
                return Err(OrchestratorError::IncompatibleGenome {
                    genome_id: genome.id,
                });
            }
        }
        if let Some(generation) = genomes.iter().map(|g| g.generation).max() {
            self.generation = generation;
        }
        self.creatures = genomes
            .into_iter()
            .enumerate()
            .map(|(slot, genome)| Creature::new(slot as u64, genome, Arc::clone(&self.topology)))
            .collect();
        self.clock.reset_time();
        Ok(())
    }

    /// Simulate up to `ticks` ticks of the current generation.
    pub fn advance_ticks(&mut self, ticks: usize) -> Result<usize, OrchestratorError> {
        let ticks = ticks.min(self.remaining_ticks());
        if ticks == 0 {
            return Ok(0);
        }
        batch::simulate(
            self.config.stepping,
            self.config.parallel,
            &mut self.creatures,
            &self.config.environment,
            ticks,
            self.clock.time(),
            self.clock.dt(),
            &self.config.step,
        )?;
        self.clock.record_ticks(ticks);
        Ok(ticks)
    }

    pub fn simulate_generation(&mut self) -> Result<(), OrchestratorError> {
        self.advance_ticks(self.remaining_ticks())?;
        Ok(())
    }

    /// Score the population and record its summary.
    pub fn finish_generation(&mut self) -> GenerationSummary {
        evaluate_population(
            &mut self.creatures,
            &self.config.environment,
            &self.config.fitness,
        );
        let summary = GenerationSummary::collect(self.generation, &self.creatures);
        info!(
            generation = summary.generation,
            best = summary.best_fitness,
            mean = summary.mean_fitness,
            worst = summary.worst_fitness,
            dead = summary.dead_count,
            reached = summary.reached_count,
            "generation finished"
        );
        self.summary.record(summary.clone(), &self.creatures);
        summary
    }

    /// The worker request for the scored current population.
    pub fn evolve_request(&self) -> EvolveRequest {
        EvolveRequest {
            creatures: self.creatures.iter().map(ScoredGenome::from).collect(),
            config: self.config.evolution.clone(),
            seed: self.config.seed,
            generation: self.generation,
        }
    }

    /// Evolve in-process and start the next generation.
    pub fn evolve(&mut self) -> Result<(), OrchestratorError> {
        let genomes = run_request(self.evolve_request())?;
        self.advance_generation(genomes)
    }

    /// Evolve through the worker; on any worker error the same request is
    /// evolved in-process.
    pub async fn evolve_with_worker(
        &mut self,
        worker: &EvolutionWorker,
    ) -> Result<(), OrchestratorError> {
        let request = self.evolve_request();
        let genomes = match worker.evolve(request.clone()).await {
            Ok(genomes) => genomes,
            Err(err) => {
                warn!(generation = self.generation, "evolution worker failed ({err}); evolving in-process");
                self.summary.evolution_fallbacks += 1;
                run_request(request)?
            }
        };
        self.advance_generation(genomes)
    }

    fn advance_generation(&mut self, genomes: Vec<Genome>) -> Result<(), OrchestratorError> {
        let next = self.generation + 1;
        self.start_generation(genomes)?;
        self.generation = next;
        Ok(())
    }

    fn check_generations(generations: usize) -> Result<(), OrchestratorError> {
        if generations > Self::MAX_GENERATIONS {
            return Err(OrchestratorError::TooManyGenerations {
                max: Self::MAX_GENERATIONS,
                actual: generations,
            });
        }
        Ok(())
    }

    /// Headless run. The population left after the last generation is the
    /// scored one, not its offspring.
    pub fn run(&mut self, generations: usize) -> Result<RunSummary, OrchestratorError> {
        Self::check_generations(generations)?;
        for index in 0..generations {
            self.simulate_generation()?;
            self.finish_generation();
            if index + 1 < generations {
                self.evolve()?;
            }
        }
        Ok(self.summary.clone())
    }

    /// Headless run delegating evolution to `worker`.
    pub async fn run_with_worker(
        &mut self,
        generations: usize,
        worker: &EvolutionWorker,
    ) -> Result<RunSummary, OrchestratorError> {
        Self::check_generations(generations)?;
        for index in 0..generations {
            self.simulate_generation()?;
            self.finish_generation();
            if index + 1 < generations {
                self.evolve_with_worker(worker).await?;
            }
        }
        Ok(self.summary.clone())
    }

    /// Interactive step: feed `wall_delta` seconds into the clock and drain
    /// whole ticks until the frame budget runs out. A generation that fills
    /// up is scored and evolved in-process before stepping continues.
    pub fn frame(&mut self, wall_delta: f64) -> Result<FrameReport, OrchestratorError> {
        let started = Instant::now();
        let budget = Duration::from_secs_f64(self.config.frame_budget_ms / 1000.0);
        let mut report = FrameReport::default();
        self.clock.advance(wall_delta);

        while self.clock.has_step() {
            if started.elapsed() >= budget {
                report.over_budget = true;
                break;
            }
            if self.remaining_ticks() == 0 {
                report.finished.push(self.finish_generation());
                self.evolve()?;
                continue;
            }
            self.clock.consume_step();
            report.ticks += self.advance_ticks(1)?;
        }
        Ok(report)
    }
}
