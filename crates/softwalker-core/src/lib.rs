pub mod batch;
pub mod body;
pub mod config;
pub mod constants;
pub mod creature;
pub mod evolution;
pub mod genome;
pub mod math;
pub mod metrics;
pub mod orchestrator;
pub mod physics;
pub mod rng;
pub mod topology;
pub mod worker;

pub use batch::{run_batch, step_population, SteppingMode};
pub use config::{SimConfig, SimConfigError};
pub use creature::{Creature, CreatureSnapshot};
pub use evolution::{EvolutionConfig, EvolutionError, ScoredGenome};
pub use genome::{Genome, MuscleGene};
pub use metrics::{GenerationSummary, RunSummary};
pub use orchestrator::{FrameReport, Orchestrator, OrchestratorError, SimClock};
pub use topology::{Topology, TopologyError};
pub use worker::{EvolutionWorker, EvolveRequest, EvolveResponse, WorkerError};
