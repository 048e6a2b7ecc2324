use crate::batch::SteppingMode;
use crate::evolution::crossover::CrossoverKind;
use crate::evolution::fitness::FitnessParams;
use crate::evolution::EvolutionConfig;
use crate::math::{Rect, Vec2};
use crate::physics::{Environment, Ground, StepOptions, Wall};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Base seed; generation `g` evolves with `derive_generation_rng(seed, g)`.
    pub seed: u64,
    /// Fixed simulation timestep in seconds.
    pub dt: f64,
    /// Ticks simulated per generation before scoring.
    pub generation_ticks: usize,
    /// Ground, walls and target zone shared by all creatures.
    pub environment: Environment,
    /// Gravity, air resistance and solver settings applied every tick.
    pub step: StepOptions,
    /// Fitness weights.
    pub fitness: FitnessParams,
    /// GA parameters, sent verbatim to the evolution worker.
    pub evolution: EvolutionConfig,
    /// Arena stepping or the per-creature fallback.
    pub stepping: SteppingMode,
    /// Step creature slots on the rayon pool.
    pub parallel: bool,
    /// Delegate evolution to the background worker when one is available.
    pub use_worker: bool,
    /// Wall-clock budget for one interactive frame, in milliseconds.
    pub frame_budget_ms: f64,
    /// Largest wall delta accepted by one clock advance, in seconds.
    pub max_frame_delta: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dt: 1.0 / 60.0,
            generation_ticks: 600,
            environment: default_environment(),
            step: StepOptions::default(),
            fitness: FitnessParams::default(),
            evolution: EvolutionConfig::default(),
            stepping: SteppingMode::Batched,
            parallel: true,
            use_worker: true,
            frame_budget_ms: 12.0,
            max_frame_delta: 0.25,
        }
    }
}

fn default_environment() -> Environment {
    Environment {
        ground: Ground {
            y: 500.0,
            restitution: 0.3,
            friction: 0.4,
        },
        walls: vec![Wall {
            x: 0.0,
            normal: Vec2::new(1.0, 0.0),
        }],
        target_zone: Some(Rect::new(Vec2::new(700.0, 300.0), Vec2::new(800.0, 500.0))),
    }
}

macro_rules! define_sim_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum SimConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for SimConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_sim_config_error! {
    InvalidDt => "dt must be positive and finite";
    InvalidForce => "step.force must be finite";
    InvalidAirResistance => "step.air_resistance must be finite and within [0,1)";
    InvalidSolverIterations { max: usize, actual: usize } => "step.solver.iterations must be within 1..={} (got {})", max, actual;
    InvalidStiffnessOverride => "step.solver.stiffness_override must be finite and within (0,1]";
    InvalidGround => "environment.ground.y must be finite";
    InvalidRestitution => "environment.ground.restitution must be finite and within [0,1]";
    InvalidFriction => "environment.ground.friction must be finite and within [0,1]";
    InvalidWall { index: usize } => "environment.walls[{index}] needs a finite x and a non-zero horizontal normal";
    InvalidTargetZone => "environment.target_zone must be finite with min <= max";
    InvalidPopulationSize { max: usize, actual: usize } => "evolution.population_size must be within 1..={} (got {})", max, actual;
    EliteCountExceedsPopulation => "evolution.elite_count must not exceed population_size";
    InvalidParentFraction => "evolution.parent_fraction must be finite and within (0,1]";
    InvalidTournamentSize => "evolution.tournament_size must be greater than 0";
    InvalidCrossoverParameter => "evolution.crossover parameter out of range (bias/alpha within [0,1], eta finite and non-negative)";
    InvalidMutationRate => "evolution.mutation.rate must be finite and within [0,1]";
    InvalidMutationStrength => "evolution.mutation.strength must be finite and non-negative";
    InvalidFitnessWeights => "fitness weights must be finite, partial_bonus_fraction within [0,1), falloff positive";
    InvalidGenerationTicks => "generation_ticks must be greater than 0";
    InvalidFrameBudget => "frame_budget_ms must be positive and finite";
    InvalidMaxFrameDelta => "max_frame_delta must be positive and finite";
}

impl std::error::Error for SimConfigError {}

impl SimConfig {
    pub const MAX_POPULATION: usize = crate::constants::MAX_POPULATION;

    pub const MAX_SOLVER_ITERATIONS: usize = crate::constants::MAX_SOLVER_ITERATIONS;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.validate_physics()?;
        self.validate_environment()?;
        self.validate_evolution()?;
        self.validate_schedule()?;
        Ok(())
    }

    fn validate_physics(&self) -> Result<(), SimConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimConfigError::InvalidDt);
        }
        if !self.step.force.is_finite() {
            return Err(SimConfigError::InvalidForce);
        }
        if !(self.step.air_resistance.is_finite() && (0.0..1.0).contains(&self.step.air_resistance))
        {
            return Err(SimConfigError::InvalidAirResistance);
        }
        let iterations = self.step.solver.iterations;
        if iterations == 0 || iterations > Self::MAX_SOLVER_ITERATIONS {
            return Err(SimConfigError::InvalidSolverIterations {
                max: Self::MAX_SOLVER_ITERATIONS,
                actual: iterations,
            });
        }
        if let Some(stiffness) = self.step.solver.stiffness_override {
            if !(stiffness.is_finite() && stiffness > 0.0 && stiffness <= 1.0) {
                return Err(SimConfigError::InvalidStiffnessOverride);
            }
        }
        Ok(())
    }

    fn validate_environment(&self) -> Result<(), SimConfigError> {
        let ground = &self.environment.ground;
        if !ground.y.is_finite() {
            return Err(SimConfigError::InvalidGround);
        }
        if !(ground.restitution.is_finite() && (0.0..=1.0).contains(&ground.restitution)) {
            return Err(SimConfigError::InvalidRestitution);
        }
        if !(ground.friction.is_finite() && (0.0..=1.0).contains(&ground.friction)) {
            return Err(SimConfigError::InvalidFriction);
        }
        for (index, wall) in self.environment.walls.iter().enumerate() {
            if !(wall.x.is_finite() && wall.normal.is_finite() && wall.normal.x != 0.0) {
                return Err(SimConfigError::InvalidWall { index });
            }
        }
        if let Some(zone) = &self.environment.target_zone {
            if !zone.is_valid() {
                return Err(SimConfigError::InvalidTargetZone);
            }
        }
        Ok(())
    }

    fn validate_evolution(&self) -> Result<(), SimConfigError> {
        let evo = &self.evolution;
        if evo.population_size == 0 || evo.population_size > Self::MAX_POPULATION {
            return Err(SimConfigError::InvalidPopulationSize {
                max: Self::MAX_POPULATION,
                actual: evo.population_size,
            });
        }
        if evo.elite_count > evo.population_size {
            return Err(SimConfigError::EliteCountExceedsPopulation);
        }
        if !(evo.parent_fraction.is_finite()
            && evo.parent_fraction > 0.0
            && evo.parent_fraction <= 1.0)
        {
            return Err(SimConfigError::InvalidParentFraction);
        }
        if evo.tournament_size == 0 {
            return Err(SimConfigError::InvalidTournamentSize);
        }
        let crossover_ok = match evo.crossover {
            CrossoverKind::Uniform { fitter_bias } => (0.0..=1.0).contains(&fitter_bias),
            CrossoverKind::Arithmetic { alpha } => (0.0..=1.0).contains(&alpha),
            CrossoverKind::Sbx { eta } => eta.is_finite() && eta >= 0.0,
        };
        if !crossover_ok {
            return Err(SimConfigError::InvalidCrossoverParameter);
        }
        if !(evo.mutation.rate.is_finite() && (0.0..=1.0).contains(&evo.mutation.rate)) {
            return Err(SimConfigError::InvalidMutationRate);
        }
        if !(evo.mutation.strength.is_finite() && evo.mutation.strength >= 0.0) {
            return Err(SimConfigError::InvalidMutationStrength);
        }
        let f = &self.fitness;
        if !(f.target_bonus.is_finite()
            && f.death_penalty.is_finite()
            && f.upright_weight.is_finite()
            && (0.0..1.0).contains(&f.partial_bonus_fraction)
            && f.partial_bonus_falloff.is_finite()
            && f.partial_bonus_falloff > 0.0)
        {
            return Err(SimConfigError::InvalidFitnessWeights);
        }
        Ok(())
    }

    fn validate_schedule(&self) -> Result<(), SimConfigError> {
        if self.generation_ticks == 0 {
            return Err(SimConfigError::InvalidGenerationTicks);
        }
        if !(self.frame_budget_ms.is_finite() && self.frame_budget_ms > 0.0) {
            return Err(SimConfigError::InvalidFrameBudget);
        }
        if !(self.max_frame_delta.is_finite() && self.max_frame_delta > 0.0) {
            return Err(SimConfigError::InvalidMaxFrameDelta);
        }
        Ok(())
    }
}
