/// Prime multiplier used to derive per-generation RNG streams from a base seed.
/// Chosen so streams for consecutive generations have minimal overlap.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

/// Constraint error below which the solver leaves a link untouched.
pub const SOLVER_DEAD_BAND: f64 = 0.01;

/// Default Gauss-Seidel iterations per tick.
pub const DEFAULT_SOLVER_ITERATIONS: usize = 3;

/// Nominal timestep used to rebuild the velocity field after a ground contact.
/// Independent of the caller's dt.
pub const GROUND_NOMINAL_DT: f64 = 0.016;

/// Decay applied to upward (push-off) velocity during a ground contact.
pub const GROUND_PUSH_OFF_DECAY: f64 = 0.95;

/// Fraction of horizontal velocity kept after a wall contact (reflected).
pub const WALL_VELOCITY_RETENTION: f64 = 0.5;

/// Clearance above the ground line for a foot to count as airborne.
pub const AIRBORNE_CLEARANCE: f64 = 0.5;

/// Upper bound on creatures per generation accepted by config validation.
pub const MAX_POPULATION: usize = 10_000;

/// Upper bound on solver sweeps per tick accepted by config validation.
pub const MAX_SOLVER_ITERATIONS: usize = 64;

/// Maximum genome pairs sampled for the per-generation diversity metric.
pub const GENOME_DIVERSITY_MAX_PAIRS: usize = 1000;
