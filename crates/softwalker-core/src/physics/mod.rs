//! In-place physics stages. Every stage mutates a body's arrays directly and
//! never touches locked particles.

pub mod collision;
pub mod integrator;
pub mod oscillator;
pub mod solver;
pub mod step;

pub use collision::{Ground, Wall};
pub use step::{step_body, BodyMut, BodyRoles, Environment, StepOptions};
