use crate::body::{Constraint, DistanceLink, Muscle, Particle, ParticleIndex};
use crate::constants::{DEFAULT_SOLVER_ITERATIONS, SOLVER_DEAD_BAND};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub iterations: usize,
    /// When set, replaces every link's own stiffness for this call.
    pub stiffness_override: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SOLVER_ITERATIONS,
            stiffness_override: None,
        }
    }
}

/// Gauss-Seidel relaxation of bones then muscles, `settings.iterations` sweeps.
///
/// Muscles are relaxed toward `current_length`, bones toward `rest_length`.
/// Links whose endpoints do not resolve, coincident endpoints and errors inside
/// the dead-band are skipped.
pub fn satisfy(
    particles: &mut [Particle],
    constraints: &[Constraint],
    muscles: &[Muscle],
    index: &ParticleIndex,
    settings: SolverSettings,
) {
    for _ in 0..settings.iterations {
        for bone in constraints {
            relax(particles, bone, index, settings.stiffness_override);
        }
        for muscle in muscles {
            relax(particles, muscle, index, settings.stiffness_override);
        }
    }
}

fn relax<L: DistanceLink>(
    particles: &mut [Particle],
    link: &L,
    index: &ParticleIndex,
    stiffness_override: Option<f64>,
) {
    let (p1, p2) = link.endpoints();
    let (Some(a), Some(b)) = (index.get(p1), index.get(p2)) else {
        return;
    };
    if a == b || a >= particles.len() || b >= particles.len() {
        return;
    }

    let inv_a = particles[a].inverse_mass();
    let inv_b = particles[b].inverse_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum == 0.0 {
        return;
    }

    let delta = particles[b].pos - particles[a].pos;
    let distance = delta.length();
    if distance == 0.0 {
        return;
    }
    let error = distance - link.target_length();
    if error.abs() < SOLVER_DEAD_BAND {
        return;
    }

    let stiffness = stiffness_override.unwrap_or_else(|| link.stiffness());
    let correction = delta / distance * (error * stiffness);
    // Heavier endpoint moves less: p1 takes m2/(m1+m2) of the correction.
    particles[a].pos += correction * (inv_a / inv_sum);
    particles[b].pos -= correction * (inv_b / inv_sum);
}
