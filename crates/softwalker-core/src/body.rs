use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ParticleId = u32;
pub type ConstraintId = u32;

/// Point mass integrated with Verlet; velocity is implied by `pos - old_pos`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub pos: Vec2,
    pub old_pos: Vec2,
    pub mass: f64,
    pub radius: f64,
    pub is_locked: bool,
    /// Display-only velocity estimate written by the integrator and collision stages.
    pub velocity: Vec2,
}

impl Particle {
    /// Particle at rest at `pos`.
    pub fn new(id: ParticleId, pos: Vec2, mass: f64, radius: f64) -> Self {
        Self {
            id,
            pos,
            old_pos: pos,
            mass,
            radius,
            is_locked: false,
            velocity: Vec2::ZERO,
        }
    }

    pub fn locked(mut self) -> Self {
        self.is_locked = true;
        self
    }

    /// Inverse mass used by the solver; locked particles behave as infinitely heavy.
    pub fn inverse_mass(&self) -> f64 {
        if self.is_locked {
            0.0
        } else {
            1.0 / self.mass
        }
    }
}

/// Distance link ("bone") between two particles of the same body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub p1_id: ParticleId,
    pub p2_id: ParticleId,
    pub rest_length: f64,
    pub stiffness: f64,
    /// Carried for authoring tools; the solver ignores it.
    #[serde(default)]
    pub damping: f64,
}

impl Constraint {
    pub fn new(id: ConstraintId, p1_id: ParticleId, p2_id: ParticleId, rest_length: f64) -> Self {
        Self {
            id,
            p1_id,
            p2_id,
            rest_length,
            stiffness: 1.0,
            damping: 0.0,
        }
    }
}

/// Actuated constraint whose target length oscillates with simulation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Muscle {
    #[serde(flatten)]
    pub link: Constraint,
    pub base_length: f64,
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
    /// Target length for the current tick, written by the oscillator.
    pub current_length: f64,
}

impl Muscle {
    pub fn new(link: Constraint, amplitude: f64, frequency: f64, phase: f64) -> Self {
        let base_length = link.rest_length;
        Self {
            link,
            base_length,
            amplitude,
            frequency,
            phase,
            current_length: base_length,
        }
    }

    pub fn id(&self) -> ConstraintId {
        self.link.id
    }
}

/// Anything the solver can relax: two endpoints and a target length.
pub trait DistanceLink {
    fn endpoints(&self) -> (ParticleId, ParticleId);
    fn target_length(&self) -> f64;
    fn stiffness(&self) -> f64;
}

impl DistanceLink for Constraint {
    fn endpoints(&self) -> (ParticleId, ParticleId) {
        (self.p1_id, self.p2_id)
    }

    fn target_length(&self) -> f64 {
        self.rest_length
    }

    fn stiffness(&self) -> f64 {
        self.stiffness
    }
}

impl DistanceLink for Muscle {
    fn endpoints(&self) -> (ParticleId, ParticleId) {
        self.link.endpoints()
    }

    fn target_length(&self) -> f64 {
        self.current_length
    }

    fn stiffness(&self) -> f64 {
        self.link.stiffness
    }
}

/// Maps particle ids to their slot in a body's particle slice.
///
/// Built once per topology; every creature instantiated from it lays its
/// particles out in the same order, so one index serves the whole population.
#[derive(Clone, Debug, Default)]
pub struct ParticleIndex {
    slots: HashMap<ParticleId, usize>,
}

impl ParticleIndex {
    pub fn build(particles: &[Particle]) -> Self {
        let slots = particles
            .iter()
            .enumerate()
            .map(|(slot, p)| (p.id, slot))
            .collect();
        Self { slots }
    }

    pub fn get(&self, id: ParticleId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Mass-weighted centre of mass, or `None` for an empty or massless body.
pub fn center_of_mass(particles: &[Particle]) -> Option<Vec2> {
    let mut total_mass = 0.0;
    let mut acc = Vec2::ZERO;
    for p in particles {
        acc += p.pos * p.mass;
        total_mass += p.mass;
    }
    (total_mass > 0.0).then(|| acc / total_mass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_particle_has_zero_inverse_mass() {
        let p = Particle::new(0, Vec2::ZERO, 2.0, 1.0);
        assert_eq!(p.inverse_mass(), 0.5);
        assert_eq!(p.locked().inverse_mass(), 0.0);
    }

    #[test]
    fn center_of_mass_is_mass_weighted() {
        let particles = vec![
            Particle::new(0, Vec2::new(0.0, 0.0), 3.0, 1.0),
            Particle::new(1, Vec2::new(4.0, 0.0), 1.0, 1.0),
        ];
        assert_eq!(center_of_mass(&particles), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(center_of_mass(&[]), None);
    }

    #[test]
    fn muscle_json_flattens_link_fields() {
        let muscle = Muscle::new(Constraint::new(3, 0, 1, 10.0), 0.2, 1.0, 0.0);
        let json = serde_json::to_value(&muscle).expect("muscle serializes");
        assert_eq!(json["p1_id"], 0);
        assert_eq!(json["base_length"], 10.0);
    }
}
