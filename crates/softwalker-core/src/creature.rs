use crate::body::{center_of_mass, Constraint, Muscle, Particle};
use crate::evolution::fitness::FitnessScore;
use crate::genome::Genome;
use crate::math::Vec2;
use crate::topology::Topology;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cumulative gait statistics used for stability scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GaitCounters {
    pub ticks: u64,
    /// Ticks where every designated foot was clear of the ground.
    pub airborne_ticks: u64,
    pub head_height_sum: f64,
    pub head_height_sq_sum: f64,
}

impl GaitCounters {
    pub fn record(&mut self, head_height: f64, airborne: bool) {
        self.ticks += 1;
        if airborne {
            self.airborne_ticks += 1;
        }
        self.head_height_sum += head_height;
        self.head_height_sq_sum += head_height * head_height;
    }

    pub fn head_height_variance(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        let n = self.ticks as f64;
        let mean = self.head_height_sum / n;
        (self.head_height_sq_sum / n - mean * mean).max(0.0)
    }

    pub fn airborne_fraction(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.airborne_ticks as f64 / self.ticks as f64
        }
    }
}

/// Per-creature progress written by the bookkeeping stage of every tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub is_dead: bool,
    pub start_pos: Vec2,
    pub current_pos: Vec2,
    /// Running maximum of the centre-of-mass `x` coordinate.
    pub max_distance: f64,
    pub reached_target: bool,
    pub min_head_y: Option<f64>,
    pub gait: GaitCounters,
}

impl MotionState {
    pub fn at(start: Vec2) -> Self {
        Self {
            is_dead: false,
            start_pos: start,
            current_pos: start,
            max_distance: start.x,
            reached_target: false,
            min_head_y: None,
            gait: GaitCounters::default(),
        }
    }

    pub fn distance_traveled(&self) -> f64 {
        self.max_distance - self.start_pos.x
    }
}

/// One body in the population: a genome plus its own copy of the topology's arrays.
#[derive(Clone, Debug)]
pub struct Creature {
    pub id: u64,
    pub genome: Genome,
    pub particles: Vec<Particle>,
    pub constraints: Vec<Constraint>,
    pub muscles: Vec<Muscle>,
    pub fitness: FitnessScore,
    pub motion: MotionState,
    pub(crate) topology: Arc<Topology>,
}

impl Creature {
    /// Fresh body at the topology's rest pose with the genome's muscle parameters.
    pub fn new(id: u64, genome: Genome, topology: Arc<Topology>) -> Self {
        let particles = topology.particles().to_vec();
        let constraints = topology.constraints().to_vec();
        let mut muscles = topology.muscles().to_vec();
        genome.apply_to(&mut muscles);
        let start = center_of_mass(&particles).unwrap_or_default();
        Self {
            id,
            genome,
            particles,
            constraints,
            muscles,
            fitness: FitnessScore::default(),
            motion: MotionState::at(start),
            topology,
        }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn is_dead(&self) -> bool {
        self.motion.is_dead
    }

    pub fn head(&self) -> &Particle {
        &self.particles[self.topology.head_slot()]
    }

    /// Read-only view for a renderer.
    pub fn snapshot(&self) -> CreatureSnapshot {
        CreatureSnapshot {
            id: self.id,
            genome_id: self.genome.id,
            positions: self.particles.iter().map(|p| p.pos).collect(),
            velocities: self.particles.iter().map(|p| p.velocity).collect(),
            muscle_lengths: self.muscles.iter().map(|m| m.current_length).collect(),
            is_dead: self.motion.is_dead,
            current_pos: self.motion.current_pos,
            max_distance: self.motion.max_distance,
            reached_target: self.motion.reached_target,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatureSnapshot {
    pub id: u64,
    pub genome_id: u64,
    pub positions: Vec<Vec2>,
    pub velocities: Vec<Vec2>,
    pub muscle_lengths: Vec<f64>,
    pub is_dead: bool,
    pub current_pos: Vec2,
    pub max_distance: f64,
    pub reached_target: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    #[test]
    fn new_creature_copies_topology_and_applies_genes() {
        let topology = Arc::new(Topology::biped());
        let genome = Genome::random(9, topology.muscle_ids(), 0, &mut create_rng(1));
        let creature = Creature::new(4, genome.clone(), Arc::clone(&topology));
        assert_eq!(creature.particles, topology.particles());
        assert!(!creature.is_dead());
        assert_eq!(creature.fitness.total, 0.0);
        for (muscle, gene) in creature.muscles.iter().zip(&genome.genes) {
            assert_eq!(muscle.amplitude, gene.amplitude);
            assert_eq!(muscle.frequency, gene.frequency);
        }
        assert_eq!(creature.motion.distance_traveled(), 0.0);
    }

    #[test]
    fn gait_variance_of_constant_height_is_zero() {
        let mut gait = GaitCounters::default();
        for _ in 0..10 {
            gait.record(4.0, false);
        }
        gait.record(4.0, true);
        assert!(gait.head_height_variance() < 1e-12);
        assert!((gait.airborne_fraction() - 1.0 / 11.0).abs() < 1e-12);
    }
}
