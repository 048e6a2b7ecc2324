use crate::creature::{Creature, MotionState};
use crate::physics::Environment;
use serde::{Deserialize, Serialize};

/// Fitness breakdown for one creature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessScore {
    pub total: f64,
    pub distance: f64,
    pub target_bonus: f64,
    /// Reserved; always zero.
    pub efficiency: f64,
    pub stability: f64,
    #[serde(default)]
    pub upright_bonus: f64,
    #[serde(default)]
    pub death_penalty: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessParams {
    /// Flat bonus for touching the target zone.
    pub target_bonus: f64,
    /// Partial bonus at zero distance, as a fraction of `target_bonus` (< 1).
    pub partial_bonus_fraction: f64,
    /// Distance over which the partial bonus decays by a factor of e.
    pub partial_bonus_falloff: f64,
    /// Added to the total of a dead creature; negative.
    pub death_penalty: f64,
    /// Weight of the head-height bonus; 0 disables it.
    pub upright_weight: f64,
}

impl Default for FitnessParams {
    fn default() -> Self {
        Self {
            target_bonus: 100.0,
            partial_bonus_fraction: 0.5,
            partial_bonus_falloff: 200.0,
            death_penalty: -50.0,
            upright_weight: 20.0,
        }
    }
}

pub fn score(motion: &MotionState, env: &Environment, params: &FitnessParams) -> FitnessScore {
    let distance = motion.distance_traveled();

    let target_bonus = match &env.target_zone {
        _ if motion.reached_target => params.target_bonus,
        Some(zone) => {
            let gap = zone.distance_to(motion.current_pos);
            params.target_bonus
                * params.partial_bonus_fraction
                * (-gap / params.partial_bonus_falloff).exp()
        }
        None => 0.0,
    };

    let death_penalty = if motion.is_dead {
        params.death_penalty
    } else {
        0.0
    };

    let ground_y = env.ground.y;
    let upright_bonus = match motion.min_head_y {
        Some(head_y) if params.upright_weight > 0.0 && ground_y > 0.0 => {
            params.upright_weight * ((ground_y - head_y) / ground_y).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };

    let stability = 1.0 / (1.0 + motion.gait.head_height_variance());

    FitnessScore {
        total: distance + target_bonus + death_penalty + upright_bonus,
        distance,
        target_bonus,
        efficiency: 0.0,
        stability,
        upright_bonus,
        death_penalty,
    }
}

/// Score every creature in place.
pub fn evaluate_population(creatures: &mut [Creature], env: &Environment, params: &FitnessParams) {
    for creature in creatures {
        creature.fitness = score(&creature.motion, env, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Rect, Vec2};
    use crate::physics::Ground;

    fn env(zone: Option<Rect>) -> Environment {
        Environment {
            ground: Ground {
                y: 500.0,
                restitution: 0.2,
                friction: 0.5,
            },
            walls: Vec::new(),
            target_zone: zone,
        }
    }

    fn zone() -> Option<Rect> {
        Some(Rect::new(Vec2::new(700.0, 0.0), Vec2::new(800.0, 500.0)))
    }

    #[test]
    fn distance_dominates_for_a_plain_walker() {
        let mut motion = MotionState::at(Vec2::new(100.0, 450.0));
        motion.max_distance = 250.0;
        motion.min_head_y = Some(400.0);
        let params = FitnessParams {
            upright_weight: 0.0,
            ..FitnessParams::default()
        };
        let s = score(&motion, &env(None), &params);
        assert_eq!(s.distance, 150.0);
        assert_eq!(s.total, 150.0);
        assert_eq!(s.upright_bonus, 0.0);
    }

    #[test]
    fn partial_bonus_stays_below_full_bonus() {
        let params = FitnessParams::default();
        let mut motion = MotionState::at(Vec2::new(100.0, 450.0));
        motion.current_pos = Vec2::new(699.9, 450.0);
        let near = score(&motion, &env(zone()), &params);
        assert!(near.target_bonus > 0.0 && near.target_bonus < params.target_bonus);

        motion.reached_target = true;
        let reached = score(&motion, &env(zone()), &params);
        assert_eq!(reached.target_bonus, params.target_bonus);
    }

    #[test]
    fn death_penalty_and_upright_bonus_apply() {
        let params = FitnessParams::default();
        let mut motion = MotionState::at(Vec2::new(0.0, 450.0));
        motion.is_dead = true;
        motion.min_head_y = Some(250.0);
        let s = score(&motion, &env(None), &params);
        assert_eq!(s.death_penalty, -50.0);
        assert_eq!(s.upright_bonus, 10.0);
        assert_eq!(s.total, -40.0);
        assert_eq!(s.stability, 1.0);
    }
}
