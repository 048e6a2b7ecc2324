use super::collision::{self, Ground, Wall};
use super::integrator::integrate;
use super::oscillator;
use super::solver::{satisfy, SolverSettings};
use crate::body::{center_of_mass, Constraint, Muscle, Particle, ParticleIndex};
use crate::creature::{Creature, MotionState};
use crate::math::{Rect, Vec2};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};

/// Static surroundings shared by every creature in a generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub ground: Ground,
    #[serde(default)]
    pub walls: Vec<Wall>,
    #[serde(default)]
    pub target_zone: Option<Rect>,
}

/// Per-tick knobs for the single-body step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepOptions {
    /// Uniform force applied to every particle (gravity).
    pub force: Vec2,
    pub air_resistance: f64,
    pub solver: SolverSettings,
    /// When false the oscillator is skipped and muscles keep their current length.
    pub actuate: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            force: Vec2::new(0.0, 500.0),
            air_resistance: 0.01,
            solver: SolverSettings::default(),
            actuate: true,
        }
    }
}

/// Slots of the head and feet inside a body's particle slice.
#[derive(Clone, Copy, Debug)]
pub struct BodyRoles<'a> {
    pub head: usize,
    pub feet: &'a [usize],
}

/// Mutable view of one body's arrays, wherever they are stored.
pub struct BodyMut<'a> {
    pub particles: &'a mut [Particle],
    pub constraints: &'a [Constraint],
    pub muscles: &'a mut [Muscle],
    pub index: &'a ParticleIndex,
    pub roles: BodyRoles<'a>,
}

impl<'a> BodyMut<'a> {
    pub fn of(creature: &'a mut Creature) -> (Self, &'a mut MotionState) {
        let Creature {
            particles,
            constraints,
            muscles,
            motion,
            topology,
            ..
        } = creature;
        let topology: &'a Topology = topology;
        let body = BodyMut {
            particles,
            constraints,
            muscles,
            index: topology.index(),
            roles: BodyRoles {
                head: topology.head_slot(),
                feet: topology.foot_slots(),
            },
        };
        (body, motion)
    }
}

/// Advance one body by one tick: oscillator, integrator, solver, ground,
/// walls, death check, bookkeeping. Dead bodies are left untouched.
pub fn step_body(
    body: BodyMut<'_>,
    motion: &mut MotionState,
    env: &Environment,
    options: &StepOptions,
    time: f64,
    dt: f64,
) {
    if motion.is_dead {
        return;
    }
    let BodyMut {
        particles,
        constraints,
        muscles,
        index,
        roles,
    } = body;

    if options.actuate {
        oscillator::update(muscles, time);
    }
    integrate(particles, options.force, dt, options.air_resistance);
    satisfy(particles, constraints, muscles, index, options.solver);
    collision::resolve_ground(particles, &env.ground);
    collision::resolve_walls(particles, &env.walls);

    let Some(head) = particles.get(roles.head) else {
        return;
    };
    if collision::head_grounded(head, &env.ground) {
        motion.is_dead = true;
    }

    if let Some(com) = center_of_mass(particles) {
        motion.current_pos = com;
        motion.max_distance = motion.max_distance.max(com.x);
    }
    if let Some(zone) = &env.target_zone {
        if !motion.reached_target && collision::touches_zone(particles, zone) {
            motion.reached_target = true;
        }
    }
    motion.min_head_y = Some(motion.min_head_y.map_or(head.pos.y, |y| y.min(head.pos.y)));

    let airborne = !roles.feet.is_empty()
        && roles.feet.iter().all(|&slot| {
            particles
                .get(slot)
                .is_some_and(|foot| collision::is_airborne(foot, &env.ground))
        });
    motion.gait.record(env.ground.y - head.pos.y, airborne);
}

/// Step one creature in place.
pub fn step_creature(
    creature: &mut Creature,
    env: &Environment,
    options: &StepOptions,
    time: f64,
    dt: f64,
) {
    let (body, motion) = BodyMut::of(creature);
    step_body(body, motion, env, options, time, dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Constraint;
    use crate::creature::MotionState;

    fn open_field() -> Environment {
        Environment {
            ground: Ground {
                y: 1000.0,
                restitution: 0.2,
                friction: 0.5,
            },
            walls: Vec::new(),
            target_zone: None,
        }
    }

    fn run(
        particles: &mut [Particle],
        constraints: &[Constraint],
        muscles: &mut [Muscle],
        motion: &mut MotionState,
        env: &Environment,
        options: &StepOptions,
        ticks: usize,
        dt: f64,
    ) {
        let index = ParticleIndex::build(particles);
        for tick in 0..ticks {
            let body = BodyMut {
                particles: &mut *particles,
                constraints,
                muscles: &mut *muscles,
                index: &index,
                roles: BodyRoles { head: 0, feet: &[] },
            };
            step_body(body, motion, env, options, (tick + 1) as f64 * dt, dt);
        }
    }

    #[test]
    fn muscle_oscillation_returns_to_base_length_after_one_period() {
        let mut particles = vec![
            Particle::new(0, Vec2::new(0.0, 0.0), 1.0, 0.0),
            Particle::new(1, Vec2::new(10.0, 0.0), 1.0, 0.0),
        ];
        let mut muscles = vec![Muscle::new(Constraint::new(0, 0, 1, 10.0), 0.5, 1.0, 0.0)];
        let options = StepOptions {
            force: Vec2::ZERO,
            air_resistance: 0.0,
            solver: SolverSettings {
                iterations: 3,
                stiffness_override: None,
            },
            actuate: true,
        };
        let mut motion = MotionState::at(Vec2::new(5.0, 0.0));
        run(
            &mut particles,
            &[],
            &mut muscles,
            &mut motion,
            &open_field(),
            &options,
            60,
            1.0 / 60.0,
        );
        let distance = particles[0].pos.distance(particles[1].pos);
        assert!((distance - 10.0).abs() < 0.05, "distance drifted to {distance}");
    }

    #[test]
    fn hanging_particle_settles_inside_dead_band_and_stays_above_ground() {
        let mut particles = vec![
            Particle::new(0, Vec2::new(0.0, 100.0), 1.0, 1.0).locked(),
            Particle::new(1, Vec2::new(0.0, 105.0), 1.0, 1.0),
        ];
        let bones = vec![Constraint::new(0, 0, 1, 5.0)];
        let mut muscles: Vec<Muscle> = Vec::new();
        let env = Environment {
            ground: Ground {
                y: 110.0,
                restitution: 0.2,
                friction: 0.5,
            },
            ..open_field()
        };
        let options = StepOptions {
            force: Vec2::new(0.0, 9.81),
            air_resistance: 0.0,
            ..StepOptions::default()
        };
        let mut motion = MotionState::at(Vec2::new(0.0, 102.5));
        let index = ParticleIndex::build(&particles);
        let dt = 1.0 / 60.0;
        for tick in 0..600 {
            let body = BodyMut {
                particles: &mut particles,
                constraints: &bones,
                muscles: &mut muscles,
                index: &index,
                roles: BodyRoles { head: 0, feet: &[] },
            };
            step_body(body, &mut motion, &env, &options, tick as f64 * dt, dt);
            let free = &particles[1];
            assert!(free.pos.y <= env.ground.y - free.radius);
            let error = (particles[0].pos.distance(free.pos) - 5.0).abs();
            assert!(error < 0.0101, "tick {tick}: error {error}");
        }
        assert_eq!(particles[0].pos, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn dead_body_is_frozen() {
        let topology = Topology::biped();
        let mut particles = topology.particles().to_vec();
        let mut muscles = topology.muscles().to_vec();
        let mut motion = MotionState::at(Vec2::ZERO);
        motion.is_dead = true;
        let before = particles.clone();
        run(
            &mut particles,
            topology.constraints(),
            &mut muscles,
            &mut motion,
            &open_field(),
            &StepOptions::default(),
            10,
            1.0 / 60.0,
        );
        assert_eq!(particles, before);
        assert_eq!(motion.gait.ticks, 0);
    }

    #[test]
    fn head_reaching_the_ground_kills_the_body() {
        let mut particles = vec![
            Particle::new(0, Vec2::new(0.0, 50.0), 1.0, 2.0),
            Particle::new(1, Vec2::new(10.0, 50.0), 1.0, 2.0),
        ];
        let mut muscles = vec![Muscle::new(Constraint::new(0, 0, 1, 10.0), 0.1, 1.0, 0.0)];
        let env = Environment {
            ground: Ground {
                y: 52.5,
                restitution: 0.0,
                friction: 0.5,
            },
            ..open_field()
        };
        let mut motion = MotionState::at(Vec2::new(5.0, 50.0));
        run(
            &mut particles,
            &[],
            &mut muscles,
            &mut motion,
            &env,
            &StepOptions::default(),
            30,
            1.0 / 60.0,
        );
        assert!(motion.is_dead);
        let ticks = motion.gait.ticks;
        run(
            &mut particles,
            &[],
            &mut muscles,
            &mut motion,
            &env,
            &StepOptions::default(),
            5,
            1.0 / 60.0,
        );
        assert_eq!(motion.gait.ticks, ticks);
    }

    #[test]
    fn bookkeeping_tracks_progress_and_target() {
        let mut particles = vec![
            Particle::new(0, Vec2::new(0.0, 0.0), 1.0, 0.0),
            Particle::new(1, Vec2::new(10.0, 0.0), 1.0, 0.0),
        ];
        for p in &mut particles {
            p.old_pos.x -= 1.0;
        }
        let mut muscles = vec![Muscle::new(Constraint::new(0, 0, 1, 10.0), 0.0, 1.0, 0.0)];
        let env = Environment {
            target_zone: Some(Rect::new(Vec2::new(14.0, -5.0), Vec2::new(16.0, 5.0))),
            ..open_field()
        };
        let options = StepOptions {
            force: Vec2::ZERO,
            air_resistance: 0.0,
            ..StepOptions::default()
        };
        let mut motion = MotionState::at(Vec2::new(5.0, 0.0));
        run(
            &mut particles,
            &[],
            &mut muscles,
            &mut motion,
            &env,
            &options,
            10,
            1.0 / 60.0,
        );
        assert!((motion.current_pos.x - 15.0).abs() < 1e-9);
        assert!((motion.distance_traveled() - 10.0).abs() < 1e-9);
        assert!(motion.reached_target);
        assert_eq!(motion.min_head_y, Some(0.0));
        assert_eq!(motion.gait.ticks, 10);
    }
}
