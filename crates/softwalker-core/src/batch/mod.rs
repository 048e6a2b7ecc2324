//! Lockstep stepping of many same-topology creatures over one arena.
//!
//! `run_batch` marshals every creature into a [`BatchArena`] once, runs all
//! ticks over the arena and copies the results back once. `step_population`
//! is the per-creature path built on the same step function; the two must
//! agree to within floating-point noise.

pub mod layout;

use crate::body::{Muscle, Particle};
use crate::creature::Creature;
use crate::physics::step::{step_creature, BodyMut, BodyRoles, Environment, StepOptions};
use crate::physics::step_body;
use crate::topology::Topology;
use layout::{BatchLayout, SlotMeta};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::{error::Error, fmt};
use tracing::debug;

/// How a generation's ticks are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteppingMode {
    #[default]
    Batched,
    PerCreature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    MixedTopology { creature_id: u64 },
    StrideMismatch { creature_id: u64 },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::MixedTopology { creature_id } => write!(
                f,
                "creature {creature_id} was built from a different topology than the batch"
            ),
            BatchError::StrideMismatch { creature_id } => write!(
                f,
                "creature {creature_id} has body arrays that do not match the topology strides"
            ),
        }
    }
}

impl Error for BatchError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchReport {
    pub creatures: usize,
    pub ticks: usize,
    pub dead: usize,
}

/// Simulation time sampled by tick `tick` of a run starting at `start_time`.
pub fn tick_time(start_time: f64, tick: usize, dt: f64) -> f64 {
    start_time + (tick + 1) as f64 * dt
}

/// Contiguous storage for a whole population.
#[derive(Clone, Debug)]
pub struct BatchArena {
    layout: BatchLayout,
    topology: Arc<Topology>,
    particles: Vec<Particle>,
    muscles: Vec<Muscle>,
    env: Environment,
    meta: Vec<SlotMeta>,
}

impl BatchArena {
    /// Marshal every creature in. All creatures must share one topology.
    pub fn load(
        topology: Arc<Topology>,
        creatures: &[Creature],
        env: &Environment,
    ) -> Result<Self, BatchError> {
        let layout = BatchLayout::for_topology(&topology, creatures.len());
        let mut particles = Vec::with_capacity(layout.particle_records());
        let mut muscles = Vec::with_capacity(layout.muscle_records());
        let mut meta = Vec::with_capacity(creatures.len());

        for creature in creatures {
            if !Arc::ptr_eq(creature.topology(), &topology) {
                return Err(BatchError::MixedTopology {
                    creature_id: creature.id,
                });
            }
            if creature.particles.len() != layout.particle_stride
                || creature.muscles.len() != layout.muscle_stride
            {
                return Err(BatchError::StrideMismatch {
                    creature_id: creature.id,
                });
            }
            particles.extend_from_slice(&creature.particles);
            muscles.extend_from_slice(&creature.muscles);
            meta.push(SlotMeta {
                motion: creature.motion.clone(),
                head_slot: topology.head_slot(),
            });
        }

        Ok(Self {
            layout,
            topology,
            particles,
            muscles,
            env: env.clone(),
            meta,
        })
    }

    pub fn dead_count(&self) -> usize {
        self.meta.iter().filter(|m| m.motion.is_dead).count()
    }

    /// Run `steps` ticks for every live slot. Slots never alias, so they may
    /// be processed on the rayon pool.
    pub fn run(
        &mut self,
        steps: usize,
        start_time: f64,
        dt: f64,
        options: &StepOptions,
        parallel: bool,
    ) {
        let topology = &*self.topology;
        let env = &self.env;
        let particle_stride = self.layout.particle_stride.max(1);
        let muscle_stride = self.layout.muscle_stride.max(1);
        let run_slot = |((particles, muscles), meta): ((&mut [Particle], &mut [Muscle]), &mut SlotMeta)| {
            for tick in 0..steps {
                if meta.motion.is_dead {
                    break;
                }
                let body = BodyMut {
                    particles: &mut *particles,
                    constraints: topology.constraints(),
                    muscles: &mut *muscles,
                    index: topology.index(),
                    roles: BodyRoles {
                        head: meta.head_slot,
                        feet: topology.foot_slots(),
                    },
                };
                step_body(
                    body,
                    &mut meta.motion,
                    env,
                    options,
                    tick_time(start_time, tick, dt),
                    dt,
                );
            }
        };

        if parallel {
            self.particles
                .par_chunks_mut(particle_stride)
                .zip(self.muscles.par_chunks_mut(muscle_stride))
                .zip(self.meta.par_iter_mut())
                .for_each(run_slot);
        } else {
            self.particles
                .chunks_mut(particle_stride)
                .zip(self.muscles.chunks_mut(muscle_stride))
                .zip(self.meta.iter_mut())
                .for_each(run_slot);
        }
    }

    /// Marshal results back: particle records, muscle lengths and metadata.
    pub fn store(&self, creatures: &mut [Creature]) {
        for (slot, creature) in creatures.iter_mut().enumerate().take(self.layout.creature_count) {
            creature
                .particles
                .clone_from_slice(&self.particles[self.layout.particle_range(slot)]);
            creature
                .muscles
                .clone_from_slice(&self.muscles[self.layout.muscle_range(slot)]);
            creature.motion.clone_from(&self.meta[slot].motion);
        }
    }
}

/// Step a whole population through the arena: one marshal in, `steps` ticks,
/// one marshal out.
pub fn run_batch(
    creatures: &mut [Creature],
    env: &Environment,
    steps: usize,
    start_time: f64,
    dt: f64,
    options: &StepOptions,
    parallel: bool,
) -> Result<BatchReport, BatchError> {
    let Some(first) = creatures.first() else {
        return Ok(BatchReport {
            creatures: 0,
            ticks: steps,
            dead: 0,
        });
    };
    let topology = Arc::clone(first.topology());
    let mut arena = BatchArena::load(topology, creatures, env)?;
    arena.run(steps, start_time, dt, options, parallel);
    arena.store(creatures);
    let report = BatchReport {
        creatures: creatures.len(),
        ticks: steps,
        dead: arena.dead_count(),
    };
    debug!(
        creatures = report.creatures,
        ticks = report.ticks,
        dead = report.dead,
        "batch complete"
    );
    Ok(report)
}

/// Per-creature path: same step function, same tick times, no arena.
pub fn step_population(
    creatures: &mut [Creature],
    env: &Environment,
    steps: usize,
    start_time: f64,
    dt: f64,
    options: &StepOptions,
) {
    for creature in creatures.iter_mut() {
        for tick in 0..steps {
            if creature.is_dead() {
                break;
            }
            step_creature(creature, env, options, tick_time(start_time, tick, dt), dt);
        }
    }
}

/// Dispatch on the configured stepping mode.
#[allow(clippy::too_many_arguments)]
pub fn simulate(
    mode: SteppingMode,
    parallel: bool,
    creatures: &mut [Creature],
    env: &Environment,
    steps: usize,
    start_time: f64,
    dt: f64,
    options: &StepOptions,
) -> Result<(), BatchError> {
    match mode {
        SteppingMode::Batched => {
            run_batch(creatures, env, steps, start_time, dt, options, parallel).map(|_| ())
        }
        SteppingMode::PerCreature => {
            step_population(creatures, env, steps, start_time, dt, options);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;
    use crate::math::{Rect, Vec2};
    use crate::physics::{Ground, Wall};
    use crate::rng::create_rng;

    fn environment() -> Environment {
        Environment {
            ground: Ground {
                y: 500.0,
                restitution: 0.3,
                friction: 0.4,
            },
            walls: vec![
                Wall {
                    x: 0.0,
                    normal: Vec2::new(1.0, 0.0),
                },
                Wall {
                    x: 160.0,
                    normal: Vec2::new(-1.0, 0.0),
                },
            ],
            target_zone: Some(Rect::new(Vec2::new(130.0, 0.0), Vec2::new(200.0, 500.0))),
        }
    }

    fn population(topology: &Arc<Topology>, size: usize, seed: u64) -> Vec<Creature> {
        let mut rng = create_rng(seed);
        (0..size)
            .map(|i| {
                let genome = Genome::random(i as u64, topology.muscle_ids(), 0, &mut rng);
                Creature::new(i as u64, genome, Arc::clone(topology))
            })
            .collect()
    }

    fn assert_close(a: f64, b: f64) {
        let scale = a.abs().max(b.abs()).max(1.0);
        assert!((a - b).abs() <= 1e-9 * scale, "{a} vs {b}");
    }

    fn assert_parity(batched: &[Creature], reference: &[Creature]) {
        for (b, r) in batched.iter().zip(reference) {
            assert_eq!(b.motion.is_dead, r.motion.is_dead);
            assert_eq!(b.motion.reached_target, r.motion.reached_target);
            assert_eq!(b.motion.gait.ticks, r.motion.gait.ticks);
            assert_close(b.motion.max_distance, r.motion.max_distance);
            for (pb, pr) in b.particles.iter().zip(&r.particles) {
                assert_close(pb.pos.x, pr.pos.x);
                assert_close(pb.pos.y, pr.pos.y);
                assert_close(pb.velocity.x, pr.velocity.x);
                assert_close(pb.velocity.y, pr.velocity.y);
            }
            for (mb, mr) in b.muscles.iter().zip(&r.muscles) {
                assert_close(mb.current_length, mr.current_length);
            }
        }
    }

    #[test]
    fn batched_and_per_creature_stepping_agree() {
        let topology = Arc::new(Topology::biped());
        let env = environment();
        let options = StepOptions::default();
        let dt = 1.0 / 60.0;
        for parallel in [false, true] {
            let mut batched = population(&topology, 8, 21);
            let mut reference = batched.clone();
            run_batch(&mut batched, &env, 300, 0.0, dt, &options, parallel).expect("one topology");
            step_population(&mut reference, &env, 300, 0.0, dt, &options);
            assert_parity(&batched, &reference);
        }
    }

    #[test]
    fn split_batches_match_one_long_batch() {
        let topology = Arc::new(Topology::biped());
        let env = environment();
        let options = StepOptions::default();
        let dt = 1.0 / 60.0;
        let mut whole = population(&topology, 4, 5);
        let mut split = whole.clone();
        run_batch(&mut whole, &env, 120, 0.0, dt, &options, false).expect("ok");
        run_batch(&mut split, &env, 60, 0.0, dt, &options, false).expect("ok");
        run_batch(&mut split, &env, 60, 60.0 * dt, dt, &options, false).expect("ok");
        assert_parity(&split, &whole);
    }

    #[test]
    fn dead_creatures_are_left_untouched() {
        let topology = Arc::new(Topology::biped());
        let mut creatures = population(&topology, 3, 9);
        creatures[1].motion.is_dead = true;
        let frozen = creatures[1].particles.clone();
        run_batch(
            &mut creatures,
            &environment(),
            30,
            0.0,
            1.0 / 60.0,
            &StepOptions::default(),
            true,
        )
        .expect("ok");
        assert_eq!(creatures[1].particles, frozen);
        assert_ne!(creatures[0].particles, topology.particles());
    }

    #[test]
    fn mixed_topologies_are_rejected() {
        let a = Arc::new(Topology::biped());
        let b = Arc::new(Topology::biped());
        let mut creatures = population(&a, 2, 1);
        creatures.extend(population(&b, 1, 2).into_iter().map(|mut c| {
            c.id = 99;
            c
        }));
        let err = run_batch(
            &mut creatures,
            &environment(),
            1,
            0.0,
            0.01,
            &StepOptions::default(),
            false,
        )
        .unwrap_err();
        assert_eq!(err, BatchError::MixedTopology { creature_id: 99 });
    }

    #[test]
    fn empty_population_is_a_no_op() {
        let report = run_batch(
            &mut [],
            &environment(),
            10,
            0.0,
            0.01,
            &StepOptions::default(),
            true,
        )
        .expect("empty batch");
        assert_eq!(report.creatures, 0);
    }
}
