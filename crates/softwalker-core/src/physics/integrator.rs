use crate::body::Particle;
use crate::math::Vec2;

/// Verlet position update under a uniform force, followed by optional
/// position-based air damping.
pub fn integrate(particles: &mut [Particle], force: Vec2, dt: f64, air_resistance: f64) {
    let dt_sq = dt * dt;
    for p in particles.iter_mut().filter(|p| !p.is_locked) {
        let velocity = p.pos - p.old_pos;
        let accel = force / p.mass;
        let next = p.pos + velocity + accel * dt_sq;
        p.old_pos = p.pos;
        p.pos = next;
        p.velocity = velocity / dt;
    }

    if air_resistance > 0.0 {
        let keep = 1.0 - air_resistance;
        for p in particles.iter_mut().filter(|p| !p.is_locked) {
            let damped = (p.pos - p.old_pos) * keep;
            p.old_pos = p.pos - damped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn moving(vx: f64, vy: f64) -> Particle {
        let mut p = Particle::new(0, Vec2::new(10.0, 10.0), 2.0, 1.0);
        p.old_pos = Vec2::new(10.0 - vx, 10.0 - vy);
        p
    }

    #[test]
    fn unforced_undamped_motion_keeps_its_step() {
        let mut particles = vec![moving(1.5, -0.25)];
        for _ in 0..20 {
            let before = particles[0].pos - particles[0].old_pos;
            integrate(&mut particles, Vec2::ZERO, 1.0 / 60.0, 0.0);
            let after = particles[0].pos - particles[0].old_pos;
            assert!((after.x - before.x).abs() < 1e-12);
            assert!((after.y - before.y).abs() < 1e-12);
        }
    }

    #[test]
    fn acceleration_is_force_over_mass() {
        let mut particles = vec![Particle::new(0, Vec2::ZERO, 2.0, 1.0)];
        integrate(&mut particles, Vec2::new(0.0, 8.0), 0.5, 0.0);
        // a = 4, dt^2 = 0.25
        assert_eq!(particles[0].pos, Vec2::new(0.0, 1.0));
        assert_eq!(particles[0].old_pos, Vec2::ZERO);
        assert_eq!(particles[0].velocity, Vec2::ZERO);
    }

    #[test]
    fn air_resistance_scales_the_implied_step() {
        let mut particles = vec![moving(2.0, 0.0)];
        integrate(&mut particles, Vec2::ZERO, 1.0, 0.25);
        let step = particles[0].pos - particles[0].old_pos;
        assert!((step.x - 1.5).abs() < 1e-12);
        assert_eq!(particles[0].velocity, Vec2::new(2.0, 0.0));
    }

    proptest! {
        #[test]
        fn locked_particles_never_move(
            fx in -1e4f64..1e4,
            fy in -1e4f64..1e4,
            dt in 1e-4f64..1.0,
            air in 0.0f64..1.0,
        ) {
            let mut p = moving(3.0, 4.0).locked();
            p.velocity = Vec2::new(7.0, 7.0);
            let mut particles = vec![p.clone()];
            integrate(&mut particles, Vec2::new(fx, fy), dt, air);
            prop_assert_eq!(&particles[0], &p);
        }
    }
}
