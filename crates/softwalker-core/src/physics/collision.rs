use crate::body::Particle;
use crate::constants::{
    AIRBORNE_CLEARANCE, GROUND_NOMINAL_DT, GROUND_PUSH_OFF_DECAY, WALL_VELOCITY_RETENTION,
};
use crate::math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Horizontal ground line; everything with `y` greater than `y - radius` is inside it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ground {
    pub y: f64,
    /// Fraction of impact speed returned as bounce.
    pub restitution: f64,
    /// Fraction of horizontal speed removed per contact.
    pub friction: f64,
}

/// Vertical wall at `x`. Only the sign of `normal.x` is used: it points toward
/// the open side. Particles already on the open side are never touched, even
/// when they overlap the wall by less than their radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub x: f64,
    pub normal: Vec2,
}

pub fn resolve_ground(particles: &mut [Particle], ground: &Ground) {
    for p in particles.iter_mut().filter(|p| !p.is_locked) {
        let floor = ground.y - p.radius;
        if p.pos.y <= floor {
            continue;
        }
        let v = p.pos - p.old_pos;
        p.pos.y = floor;

        let vy = if v.y < 0.0 {
            v.y * GROUND_PUSH_OFF_DECAY
        } else {
            -v.y * ground.restitution
        };
        let vx = v.x * (1.0 - ground.friction);
        let v = Vec2::new(vx, vy);
        p.old_pos = p.pos - v;
        p.velocity = v / GROUND_NOMINAL_DT;
    }
}

pub fn resolve_walls(particles: &mut [Particle], walls: &[Wall]) {
    for p in particles.iter_mut().filter(|p| !p.is_locked) {
        for wall in walls {
            if wall.normal.x == 0.0 {
                continue;
            }
            let side = wall.normal.x.signum();
            // Only particles on the blocked side are pushed out.
            let signed_distance = (p.pos.x - wall.x) * side;
            if signed_distance >= 0.0 {
                continue;
            }
            let vx = p.pos.x - p.old_pos.x;
            p.pos.x = wall.x + side * p.radius;
            p.old_pos.x = p.pos.x + vx * WALL_VELOCITY_RETENTION;
        }
    }
}

/// True when any particle lies inside the zone.
pub fn touches_zone(particles: &[Particle], zone: &Rect) -> bool {
    particles.iter().any(|p| zone.contains(p.pos))
}

/// Death condition: the head reached the ground line.
pub fn head_grounded(head: &Particle, ground: &Ground) -> bool {
    head.pos.y >= ground.y - head.radius
}

pub fn is_airborne(foot: &Particle, ground: &Ground) -> bool {
    foot.pos.y < ground.y - foot.radius - AIRBORNE_CLEARANCE
}
