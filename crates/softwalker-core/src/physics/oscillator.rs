use crate::body::Muscle;
use std::f64::consts::TAU;

/// Target length of a muscle at simulation time `time` (seconds).
pub fn target_length(muscle: &Muscle, time: f64) -> f64 {
    muscle.base_length
        * (1.0 + muscle.amplitude * (time * muscle.frequency * TAU + muscle.phase).sin())
}

/// Write every muscle's `current_length` for this tick.
pub fn update(muscles: &mut [Muscle], time: f64) {
    for muscle in muscles {
        muscle.current_length = target_length(muscle, time);
    }
}
