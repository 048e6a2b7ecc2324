/// Fixed-timestep clock fed with wall time.
///
/// Wall time accumulates; whole `dt` steps are drained from the accumulator
/// and any remainder carries into the next advance. Simulation time is
/// derived from the tick count so it never drifts from `ticks * dt`.
#[derive(Clone, Debug, PartialEq)]
pub struct SimClock {
    dt: f64,
    max_delta: f64,
    accumulator: f64,
    ticks: u64,
}

impl SimClock {
    pub fn new(dt: f64, max_delta: f64) -> Self {
        Self {
            dt,
            max_delta,
            accumulator: 0.0,
            ticks: 0,
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulation time reached after the recorded ticks.
    pub fn time(&self) -> f64 {
        self.ticks as f64 * self.dt
    }

    /// Add wall time, clamped to `[0, max_delta]`; non-finite input is ignored.
    /// Returns the whole steps now pending.
    pub fn advance(&mut self, wall_delta: f64) -> usize {
        if wall_delta.is_finite() {
            self.accumulator += wall_delta.clamp(0.0, self.max_delta);
        }
        (self.accumulator / self.dt).floor() as usize
    }

    pub fn has_step(&self) -> bool {
        self.accumulator >= self.dt
    }

    /// Take one whole step out of the accumulator if one is available.
    pub fn consume_step(&mut self) -> bool {
        if self.accumulator < self.dt {
            return false;
        }
        self.accumulator -= self.dt;
        true
    }

    pub fn record_ticks(&mut self, ticks: usize) {
        self.ticks += ticks as u64;
    }

    /// Restart simulation time for a new generation; pending wall time is kept.
    pub fn reset_time(&mut self) {
        self.ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn drains_whole_steps_and_carries_remainder() {
        let mut clock = SimClock::new(0.01, 1.0);
        assert_eq!(clock.advance(0.035), 3);
        let mut drained = 0;
        while clock.consume_step() {
            drained += 1;
        }
        assert_eq!(drained, 3);
        assert_relative_eq!(clock.accumulator(), 0.005, epsilon = 1e-12);
        assert_eq!(clock.advance(0.006), 1);
    }

    #[test]
    fn advance_clamps_and_ignores_bad_deltas() {
        let mut clock = SimClock::new(0.1, 0.25);
        assert_eq!(clock.advance(10.0), 2);
        assert_relative_eq!(clock.accumulator(), 0.25);
        clock.advance(-1.0);
        clock.advance(f64::NAN);
        assert_relative_eq!(clock.accumulator(), 0.25);
    }

    #[test]
    fn time_follows_recorded_ticks() {
        let mut clock = SimClock::new(0.5, 1.0);
        clock.record_ticks(3);
        assert_eq!(clock.time(), 1.5);
        clock.reset_time();
        assert_eq!(clock.time(), 0.0);
        assert_eq!(clock.ticks(), 0);
    }
}
