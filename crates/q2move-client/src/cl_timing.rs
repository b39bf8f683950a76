// cl_timing.rs -- Fixed-step physics timing for the movement clock
//
// With async enabled, player physics runs at `maxfps` steps per second
// regardless of how often frames are drawn. Time left over after the last
// whole step is what the display projection simulates on top of the
// authoritative state.

use std::time::Instant;

/// Most physics steps run for a single frame when catching up.
pub const MAX_CATCHUP_STEPS: u32 = 5;

/// Timing state for decoupled physics.
pub struct MoveTiming {
    /// Accumulated time for physics steps (microseconds)
    pub physics_accumulator: f64,
    /// Last frame timestamp
    pub last_frame_time: Instant,
    /// Whether async physics is enabled
    pub async_enabled: bool,
}

impl MoveTiming {
    pub fn new() -> Self {
        Self {
            physics_accumulator: 0.0,
            last_frame_time: Instant::now(),
            async_enabled: true,
        }
    }

    /// Measure the time since the last frame and feed it to the accumulator.
    /// Returns the delta time in seconds.
    pub fn update(&mut self) -> f64 {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;

        let secs = delta.as_secs_f64();
        self.accumulate(secs);
        secs
    }

    /// Feed an externally measured frame delta.
    pub fn accumulate(&mut self, delta_secs: f64) {
        if self.async_enabled && delta_secs > 0.0 {
            self.physics_accumulator += delta_secs * 1_000_000.0;
        }
    }

    /// Number of physics steps to run this frame (may be > 1 if we're behind).
    pub fn should_physics(&mut self, maxfps: i32) -> u32 {
        if !self.async_enabled {
            return 1;
        }

        let frame_time_us = self.physics_frametime(maxfps) as f64 * 1_000_000.0;
        let mut frames = 0u32;

        while self.physics_accumulator >= frame_time_us && frames < MAX_CATCHUP_STEPS {
            self.physics_accumulator -= frame_time_us;
            frames += 1;
        }

        // Prevent accumulator from growing too large
        if self.physics_accumulator > frame_time_us * 2.0 {
            self.physics_accumulator = 0.0;
        }

        frames
    }

    /// Physics step length in seconds for a given target rate.
    pub fn physics_frametime(&self, maxfps: i32) -> f32 {
        if maxfps <= 0 {
            1.0 / 60.0
        } else {
            1.0 / maxfps as f32
        }
    }

    /// Time not yet consumed by a whole physics step, in seconds.
    pub fn remaining(&self) -> f32 {
        (self.physics_accumulator / 1_000_000.0) as f32
    }

    /// Reset the accumulator (used on map change, etc.)
    pub fn reset(&mut self) {
        self.physics_accumulator = 0.0;
        self.last_frame_time = Instant::now();
    }

    pub fn set_async(&mut self, enabled: bool) {
        self.async_enabled = enabled;
        self.reset();
    }
}

impl Default for MoveTiming {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_creation() {
        let timing = MoveTiming::new();
        assert!(timing.async_enabled);
        assert_eq!(timing.physics_accumulator, 0.0);
    }

    #[test]
    fn test_physics_frametime() {
        let timing = MoveTiming::new();
        assert!((timing.physics_frametime(120) - 1.0 / 120.0).abs() < 0.0001);
        assert!((timing.physics_frametime(0) - 1.0 / 60.0).abs() < 0.0001);
        assert!((timing.physics_frametime(-5) - 1.0 / 60.0).abs() < 0.0001);
    }

    #[test]
    fn test_whole_steps_and_remainder() {
        let mut timing = MoveTiming::new();
        // two and a half steps at 100 Hz
        timing.accumulate(0.025);
        assert_eq!(timing.should_physics(100), 2);
        assert!((timing.remaining() - 0.005).abs() < 1e-5);

        timing.accumulate(0.006);
        assert_eq!(timing.should_physics(100), 1);
        assert!((timing.remaining() - 0.001).abs() < 1e-5);
    }

    #[test]
    fn test_catchup_is_capped() {
        let mut timing = MoveTiming::new();
        timing.accumulate(1.0);
        assert_eq!(timing.should_physics(100), MAX_CATCHUP_STEPS);
        // the backlog is dropped rather than carried over
        assert_eq!(timing.physics_accumulator, 0.0);
    }

    #[test]
    fn test_sync_mode_always_one_step() {
        let mut timing = MoveTiming::new();
        timing.set_async(false);
        timing.accumulate(1.0);
        assert_eq!(timing.physics_accumulator, 0.0);
        assert_eq!(timing.should_physics(120), 1);
        assert_eq!(timing.should_physics(120), 1);
    }

    #[test]
    fn test_set_async_resets() {
        let mut timing = MoveTiming::new();
        timing.accumulate(0.004);
        timing.set_async(true);
        assert_eq!(timing.physics_accumulator, 0.0);
    }
}
