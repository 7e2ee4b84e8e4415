//! Wall-clock timing for frame statistics.

use std::time::{Duration, Instant};

/// Measures elapsed time and counts frames against it.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    frames: u64,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: 0,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record one completed frame.
    pub fn tick(&mut self) {
        self.frames += 1;
    }

    /// Number of frames recorded with [`tick`](Self::tick).
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average frames per second over the whole lifetime of the timer.
    ///
    /// Returns 0 when no measurable time has passed.
    pub fn average_fps(&self) -> f64 {
        Self::rate(self.frames, self.elapsed())
    }

    fn rate(frames: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            0.0
        } else {
            frames as f64 / secs
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = Timer::new();
        timer.tick();
        timer.tick();
        timer.tick();
        assert_eq!(timer.frames(), 3);
    }

    #[test]
    fn test_rate() {
        assert_eq!(Timer::rate(120, Duration::from_secs(2)), 60.0);
        assert_eq!(Timer::rate(10, Duration::ZERO), 0.0);
    }
}
