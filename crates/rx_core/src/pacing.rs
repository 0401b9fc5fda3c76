//! Frame pacing for stepped mode.
//!
//! Real-time sources pace themselves, so the loop never consults a `Pacer`
//! there.

use std::thread;
use std::time::{Duration, Instant};

/// Slowest accepted frame rate (one frame per hour)
pub const MIN_FPS: f64 = 1.0 / 3600.0;

/// Budget at `MIN_FPS`
pub const MAX_FRAME_BUDGET: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    frame_budget: Duration,
}

impl Pacer {
    /// Budget of `1 / fps` seconds per frame. Non-positive or non-finite
    /// rates yield a zero budget (never sleep); rates below `MIN_FPS` are
    /// clamped to it.
    pub fn from_fps(fps: f64) -> Self {
        let frame_budget = if !(fps.is_finite() && fps > 0.0) {
            Duration::ZERO
        } else if fps <= MIN_FPS {
            MAX_FRAME_BUDGET
        } else {
            Duration::try_from_secs_f64(1.0 / fps).unwrap_or(MAX_FRAME_BUDGET)
        };
        Self { frame_budget }
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// `max(0, budget - elapsed)`
    #[inline]
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.frame_budget.saturating_sub(elapsed)
    }

    pub fn remaining_since(&self, started: Instant) -> Duration {
        self.remaining(started.elapsed())
    }

    /// Sleep out the rest of the frame that began at `started`.
    /// Returns the duration slept.
    pub fn pace(&self, started: Instant) -> Duration {
        let wait = self.remaining_since(started);
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_from_fps() {
        let pacer = Pacer::from_fps(20.0);
        assert_eq!(pacer.frame_budget(), Duration::from_millis(50));
    }

    #[test]
    fn test_remaining_inside_budget() {
        let pacer = Pacer::from_fps(10.0);
        assert_eq!(pacer.remaining(Duration::from_millis(30)), Duration::from_millis(70));
    }

    #[test]
    fn test_never_negative_when_over_budget() {
        let pacer = Pacer::from_fps(30.0);
        for over_ms in [34u64, 100, 1_000, 60_000] {
            assert_eq!(pacer.remaining(Duration::from_millis(over_ms)), Duration::ZERO);
        }
        assert_eq!(pacer.remaining(pacer.frame_budget()), Duration::ZERO);
    }

    #[test]
    fn test_invalid_rates_do_not_sleep() {
        assert_eq!(Pacer::from_fps(0.0).frame_budget(), Duration::ZERO);
        assert_eq!(Pacer::from_fps(-5.0).frame_budget(), Duration::ZERO);
        assert_eq!(Pacer::from_fps(f64::INFINITY).frame_budget(), Duration::ZERO);
    }

    #[test]
    fn test_tiny_rates_clamp_instead_of_overflowing() {
        for fps in [1e-20, f64::MIN_POSITIVE, 1e-300] {
            assert_eq!(Pacer::from_fps(fps).frame_budget(), MAX_FRAME_BUDGET);
        }
        assert_eq!(Pacer::from_fps(MIN_FPS).frame_budget(), MAX_FRAME_BUDGET);
    }

    #[test]
    fn test_pace_sleeps_out_the_frame() {
        let pacer = Pacer::from_fps(100.0);
        let started = Instant::now();
        pacer.pace(started);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
