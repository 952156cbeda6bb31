//! Phase progress measured against a fixed entry timestamp.
//!
//! Elapsed time is recomputed from `phase_start` on every sample and never
//! accumulated tick by tick, so jitter in the sampler cannot build up drift.

use std::time::{Duration, Instant};

use tracing::warn;

/// Result of sampling a [`ProgressClock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    /// Elapsed fraction of the phase, clamped to `0.0..=1.0`.
    pub fraction: f64,
    /// True once the full phase duration has elapsed.
    pub complete: bool,
    pub elapsed: Duration,
    pub remaining: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressClock {
    phase_start: Instant,
    duration: Duration,
}

impl ProgressClock {
    /// A zero `duration` reads as complete from the first sample.
    pub fn new(phase_start: Instant, duration: Duration) -> Self {
        Self {
            phase_start,
            duration,
        }
    }

    pub fn phase_start(&self) -> Instant {
        self.phase_start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Instant at which the current phase completes.
    pub fn phase_end(&self) -> Instant {
        self.phase_start + self.duration
    }

    /// Time spent in the phase as of `now`. Instants before the anchor count as zero.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_start)
    }

    pub fn sample(&self, now: Instant) -> ClockReading {
        let elapsed = self.elapsed(now);
        let fraction = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        ClockReading {
            fraction,
            complete: elapsed >= self.duration,
            elapsed,
            remaining: self.duration.saturating_sub(elapsed),
        }
    }

    /// Start a new phase at `phase_start`.
    pub fn reanchor(&mut self, phase_start: Instant, duration: Duration) {
        self.phase_start = phase_start;
        self.duration = duration;
    }

    /// Move the anchor so that `elapsed` has already passed at `now`.
    /// Used on resume to continue exactly where a pause left off.
    pub fn resume_at(&mut self, now: Instant, elapsed: Duration) {
        self.phase_start = match now.checked_sub(elapsed) {
            Some(start) => start,
            None => {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "cannot rewind phase anchor, restarting phase"
                );
                now
            }
        };
    }
}
