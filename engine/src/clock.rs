//! Time sources that drive the attraction/repulsion oscillator.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Monotonic time source read once per engine step.
pub trait Clock: Send + fmt::Debug {
    /// Restarts the clock so that elapsed time is measured from now.
    fn restart(&mut self);

    /// Time elapsed since the last restart.
    fn elapsed(&mut self) -> Duration;
}

/// Wall-clock time source backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    /// Creates a clock that starts measuring immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn restart(&mut self) {
        self.started = Instant::now();
    }

    fn elapsed(&mut self) -> Duration {
        self.started.elapsed()
    }
}

/// Deterministic time source that advances by a fixed step on every read.
///
/// The first read after a restart reports exactly one step.
#[derive(Clone, Debug)]
pub struct FixedStepClock {
    step: Duration,
    elapsed: Duration,
}

impl FixedStepClock {
    /// Creates a clock that advances by `step` per read.
    #[must_use]
    pub const fn new(step: Duration) -> Self {
        Self {
            step,
            elapsed: Duration::ZERO,
        }
    }

    /// Creates a clock that advances by `1 / frames_per_second` per read.
    ///
    /// A zero rate produces a clock that never advances.
    #[must_use]
    pub fn per_frame(frames_per_second: u32) -> Self {
        if frames_per_second == 0 {
            return Self::new(Duration::ZERO);
        }
        Self::new(Duration::from_secs(1) / frames_per_second)
    }
}

impl Clock for FixedStepClock {
    fn restart(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    fn elapsed(&mut self) -> Duration {
        self.elapsed = self.elapsed.saturating_add(self.step);
        self.elapsed
    }
}
