//! Time source for the monitoring loop

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

/// Monotonic and wall-clock time, plus blocking sleep
pub trait Clock {
    /// Monotonic reading for timers
    fn now(&self) -> Instant;

    /// Local wall-clock time for segment naming and rotation
    fn wall(&self) -> DateTime<Local>;

    fn sleep(&self, duration: Duration);
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
