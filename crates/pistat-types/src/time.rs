//! Clock abstraction.
//!
//! Every timed behavior (hold ticks, tweens, acknowledgement deadlines,
//! uptime) reads time through [`TimeService`] so that tests can drive the
//! clock by hand.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Instant, SystemTime};

pub trait TimeService {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn monotonic_ms(&self) -> u64;

    /// Seconds since the Unix epoch.
    fn unix_secs(&self) -> u64;
}

/// Real clocks from `std`.
#[derive(Debug)]
pub struct SystemTimeService {
    origin: Instant,
}

impl SystemTimeService {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeService for SystemTimeService {
    fn monotonic_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Hand-driven clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now_ms: Rc<Cell<u64>>,
    epoch_secs: Rc<Cell<u64>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a given Unix time (seconds). Monotonic time starts at zero.
    pub fn at_unix(secs: u64) -> Self {
        let t = Self::default();
        t.epoch_secs.set(secs);
        t
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    /// Jump to an absolute monotonic time. Moving backwards is ignored.
    pub fn set(&self, ms: u64) {
        if ms > self.now_ms.get() {
            self.now_ms.set(ms);
        }
    }
}

impl TimeService for ManualTime {
    fn monotonic_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn unix_secs(&self) -> u64 {
        self.epoch_secs.get() + self.now_ms.get() / 1000
    }
}

/// Format a Unix timestamp as `HH:MM:SS` (UTC).
pub fn clock_hms(unix_secs: u64) -> String {
    let day = unix_secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}

/// Format a duration in seconds as `HH:MM:SS`; hours may exceed 24.
pub fn duration_hms(secs: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
