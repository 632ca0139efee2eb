//! # clock
//!
//! Monotonic and wall time for the control loop. Flush and health timers read
//! [`Clock::now_ms`]; trade reports stamp [`Clock::wall`].

use std::time::Instant;

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin. Never goes backwards.
    fn now_ms(&self) -> u64;

    fn wall(&self) -> DateTime<Utc>;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
#[cfg(test)]
pub struct ManualClock {
    ms:   std::sync::atomic::AtomicU64,
    base: DateTime<Utc>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        use chrono::TimeZone;
        Self {
            ms:   std::sync::atomic::AtomicU64::new(0),
            base: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn wall(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::milliseconds(self.now_ms() as i64)
    }
}
