//! Timestamp source

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of 100µs timestamps
pub trait Clock {
    /// Current time in 100µs ticks
    fn now(&self) -> u64;

    /// Current time truncated to 32 bits, for the wrap-tolerant timers
    #[allow(clippy::cast_possible_truncation)]
    fn now_u32(&self) -> u32 {
        self.now() as u32
    }
}

/// Wall clock, 100µs ticks since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() * 10_000 + u64::from(d.subsec_micros() / 100))
            .unwrap_or(0)
    }
}

/// Wrap-tolerant timer check on 32-bit tick counters
///
/// A `last` ahead of `now` means the counter wrapped and the timer fires.
/// Otherwise it fires once strictly more than `interval` ticks have passed.
#[must_use]
pub fn is_due(last: u32, now: u32, interval: u32) -> bool {
    last > now || now.wrapping_sub(last) > interval
}
