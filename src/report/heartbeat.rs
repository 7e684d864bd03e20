//! # Heartbeat
//!
//! Keeps idle-timeout proxies from cutting a long scan. A single space is
//! insignificant whitespace between JSON array elements, so streaming
//! readers skip it.

use std::time::{Duration, Instant};

/// Interval used unless configured otherwise
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

/// Byte written on each heartbeat
pub const HEARTBEAT_BYTE: u8 = b' ';

/// Time of the last heartbeat (or scan start), threaded through the scan loop.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last: Instant,
    sent: u64,
}

impl Heartbeat {
    /// Start the timer now.
    pub fn start(interval: Duration) -> Self {
        Self::start_at(interval, Instant::now())
    }

    pub fn start_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
            sent: 0,
        }
    }

    /// Returns true, and resets the timer, when strictly more than the
    /// interval has passed since the last reset.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) > self.interval {
            self.last = now;
            self.sent += 1;
            true
        } else {
            false
        }
    }

    /// Heartbeats signalled so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}
