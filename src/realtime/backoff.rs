//! Reconnect delay schedule

use std::time::Duration;

/// Floor of the reconnect schedule.
const FLOOR_MS: u64 = 1_000;
/// Ceiling the schedule clamps to; retries continue at this cadence.
const CEILING_MS: u64 = 30_000;

/// Exponential reconnect backoff: 1s, 2s, 4s, ... clamped at 30s.
///
/// `next_delay` returns the delay for the current attempt and doubles the
/// schedule; a successful open resets it to the floor.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay_ms: u64,
}

impl Backoff {
    pub fn new() -> Self {
        Self { delay_ms: FLOOR_MS }
    }

    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay_ms;
        self.delay_ms = (self.delay_ms.saturating_mul(2)).min(CEILING_MS);
        Duration::from_millis(current)
    }

    pub fn reset(&mut self) {
        self.delay_ms = FLOOR_MS;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
