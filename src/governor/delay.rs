//! Randomised human-like pauses

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive range of milliseconds a pause is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// A range that never pauses
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    /// Draw one pause length from the range
    pub fn sample(&self) -> Duration {
        if self.is_zero() {
            return Duration::ZERO;
        }
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Sleep for a random duration drawn from `range`
pub async fn human_pause(range: DelayRange) {
    let pause = range.sample();
    if pause.is_zero() {
        return;
    }
    tracing::trace!("Pausing for {}ms", pause.as_millis());
    tokio::time::sleep(pause).await;
}
