//! Upload correlation ids
//!
//! An upload id is the current time in milliseconds, bumped past the last id
//! handed out so that two publishes started within the same millisecond never
//! share one.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_UPLOAD_ID: AtomicU64 = AtomicU64::new(0);

/// Correlation key binding binary transfers to their configure call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UploadId(u64);

impl UploadId {
    /// A fresh id, strictly greater than every id issued before in this process
    pub fn next() -> Self {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        Self(next_after(&LAST_UPLOAD_ID, now_ms))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Entity name for one binary transfer under this id
    pub fn entity_name(&self) -> String {
        let suffix: u64 = rand::thread_rng().gen_range(1_000_000_000..=9_999_999_999);
        format!("{}_0_{}", self.0, suffix)
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn next_after(last: &AtomicU64, now_ms: u64) -> u64 {
    let previous = last
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
            Some(now_ms.max(prev + 1))
        })
        .unwrap_or_else(|prev| prev);
    now_ms.max(previous + 1)
}
