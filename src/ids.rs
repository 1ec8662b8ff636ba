//! Time-based identifiers that never repeat.
//!
//! A bare millisecond timestamp collides when two sessions are created in the
//! same millisecond.  [`TimeOrderedIds`] hands out the current Unix time in
//! milliseconds, or one more than the last value it issued, whichever is
//! larger, so ids are strictly increasing for the generator's lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;

/// Generator of strictly increasing, time-based ids.
#[derive(Debug, Default)]
pub struct TimeOrderedIds {
    last: AtomicU64,
}

impl TimeOrderedIds {
    /// Create a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next token.
    pub fn next_token(&self) -> u64 {
        let now = unix_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }

    /// Returns the next token rendered as a string id.
    pub fn next_id(&self) -> String {
        self.next_token().to_string()
    }
}

fn unix_millis() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000).max(0) as u64
}
