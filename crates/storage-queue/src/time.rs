//! Clock abstraction used by the in-memory service to evaluate visibility
//! windows and expiry.

use crate::message::Timestamp;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current time
pub trait TimeProvider: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Wall-clock time provider
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to; clones share the same instant
#[derive(Debug, Clone)]
pub struct ManualTimeProvider {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualTimeProvider {
    /// Clock starting at the current wall-clock time
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock starting at `start`
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> Timestamp {
        let now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Timestamp::from_datetime(*now)
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
