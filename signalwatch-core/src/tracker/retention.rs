//! Retention windows for tracked signals.

use crate::domain::Signal;
use chrono::{DateTime, Duration, Utc};

/// How long signals stay in the registry.
///
/// ACTIVE signals live for `active_ttl` from creation. Signals that hit a
/// target, the stop, or were closed live for `hit_ttl` from their last status
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub active_ttl: Duration,
    pub hit_ttl: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            active_ttl: Duration::hours(24),
            hit_ttl: Duration::minutes(30),
        }
    }
}

impl RetentionPolicy {
    /// True while `signal` is inside its retention window at `now`.
    pub fn retains(&self, signal: &Signal, now: DateTime<Utc>) -> bool {
        if signal.is_active() {
            return now - signal.created_at < self.active_ttl;
        }
        signal
            .hit_at
            .is_some_and(|hit_at| now - hit_at < self.hit_ttl)
    }
}
