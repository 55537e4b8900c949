//! Circuit breaker driven by Binance's rate-limit and ban responses.
//!
//! Binance reports trouble through the status code:
//! - 429: request weight exceeded, back off for `Retry-After` seconds
//! - 418: the IP was auto-banned for ignoring 429s; `Retry-After` is the ban length
//! - 403: the WAF rejected the request
//! - 5xx: exchange-side failure; only a run of them opens the breaker
//!
//! While open, every request is refused until the deadline passes. A new trip
//! never shortens a longer hold already in force.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Why the breaker opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripReason {
    RateLimited,
    Banned,
    WafBlocked,
    ServerErrors,
}

impl TripReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Banned => "ip_banned",
            Self::WafBlocked => "waf_blocked",
            Self::ServerErrors => "server_errors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open { until: Instant, reason: TripReason },
}

/// Hold durations per trip reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Consecutive 5xx responses that open the breaker.
    pub failure_threshold: u32,
    pub failure_cooldown: Duration,
    /// Hold for a 429 without a usable `Retry-After`.
    pub rate_limit_fallback: Duration,
    /// Hold for a 418 without a usable `Retry-After`.
    pub ban_fallback: Duration,
    pub waf_cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_cooldown: Duration::from_secs(5 * 60),
            rate_limit_fallback: Duration::from_secs(60),
            ban_fallback: Duration::from_secs(5 * 60),
            waf_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    policy: BreakerPolicy,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            policy,
        }
    }

    // Every update leaves `Inner` consistent, so a poisoned lock is usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_allowed(&self) -> bool {
        self.is_allowed_at(Instant::now())
    }

    fn is_allowed_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { until, .. } if now >= until => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    /// Time left before requests are allowed again (zero when closed).
    pub fn remaining_cooldown(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { until, .. } => until.saturating_duration_since(now),
        }
    }

    /// Reason for the current hold, if open.
    pub fn open_reason(&self) -> Option<TripReason> {
        match self.lock().state {
            BreakerState::Closed => None,
            BreakerState::Open { reason, .. } => Some(reason),
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Feed a non-success HTTP status. Returns the reason when this response
    /// opened (or extended) the breaker; other client errors are neutral.
    pub fn record_status(&self, status: u16, retry_after: Option<Duration>) -> Option<TripReason> {
        self.record_status_at(Instant::now(), status, retry_after)
    }

    fn record_status_at(
        &self,
        now: Instant,
        status: u16,
        retry_after: Option<Duration>,
    ) -> Option<TripReason> {
        let policy = &self.policy;
        let mut inner = self.lock();

        let (reason, hold) = match status {
            429 => (
                TripReason::RateLimited,
                retry_after.unwrap_or(policy.rate_limit_fallback),
            ),
            418 => (TripReason::Banned, retry_after.unwrap_or(policy.ban_fallback)),
            403 => (TripReason::WafBlocked, policy.waf_cooldown),
            500..=599 => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures < policy.failure_threshold {
                    return None;
                }
                (TripReason::ServerErrors, policy.failure_cooldown)
            }
            _ => return None,
        };

        let until = now + hold;
        match inner.state {
            BreakerState::Open { until: current, .. } if current >= until => {}
            _ => inner.state = BreakerState::Open { until, reason },
        }
        Some(reason)
    }
}
