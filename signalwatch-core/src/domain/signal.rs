//! Signal: an emitted BUY call and its lifecycle state.
//!
//! Entry, targets, stop and the creation-time snapshot are fixed when the
//! classifier builds the signal. Only `current_price`, `status`, `hit_at` and
//! `message_id` change afterwards, and `status` only ever moves forward.

use super::ids::{MessageId, SignalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a signal.
///
/// Targets form a ranked ladder (ACTIVE < TP1 < TP2 < TP3). `SlHit` and
/// `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Active,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    SlHit,
    Closed,
}

impl SignalStatus {
    /// Ordinal rank used for forward-only advancement.
    pub fn rank(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Tp1Hit => 1,
            Self::Tp2Hit => 2,
            Self::Tp3Hit => 3,
            Self::SlHit | Self::Closed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SlHit | Self::Closed)
    }

    /// Target level (1-based) for the TP states.
    pub fn target_level(self) -> Option<usize> {
        match self {
            Self::Tp1Hit => Some(1),
            Self::Tp2Hit => Some(2),
            Self::Tp3Hit => Some(3),
            _ => None,
        }
    }

    /// Status for a reached target level (1-based).
    pub fn for_target_level(level: usize) -> Option<Self> {
        match level {
            1 => Some(Self::Tp1Hit),
            2 => Some(Self::Tp2Hit),
            3 => Some(Self::Tp3Hit),
            _ => None,
        }
    }

    /// Returns `candidate` if it is a legal forward move from `self`.
    ///
    /// Replacement happens iff the current status is not terminal and the
    /// candidate outranks it. The rule is uniform across all target levels.
    pub fn advance(self, candidate: SignalStatus) -> Option<SignalStatus> {
        if self.is_terminal() || candidate.rank() <= self.rank() {
            None
        } else {
            Some(candidate)
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Tp1Hit => "TP1_HIT",
            Self::Tp2Hit => "TP2_HIT",
            Self::Tp3Hit => "TP3_HIT",
            Self::SlHit => "SL_HIT",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Which classifier rule produced the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Trend continuation after a pullback into SMA50.
    Primo,
    /// Volume shock on a strong green bar.
    WhaleEntry,
    /// EMA trend + MACD + RSI + volume confirmation.
    MomentumBreakout,
}

impl SignalKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Primo => "Primo",
            Self::WhaleEntry => "Whale entry",
            Self::MomentumBreakout => "Momentum breakout",
        }
    }
}

/// EMA-based trend classification at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Neutral => "NEUTRAL",
        }
    }
}

/// Classifier action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Wait,
}

/// Outcome of the static allow-list lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NeedsReview,
}

/// Compliance tag attached to every signal. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    pub status: ComplianceStatus,
    pub note: String,
}

impl Compliance {
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }
}

/// A tracked BUY signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub kind: SignalKind,
    pub entry_price: f64,
    pub current_price: f64,
    /// Take-profit levels, strictly ascending.
    pub tps: [f64; 3],
    /// Stop-loss level, below entry.
    pub sl: f64,
    pub rsi: f64,
    pub ema20: f64,
    pub trend: Trend,
    pub change_24h: f64,
    /// Latest-bar volume at creation.
    pub volume: f64,
    pub compliance: Compliance,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub hit_at: Option<DateTime<Utc>>,
    pub message_id: Option<MessageId>,
}

impl Signal {
    pub fn symbol(&self) -> &str {
        &self.id.symbol
    }

    pub fn is_active(&self) -> bool {
        self.status == SignalStatus::Active
    }

    /// Levels satisfy the long-only invariants: finite, tps strictly
    /// ascending and above entry, 0 < sl < entry.
    pub fn has_valid_levels(&self) -> bool {
        let all_finite = self.entry_price.is_finite()
            && self.sl.is_finite()
            && self.tps.iter().all(|tp| tp.is_finite());
        all_finite
            && self.entry_price > 0.0
            && self.sl > 0.0
            && self.sl < self.entry_price
            && self.entry_price < self.tps[0]
            && self.tps[0] < self.tps[1]
            && self.tps[1] < self.tps[2]
    }

    /// Status implied by `price`, before the forward-only rule is applied.
    ///
    /// Targets are checked from the highest down; the stop is only checked
    /// for an ACTIVE signal and only when no target is reached.
    pub fn status_at(&self, price: f64) -> SignalStatus {
        for level in (1..=3).rev() {
            if price >= self.tps[level - 1] {
                if let Some(status) = SignalStatus::for_target_level(level) {
                    return status;
                }
            }
        }
        if self.status == SignalStatus::Active && price <= self.sl {
            return SignalStatus::SlHit;
        }
        self.status
    }

    /// Refresh the price and advance the status.
    ///
    /// Returns the previous status when the status changed. `hit_at` is
    /// stamped with `now` on every change.
    pub fn reprice(&mut self, price: f64, now: DateTime<Utc>) -> Option<SignalStatus> {
        self.current_price = price;
        let next = self.status.advance(self.status_at(price))?;
        let previous = self.status;
        self.status = next;
        self.hit_at = Some(now);
        Some(previous)
    }

    /// Operator close. No-op for terminal signals.
    pub fn close(&mut self, now: DateTime<Utc>) -> Option<SignalStatus> {
        if self.status.is_terminal() {
            return None;
        }
        let previous = self.status;
        self.status = SignalStatus::Closed;
        self.hit_at = Some(now);
        Some(previous)
    }

    /// Price level that realised `status`: the target for TPn, the stop for
    /// SL_HIT, the current price for CLOSED.
    pub fn exit_price(&self, status: SignalStatus) -> Option<f64> {
        match status {
            SignalStatus::Active => None,
            SignalStatus::SlHit => Some(self.sl),
            SignalStatus::Closed => Some(self.current_price),
            other => other.target_level().map(|level| self.tps[level - 1]),
        }
    }

    /// Percent move from entry to the level that realised `status`.
    pub fn pnl_pct(&self, status: SignalStatus) -> Option<f64> {
        self.exit_price(status)
            .map(|exit| (exit - self.entry_price) / self.entry_price * 100.0)
    }
}
