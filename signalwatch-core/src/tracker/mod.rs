//! Signal lifecycle tracker.
//!
//! Owns the registry of tracked signals and the set of signals already offered
//! to the notification sink. Each call to [`Tracker::run_cycle`] consumes one
//! immutable [`CycleSnapshot`] and runs three phases in a fixed order:
//!
//! 1. re-price every tracked signal that has fresh data and advance its status
//! 2. evict signals whose retention window has elapsed
//! 3. classify universe symbols without an ACTIVE signal and register BUYs
//!
//! Phase 1 finishing before phase 3 means a symbol cannot close out an old
//! signal and open a duplicate within the same cycle. At most one ACTIVE
//! signal exists per symbol; hit signals for the same symbol may coexist with
//! it until they expire.

pub mod retention;
pub mod snapshot;

pub use retention::RetentionPolicy;
pub use snapshot::{CycleSnapshot, MarketData};

use crate::classifier::Classifier;
use crate::domain::{Signal, SignalId, SignalStatus};
use crate::notify::NotificationSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A status change observed during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: SignalId,
    pub from: SignalStatus,
    pub to: SignalStatus,
    pub price: f64,
    pub at: DateTime<Utc>,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Tracked signals that received fresh data.
    pub repriced: usize,
    /// Tracked signals left untouched for lack of data.
    pub stale: usize,
    pub transitions: Vec<Transition>,
    pub evicted: Vec<SignalId>,
    pub created: Vec<SignalId>,
    pub notifications_sent: usize,
    pub notification_failures: usize,
}

/// Process-wide signal registry, constructed empty once per process.
#[derive(Debug)]
pub struct Tracker {
    registry: Vec<Signal>,
    sent: HashSet<SignalId>,
    classifier: Classifier,
    retention: RetentionPolicy,
}

impl Tracker {
    pub fn new(classifier: Classifier, retention: RetentionPolicy) -> Self {
        Self {
            registry: Vec::new(),
            sent: HashSet::new(),
            classifier,
            retention,
        }
    }

    /// Current registry contents, in insertion order.
    pub fn signals(&self) -> &[Signal] {
        &self.registry
    }

    /// Owned copy of the registry for readers outside the cycle.
    pub fn snapshot(&self) -> Vec<Signal> {
        self.registry.clone()
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Distinct symbols with at least one tracked signal, in registry order.
    pub fn tracked_symbols(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.registry
            .iter()
            .filter(|s| seen.insert(s.symbol()))
            .map(|s| s.symbol().to_string())
            .collect()
    }

    pub fn has_active(&self, symbol: &str) -> bool {
        self.registry
            .iter()
            .any(|s| s.is_active() && s.symbol() == symbol)
    }

    /// True once a new-signal notification was attempted for `id`.
    pub fn was_notified(&self, id: &SignalId) -> bool {
        self.sent.contains(id)
    }

    /// Close a non-terminal signal by id. Returns the transition if the
    /// signal existed and was open.
    pub fn close(&mut self, id: &SignalId, now: DateTime<Utc>) -> Option<Transition> {
        let signal = self.registry.iter_mut().find(|s| &s.id == id)?;
        let from = signal.close(now)?;
        info!(id = %signal.id, %from, "signal closed");
        Some(Transition {
            id: signal.id.clone(),
            from,
            to: signal.status,
            price: signal.current_price,
            at: now,
        })
    }

    /// Run one polling cycle against `snapshot`.
    pub fn run_cycle(
        &mut self,
        snapshot: &CycleSnapshot,
        sink: &dyn NotificationSink,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        self.advance(snapshot, sink, &mut report);
        self.evict(snapshot.now, &mut report);
        self.emit(snapshot, sink, &mut report);
        report
    }

    fn advance(
        &mut self,
        snapshot: &CycleSnapshot,
        sink: &dyn NotificationSink,
        report: &mut CycleReport,
    ) {
        let now = snapshot.now;
        for signal in self.registry.iter_mut() {
            let Some(data) = snapshot.market_for(signal.symbol()) else {
                report.stale += 1;
                continue;
            };
            report.repriced += 1;

            let before = signal.clone();
            let Some(from) = signal.reprice(data.price, now) else {
                continue;
            };

            info!(
                id = %signal.id,
                %from,
                to = %signal.status,
                price = data.price,
                "signal status changed"
            );
            report.transitions.push(Transition {
                id: signal.id.clone(),
                from,
                to: signal.status,
                price: data.price,
                at: now,
            });

            match sink.deliver_transition(&before, signal, now) {
                Ok(()) => report.notifications_sent += 1,
                Err(err) => {
                    warn!(id = %signal.id, error = %err, "transition notification failed");
                    report.notification_failures += 1;
                }
            }
        }
    }

    fn evict(&mut self, now: DateTime<Utc>, report: &mut CycleReport) {
        let retention = self.retention;
        self.registry.retain(|signal| {
            let keep = retention.retains(signal, now);
            if !keep {
                debug!(id = %signal.id, status = %signal.status, "signal evicted");
                report.evicted.push(signal.id.clone());
            }
            keep
        });

        // Dedup entries only collide with same-instant ids.
        let horizon = (now - retention.active_ttl).timestamp_millis();
        self.sent.retain(|id| id.created_ms >= horizon);
    }

    fn emit(
        &mut self,
        snapshot: &CycleSnapshot,
        sink: &dyn NotificationSink,
        report: &mut CycleReport,
    ) {
        for symbol in &snapshot.universe {
            if self.has_active(symbol) {
                continue;
            }
            let Some(data) = snapshot.market_for(symbol) else {
                continue;
            };

            let classification = self.classifier.classify(
                symbol,
                &data.candles,
                data.price,
                data.change_pct(),
                snapshot.now,
            );
            let Some(mut signal) = classification.into_signal() else {
                continue;
            };

            if self.registry.iter().any(|s| s.id == signal.id) {
                debug!(id = %signal.id, "signal id already registered, skipping");
                continue;
            }

            if self.sent.insert(signal.id.clone()) {
                match sink.deliver_new_signal(&signal) {
                    Ok(message_id) => {
                        signal.message_id = message_id;
                        report.notifications_sent += 1;
                    }
                    Err(err) => {
                        warn!(id = %signal.id, error = %err, "new-signal notification failed");
                        report.notification_failures += 1;
                    }
                }
            }

            info!(
                id = %signal.id,
                kind = signal.kind.label(),
                entry = signal.entry_price,
                sl = signal.sl,
                "new signal"
            );
            report.created.push(signal.id.clone());
            self.registry.push(signal);
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(Classifier::standard(), RetentionPolicy::default())
    }
}
