//! Integration tests for the signal tracker's cycle semantics.
//!
//! Tests:
//! 1. Retention boundaries for ACTIVE and hit signals
//! 2. At most one ACTIVE signal per symbol, across cycles
//! 3. New-signal notifications are delivered once per signal id
//! 4. Symbols without fresh data are left untouched
//! 5. Sink failures never block registration or advancement
//! 6. Correlation ids are recorded and handed back on transitions
//! 7. Status ladder advances forward only, including gaps

use chrono::{DateTime, Duration, TimeZone, Utc};
use signalwatch_core::classifier::{Classifier, Features, Levels, SignalRule};
use signalwatch_core::domain::{Candle, MessageId, Signal, SignalId, SignalKind, SignalStatus};
use signalwatch_core::notify::{NotificationSink, NotifyError, NullSink};
use signalwatch_core::tracker::{CycleSnapshot, MarketData, RetentionPolicy, Tracker};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

// ── Helpers ──────────────────────────────────────────────────────────

/// Buys every symbol: targets +1/+2/+3%, stop -1%.
struct AlwaysBuy;

impl SignalRule for AlwaysBuy {
    fn kind(&self) -> SignalKind {
        SignalKind::MomentumBreakout
    }
    fn matches(&self, _: &Features) -> bool {
        true
    }
    fn levels(&self, f: &Features) -> Levels {
        Levels {
            tps: [f.price * 1.01, f.price * 1.02, f.price * 1.03],
            sl: f.price * 0.99,
        }
    }
}

fn tracker() -> Tracker {
    Tracker::new(
        Classifier::new(vec![Box::new(AlwaysBuy)]),
        RetentionPolicy::default(),
    )
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn at_price(price: f64) -> MarketData {
    let candles = (0..5)
        .map(|i| Candle {
            open_time: t0() + Duration::minutes(5 * i),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1000.0,
        })
        .collect();
    MarketData::from_candles(candles).unwrap()
}

fn cycle(now: DateTime<Utc>, prices: &[(&str, f64)]) -> CycleSnapshot {
    let universe = prices.iter().map(|(s, _)| s.to_string()).collect();
    prices
        .iter()
        .fold(CycleSnapshot::new(now, universe), |snap, &(symbol, price)| {
            snap.with_market(symbol, at_price(price))
        })
}

/// Market data for `prices` without any universe: nothing new is emitted.
fn reprice_only(now: DateTime<Utc>, prices: &[(&str, f64)]) -> CycleSnapshot {
    prices
        .iter()
        .fold(CycleSnapshot::new(now, Vec::new()), |snap, &(symbol, price)| {
            snap.with_market(symbol, at_price(price))
        })
}

fn status_of(tracker: &Tracker, id: &SignalId) -> Option<SignalStatus> {
    tracker
        .signals()
        .iter()
        .find(|s| &s.id == id)
        .map(|s| s.status)
}

#[derive(Default)]
struct RecordingSink {
    next_id: AtomicI64,
    fail: bool,
    new_signals: Mutex<Vec<SignalId>>,
    transitions: Mutex<Vec<(SignalStatus, SignalStatus, Option<MessageId>)>>,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn new_count(&self) -> usize {
        self.new_signals.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver_new_signal(&self, signal: &Signal) -> Result<Option<MessageId>, NotifyError> {
        self.new_signals.lock().unwrap().push(signal.id.clone());
        if self.fail {
            return Err(NotifyError::Transport("connection reset".into()));
        }
        Ok(Some(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 100)))
    }

    fn deliver_transition(
        &self,
        before: &Signal,
        after: &Signal,
        _hit_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.transitions
            .lock()
            .unwrap()
            .push((before.status, after.status, before.message_id));
        if self.fail {
            return Err(NotifyError::Rejected("chat not found".into()));
        }
        Ok(())
    }
}

// ── 1. Retention ─────────────────────────────────────────────────────

#[test]
fn active_signal_expires_after_24_hours() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &NullSink);
    let id = t.signals()[0].id.clone();

    let almost = t0() + Duration::hours(23) + Duration::minutes(59);
    t.run_cycle(&CycleSnapshot::new(almost, Vec::new()), &NullSink);
    assert_eq!(status_of(&t, &id), Some(SignalStatus::Active));

    let past = t0() + Duration::hours(24) + Duration::minutes(1);
    let report = t.run_cycle(&CycleSnapshot::new(past, Vec::new()), &NullSink);
    assert_eq!(status_of(&t, &id), None);
    assert_eq!(report.evicted, vec![id]);
}

#[test]
fn hit_signal_expires_30_minutes_after_hit() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &NullSink);
    let id = t.signals()[0].id.clone();

    let hit = t0() + Duration::hours(2);
    t.run_cycle(&reprice_only(hit, &[("SOLUSDT", 98.0)]), &NullSink);
    assert_eq!(status_of(&t, &id), Some(SignalStatus::SlHit));
    assert_eq!(t.signals()[0].hit_at, Some(hit));

    let almost = hit + Duration::minutes(29);
    t.run_cycle(&CycleSnapshot::new(almost, Vec::new()), &NullSink);
    assert_eq!(status_of(&t, &id), Some(SignalStatus::SlHit));

    let past = hit + Duration::minutes(31);
    t.run_cycle(&CycleSnapshot::new(past, Vec::new()), &NullSink);
    assert_eq!(status_of(&t, &id), None);
}

#[test]
fn target_hit_extends_life_past_active_window() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &NullSink);
    let id = t.signals()[0].id.clone();

    let hit = t0() + Duration::hours(23) + Duration::minutes(50);
    t.run_cycle(&reprice_only(hit, &[("SOLUSDT", 101.5)]), &NullSink);

    t.run_cycle(&CycleSnapshot::new(t0() + Duration::hours(24), Vec::new()), &NullSink);
    assert_eq!(status_of(&t, &id), Some(SignalStatus::Tp1Hit));
}

// ── 2. One ACTIVE per symbol ─────────────────────────────────────────

#[test]
fn no_duplicate_active_per_symbol() {
    let mut t = tracker();
    for minute in 0..5 {
        let now = t0() + Duration::minutes(minute);
        t.run_cycle(&cycle(now, &[("SOLUSDT", 100.0), ("XRPUSDT", 0.5)]), &NullSink);
    }
    for symbol in ["SOLUSDT", "XRPUSDT"] {
        let active = t
            .signals()
            .iter()
            .filter(|s| s.symbol() == symbol && s.is_active())
            .count();
        assert_eq!(active, 1, "{symbol}");
    }
    assert_eq!(t.signals().len(), 2);
}

#[test]
fn symbol_reopens_after_stop_and_coexists_with_hit_signal() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &NullSink);

    // Stop hit and re-entry happen in the same cycle: advancement runs first.
    let later = t0() + Duration::minutes(5);
    let report = t.run_cycle(&cycle(later, &[("SOLUSDT", 98.0)]), &NullSink);
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.created.len(), 1);

    let statuses: Vec<_> = t.signals().iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![SignalStatus::SlHit, SignalStatus::Active]);
    assert_eq!(t.signals()[1].entry_price, 98.0);
}

#[test]
fn emission_follows_universe_order_and_skips_missing_data() {
    let mut t = tracker();
    let snap = CycleSnapshot::new(
        t0(),
        vec!["XRPUSDT".into(), "DOGEUSDT".into(), "SOLUSDT".into()],
    )
    .with_market("SOLUSDT", at_price(100.0))
    .with_market("XRPUSDT", at_price(0.5));

    let report = t.run_cycle(&snap, &NullSink);
    let symbols: Vec<_> = report.created.iter().map(|id| id.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["XRPUSDT", "SOLUSDT"]);
}

// ── 3. Dedup ─────────────────────────────────────────────────────────

#[test]
fn new_signal_is_announced_once() {
    let mut t = tracker();
    let sink = RecordingSink::default();
    for minute in 0..10 {
        let now = t0() + Duration::minutes(minute);
        t.run_cycle(&cycle(now, &[("SOLUSDT", 100.0)]), &sink);
    }
    assert_eq!(sink.new_count(), 1);
    assert!(t.was_notified(&t.signals()[0].id));
}

// ── 4. Stale data ────────────────────────────────────────────────────

#[test]
fn missing_data_leaves_signal_untouched() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0), ("XRPUSDT", 0.5)]), &NullSink);

    // XRP fetch failed this cycle; SOL moved.
    let later = t0() + Duration::minutes(1);
    let report = t.run_cycle(&reprice_only(later, &[("SOLUSDT", 100.4)]), &NullSink);
    assert_eq!(report.repriced, 1);
    assert_eq!(report.stale, 1);

    let xrp = t.signals().iter().find(|s| s.symbol() == "XRPUSDT").unwrap();
    assert_eq!(xrp.current_price, 0.5);
    assert_eq!(xrp.status, SignalStatus::Active);
    assert_eq!(xrp.hit_at, None);

    let sol = t.signals().iter().find(|s| s.symbol() == "SOLUSDT").unwrap();
    assert_eq!(sol.current_price, 100.4);
}

// ── 5. Sink failures ─────────────────────────────────────────────────

#[test]
fn failing_sink_does_not_block_the_cycle() {
    let mut t = tracker();
    let sink = RecordingSink::failing();

    let report = t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &sink);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.notification_failures, 1);
    assert_eq!(t.signals()[0].message_id, None);
    // The attempt counts: the id is not offered again.
    assert!(t.was_notified(&t.signals()[0].id));

    let later = t0() + Duration::minutes(1);
    let report = t.run_cycle(&reprice_only(later, &[("SOLUSDT", 101.2)]), &sink);
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.notification_failures, 1);
    assert_eq!(t.signals()[0].status, SignalStatus::Tp1Hit);
    assert_eq!(sink.new_count(), 1);
}

// ── 6. Correlation ids ───────────────────────────────────────────────

#[test]
fn message_id_is_recorded_and_threaded() {
    let mut t = tracker();
    let sink = RecordingSink::default();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &sink);
    assert_eq!(t.signals()[0].message_id, Some(MessageId(100)));

    let later = t0() + Duration::minutes(1);
    t.run_cycle(&reprice_only(later, &[("SOLUSDT", 102.5)]), &sink);

    let transitions = sink.transitions.lock().unwrap();
    assert_eq!(
        *transitions,
        vec![(SignalStatus::Active, SignalStatus::Tp2Hit, Some(MessageId(100)))]
    );
}

// ── 7. Status ladder ─────────────────────────────────────────────────

#[test]
fn ladder_advances_forward_only() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &NullSink);
    let id = t.signals()[0].id.clone();

    let steps = [
        (101.1, SignalStatus::Tp1Hit),
        (100.5, SignalStatus::Tp1Hit),
        (98.0, SignalStatus::Tp1Hit), // stop only applies while ACTIVE
        (103.5, SignalStatus::Tp3Hit),
        (101.5, SignalStatus::Tp3Hit),
    ];
    let mut transitions = 0;
    for (i, (price, expected)) in steps.into_iter().enumerate() {
        let now = t0() + Duration::minutes(i as i64 + 1);
        let report = t.run_cycle(&reprice_only(now, &[("SOLUSDT", price)]), &NullSink);
        transitions += report.transitions.len();
        assert_eq!(status_of(&t, &id), Some(expected), "step {i}");
    }
    assert_eq!(transitions, 2);
    assert_eq!(t.signals()[0].hit_at, Some(t0() + Duration::minutes(4)));
}

#[test]
fn operator_close_is_terminal() {
    let mut t = tracker();
    t.run_cycle(&cycle(t0(), &[("SOLUSDT", 100.0)]), &NullSink);
    let id = t.signals()[0].id.clone();

    let closed_at = t0() + Duration::minutes(10);
    t.close(&id, closed_at).unwrap();
    let report = t.run_cycle(&reprice_only(closed_at, &[("SOLUSDT", 110.0)]), &NullSink);
    assert!(report.transitions.is_empty());
    assert_eq!(status_of(&t, &id), Some(SignalStatus::Closed));
}
