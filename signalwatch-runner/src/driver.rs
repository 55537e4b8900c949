//! Polling driver: owns the tracker and runs one cycle per period.
//!
//! Each cycle:
//! 1. resolve the universe (falling back to a fixed list on failure)
//! 2. fetch candles for the universe plus every tracked symbol, in batches
//!    on a private thread pool, with a pause between batches
//! 3. pick the notification sink from the current settings
//! 4. run the tracker over the immutable snapshot
//! 5. publish the registry to the shared board and the export file
//!
//! Cycles never overlap. A failing cycle is logged and the loop carries on.

use crate::config::{PollingConfig, WatchConfig};
use crate::settings::SettingsSource;
use crate::telegram::TelegramSink;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use signalwatch_core::classifier::{Classification, Classifier};
use signalwatch_core::data::{fallback_universe, MarketDataProvider};
use signalwatch_core::domain::Signal;
use signalwatch_core::notify::{NotificationSink, NullSink};
use signalwatch_core::tracker::{CycleReport, CycleSnapshot, MarketData, Tracker};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Registry snapshot shared with readers outside the driver.
pub type SignalBoard = Arc<RwLock<Vec<Signal>>>;

/// Longest uninterrupted sleep while waiting for the next cycle.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to build fetch thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to serialize signal snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write signal snapshot to {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Sleep before the next cycle: the rest of the period, but never less than
/// `min_delay`.
pub fn pacing_delay(elapsed: Duration, period: Duration, min_delay: Duration) -> Duration {
    period.saturating_sub(elapsed).max(min_delay)
}

pub struct Driver {
    tracker: Tracker,
    provider: Box<dyn MarketDataProvider>,
    settings: Box<dyn SettingsSource>,
    pool: rayon::ThreadPool,
    polling: PollingConfig,
    export_path: Option<PathBuf>,
    board: SignalBoard,
}

impl Driver {
    pub fn new(
        config: &WatchConfig,
        provider: Box<dyn MarketDataProvider>,
        settings: Box<dyn SettingsSource>,
    ) -> Result<Self, DriverError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.polling.batch_width.max(1))
            .thread_name(|i| format!("signalwatch-fetch-{i}"))
            .build()?;

        Ok(Self {
            tracker: Tracker::new(Classifier::standard(), config.retention.policy()),
            provider,
            settings,
            pool,
            polling: config.polling.clone(),
            export_path: config.export.path.clone(),
            board: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Replace the tracker (custom rules or retention).
    pub fn with_tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Handle to the published registry snapshot.
    pub fn board(&self) -> SignalBoard {
        Arc::clone(&self.board)
    }

    /// Universe for this cycle; the fixed fallback list if the provider fails.
    pub fn resolve_universe(&self) -> Vec<String> {
        match self.provider.fetch_universe(self.polling.universe_size) {
            Ok(universe) if !universe.is_empty() => universe,
            Ok(_) => {
                warn!(provider = self.provider.name(), "empty universe, using fallback list");
                fallback_universe()
            }
            Err(err) => {
                warn!(
                    provider = self.provider.name(),
                    error = %err,
                    "universe fetch failed, using fallback list"
                );
                fallback_universe()
            }
        }
    }

    /// Fetch market data for `symbols` in batches of `batch_width`.
    ///
    /// Symbols whose fetch fails or returns no candles are absent from the
    /// result.
    pub fn fetch_market(&self, symbols: &[String]) -> Vec<(String, MarketData)> {
        let width = self.polling.batch_width.max(1);
        let batches = symbols.chunks(width);
        let batch_count = batches.len();
        let mut market = Vec::with_capacity(symbols.len());

        for (i, batch) in batches.enumerate() {
            let fetched: Vec<(String, MarketData)> = self.pool.install(|| {
                batch
                    .par_iter()
                    .filter_map(|symbol| {
                        self.fetch_one(symbol).map(|data| (symbol.clone(), data))
                    })
                    .collect()
            });
            market.extend(fetched);

            if i + 1 < batch_count && !self.polling.batch_pause().is_zero() {
                std::thread::sleep(self.polling.batch_pause());
            }
        }
        market
    }

    fn fetch_one(&self, symbol: &str) -> Option<MarketData> {
        match self.provider.fetch_candles(
            symbol,
            self.polling.interval,
            self.polling.candle_limit,
        ) {
            Ok(candles) => {
                let data = MarketData::from_candles(candles);
                if data.is_none() {
                    debug!(symbol, "no candles returned");
                }
                data
            }
            Err(err) => {
                warn!(symbol, error = %err, "candle fetch failed");
                None
            }
        }
    }

    /// Build this cycle's immutable input: the universe plus data for the
    /// universe and every tracked symbol.
    pub fn build_snapshot(&self, now: DateTime<Utc>) -> CycleSnapshot {
        let universe = self.resolve_universe();

        let mut seen = HashSet::new();
        let symbols: Vec<String> = universe
            .iter()
            .cloned()
            .chain(self.tracker.tracked_symbols())
            .filter(|s| seen.insert(s.clone()))
            .collect();

        let market = self.fetch_market(&symbols);
        market
            .into_iter()
            .fold(CycleSnapshot::new(now, universe), |snap, (symbol, data)| {
                snap.with_market(symbol, data)
            })
    }

    /// Sink for this cycle, from the settings as they are right now.
    fn sink_for_cycle(&self) -> Box<dyn NotificationSink> {
        let settings = self.settings.notification_settings();
        if !settings.is_usable() {
            return Box::new(NullSink);
        }
        match TelegramSink::new(&settings) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                warn!(error = %err, "cannot create telegram sink, notifications skipped this cycle");
                Box::new(NullSink)
            }
        }
    }

    /// Run one cycle with the configured notification settings.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, DriverError> {
        let sink = self.sink_for_cycle();
        self.run_cycle_with(now, sink.as_ref())
    }

    /// Run one cycle delivering notifications to `sink`.
    pub fn run_cycle_with(
        &mut self,
        now: DateTime<Utc>,
        sink: &dyn NotificationSink,
    ) -> Result<CycleReport, DriverError> {
        let snapshot = self.build_snapshot(now);
        let report = self.tracker.run_cycle(&snapshot, sink);

        info!(
            universe = snapshot.universe.len(),
            fetched = snapshot.market.len(),
            tracked = self.tracker.signals().len(),
            new = report.created.len(),
            transitions = report.transitions.len(),
            evicted = report.evicted.len(),
            stale = report.stale,
            notify_failed = report.notification_failures,
            "cycle complete"
        );

        self.publish()?;
        Ok(report)
    }

    /// Copy the registry to the board and, if configured, the export file.
    pub fn publish(&self) -> Result<(), DriverError> {
        let snapshot = self.tracker.snapshot();
        if let Some(path) = &self.export_path {
            export_signals(path, &snapshot)?;
        }
        *self.board.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(())
    }

    /// Classify the current universe without touching the registry.
    pub fn scan(&self, now: DateTime<Utc>) -> Vec<Classification> {
        let universe = self.resolve_universe();
        let market = self.fetch_market(&universe);
        market
            .iter()
            .map(|(symbol, data)| {
                self.tracker.classifier().classify(
                    symbol,
                    &data.candles,
                    data.price,
                    data.change_pct(),
                    now,
                )
            })
            .collect()
    }

    /// Poll until `max_cycles` cycles ran or `cancel` is set. Returns the
    /// number of cycles completed.
    pub fn run(&mut self, max_cycles: Option<usize>, cancel: Option<&AtomicBool>) -> usize {
        let cancelled = || cancel.is_some_and(|f| f.load(Ordering::Relaxed));
        let mut cycles = 0;

        let retention = self.tracker.retention();
        info!(
            provider = self.provider.name(),
            period_secs = self.polling.period_secs,
            universe_size = self.polling.universe_size,
            active_hours = retention.active_ttl.num_hours(),
            hit_minutes = retention.hit_ttl.num_minutes(),
            "starting watch loop"
        );

        loop {
            if cancelled() {
                break;
            }

            let start = Instant::now();
            if let Err(err) = self.run_cycle(Utc::now()) {
                error!(error = %err, "cycle failed");
            }
            cycles += 1;

            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            let elapsed = start.elapsed();
            let delay = pacing_delay(elapsed, self.polling.period(), self.polling.min_delay());
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "waiting for next cycle"
            );
            sleep_unless(delay, &cancelled);
        }

        info!(cycles, "watch loop stopped");
        cycles
    }
}

fn sleep_unless(total: Duration, cancelled: &dyn Fn() -> bool) {
    let deadline = Instant::now() + total;
    loop {
        let now = Instant::now();
        if now >= deadline || cancelled() {
            return;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Write `signals` as pretty JSON, replacing the file in one rename.
pub fn export_signals(path: &Path, signals: &[Signal]) -> Result<(), DriverError> {
    let json = serde_json::to_string_pretty(signals)?;
    let io_err = |source| DriverError::Export {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
