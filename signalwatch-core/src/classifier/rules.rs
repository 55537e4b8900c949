//! Classifier rules.
//!
//! Each rule pairs an entry predicate with a target/stop builder. The
//! classifier evaluates rules in list order and the first match wins.

use super::features::Features;
use crate::domain::{SignalKind, Trend};

/// Take-profit and stop levels for a matched rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub tps: [f64; 3],
    pub sl: f64,
}

/// One entry in the classifier's ordered rule list.
pub trait SignalRule: Send + Sync {
    /// Subtype tag carried by signals this rule produces.
    fn kind(&self) -> SignalKind;

    /// Entry predicate.
    fn matches(&self, features: &Features) -> bool;

    /// Target and stop levels, with the current price as entry.
    fn levels(&self, features: &Features) -> Levels;
}

/// Trend continuation: price above SMA50, a recent low touched SMA50, and a
/// strong green trigger bar closing back above it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimoRule;

impl PrimoRule {
    const TOUCH_TOLERANCE: f64 = 1.001;
    const MIN_BODY: f64 = 0.003;
    const MIN_RSI: f64 = 50.0;
    const STOP_BUFFER: f64 = 0.998;
    const ATR_TARGETS: [f64; 3] = [2.0, 4.0, 6.0];
}

impl SignalRule for PrimoRule {
    fn kind(&self) -> SignalKind {
        SignalKind::Primo
    }

    fn matches(&self, f: &Features) -> bool {
        let trend = f.price > f.sma50;
        let touched = f
            .recent_lows
            .iter()
            .any(|&low| low <= f.sma50 * Self::TOUCH_TOLERANCE);
        let trigger = f.latest_green
            && f.latest_close > f.sma50
            && f.latest_body > Self::MIN_BODY
            && f.rsi > Self::MIN_RSI;
        trend && touched && trigger
    }

    fn levels(&self, f: &Features) -> Levels {
        let atr = f.atr_or_fallback();
        Levels {
            tps: Self::ATR_TARGETS.map(|m| f.price + atr * m),
            sl: f.latest_low.min(f.sma50) * Self::STOP_BUFFER,
        }
    }
}

/// Volume shock: latest volume above five times the 20-bar average on a
/// strong green bar. Fixed-percentage scalp levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhaleEntryRule;

impl WhaleEntryRule {
    const VOLUME_MULTIPLE: f64 = 5.0;
    const MIN_BODY: f64 = 0.005;
    const TARGETS: [f64; 3] = [1.005, 1.01, 1.015];
    const STOP: f64 = 0.992;
}

impl SignalRule for WhaleEntryRule {
    fn kind(&self) -> SignalKind {
        SignalKind::WhaleEntry
    }

    fn matches(&self, f: &Features) -> bool {
        f.volume_sma20 > 0.0
            && f.latest_volume > f.volume_sma20 * Self::VOLUME_MULTIPLE
            && f.latest_green
            && f.latest_body > Self::MIN_BODY
    }

    fn levels(&self, f: &Features) -> Levels {
        Levels {
            tps: Self::TARGETS.map(|m| f.price * m),
            sl: f.price * Self::STOP,
        }
    }
}

/// Momentum breakout: EMA uptrend, bullish MACD, RSI between 50 and 70 and a
/// volume spike over twice the average.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumBreakoutRule;

impl MomentumBreakoutRule {
    const VOLUME_MULTIPLE: f64 = 2.0;
    const RSI_FLOOR: f64 = 50.0;
    const RSI_CEILING: f64 = 70.0;
    const STOP_ATR: f64 = 2.0;
    const MIN_STOP_PCT: f64 = 0.005;
    const MAX_STOP_PCT: f64 = 0.03;
    const ATR_TARGETS: [f64; 3] = [1.5, 3.0, 5.0];
    const MIN_TARGET_PCT: [f64; 3] = [0.01, 0.025, 0.04];
}

impl SignalRule for MomentumBreakoutRule {
    fn kind(&self) -> SignalKind {
        SignalKind::MomentumBreakout
    }

    fn matches(&self, f: &Features) -> bool {
        f.trend() == Trend::Up
            && f.macd.is_bullish()
            && f.rsi > Self::RSI_FLOOR
            && f.rsi < Self::RSI_CEILING
            && f.avg_volume > 0.0
            && f.latest_volume > f.avg_volume * Self::VOLUME_MULTIPLE
    }

    fn levels(&self, f: &Features) -> Levels {
        let atr = f.atr_or_fallback();
        let entry = f.price;

        let mut sl = entry - atr * Self::STOP_ATR;
        let stop_pct = (entry - sl) / entry;
        if stop_pct < Self::MIN_STOP_PCT {
            sl = entry * (1.0 - Self::MIN_STOP_PCT);
        } else if stop_pct > Self::MAX_STOP_PCT {
            sl = entry * (1.0 - Self::MAX_STOP_PCT);
        }

        let mut tps = [0.0; 3];
        for (i, tp) in tps.iter_mut().enumerate() {
            *tp = entry + (atr * Self::ATR_TARGETS[i]).max(entry * Self::MIN_TARGET_PCT[i]);
        }
        Levels { tps, sl }
    }
}

/// The production rule list in priority order.
pub fn standard_rules() -> Vec<Box<dyn SignalRule>> {
    vec![
        Box::new(PrimoRule),
        Box::new(WhaleEntryRule),
        Box::new(MomentumBreakoutRule),
    ]
}
