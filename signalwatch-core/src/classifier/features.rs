//! Derived quantities the rules evaluate.
//!
//! Computed once per classification so each rule is a plain predicate over
//! numbers and can be unit-tested from a hand-built `Features`.

use crate::domain::{Candle, Trend};
use crate::indicators::{self, Macd, ATR_PERIOD, MACD_FAST, MACD_SIGNAL, MACD_SLOW, RSI_PERIOD};
use serde::{Deserialize, Serialize};

/// Lookback of the short volume average used by the whale rule.
pub const VOLUME_SMA_BARS: usize = 20;

/// Number of trailing bars inspected for an SMA50 touch.
pub const TOUCH_LOOKBACK_BARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Current price; the entry price of any resulting signal.
    pub price: f64,
    pub rsi: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub sma50: f64,
    pub atr: f64,
    pub macd: Macd,
    /// Mean volume of every bar except the latest (0 with fewer than 2 bars).
    pub avg_volume: f64,
    pub latest_volume: f64,
    /// Mean volume of up to 20 bars preceding the latest.
    pub volume_sma20: f64,
    pub latest_green: bool,
    /// Latest bar body as a signed fraction of its open.
    pub latest_body: f64,
    pub latest_close: f64,
    pub latest_low: f64,
    /// Lows of the last three bars, oldest first.
    pub recent_lows: Vec<f64>,
}

impl Features {
    /// Derive the feature set from a candle series. `None` for an empty series.
    pub fn compute(candles: &[Candle], price: f64) -> Option<Self> {
        let latest = candles.last()?;
        let closes = indicators::closes(candles);

        let prior = &candles[..candles.len() - 1];
        let avg_volume = mean(prior.iter().map(|c| c.volume));
        let sma_window = &prior[prior.len().saturating_sub(VOLUME_SMA_BARS)..];
        let volume_sma20 = mean(sma_window.iter().map(|c| c.volume));

        let recent_lows = candles[candles.len().saturating_sub(TOUCH_LOOKBACK_BARS)..]
            .iter()
            .map(|c| c.low)
            .collect();

        Some(Self {
            price,
            rsi: indicators::rsi(&closes, RSI_PERIOD),
            ema20: indicators::ema(&closes, 20),
            ema50: indicators::ema(&closes, 50),
            sma50: indicators::sma(&closes, 50),
            atr: indicators::atr(candles, ATR_PERIOD),
            macd: indicators::macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL),
            avg_volume,
            latest_volume: latest.volume,
            volume_sma20,
            latest_green: latest.is_green(),
            latest_body: latest.body_fraction(),
            latest_close: latest.close,
            latest_low: latest.low,
            recent_lows,
        })
    }

    /// UP when price is above both EMAs, DOWN when below both.
    pub fn trend(&self) -> Trend {
        if self.price > self.ema20 && self.price > self.ema50 {
            Trend::Up
        } else if self.price < self.ema20 && self.price < self.ema50 {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }

    /// ATR, or 1% of price when ATR is unavailable.
    pub fn atr_or_fallback(&self) -> f64 {
        if self.atr > 0.0 {
            self.atr
        } else {
            self.price * 0.01
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
