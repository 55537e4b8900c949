//! Moving Average Convergence Divergence (MACD).
//!
//! MACD line = EMA(fast) - EMA(slow), point-wise over the full series.
//! Signal line = EMA(signal) of the MACD line. Histogram = MACD - signal.

use super::ema::ema_series;
use serde::{Deserialize, Serialize};

/// Latest MACD reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl Macd {
    /// MACD above its signal line with a positive histogram.
    pub fn is_bullish(&self) -> bool {
        self.macd > self.signal && self.histogram > 0.0
    }
}

/// Latest MACD, signal and histogram values. Empty input yields all zeros.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    let fast_line = ema_series(closes, fast);
    let slow_line = ema_series(closes, slow);
    let macd_line: Vec<f64> = fast_line
        .iter()
        .zip(&slow_line)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&macd_line, signal_period);

    let macd = macd_line.last().copied().unwrap_or(0.0);
    let signal = signal_line.last().copied().unwrap_or(0.0);
    Macd {
        macd,
        signal,
        histogram: macd - signal,
    }
}
