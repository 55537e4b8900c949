//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing: atr = (atr * (period - 1) + tr) / period.
//! Needs period+1 candles; returns 0 otherwise.

use crate::domain::Candle;

/// Compute the True Range series from candles.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    let Some(first) = candles.first() else {
        return tr;
    };
    tr.push(first.high - first.low);

    for pair in candles.windows(2) {
        let (prev, bar) = (&pair[0], &pair[1]);
        let pc = prev.close;
        tr.push(
            (bar.high - bar.low)
                .max((bar.high - pc).abs())
                .max((bar.low - pc).abs()),
        );
    }
    tr
}

/// Latest ATR value.
///
/// Seed: mean of the first `period` true ranges (TR[0] included), then Wilder
/// smoothing over the remaining bars.
pub fn atr(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period + 1 {
        return 0.0;
    }

    let tr = true_range(candles);
    let mut value = tr[..period].iter().sum::<f64>() / period as f64;
    let weight = (period - 1) as f64;
    for &range in &tr[period..] {
        value = (value * weight + range) / period as f64;
    }
    value
}
