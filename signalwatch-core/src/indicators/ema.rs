//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = k * close[t] + (1 - k) * EMA[t-1], k = 2 / (period + 1).
//! Seed: EMA[0] = close[0], so the series is defined from the first bar.

/// Full EMA series, one value per input close.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = closes.first() else {
        return Vec::new();
    };

    let k = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(closes.len());
    let mut prev = first;
    result.push(prev);
    for &close in &closes[1..] {
        prev = close * k + prev * (1.0 - k);
        result.push(prev);
    }
    result
}

/// Latest EMA value; 0 for an empty input.
pub fn ema(closes: &[f64], period: usize) -> f64 {
    ema_series(closes, period).last().copied().unwrap_or(0.0)
}
