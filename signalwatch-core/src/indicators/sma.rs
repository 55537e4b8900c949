//! Simple Moving Average (SMA).

/// Mean of the last `period` closes; 0 when fewer than `period` exist.
pub fn sma(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period {
        return 0.0;
    }
    let window = &closes[closes.len() - period..];
    window.iter().sum::<f64>() / period as f64
}
