//! Immutable per-cycle input to the tracker.

use crate::domain::Candle;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Fresh market data for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    pub price: f64,
    pub candles: Vec<Candle>,
}

impl MarketData {
    /// Market data priced at the latest close. `None` for an empty series.
    pub fn from_candles(candles: Vec<Candle>) -> Option<Self> {
        let price = candles.last()?.close;
        Some(Self { price, candles })
    }

    /// Percent change from the first candle's open to the current price.
    pub fn change_pct(&self) -> f64 {
        match self.candles.first() {
            Some(first) if first.open != 0.0 => (self.price - first.open) / first.open * 100.0,
            _ => 0.0,
        }
    }
}

/// Everything one tracker cycle consumes: the cycle's wall-clock time, the
/// target universe, and market data for every symbol that could be fetched.
///
/// Symbols missing from `market` are treated as stale for this cycle.
#[derive(Debug, Clone)]
pub struct CycleSnapshot {
    pub now: DateTime<Utc>,
    pub universe: Vec<String>,
    pub market: HashMap<String, MarketData>,
}

impl CycleSnapshot {
    pub fn new(now: DateTime<Utc>, universe: Vec<String>) -> Self {
        Self {
            now,
            universe,
            market: HashMap::new(),
        }
    }

    pub fn with_market(mut self, symbol: impl Into<String>, data: MarketData) -> Self {
        self.market.insert(symbol.into(), data);
        self
    }

    pub fn market_for(&self, symbol: &str) -> Option<&MarketData> {
        self.market.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn priced_at_latest_close() {
        let data = MarketData::from_candles(make_candles(&[10.0, 11.0, 12.0])).unwrap();
        assert_eq!(data.price, 12.0);
        // first open equals first close (10) → +20%
        assert!((data.change_pct() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_is_no_data() {
        assert!(MarketData::from_candles(Vec::new()).is_none());
    }
}
