//! Market-data layer: provider trait, Binance client, universe selection.

pub mod binance;
pub mod circuit_breaker;
pub mod provider;
pub mod universe;

pub use binance::BinanceProvider;
pub use circuit_breaker::{BreakerPolicy, CircuitBreaker, TripReason};
pub use provider::{DataError, Interval, MarketDataProvider};
pub use universe::{fallback_universe, select_universe, Ticker24h, FALLBACK_UNIVERSE};
