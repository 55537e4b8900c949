//! SignalWatch Core: domain types, indicators, signal classifier, lifecycle tracker.
//!
//! This crate contains everything a polling cycle needs apart from the loop itself:
//! - Domain types (candles, signals, statuses, ids)
//! - Technical indicators (RSI, EMA, SMA, MACD, ATR)
//! - Ordered-rule classifier producing BUY / WAIT per symbol
//! - Signal tracker: advancement, eviction, emission with dedup
//! - Market-data provider trait and the Binance client
//! - Notification sink trait

pub mod classifier;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod notify;
pub mod tracker;
