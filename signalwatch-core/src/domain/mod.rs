//! Domain types for SignalWatch

pub mod candle;
pub mod ids;
pub mod signal;

pub use candle::Candle;
pub use ids::{MessageId, SignalId};
pub use signal::{
    Action, Compliance, ComplianceStatus, Signal, SignalKind, SignalStatus, Trend,
};
