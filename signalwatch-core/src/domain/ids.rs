use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal identity: the pair ticker plus the creation instant in epoch millis.
///
/// Stable for the lifetime of a signal and used as the deduplication key for
/// new-signal notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId {
    pub symbol: String,
    pub created_ms: i64,
}

impl SignalId {
    pub fn new(symbol: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            created_ms: created_at.timestamp_millis(),
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.symbol, self.created_ms)
    }
}

/// Correlation id returned by the notification sink for a delivered message.
///
/// Follow-up transition messages thread onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
