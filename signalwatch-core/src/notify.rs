//! Notification sink: where new signals and status transitions are sent.
//!
//! Delivery is best-effort. The tracker logs a failed delivery and carries on;
//! a sink error never blocks status advancement or eviction.

use crate::domain::{MessageId, Signal};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by notification API: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Outbound notification channel.
pub trait NotificationSink: Send + Sync {
    /// Announce a newly created signal. Returns the message id follow-ups
    /// should thread onto, if the channel provides one.
    fn deliver_new_signal(&self, signal: &Signal) -> Result<Option<MessageId>, NotifyError>;

    /// Announce a status change. `before` is the signal as it was at the
    /// start of the cycle, `after` carries the new status and price.
    fn deliver_transition(
        &self,
        before: &Signal,
        after: &Signal,
        hit_at: DateTime<Utc>,
    ) -> Result<(), NotifyError>;
}

/// Sink used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver_new_signal(&self, _signal: &Signal) -> Result<Option<MessageId>, NotifyError> {
        Ok(None)
    }

    fn deliver_transition(
        &self,
        _before: &Signal,
        _after: &Signal,
        _hit_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}
