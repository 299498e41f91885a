use async_trait::async_trait;
use std::time::Duration;

use crate::alert::OwnerId;
use crate::retry::RetryableError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient can never be reached again (blocked the bot, deleted
    /// the chat).
    #[error("recipient {recipient} is unreachable: {reason}")]
    RecipientUnreachable { recipient: OwnerId, reason: String },
    #[error("transient delivery failure: {0}")]
    Transient(String),
    /// Flood control: the transport asked for a pause before the next send.
    #[error("delivery throttled for {}s", .retry_after.as_secs())]
    Throttled { retry_after: Duration },
    /// The transport refused this particular message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::RecipientUnreachable { .. })
    }
}

impl RetryableError for DeliveryError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Transient(_) | DeliveryError::Throttled { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DeliveryError::Throttled { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_message(&self, recipient: OwnerId, text: &str) -> Result<(), DeliveryError>;
}
