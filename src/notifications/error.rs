use crate::notifications::channel::ChannelError;
use crate::notifications::types::NotificationId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("Background execution agent unavailable: {0}")]
    AgentUnavailable(String),
    #[error("Alert permission denied")]
    PermissionDenied,
    #[error("Push subscription failed: {0}")]
    SubscriptionFailure(String),
    #[error("Server authentication key not configured")]
    MissingServerKey,
    #[error("Server authentication key invalid: {0}")]
    InvalidServerKey(String),
}

pub type InitResult<T> = Result<T, InitError>;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error(transparent)]
    Init(#[from] InitError),
    #[error("Channel '{channel}' send failed: {source}")]
    ChannelSendFailure {
        channel: String,
        #[source]
        source: ChannelError,
    },
    #[error("Notification {id} dropped after {attempts} attempts")]
    MaxRetriesExceeded { id: NotificationId, attempts: u32 },
}
