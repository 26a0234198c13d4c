use async_trait::async_trait;
use serde::Serialize;

use crate::notifications::ack::AckHandle;
use crate::notifications::types::NotificationRequest;

/// Ordered most to least dependable, so sorting ascending ranks the best channel first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityTier {
    High,
    Medium,
    Low,
}

/// Known delivery surfaces, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    BackgroundPush,
    ForegroundAlert,
    AgentMessage,
    Escalation,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub kind: ChannelKind,
    pub available: bool,
    pub reliability_tier: ReliabilityTier,
    pub works_when_backgrounded: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel not supported in this runtime")]
    Unsupported,
    #[error("no active push subscription")]
    NoSubscription,
    #[error("push subscription is no longer valid")]
    SubscriptionInvalid,
    #[error("channel panicked during send")]
    Panicked,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn channel_id(&self) -> &str;
    fn kind(&self) -> ChannelKind;
    fn reliability_tier(&self) -> ReliabilityTier;
    fn works_when_backgrounded(&self) -> bool;

    /// Read-only capability query. Must not block or prompt the user.
    fn probe(&self) -> Result<bool, ChannelError>;

    async fn send(&self, request: &NotificationRequest, ack: AckHandle)
    -> Result<(), ChannelError>;

    fn describe(&self, available: bool) -> ChannelDescriptor {
        ChannelDescriptor {
            name: self.channel_id().to_string(),
            kind: self.kind(),
            available,
            reliability_tier: self.reliability_tier(),
            works_when_backgrounded: self.works_when_backgrounded(),
        }
    }
}
