use async_trait::async_trait;

use crate::notifications::ack::AckHandle;
use crate::notifications::channel::{
    ChannelError, ChannelKind, NotificationChannel, ReliabilityTier,
};
use crate::notifications::types::NotificationRequest;

/// Reserved slot for carrier delivery. Always probes unavailable.
#[derive(Debug, Default)]
pub struct SmsChannel;

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn channel_id(&self) -> &str {
        "sms"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn reliability_tier(&self) -> ReliabilityTier {
        ReliabilityTier::Low
    }

    fn works_when_backgrounded(&self) -> bool {
        true
    }

    fn probe(&self) -> Result<bool, ChannelError> {
        Ok(false)
    }

    async fn send(
        &self,
        _request: &NotificationRequest,
        _ack: AckHandle,
    ) -> Result<(), ChannelError> {
        Err(ChannelError::Unsupported)
    }
}
