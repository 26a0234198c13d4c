use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::notifications::ack::AckHandle;
use crate::notifications::channel::{
    ChannelError, ChannelKind, NotificationChannel, ReliabilityTier,
};
use crate::notifications::types::NotificationRequest;
use crate::platform::ports::{AgentMessage, BackgroundAgent};

pub const CRITICAL_NOTIFICATION_MESSAGE: &str = "CRITICAL_NOTIFICATION";

/// Hands the alert to the background agent, which can raise it while the app is hidden.
pub struct AgentMessageChannel {
    agent: Arc<dyn BackgroundAgent>,
}

impl AgentMessageChannel {
    pub fn new(agent: Arc<dyn BackgroundAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl NotificationChannel for AgentMessageChannel {
    fn channel_id(&self) -> &str {
        "agent"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::AgentMessage
    }

    fn reliability_tier(&self) -> ReliabilityTier {
        ReliabilityTier::High
    }

    fn works_when_backgrounded(&self) -> bool {
        true
    }

    fn probe(&self) -> Result<bool, ChannelError> {
        Ok(self.agent.is_supported() && self.agent.is_active())
    }

    async fn send(
        &self,
        request: &NotificationRequest,
        _ack: AckHandle,
    ) -> Result<(), ChannelError> {
        if !self.agent.is_active() {
            return Err(ChannelError::Unsupported);
        }
        let message = AgentMessage {
            kind: CRITICAL_NOTIFICATION_MESSAGE,
            data: json!({
                "id": request.id,
                "title": request.title,
                "body": request.body,
                "category": request.category,
                "targetProviderId": request.target_provider_id,
                "targetProviderType": request.target_provider_type,
                "bookingReference": request.booking_reference,
                "attempt": request.attempt_count,
                "url": request.deep_link(),
            }),
        };
        self.agent.post_message(message).await?;
        Ok(())
    }
}
