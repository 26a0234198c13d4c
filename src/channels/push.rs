use std::sync::Arc;

use async_trait::async_trait;

use crate::notifications::ack::AckHandle;
use crate::notifications::channel::{
    ChannelError, ChannelKind, NotificationChannel, ReliabilityTier,
};
use crate::notifications::types::NotificationRequest;
use crate::platform::ports::{PushError, PushManager, PushPayload, PushSender};
use crate::subscription::SubscriptionManager;

pub fn push_payload(request: &NotificationRequest) -> PushPayload {
    PushPayload {
        notification_id: request.id.clone(),
        title: request.title.clone(),
        body: request.body.clone(),
        category: request.category.to_string(),
        tag: request.tag(),
        url: request.deep_link(),
        require_interaction: request.category.is_high_priority(),
        vibrate: request.category.vibration_pattern().to_vec(),
    }
}

/// Server-initiated push; the only channel that reaches a closed app.
pub struct BackgroundPushChannel {
    subscriptions: Arc<SubscriptionManager>,
    push_manager: Arc<dyn PushManager>,
    sender: Arc<dyn PushSender>,
}

impl BackgroundPushChannel {
    pub fn new(
        subscriptions: Arc<SubscriptionManager>,
        push_manager: Arc<dyn PushManager>,
        sender: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            subscriptions,
            push_manager,
            sender,
        }
    }
}

#[async_trait]
impl NotificationChannel for BackgroundPushChannel {
    fn channel_id(&self) -> &str {
        "push"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::BackgroundPush
    }

    fn reliability_tier(&self) -> ReliabilityTier {
        ReliabilityTier::High
    }

    fn works_when_backgrounded(&self) -> bool {
        true
    }

    fn probe(&self) -> Result<bool, ChannelError> {
        Ok(self.push_manager.is_supported() && self.sender.is_configured())
    }

    async fn send(
        &self,
        request: &NotificationRequest,
        _ack: AckHandle,
    ) -> Result<(), ChannelError> {
        let subscription = self
            .subscriptions
            .current()
            .await
            .ok_or(ChannelError::NoSubscription)?;
        match self.sender.push(&subscription, &push_payload(request)).await {
            Ok(()) => Ok(()),
            Err(PushError::Gone) => {
                if let Err(err) = self.subscriptions.renew(&subscription.endpoint).await {
                    tracing::warn!(
                        event = "subscription_renew_failed",
                        endpoint = %subscription.endpoint,
                        error = %err,
                        "push subscription renewal failed"
                    );
                }
                Err(ChannelError::SubscriptionInvalid)
            }
            Err(PushError::Rejected(reason)) => {
                Err(ChannelError::Other(anyhow::anyhow!("push rejected: {reason}")))
            }
            Err(PushError::Transport(err)) => Err(ChannelError::Other(err)),
        }
    }
}
