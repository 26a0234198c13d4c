use std::sync::Arc;

use async_trait::async_trait;

use crate::notifications::ack::AckHandle;
use crate::notifications::channel::{
    ChannelError, ChannelKind, NotificationChannel, ReliabilityTier,
};
use crate::notifications::types::NotificationRequest;
use crate::platform::ports::{AlertSpec, AlertSurface};

pub struct ForegroundAlertChannel {
    surface: Arc<dyn AlertSurface>,
}

impl ForegroundAlertChannel {
    pub fn new(surface: Arc<dyn AlertSurface>) -> Self {
        Self { surface }
    }
}

#[async_trait]
impl NotificationChannel for ForegroundAlertChannel {
    fn channel_id(&self) -> &str {
        "foreground"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::ForegroundAlert
    }

    fn reliability_tier(&self) -> ReliabilityTier {
        ReliabilityTier::Medium
    }

    fn works_when_backgrounded(&self) -> bool {
        false
    }

    fn probe(&self) -> Result<bool, ChannelError> {
        Ok(self.surface.is_supported())
    }

    async fn send(&self, request: &NotificationRequest, ack: AckHandle) -> Result<(), ChannelError> {
        let alert = AlertSpec {
            title: request.title.clone(),
            body: request.body.clone(),
            tag: request.tag(),
            require_interaction: request.category.is_high_priority(),
            vibrate: request.category.vibration_pattern().to_vec(),
            url: request.deep_link(),
        };
        self.surface.show(alert, ack).await?;
        Ok(())
    }
}
