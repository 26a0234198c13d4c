use async_trait::async_trait;

use crate::escalation::EscalationPresenter;
use crate::notifications::ack::AckHandle;
use crate::notifications::channel::{
    ChannelError, ChannelKind, NotificationChannel, ReliabilityTier,
};
use crate::notifications::types::NotificationRequest;

pub struct EscalationChannel {
    presenter: EscalationPresenter,
}

impl EscalationChannel {
    pub fn new(presenter: EscalationPresenter) -> Self {
        Self { presenter }
    }
}

#[async_trait]
impl NotificationChannel for EscalationChannel {
    fn channel_id(&self) -> &str {
        "escalation"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Escalation
    }

    fn reliability_tier(&self) -> ReliabilityTier {
        ReliabilityTier::Medium
    }

    fn works_when_backgrounded(&self) -> bool {
        false
    }

    fn probe(&self) -> Result<bool, ChannelError> {
        Ok(self.presenter.is_supported())
    }

    async fn send(&self, request: &NotificationRequest, ack: AckHandle) -> Result<(), ChannelError> {
        self.presenter.escalate(request, ack).map(|_| ())
    }
}
