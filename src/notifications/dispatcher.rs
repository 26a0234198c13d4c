use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::notifications::ack::{AckHandle, AckSender};
use crate::notifications::channel::{ChannelError, NotificationChannel};
use crate::notifications::error::AlertError;
use crate::notifications::registry::ChannelRegistry;
use crate::notifications::types::{ChannelOutcome, NotificationId, NotificationRequest};

/// Where per-channel results land once a send resolves.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record_outcome(&self, id: &str, channel_id: &str, outcome: ChannelOutcome);
}

/// Attempts started by one dispatch. Dropping it detaches the attempts.
#[derive(Debug)]
pub struct DispatchTicket {
    request_id: NotificationId,
    attempts: Vec<(String, JoinHandle<()>)>,
}

impl DispatchTicket {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn initiated(&self) -> usize {
        self.attempts.len()
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.attempts.iter().map(|(channel, _)| channel.as_str())
    }

    pub async fn settled(self) {
        for (_, handle) in self.attempts {
            let _ = handle.await;
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: ChannelRegistry,
    acks: AckSender,
}

impl Dispatcher {
    pub fn new(registry: ChannelRegistry, acks: AckSender) -> Self {
        Self { registry, acks }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Each channel is marked `Pending` on `request` immediately; the final outcome is
    /// written through `sink` by the attempt itself, inside its own failure boundary.
    pub fn dispatch(
        &self,
        request: &mut NotificationRequest,
        sink: Arc<dyn OutcomeSink>,
    ) -> DispatchTicket {
        let channels = self.registry.available();
        if channels.is_empty() {
            tracing::warn!(
                event = "dispatch_no_channels",
                notification_id = %request.id,
                "no delivery channel available"
            );
        }
        for channel in &channels {
            request
                .per_channel_outcome
                .insert(channel.channel_id().to_string(), ChannelOutcome::Pending);
        }
        let snapshot = Arc::new(request.clone());
        let attempts = channels
            .into_iter()
            .map(|channel| {
                let channel_id = channel.channel_id().to_string();
                let handle = tokio::spawn(run_attempt(
                    channel,
                    Arc::clone(&snapshot),
                    self.acks.handle_for(&snapshot),
                    Arc::clone(&sink),
                ));
                (channel_id, handle)
            })
            .collect();
        tracing::debug!(
            event = "notification_dispatched",
            notification_id = %request.id,
            attempt = request.attempt_count,
            "dispatch initiated"
        );
        DispatchTicket {
            request_id: request.id.clone(),
            attempts,
        }
    }
}

async fn run_attempt(
    channel: Arc<dyn NotificationChannel>,
    request: Arc<NotificationRequest>,
    ack: AckHandle,
    sink: Arc<dyn OutcomeSink>,
) {
    let channel_id = channel.channel_id().to_string();
    let result = AssertUnwindSafe(channel.send(request.as_ref(), ack))
        .catch_unwind()
        .await
        .unwrap_or(Err(ChannelError::Panicked));
    let outcome = match result {
        Ok(()) => {
            tracing::debug!(
                event = "channel_delivered",
                channel_id = %channel_id,
                notification_id = %request.id,
                attempt = request.attempt_count,
                "channel delivered notification"
            );
            ChannelOutcome::Delivered
        }
        Err(source) => {
            let reason = source.to_string();
            let err = AlertError::ChannelSendFailure {
                channel: channel_id.clone(),
                source,
            };
            tracing::warn!(
                event = "channel_send_failed",
                channel_id = %channel_id,
                notification_id = %request.id,
                attempt = request.attempt_count,
                error = %err,
                "channel send failed"
            );
            ChannelOutcome::Failed { reason }
        }
    };
    sink.record_outcome(&request.id, &channel_id, outcome).await;
}
