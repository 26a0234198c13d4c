use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::channels::{
    AgentMessageChannel, BackgroundPushChannel, EscalationChannel, ForegroundAlertChannel,
    SmsChannel,
};
use crate::escalation::{AudioAssets, EscalationConfig, EscalationPresenter};
use crate::notifications::ack::{AckEvent, ack_channel};
use crate::notifications::channel::NotificationChannel;
use crate::notifications::dispatcher::Dispatcher;
use crate::notifications::error::AlertError;
use crate::notifications::queue::{NotificationRecord, RetryQueue, RetryQueueConfig};
use crate::notifications::registry::{ChannelRegistry, ChannelTestReport};
use crate::notifications::types::{
    AlertRequest, NotificationId, NotificationRequest, ProviderType,
};
use crate::platform::Platform;
use crate::platform::ports::DeepLinkHandler;
use crate::subscription::{SubscriptionConfig, SubscriptionManager};

#[derive(Debug, Clone, Default)]
pub struct AlertSettings {
    pub subscription: SubscriptionConfig,
    pub retry: RetryQueueConfig,
    pub escalation: EscalationConfig,
    pub audio: AudioAssets,
}

pub struct AlertService {
    subscriptions: Arc<SubscriptionManager>,
    registry: ChannelRegistry,
    queue: RetryQueue,
    presenter: EscalationPresenter,
    provider: Mutex<Option<(String, ProviderType)>>,
    initialized: AtomicBool,
    ack_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AlertService {
    /// Wires the channels and starts acknowledgment routing. Needs a running tokio runtime.
    pub fn new(platform: Platform, settings: AlertSettings) -> Self {
        let (acks, ack_rx) = ack_channel();
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&platform.agent),
            Arc::clone(&platform.permission),
            Arc::clone(&platform.push_manager),
            Arc::clone(&platform.subscription_backend),
            settings.subscription,
        ));
        let presenter = EscalationPresenter::new(
            Arc::clone(&platform.modal),
            Arc::clone(&platform.audio),
            Arc::clone(&platform.title),
            settings.audio,
            settings.escalation,
        );
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(BackgroundPushChannel::new(
                Arc::clone(&subscriptions),
                Arc::clone(&platform.push_manager),
                Arc::clone(&platform.push_sender),
            )),
            Arc::new(ForegroundAlertChannel::new(Arc::clone(&platform.alert_surface))),
            Arc::new(AgentMessageChannel::new(Arc::clone(&platform.agent))),
            Arc::new(EscalationChannel::new(presenter.clone())),
            Arc::new(SmsChannel),
        ];
        let registry = ChannelRegistry::new(channels);
        let (exhausted_tx, exhausted_rx) = mpsc::unbounded_channel();
        let queue = RetryQueue::new(Dispatcher::new(registry.clone(), acks), settings.retry)
            .with_exhausted_notifier(exhausted_tx);
        let ack_task = tokio::spawn(route_acks(
            ack_rx,
            exhausted_rx,
            queue.clone(),
            presenter.clone(),
            Arc::clone(&platform.deep_links),
        ));
        Self {
            subscriptions,
            registry,
            queue,
            presenter,
            provider: Mutex::new(None),
            initialized: AtomicBool::new(false),
            ack_task: std::sync::Mutex::new(Some(ack_task)),
        }
    }

    /// Sets up the subscription, probes channels and starts the retry sweep. Failures are
    /// logged and reported as `false`; nothing already set up is undone.
    pub async fn initialize(&self, provider_id: &str, provider_type: ProviderType) -> bool {
        *self.provider.lock().await = Some((provider_id.to_string(), provider_type));
        let result = self
            .subscriptions
            .initialize(provider_id, provider_type)
            .await;

        let report = self.registry.probe_channels();
        let available: Vec<&str> = report.available().map(|c| c.name.as_str()).collect();
        tracing::info!(
            event = "channels_probed",
            available = ?available,
            background_capable = report.background_capable(),
            "delivery channels probed"
        );
        self.queue.start().await;

        match result {
            Ok(_) => {
                self.initialized.store(true, Ordering::SeqCst);
                tracing::info!(
                    event = "alerts_initialized",
                    provider_id = %provider_id,
                    provider_type = %provider_type,
                    "critical alerts initialized"
                );
                true
            }
            Err(err) => {
                let err = AlertError::from(err);
                tracing::error!(
                    event = "alerts_init_failed",
                    provider_id = %provider_id,
                    provider_type = %provider_type,
                    error = %err,
                    "critical alert initialization failed"
                );
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Queues the alert and fans it out right away. Returns once every channel attempt has
    /// been started.
    pub async fn send_critical_notification(&self, alert: AlertRequest) -> NotificationId {
        if let Some((provider_id, _)) = self.provider.lock().await.as_ref()
            && provider_id != &alert.target_provider_id
        {
            tracing::warn!(
                event = "identity_mismatch",
                session_provider = %provider_id,
                target_provider = %alert.target_provider_id,
                "alert targets a provider other than the session's"
            );
        }
        if !self.queue.is_running().await {
            tracing::warn!(
                event = "send_before_initialize",
                "alert sent before initialization, starting retry sweep"
            );
            self.queue.start().await;
        }
        let request = NotificationRequest::new(alert, self.queue.config().max_attempts);
        let id = self.queue.enqueue(request).await;
        tracing::info!(
            event = "critical_notification",
            notification_id = %id,
            "critical notification queued"
        );
        let _ticket = self.queue.attempt(&id).await;
        id
    }

    /// Confirms delivery from outside the alert surfaces. Acknowledging twice is a no-op.
    pub async fn acknowledge(&self, id: &str) -> bool {
        self.presenter.stop(id);
        self.queue.acknowledge(id).await
    }

    pub fn channel_report(&self) -> ChannelTestReport {
        self.registry
            .last_report()
            .unwrap_or_else(|| self.registry.probe_channels())
    }

    pub async fn pending(&self) -> Vec<NotificationRequest> {
        self.queue.snapshot().await
    }

    pub async fn records(&self) -> Vec<NotificationRecord> {
        self.queue.records().await
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn presenter(&self) -> &EscalationPresenter {
        &self.presenter
    }

    pub async fn destroy(&self) {
        self.queue.destroy().await;
        self.presenter.stop_all();
        let task = self.ack_task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            task.abort();
        }
        tracing::info!(event = "alerts_destroyed", "critical alert service stopped");
    }
}

async fn route_acks(
    mut acks: mpsc::UnboundedReceiver<AckEvent>,
    mut exhausted: mpsc::UnboundedReceiver<NotificationId>,
    queue: RetryQueue,
    presenter: EscalationPresenter,
    deep_links: Arc<dyn DeepLinkHandler>,
) {
    loop {
        tokio::select! {
            Some(id) = exhausted.recv() => presenter.stop(&id),
            event = acks.recv() => {
                let Some(event) = event else { break };
                presenter.stop(&event.id);
                let removed = queue.acknowledge(&event.id).await;
                tracing::debug!(
                    event = "ack_routed",
                    notification_id = %event.id,
                    source = ?event.source,
                    removed,
                    "acknowledgment routed"
                );
                // Stale surfaces for dropped requests lead nowhere.
                if removed {
                    deep_links.open(&event.deep_link);
                }
            }
        }
    }
}
