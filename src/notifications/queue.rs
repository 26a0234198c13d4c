use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::notifications::dispatcher::{DispatchTicket, Dispatcher, OutcomeSink};
use crate::notifications::error::AlertError;
use crate::notifications::types::{
    Category, ChannelOutcome, DEFAULT_MAX_ATTEMPTS, NotificationId, NotificationRequest,
};

#[derive(Debug, Clone)]
pub struct RetryQueueConfig {
    pub max_attempts: u32,
    pub sweep_interval: Duration,
    pub max_records: usize,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sweep_interval: Duration::from_secs(30),
            max_records: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Acknowledged,
    Exhausted,
    Dropped,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub category: Category,
    pub target_provider_id: String,
    pub status: NotificationStatus,
    pub attempts: u32,
    pub delivered_channels: Vec<String>,
    pub last_error: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub retried: usize,
    pub exhausted: usize,
    pub exhausted_ids: Vec<NotificationId>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<NotificationRequest>,
    records: Vec<NotificationRecord>,
}

impl QueueState {
    fn position(&self, id: &str) -> Option<usize> {
        self.pending.iter().position(|request| request.id == id)
    }

    fn record_mut(&mut self, id: &str) -> Option<&mut NotificationRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }
}

struct SweepTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns every in-flight request. `enqueue`, `sweep` and `acknowledge` are the only writers.
#[derive(Clone)]
pub struct RetryQueue {
    state: Arc<Mutex<QueueState>>,
    dispatcher: Dispatcher,
    config: RetryQueueConfig,
    sweeper: Arc<Mutex<Option<SweepTask>>>,
    exhausted_tx: Option<mpsc::UnboundedSender<NotificationId>>,
}

impl RetryQueue {
    pub fn new(dispatcher: Dispatcher, config: RetryQueueConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            dispatcher,
            config,
            sweeper: Arc::new(Mutex::new(None)),
            exhausted_tx: None,
        }
    }

    /// Every id a sweep drops for exhaustion is also sent on `tx`.
    pub fn with_exhausted_notifier(mut self, tx: mpsc::UnboundedSender<NotificationId>) -> Self {
        self.exhausted_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &RetryQueueConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn enqueue(&self, mut request: NotificationRequest) -> NotificationId {
        request.attempt_count = 0;
        request.max_attempts = self.config.max_attempts;
        let id = request.id.clone();
        let record = NotificationRecord {
            id: id.clone(),
            category: request.category,
            target_provider_id: request.target_provider_id.clone(),
            status: NotificationStatus::Pending,
            attempts: 0,
            delivered_channels: Vec::new(),
            last_error: None,
            updated_at: chrono::Utc::now(),
        };
        let mut state = self.state.lock().await;
        state.records.push(record);
        prune_records(&mut state.records, self.config.max_records);
        state.pending.push_back(request);
        tracing::debug!(
            event = "notification_enqueued",
            notification_id = %id,
            pending = state.pending.len(),
            "notification enqueued"
        );
        id
    }

    /// Counts one attempt against `id` and dispatches it. `None` if the id is no longer queued
    /// or its attempt budget is already spent.
    pub async fn attempt(&self, id: &str) -> Option<DispatchTicket> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let request = &mut state.pending[index];
        if request.is_exhausted() {
            return None;
        }
        let ticket = self.attempt_locked(request);
        let attempts = request.attempt_count;
        if let Some(record) = state.record_mut(id) {
            record.attempts = attempts;
            record.updated_at = chrono::Utc::now();
        }
        Some(ticket)
    }

    fn attempt_locked(&self, request: &mut NotificationRequest) -> DispatchTicket {
        request.attempt_count += 1;
        self.dispatcher.dispatch(request, self.sink())
    }

    fn sink(&self) -> Arc<dyn OutcomeSink> {
        Arc::new(QueueSink {
            state: Arc::clone(&self.state),
        })
    }

    /// One retry pass: drops requests whose budget is spent, re-dispatches the rest.
    pub async fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let mut state = self.state.lock().await;
        let mut kept = VecDeque::with_capacity(state.pending.len());
        let mut retried = Vec::new();
        let mut finished = Vec::new();
        while let Some(mut request) = state.pending.pop_front() {
            if request.is_exhausted() {
                finished.push(request);
                continue;
            }
            // Detached: outcomes flow back through the sink.
            let _ticket = self.attempt_locked(&mut request);
            retried.push((request.id.clone(), request.attempt_count));
            kept.push_back(request);
        }
        state.pending = kept;
        summary.retried = retried.len();
        summary.exhausted = finished.len();
        summary.exhausted_ids = finished.iter().map(|request| request.id.clone()).collect();
        for (id, attempts) in retried {
            if let Some(record) = state.record_mut(&id) {
                record.attempts = attempts;
                record.updated_at = chrono::Utc::now();
            }
        }
        for request in finished {
            retire_exhausted(&mut state, request);
        }
        drop(state);
        if let Some(tx) = &self.exhausted_tx {
            for id in &summary.exhausted_ids {
                let _ = tx.send(id.clone());
            }
        }
        if summary.retried > 0 || summary.exhausted > 0 {
            tracing::debug!(
                event = "retry_sweep",
                retried = summary.retried,
                exhausted = summary.exhausted,
                "retry sweep completed"
            );
        }
        summary
    }

    pub async fn acknowledge(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(index) = state.position(id) else {
            tracing::debug!(
                event = "acknowledge_unknown",
                notification_id = %id,
                "acknowledge for unknown or removed notification ignored"
            );
            return false;
        };
        let Some(request) = state.pending.remove(index) else {
            return false;
        };
        let delivered = request.delivered_channels();
        if let Some(record) = state.record_mut(id) {
            record.status = NotificationStatus::Acknowledged;
            record.attempts = request.attempt_count;
            record.delivered_channels = delivered;
            record.updated_at = chrono::Utc::now();
        }
        tracing::info!(
            event = "notification_acknowledged",
            notification_id = %id,
            attempts = request.attempt_count,
            "notification acknowledged"
        );
        true
    }

    pub async fn get(&self, id: &str) -> Option<NotificationRequest> {
        let state = self.state.lock().await;
        state.pending.iter().find(|request| request.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.position(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.pending.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<NotificationRequest> {
        self.state.lock().await.pending.iter().cloned().collect()
    }

    pub async fn records(&self) -> Vec<NotificationRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn record(&self, id: &str) -> Option<NotificationRecord> {
        let state = self.state.lock().await;
        state.records.iter().find(|record| record.id == id).cloned()
    }

    pub async fn start(&self) {
        let mut guard = self.sweeper.lock().await;
        if guard.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let queue = self.clone();
        let child = token.clone();
        let period = self.config.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        queue.sweep().await;
                    }
                }
            }
        });
        *guard = Some(SweepTask { token, handle });
    }

    pub async fn is_running(&self) -> bool {
        self.sweeper.lock().await.is_some()
    }

    pub async fn destroy(&self) {
        let task = self.sweeper.lock().await.take();
        if let Some(task) = task {
            task.token.cancel();
            let _ = task.handle.await;
        }
        let mut state = self.state.lock().await;
        let dropped = state.pending.len();
        let now = chrono::Utc::now();
        let QueueState { pending, records } = &mut *state;
        for request in pending.drain(..) {
            if let Some(record) = records.iter_mut().find(|record| record.id == request.id) {
                record.status = NotificationStatus::Dropped;
                record.attempts = request.attempt_count;
                record.delivered_channels = request.delivered_channels();
                record.updated_at = now;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                event = "queue_destroyed",
                dropped,
                "retry queue destroyed with pending notifications"
            );
        }
    }
}

fn retire_exhausted(state: &mut QueueState, request: NotificationRequest) {
    let delivered = request.delivered_channels();
    let err = AlertError::MaxRetriesExceeded {
        id: request.id.clone(),
        attempts: request.attempt_count,
    };
    if delivered.is_empty() {
        tracing::warn!(
            event = "notification_exhausted",
            notification_id = %request.id,
            target_provider_id = %request.target_provider_id,
            attempts = request.attempt_count,
            error = %err,
            "notification dropped without delivery"
        );
    } else {
        tracing::info!(
            event = "notification_expired",
            notification_id = %request.id,
            attempts = request.attempt_count,
            delivered = ?delivered,
            "notification delivered but never acknowledged, dropping"
        );
    }
    if let Some(record) = state.record_mut(&request.id) {
        record.status = NotificationStatus::Exhausted;
        record.attempts = request.attempt_count;
        if delivered.is_empty() {
            record.last_error = Some(err.to_string());
        }
        record.delivered_channels = delivered;
        record.updated_at = chrono::Utc::now();
    }
}

struct QueueSink {
    state: Arc<Mutex<QueueState>>,
}

#[async_trait]
impl OutcomeSink for QueueSink {
    async fn record_outcome(&self, id: &str, channel_id: &str, outcome: ChannelOutcome) {
        let mut state = self.state.lock().await;
        let Some(index) = state.position(id) else {
            return;
        };
        let error = match &outcome {
            ChannelOutcome::Failed { reason } => Some(format!("{channel_id}: {reason}")),
            _ => None,
        };
        let delivered = outcome.is_delivered();
        state.pending[index]
            .per_channel_outcome
            .insert(channel_id.to_string(), outcome);
        if let Some(record) = state.record_mut(id) {
            if delivered && !record.delivered_channels.iter().any(|c| c == channel_id) {
                record.delivered_channels.push(channel_id.to_string());
            }
            if error.is_some() {
                record.last_error = error;
            }
            record.updated_at = chrono::Utc::now();
        }
    }
}

fn prune_records(records: &mut Vec<NotificationRecord>, max_records: usize) {
    if max_records == 0 {
        records.clear();
        return;
    }
    if records.len() <= max_records {
        return;
    }
    let mut excess = records.len() - max_records;
    records.retain(|record| {
        if excess > 0 && record.status != NotificationStatus::Pending {
            excess -= 1;
            return false;
        }
        true
    });
    if records.len() > max_records {
        let drop_count = records.len() - max_records;
        records.drain(0..drop_count);
    }
}
