#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use alertline::escalation::{AudioAssets, EscalationConfig};
use alertline::notifications::AlertSettings;
use alertline::notifications::ack::{AckHandle, AckSource};
use alertline::notifications::channel::{
    ChannelError, ChannelKind, NotificationChannel, ReliabilityTier,
};
use alertline::notifications::dispatcher::OutcomeSink;
use alertline::notifications::queue::RetryQueueConfig;
use alertline::notifications::types::{
    AlertRequest, Category, ChannelOutcome, NotificationRequest, ProviderType,
};
use alertline::platform::Platform;
use alertline::platform::ports::{
    AgentMessage, AlertSpec, AlertSurface, AudioPlayer, BackgroundAgent, DeepLinkHandler,
    ModalSpec, ModalSurface, PermissionPort, PermissionState, PushError, PushManager, PushPayload,
    PushSender, SubscriptionBackend, TitleBar,
};
use alertline::subscription::{
    PushSubscription, ServerKey, SubscriptionConfig, SubscriptionKeys, SubscriptionRecord,
};

pub const SERVER_KEY: &str = "BA0B-p4S_w";

pub fn alert(category: Category, provider: &str) -> AlertRequest {
    AlertRequest {
        title: "New booking".to_string(),
        body: "90 min massage at 18:00".to_string(),
        category,
        target_provider_id: provider.to_string(),
        target_provider_type: ProviderType::Therapist,
        booking_reference: None,
    }
}

pub fn request(category: Category) -> NotificationRequest {
    NotificationRequest::new(alert(category, "t-123"), 5)
}

pub fn settings() -> AlertSettings {
    AlertSettings {
        subscription: SubscriptionConfig {
            server_public_key: Some(SERVER_KEY.to_string()),
            store_cooldown: Duration::from_secs(5),
        },
        retry: RetryQueueConfig::default(),
        escalation: EscalationConfig::default(),
        audio: AudioAssets::default(),
    }
}

/// Collects formatted log output from everything running on the test's thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let buf = Arc::clone(&self.buf);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(Arc::clone(&buf)))
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn count(&self, needle: &str) -> usize {
        let text = String::from_utf8_lossy(&self.buf.lock().unwrap()).to_string();
        text.matches(needle).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Deliver,
    Fail,
    Panic,
    Hang,
}

/// Channel with a fixed result, for exercising the dispatcher directly.
pub struct ScriptedChannel {
    pub id: &'static str,
    pub kind: ChannelKind,
    pub tier: ReliabilityTier,
    pub behavior: Behavior,
    pub sends: AtomicUsize,
}

impl ScriptedChannel {
    pub fn new(id: &'static str, kind: ChannelKind, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind,
            tier: ReliabilityTier::High,
            behavior,
            sends: AtomicUsize::new(0),
        })
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for ScriptedChannel {
    fn channel_id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn reliability_tier(&self) -> ReliabilityTier {
        self.tier
    }

    fn works_when_backgrounded(&self) -> bool {
        true
    }

    fn probe(&self) -> Result<bool, ChannelError> {
        Ok(true)
    }

    async fn send(&self, _request: &NotificationRequest, _ack: AckHandle) -> Result<(), ChannelError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Deliver => Ok(()),
            Behavior::Fail => Err(ChannelError::Other(anyhow::anyhow!("scripted failure"))),
            Behavior::Panic => panic!("scripted panic"),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub outcomes: Mutex<Vec<(String, String, ChannelOutcome)>>,
}

impl RecordingSink {
    pub fn outcome(&self, channel: &str) -> Option<ChannelOutcome> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .find(|(_, c, _)| c == channel)
            .map(|(_, _, outcome)| outcome.clone())
    }
}

#[async_trait]
impl OutcomeSink for RecordingSink {
    async fn record_outcome(&self, id: &str, channel_id: &str, outcome: ChannelOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .push((id.to_string(), channel_id.to_string(), outcome));
    }
}

pub struct FakePermission {
    pub state: Mutex<PermissionState>,
    pub answer: PermissionState,
    pub requests: AtomicUsize,
    pub instructions: AtomicUsize,
}

impl FakePermission {
    pub fn new(state: PermissionState, answer: PermissionState) -> Self {
        Self {
            state: Mutex::new(state),
            answer,
            requests: AtomicUsize::new(0),
            instructions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PermissionPort for FakePermission {
    fn state(&self) -> PermissionState {
        *self.state.lock().unwrap()
    }

    async fn request(&self) -> PermissionState {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = self.answer;
        self.answer
    }

    fn show_enable_instructions(&self) {
        self.instructions.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeAgent {
    pub supported: bool,
    pub active: AtomicBool,
    pub registrations: AtomicUsize,
    pub messages: Mutex<Vec<AgentMessage>>,
}

impl FakeAgent {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            active: AtomicBool::new(false),
            registrations: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BackgroundAgent for FakeAgent {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn register(&self) -> anyhow::Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn post_message(&self, message: AgentMessage) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct FakePushManager {
    pub supported: bool,
    pub existing: Mutex<Option<PushSubscription>>,
    pub subscribes: AtomicUsize,
    pub fail_subscribe: bool,
}

impl FakePushManager {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            existing: Mutex::new(None),
            subscribes: AtomicUsize::new(0),
            fail_subscribe: false,
        }
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushManager for FakePushManager {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn existing(&self) -> anyhow::Result<Option<PushSubscription>> {
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn subscribe(
        &self,
        server_key: &ServerKey,
        owner_session_id: &str,
    ) -> anyhow::Result<PushSubscription> {
        if self.fail_subscribe {
            anyhow::bail!("push service refused");
        }
        let n = self.subscribes.fetch_add(1, Ordering::SeqCst) + 1;
        let subscription = PushSubscription {
            endpoint: format!("https://push.test/endpoint/{n}"),
            keys: SubscriptionKeys {
                p256dh: server_key.as_base64url().to_string(),
                auth: format!("auth-{n}"),
            },
            owner_session_id: owner_session_id.to_string(),
        };
        *self.existing.lock().unwrap() = Some(subscription.clone());
        Ok(subscription)
    }
}

pub struct FakePushSender {
    pub configured: bool,
    pub gone_next: AtomicBool,
    pub pushes: Mutex<Vec<(String, PushPayload)>>,
}

impl FakePushSender {
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            gone_next: AtomicBool::new(false),
            pushes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PushSender for FakePushSender {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn push(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), PushError> {
        if self.gone_next.swap(false, Ordering::SeqCst) {
            return Err(PushError::Gone);
        }
        self.pushes
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub fail: bool,
    pub stored: Mutex<Vec<SubscriptionRecord>>,
    pub expired: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn stores(&self) -> usize {
        self.stored.lock().unwrap().len()
    }
}

#[async_trait]
impl SubscriptionBackend for FakeBackend {
    async fn store(&self, record: &SubscriptionRecord) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("backend offline");
        }
        self.stored.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn mark_expired(&self, endpoint: &str) -> anyhow::Result<()> {
        self.expired.lock().unwrap().push(endpoint.to_string());
        Ok(())
    }
}

pub struct FakeAlerts {
    pub supported: bool,
    pub shown: Mutex<Vec<(AlertSpec, AckHandle)>>,
}

impl FakeAlerts {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Simulates the user clicking the most recent alert.
    pub fn click_last(&self) -> bool {
        let shown = self.shown.lock().unwrap();
        shown
            .last()
            .map(|(_, handle)| handle.acknowledge(AckSource::SystemAlert))
            .unwrap_or(false)
    }
}

#[async_trait]
impl AlertSurface for FakeAlerts {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn show(&self, alert: AlertSpec, on_click: AckHandle) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push((alert, on_click));
        Ok(())
    }
}

pub struct FakeAudio {
    pub supported: bool,
    pub plays: Mutex<Vec<(Instant, PathBuf)>>,
}

impl FakeAudio {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            plays: Mutex::new(Vec::new()),
        }
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn offsets_from(&self, start: Instant) -> Vec<Duration> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| at.duration_since(start))
            .collect()
    }
}

impl AudioPlayer for FakeAudio {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn play(&self, clip: &Path) -> anyhow::Result<()> {
        self.plays
            .lock()
            .unwrap()
            .push((Instant::now(), clip.to_path_buf()));
        Ok(())
    }
}

pub struct FakeModal {
    pub supported: bool,
    pub shown: Mutex<Vec<ModalSpec>>,
    pub handles: Mutex<HashMap<String, AckHandle>>,
    pub dismissed: Mutex<Vec<String>>,
    pub fail_show: AtomicBool,
}

impl FakeModal {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            shown: Mutex::new(Vec::new()),
            handles: Mutex::new(HashMap::new()),
            dismissed: Mutex::new(Vec::new()),
            fail_show: AtomicBool::new(false),
        }
    }

    pub fn press_acknowledge(&self, id: &str) -> bool {
        let handle = self.handles.lock().unwrap().get(id).cloned();
        handle.is_some_and(|handle| handle.acknowledge(AckSource::Modal))
    }

    pub fn shown_count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

impl ModalSurface for FakeModal {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn show(&self, modal: ModalSpec, on_acknowledge: AckHandle) -> anyhow::Result<()> {
        if self.fail_show.load(Ordering::SeqCst) {
            anyhow::bail!("modal surface closed");
        }
        self.handles
            .lock()
            .unwrap()
            .insert(modal.notification_id.clone(), on_acknowledge);
        self.shown.lock().unwrap().push(modal);
        Ok(())
    }

    fn dismiss(&self, notification_id: &str) {
        self.handles.lock().unwrap().remove(notification_id);
        self.dismissed
            .lock()
            .unwrap()
            .push(notification_id.to_string());
    }
}

pub struct FakeTitle {
    pub current: Mutex<String>,
    pub history: Mutex<Vec<(Instant, String)>>,
}

impl FakeTitle {
    pub fn new(initial: &str) -> Self {
        Self {
            current: Mutex::new(initial.to_string()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn changes(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

impl TitleBar for FakeTitle {
    fn current(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    fn set(&self, title: &str) {
        *self.current.lock().unwrap() = title.to_string();
        self.history
            .lock()
            .unwrap()
            .push((Instant::now(), title.to_string()));
    }
}

#[derive(Default)]
pub struct FakeDeepLinks {
    pub opened: Mutex<Vec<String>>,
}

impl DeepLinkHandler for FakeDeepLinks {
    fn open(&self, target: &str) {
        self.opened.lock().unwrap().push(target.to_string());
    }
}

/// Every port as a fake, all capabilities present and permission granted.
pub struct FakePlatform {
    pub permission: Arc<FakePermission>,
    pub agent: Arc<FakeAgent>,
    pub push_manager: Arc<FakePushManager>,
    pub push_sender: Arc<FakePushSender>,
    pub backend: Arc<FakeBackend>,
    pub alerts: Arc<FakeAlerts>,
    pub audio: Arc<FakeAudio>,
    pub modal: Arc<FakeModal>,
    pub title: Arc<FakeTitle>,
    pub deep_links: Arc<FakeDeepLinks>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            permission: Arc::new(FakePermission::new(
                PermissionState::Granted,
                PermissionState::Granted,
            )),
            agent: Arc::new(FakeAgent::new(true)),
            push_manager: Arc::new(FakePushManager::new(true)),
            push_sender: Arc::new(FakePushSender::new(true)),
            backend: Arc::new(FakeBackend::default()),
            alerts: Arc::new(FakeAlerts::new(true)),
            audio: Arc::new(FakeAudio::new(true)),
            modal: Arc::new(FakeModal::new(true)),
            title: Arc::new(FakeTitle::new("Provider Dashboard")),
            deep_links: Arc::new(FakeDeepLinks::default()),
        }
    }
}

impl FakePlatform {
    pub fn denied() -> Self {
        Self {
            permission: Arc::new(FakePermission::new(
                PermissionState::Prompt,
                PermissionState::Denied,
            )),
            ..Self::default()
        }
    }

    /// Nothing but the modal and audio cues can deliver.
    pub fn foreground_only() -> Self {
        Self {
            agent: Arc::new(FakeAgent::new(false)),
            push_manager: Arc::new(FakePushManager::new(false)),
            push_sender: Arc::new(FakePushSender::new(false)),
            alerts: Arc::new(FakeAlerts::new(false)),
            ..Self::default()
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            permission: self.permission.clone(),
            agent: self.agent.clone(),
            push_manager: self.push_manager.clone(),
            push_sender: self.push_sender.clone(),
            subscription_backend: self.backend.clone(),
            alert_surface: self.alerts.clone(),
            audio: self.audio.clone(),
            modal: self.modal.clone(),
            title: self.title.clone(),
            deep_links: self.deep_links.clone(),
        }
    }
}
