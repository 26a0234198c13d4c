//! Capabilities the alert core needs from its host. Each has a terminal/HTTP
//! implementation in this crate and a fake in the integration tests.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::notifications::ack::AckHandle;
use crate::subscription::{PushSubscription, ServerKey, SubscriptionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not decided yet; asking will prompt the user.
    Prompt,
}

#[async_trait]
pub trait PermissionPort: Send + Sync {
    fn state(&self) -> PermissionState;
    async fn request(&self) -> PermissionState;
    fn show_enable_instructions(&self);
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: serde_json::Value,
}

/// Code that keeps running while the app is backgrounded.
#[async_trait]
pub trait BackgroundAgent: Send + Sync {
    fn is_supported(&self) -> bool;
    async fn register(&self) -> Result<(), anyhow::Error>;
    fn is_active(&self) -> bool;
    async fn post_message(&self, message: AgentMessage) -> Result<(), anyhow::Error>;
}

/// Creates push-delivery subscriptions for this device.
#[async_trait]
pub trait PushManager: Send + Sync {
    fn is_supported(&self) -> bool;
    async fn existing(&self) -> Result<Option<PushSubscription>, anyhow::Error>;
    async fn subscribe(
        &self,
        server_key: &ServerKey,
        owner_session_id: &str,
    ) -> Result<PushSubscription, anyhow::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The push service no longer knows this subscription (404/410).
    #[error("push subscription gone")]
    Gone,
    #[error("push rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub notification_id: String,
    pub title: String,
    pub body: String,
    pub category: String,
    pub tag: String,
    pub url: String,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
}

/// Asks the backend to push to a subscription; the server holds the private key.
#[async_trait]
pub trait PushSender: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn push(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), PushError>;
}

#[async_trait]
pub trait SubscriptionBackend: Send + Sync {
    async fn store(&self, record: &SubscriptionRecord) -> Result<(), anyhow::Error>;
    async fn mark_expired(&self, endpoint: &str) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone)]
pub struct AlertSpec {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
    pub url: String,
}

/// System-level alert shown outside the app's own window.
#[async_trait]
pub trait AlertSurface: Send + Sync {
    fn is_supported(&self) -> bool;
    /// Clicking the alert should call `on_click.acknowledge(AckSource::SystemAlert)`.
    async fn show(&self, alert: AlertSpec, on_click: AckHandle) -> Result<(), anyhow::Error>;
}

pub trait AudioPlayer: Send + Sync {
    fn is_supported(&self) -> bool;
    fn play(&self, clip: &Path) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone)]
pub struct ModalSpec {
    pub notification_id: String,
    pub title: String,
    pub body: String,
    pub action_label: String,
}

/// Blocking in-app dialog with a single acknowledge action.
pub trait ModalSurface: Send + Sync {
    fn is_supported(&self) -> bool;
    fn show(&self, modal: ModalSpec, on_acknowledge: AckHandle) -> Result<(), anyhow::Error>;
    fn dismiss(&self, notification_id: &str);
}

pub trait TitleBar: Send + Sync {
    fn current(&self) -> String;
    fn set(&self, title: &str);
}

pub trait DeepLinkHandler: Send + Sync {
    fn open(&self, target: &str);
}
