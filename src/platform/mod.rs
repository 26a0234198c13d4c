pub mod http;
pub mod ports;
pub mod terminal;

use std::sync::Arc;

use ports::{
    AlertSurface, AudioPlayer, BackgroundAgent, DeepLinkHandler, ModalSurface, PermissionPort,
    PushManager, PushSender, SubscriptionBackend, TitleBar,
};

/// Every host capability the alert service is wired to.
#[derive(Clone)]
pub struct Platform {
    pub permission: Arc<dyn PermissionPort>,
    pub agent: Arc<dyn BackgroundAgent>,
    pub push_manager: Arc<dyn PushManager>,
    pub push_sender: Arc<dyn PushSender>,
    pub subscription_backend: Arc<dyn SubscriptionBackend>,
    pub alert_surface: Arc<dyn AlertSurface>,
    pub audio: Arc<dyn AudioPlayer>,
    pub modal: Arc<dyn ModalSurface>,
    pub title: Arc<dyn TitleBar>,
    pub deep_links: Arc<dyn DeepLinkHandler>,
}
