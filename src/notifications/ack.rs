use tokio::sync::mpsc;

use crate::notifications::types::{NotificationId, NotificationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckSource {
    Modal,
    SystemAlert,
}

#[derive(Debug, Clone)]
pub struct AckEvent {
    pub id: NotificationId,
    pub deep_link: String,
    pub source: AckSource,
}

/// Handed to an alert surface so a user action can acknowledge the request it shows.
#[derive(Debug, Clone)]
pub struct AckHandle {
    id: NotificationId,
    deep_link: String,
    tx: mpsc::UnboundedSender<AckEvent>,
}

impl AckHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn deep_link(&self) -> &str {
        &self.deep_link
    }

    /// Returns false once the service has shut down.
    pub fn acknowledge(&self, source: AckSource) -> bool {
        self.tx
            .send(AckEvent {
                id: self.id.clone(),
                deep_link: self.deep_link.clone(),
                source,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct AckSender {
    tx: mpsc::UnboundedSender<AckEvent>,
}

impl AckSender {
    pub fn handle_for(&self, request: &NotificationRequest) -> AckHandle {
        AckHandle {
            id: request.id.clone(),
            deep_link: request.deep_link(),
            tx: self.tx.clone(),
        }
    }
}

pub fn ack_channel() -> (AckSender, mpsc::UnboundedReceiver<AckEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AckSender { tx }, rx)
}
