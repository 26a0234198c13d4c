mod key;
mod manager;

pub use key::ServerKey;
pub use manager::{SubscriptionConfig, SubscriptionManager};

use serde::{Deserialize, Serialize};

use crate::notifications::types::ProviderType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Endpoint and key material the backend needs to push to this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub owner_session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Revoked,
    Expired,
    Blocked,
}

/// What gets handed to the backend; upserted there by `endpoint`.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    pub provider_id: String,
    pub provider_type: ProviderType,
    pub status: SubscriptionStatus,
    pub subscription: PushSubscription,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
