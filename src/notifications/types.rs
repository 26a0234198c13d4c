use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type NotificationId = String;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Booking,
    Message,
    Alert,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Booking => "booking",
            Category::Message => "message",
            Category::Alert => "alert",
        }
    }

    /// Bookings and alerts cost money when missed; messages can wait for the next look.
    pub fn is_high_priority(self) -> bool {
        matches!(self, Category::Booking | Category::Alert)
    }

    pub fn vibration_pattern(self) -> &'static [u32] {
        match self {
            Category::Booking => &[200, 100, 200, 100, 200],
            Category::Message => &[100, 50, 100],
            Category::Alert => &[500, 200, 500, 200, 500],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Therapist,
    Venue,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::Therapist => "therapist",
            ProviderType::Venue => "venue",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "therapist" => Ok(ProviderType::Therapist),
            "venue" | "place" => Ok(ProviderType::Venue),
            other => Err(format!("unknown provider type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRequest {
    pub title: String,
    pub body: String,
    pub category: Category,
    pub target_provider_id: String,
    pub target_provider_type: ProviderType,
    #[serde(default)]
    pub booking_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Pending,
    Delivered,
    Failed { reason: String },
}

impl ChannelOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ChannelOutcome::Delivered)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationRequest {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub category: Category,
    pub target_provider_id: String,
    pub target_provider_type: ProviderType,
    pub booking_reference: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub per_channel_outcome: BTreeMap<String, ChannelOutcome>,
}

impl NotificationRequest {
    pub fn new(alert: AlertRequest, max_attempts: u32) -> Self {
        let id = format!(
            "{}:{}:{}",
            alert.category,
            alert.target_provider_id,
            uuid::Uuid::new_v4()
        );
        Self {
            id,
            title: alert.title,
            body: alert.body,
            category: alert.category,
            target_provider_id: alert.target_provider_id,
            target_provider_type: alert.target_provider_type,
            booking_reference: alert.booking_reference,
            created_at: chrono::Utc::now(),
            attempt_count: 0,
            max_attempts,
            per_channel_outcome: BTreeMap::new(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.per_channel_outcome
            .values()
            .any(ChannelOutcome::is_delivered)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    pub fn delivered_channels(&self) -> Vec<String> {
        self.per_channel_outcome
            .iter()
            .filter(|(_, outcome)| outcome.is_delivered())
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Tag shared by every surface showing this alert, so a repeat replaces rather than stacks.
    pub fn tag(&self) -> String {
        match self.booking_reference.as_deref() {
            Some(reference) => format!("booking-{reference}"),
            None => format!("alert-{}", self.id),
        }
    }

    pub fn deep_link(&self) -> String {
        match self.booking_reference.as_deref() {
            Some(reference) => format!("/chat?bookingId={reference}"),
            None => format!("/notifications?id={}", self.id),
        }
    }
}
