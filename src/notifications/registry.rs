use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::notifications::channel::{ChannelDescriptor, NotificationChannel};

#[derive(Debug, Clone, Serialize)]
pub struct ChannelTestReport {
    pub probed_at: chrono::DateTime<chrono::Utc>,
    pub channels: Vec<ChannelDescriptor>,
}

impl ChannelTestReport {
    pub fn available(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.channels.iter().filter(|channel| channel.available)
    }

    pub fn background_capable(&self) -> bool {
        self.available().any(|channel| channel.works_when_backgrounded)
    }
}

#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<Vec<Arc<dyn NotificationChannel>>>,
    report: Arc<RwLock<Option<ChannelTestReport>>>,
}

impl ChannelRegistry {
    pub fn new(mut channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        channels.sort_by_key(|channel| channel.kind());
        Self {
            channels: Arc::new(channels),
            report: Arc::new(RwLock::new(None)),
        }
    }

    pub fn probe_channels(&self) -> ChannelTestReport {
        let channels = self
            .channels
            .iter()
            .map(|channel| {
                let available = probe_one(channel.as_ref());
                tracing::debug!(
                    event = "channel_probe",
                    channel_id = %channel.channel_id(),
                    available,
                    tier = ?channel.reliability_tier(),
                    backgrounded = channel.works_when_backgrounded(),
                    "channel probed"
                );
                channel.describe(available)
            })
            .collect();
        let report = ChannelTestReport {
            probed_at: chrono::Utc::now(),
            channels,
        };
        if let Ok(mut guard) = self.report.write() {
            *guard = Some(report.clone());
        }
        report
    }

    pub fn last_report(&self) -> Option<ChannelTestReport> {
        self.report.read().ok()?.clone()
    }

    /// Channels the last probe found usable, best tier first. Probes if nothing has yet.
    pub fn available(&self) -> Vec<Arc<dyn NotificationChannel>> {
        let report = match self.last_report() {
            Some(report) => report,
            None => self.probe_channels(),
        };
        let mut ranked: Vec<_> = self
            .channels
            .iter()
            .filter(|channel| {
                report
                    .channels
                    .iter()
                    .any(|probed| probed.available && probed.name == channel.channel_id())
            })
            .cloned()
            .collect();
        ranked.sort_by_key(|channel| (channel.reliability_tier(), channel.kind()));
        ranked
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

fn probe_one(channel: &dyn NotificationChannel) -> bool {
    match catch_unwind(AssertUnwindSafe(|| channel.probe())) {
        Ok(Ok(available)) => available,
        Ok(Err(err)) => {
            tracing::debug!(
                event = "channel_probe_failed",
                channel_id = %channel.channel_id(),
                error = %err,
                "channel probe failed, reporting unavailable"
            );
            false
        }
        Err(_) => {
            tracing::warn!(
                event = "channel_probe_panicked",
                channel_id = %channel.channel_id(),
                "channel probe panicked, reporting unavailable"
            );
            false
        }
    }
}
