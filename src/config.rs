use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::escalation::{AudioAssets, EscalationConfig};
use crate::notifications::queue::RetryQueueConfig;
use crate::notifications::service::AlertSettings;
use crate::notifications::types::ProviderType;
use crate::subscription::SubscriptionConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown provider type `{0}`")]
    ProviderType(String),
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub push: Option<PushConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub escalation: Option<EscalationSection>,
    #[serde(default)]
    pub audio: Option<AudioConfig>,
    #[serde(default)]
    pub permission: Option<PermissionConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ProviderConfig {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PushConfig {
    pub server_public_key: Option<String>,
    pub relay_url: Option<String>,
    pub backend_url: Option<String>,
    pub store_cooldown_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub sweep_interval_secs: Option<u64>,
    pub max_records: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct EscalationSection {
    pub audio_plays: Option<u32>,
    pub audio_spacing_ms: Option<u64>,
    pub title_flash_cycles: Option<u32>,
    pub title_flash_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AudioConfig {
    pub booking: Option<String>,
    pub message: Option<String>,
    pub alert: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionPolicy {
    Granted,
    Denied,
    #[default]
    Prompt,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PermissionConfig {
    pub policy: Option<PermissionPolicy>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServerConfig {
    pub bind: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_toml(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &raw)
    }

    /// Explicit path if given, else the user config file when it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        match default_path() {
            Some(path) if path.exists() => Ok((Self::load(&path)?, Some(path))),
            _ => Ok((Self::default(), None)),
        }
    }

    pub fn provider_id(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.id.clone())
            .unwrap_or_else(|| "local".to_string())
    }

    pub fn provider_type(&self) -> Result<ProviderType, ConfigError> {
        match self.provider.as_ref().and_then(|p| p.provider_type.as_deref()) {
            None => Ok(ProviderType::Therapist),
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::ProviderType(raw.to_string())),
        }
    }

    pub fn permission_policy(&self) -> PermissionPolicy {
        self.permission
            .as_ref()
            .and_then(|p| p.policy)
            .unwrap_or_default()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn relay_url(&self) -> Option<&str> {
        self.push.as_ref().and_then(|p| p.relay_url.as_deref())
    }

    pub fn backend_url(&self) -> Option<&str> {
        self.push.as_ref().and_then(|p| p.backend_url.as_deref())
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            subscription: self.subscription_config(),
            retry: self.retry_config(),
            escalation: self.escalation_config(),
            audio: self.audio_assets(),
        }
    }

    fn subscription_config(&self) -> SubscriptionConfig {
        let defaults = SubscriptionConfig::default();
        let push = self.push.clone().unwrap_or_default();
        SubscriptionConfig {
            server_public_key: push.server_public_key,
            store_cooldown: push
                .store_cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_cooldown),
        }
    }

    fn retry_config(&self) -> RetryQueueConfig {
        let defaults = RetryQueueConfig::default();
        let retry = self.retry.clone().unwrap_or_default();
        RetryQueueConfig {
            max_attempts: retry.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            sweep_interval: retry
                .sweep_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            max_records: retry.max_records.unwrap_or(defaults.max_records),
        }
    }

    fn escalation_config(&self) -> EscalationConfig {
        let defaults = EscalationConfig::default();
        let section = self.escalation.clone().unwrap_or_default();
        EscalationConfig {
            audio_plays: section.audio_plays.unwrap_or(defaults.audio_plays),
            audio_spacing: section
                .audio_spacing_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.audio_spacing),
            title_flash_cycles: section
                .title_flash_cycles
                .unwrap_or(defaults.title_flash_cycles),
            title_flash_interval: section
                .title_flash_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.title_flash_interval),
        }
    }

    fn audio_assets(&self) -> AudioAssets {
        let defaults = AudioAssets::default();
        let audio = self.audio.clone().unwrap_or_default();
        AudioAssets {
            booking: audio.booking.map(PathBuf::from).unwrap_or(defaults.booking),
            message: audio.message.map(PathBuf::from).unwrap_or(defaults.message),
            alert: audio.alert.map(PathBuf::from).unwrap_or(defaults.alert),
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("alertline").join("config.toml"))
}
