//! Backend-facing ports over HTTP: the push relay that holds the server's
//! private key and the subscription store.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, StatusCode};
use serde_json::json;
use url::Url;

use crate::platform::ports::{PushError, PushManager, PushPayload, PushSender, SubscriptionBackend};
use crate::subscription::{PushSubscription, ServerKey, SubscriptionKeys, SubscriptionRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("failed to build http client")
}

fn parse_base(raw: Option<&str>) -> anyhow::Result<Option<Url>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let mut url = Url::parse(raw).with_context(|| format!("invalid url `{raw}`"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(Some(url))
}

fn join(base: &Url, path: &str) -> anyhow::Result<Url> {
    base.join(path)
        .with_context(|| format!("cannot join `{path}` onto {base}"))
}

/// Sends pushes through the relay's `POST /push`.
pub struct HttpPushRelay {
    client: Client,
    relay: Option<Url>,
}

impl HttpPushRelay {
    pub fn new(relay_url: Option<&str>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client()?,
            relay: parse_base(relay_url)?,
        })
    }
}

#[async_trait]
impl PushSender for HttpPushRelay {
    fn is_configured(&self) -> bool {
        self.relay.is_some()
    }

    async fn push(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), PushError> {
        let relay = self
            .relay
            .as_ref()
            .ok_or_else(|| PushError::Rejected("no push relay configured".to_string()))?;
        let url = join(relay, "push")?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "subscription": subscription, "payload": payload }))
            .send()
            .await
            .context("push relay unreachable")?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(PushError::Gone);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PushError::Rejected(format!("{status}: {body}")))
    }
}

/// Upserts subscription records at `POST /subscriptions`. Without a backend url the
/// records only go to the log.
pub struct HttpSubscriptionBackend {
    client: Client,
    base: Option<Url>,
}

impl HttpSubscriptionBackend {
    pub fn new(backend_url: Option<&str>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client()?,
            base: parse_base(backend_url)?,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> anyhow::Result<()> {
        let Some(base) = self.base.as_ref() else {
            tracing::debug!(
                event = "subscription_backend_skipped",
                path,
                "no subscription backend configured"
            );
            return Ok(());
        };
        let response = self
            .client
            .post(join(base, path)?)
            .json(&body)
            .send()
            .await
            .context("subscription backend unreachable")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("subscription backend returned {status}: {text}");
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionBackend for HttpSubscriptionBackend {
    async fn store(&self, record: &SubscriptionRecord) -> anyhow::Result<()> {
        self.post("subscriptions", serde_json::to_value(record)?).await
    }

    async fn mark_expired(&self, endpoint: &str) -> anyhow::Result<()> {
        self.post(
            "subscriptions/expire",
            json!({ "endpoint": endpoint, "status": "expired" }),
        )
        .await
    }
}

/// Hands out relay-addressed endpoints for this process. Holds at most one live
/// subscription.
pub struct RelayPushManager {
    relay: Option<Url>,
    current: Mutex<Option<PushSubscription>>,
}

impl RelayPushManager {
    pub fn new(relay_url: Option<&str>) -> anyhow::Result<Self> {
        Ok(Self {
            relay: parse_base(relay_url)?,
            current: Mutex::new(None),
        })
    }
}

#[async_trait]
impl PushManager for RelayPushManager {
    fn is_supported(&self) -> bool {
        self.relay.is_some()
    }

    async fn existing(&self) -> anyhow::Result<Option<PushSubscription>> {
        let current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("push manager state poisoned"))?;
        Ok(current.clone())
    }

    async fn subscribe(
        &self,
        server_key: &ServerKey,
        owner_session_id: &str,
    ) -> anyhow::Result<PushSubscription> {
        let relay = self
            .relay
            .as_ref()
            .context("push unsupported without a relay")?;
        let endpoint = join(relay, &format!("endpoints/{}", uuid::Uuid::new_v4()))?;
        let subscription = PushSubscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: server_key.as_base64url().to_string(),
                auth: URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes()),
            },
            owner_session_id: owner_session_id.to_string(),
        };
        let mut current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("push manager state poisoned"))?;
        *current = Some(subscription.clone());
        Ok(subscription)
    }
}
