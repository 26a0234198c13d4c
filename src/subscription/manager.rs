use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::notifications::error::{InitError, InitResult};
use crate::notifications::types::ProviderType;
use crate::platform::ports::{
    BackgroundAgent, PermissionPort, PermissionState, PushManager, SubscriptionBackend,
};
use crate::subscription::{PushSubscription, ServerKey, SubscriptionRecord, SubscriptionStatus};

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub server_public_key: Option<String>,
    pub store_cooldown: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            server_public_key: None,
            store_cooldown: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    current: Option<PushSubscription>,
    provider: Option<(String, ProviderType)>,
    last_stored: Option<(String, Instant)>,
}

pub struct SubscriptionManager {
    agent: Arc<dyn BackgroundAgent>,
    permission: Arc<dyn PermissionPort>,
    push: Arc<dyn PushManager>,
    backend: Arc<dyn SubscriptionBackend>,
    config: SubscriptionConfig,
    session_id: String,
    state: Mutex<ManagerState>,
}

impl SubscriptionManager {
    pub fn new(
        agent: Arc<dyn BackgroundAgent>,
        permission: Arc<dyn PermissionPort>,
        push: Arc<dyn PushManager>,
        backend: Arc<dyn SubscriptionBackend>,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            agent,
            permission,
            push,
            backend,
            config,
            session_id: uuid::Uuid::new_v4().to_string(),
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn current(&self) -> Option<PushSubscription> {
        self.state.lock().await.current.clone()
    }

    /// Agent, then permission, then subscription, then backend hand-off. Stops at the first
    /// failing step without undoing earlier ones. Safe to call again; an existing subscription
    /// is reused.
    pub async fn initialize(
        &self,
        provider_id: &str,
        provider_type: ProviderType,
    ) -> InitResult<PushSubscription> {
        let mut state = self.state.lock().await;
        state.provider = Some((provider_id.to_string(), provider_type));

        self.activate_agent().await?;
        self.ensure_permission().await?;

        let server_key = ServerKey::from_config(self.config.server_public_key.as_deref())?;
        let subscription = match state.current.clone() {
            Some(existing) => existing,
            None => self.obtain_subscription(&server_key).await?,
        };
        state.current = Some(subscription.clone());

        let recently_stored = state.last_stored.as_ref().is_some_and(|(endpoint, at)| {
            endpoint == &subscription.endpoint && at.elapsed() < self.config.store_cooldown
        });
        if recently_stored {
            tracing::debug!(
                event = "subscription_store_skipped",
                endpoint = %subscription.endpoint,
                "subscription stored recently, skipping backend sync"
            );
        } else {
            self.store(&subscription, provider_id, provider_type).await?;
            state.last_stored = Some((subscription.endpoint.clone(), Instant::now()));
        }
        tracing::info!(
            event = "subscription_ready",
            provider_id = %provider_id,
            provider_type = %provider_type,
            endpoint = %subscription.endpoint,
            "push subscription ready"
        );
        Ok(subscription)
    }

    /// Replaces a subscription the push service rejected. A no-op when `stale_endpoint` was
    /// already replaced by a concurrent renewal.
    pub async fn renew(&self, stale_endpoint: &str) -> InitResult<PushSubscription> {
        let mut state = self.state.lock().await;
        if let Some(current) = state.current.as_ref()
            && current.endpoint != stale_endpoint
        {
            return Ok(current.clone());
        }
        let Some((provider_id, provider_type)) = state.provider.clone() else {
            return Err(InitError::SubscriptionFailure(
                "renewal requested before initialization".to_string(),
            ));
        };
        if let Err(err) = self.backend.mark_expired(stale_endpoint).await {
            tracing::warn!(
                event = "subscription_expire_failed",
                endpoint = %stale_endpoint,
                error = %err,
                "failed to mark subscription expired"
            );
        }
        state.current = None;
        let server_key = ServerKey::from_config(self.config.server_public_key.as_deref())?;
        let subscription = self
            .push
            .subscribe(&server_key, &self.session_id)
            .await
            .map_err(|err| InitError::SubscriptionFailure(err.to_string()))?;
        self.store(&subscription, &provider_id, provider_type).await?;
        state.last_stored = Some((subscription.endpoint.clone(), Instant::now()));
        state.current = Some(subscription.clone());
        tracing::info!(
            event = "subscription_renewed",
            stale_endpoint = %stale_endpoint,
            endpoint = %subscription.endpoint,
            "push subscription renewed"
        );
        Ok(subscription)
    }

    async fn activate_agent(&self) -> InitResult<()> {
        if !self.agent.is_supported() {
            return Err(InitError::AgentUnavailable(
                "runtime has no background execution support".to_string(),
            ));
        }
        if self.agent.is_active() {
            return Ok(());
        }
        self.agent
            .register()
            .await
            .map_err(|err| InitError::AgentUnavailable(err.to_string()))
    }

    async fn ensure_permission(&self) -> InitResult<()> {
        let decided = match self.permission.state() {
            PermissionState::Prompt => self.permission.request().await,
            state => state,
        };
        if decided == PermissionState::Granted {
            return Ok(());
        }
        self.permission.show_enable_instructions();
        Err(InitError::PermissionDenied)
    }

    async fn obtain_subscription(&self, server_key: &ServerKey) -> InitResult<PushSubscription> {
        if !self.push.is_supported() {
            return Err(InitError::SubscriptionFailure(
                "push delivery not supported".to_string(),
            ));
        }
        match self.push.existing().await {
            Ok(Some(existing)) => {
                tracing::debug!(
                    event = "subscription_reused",
                    endpoint = %existing.endpoint,
                    "reusing existing push subscription"
                );
                return Ok(existing);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(
                    event = "subscription_lookup_failed",
                    error = %err,
                    "could not look up existing subscription, creating one"
                );
            }
        }
        self.push
            .subscribe(server_key, &self.session_id)
            .await
            .map_err(|err| InitError::SubscriptionFailure(err.to_string()))
    }

    async fn store(
        &self,
        subscription: &PushSubscription,
        provider_id: &str,
        provider_type: ProviderType,
    ) -> InitResult<()> {
        let record = SubscriptionRecord {
            provider_id: provider_id.to_string(),
            provider_type,
            status: SubscriptionStatus::Active,
            subscription: subscription.clone(),
            updated_at: chrono::Utc::now(),
        };
        self.backend
            .store(&record)
            .await
            .map_err(|err| InitError::SubscriptionFailure(format!("backend sync failed: {err}")))
    }
}
