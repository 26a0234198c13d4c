use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use alertline::config::Config;
use alertline::notifications::AlertService;
use alertline::platform::Platform;
use alertline::platform::http::{HttpPushRelay, HttpSubscriptionBackend, RelayPushManager};
use alertline::platform::terminal::{
    DEFAULT_TITLE, LocalAgent, LoggedDeepLinks, PolicyPermission, TerminalAlerts, TerminalBell,
    TerminalModal, TerminalTitle,
};
use alertline::server::app::{bind_address, build_router};
use alertline::server::state::AppState;

fn init_tracing(configured: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn build_platform(config: &Config, modal: Arc<TerminalModal>) -> Result<Platform> {
    Ok(Platform {
        permission: Arc::new(PolicyPermission::new(config.permission_policy())),
        agent: Arc::new(LocalAgent::default()),
        push_manager: Arc::new(RelayPushManager::new(config.relay_url())?),
        push_sender: Arc::new(HttpPushRelay::new(config.relay_url())?),
        subscription_backend: Arc::new(HttpSubscriptionBackend::new(config.backend_url())?),
        alert_surface: Arc::new(TerminalAlerts),
        audio: Arc::new(TerminalBell),
        modal,
        title: Arc::new(TerminalTitle::new(DEFAULT_TITLE)),
        deep_links: Arc::new(LoggedDeepLinks),
    })
}

/// `ack [id]` acknowledges an open alert, `quit` stops the daemon.
async fn read_commands(modal: Arc<TerminalModal>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => line,
        };
        let Ok(Some(line)) = line else {
            return;
        };
        let mut words = line.split_whitespace();
        match words.next() {
            Some("ack") => {
                if !modal.acknowledge(words.next()) {
                    eprintln!("open alerts: {:?}", modal.open_ids());
                }
            }
            Some("quit") | Some("exit") => {
                shutdown.cancel();
                return;
            }
            Some(other) => eprintln!("unknown command `{other}`"),
            None => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, config_path) = Config::discover(explicit.as_deref())?;
    init_tracing(config.log_level());
    match &config_path {
        Some(path) => tracing::info!(path = %path.display(), "config loaded"),
        None => tracing::info!("no config file, using defaults"),
    }

    let modal = Arc::new(TerminalModal::default());
    let platform = build_platform(&config, Arc::clone(&modal))?;
    let alerts = Arc::new(AlertService::new(platform, config.alert_settings()));

    let provider_type = config.provider_type()?;
    if !alerts.initialize(&config.provider_id(), provider_type).await {
        tracing::warn!("continuing with degraded delivery");
    }

    let shutdown = CancellationToken::new();
    let commands = tokio::spawn(read_commands(Arc::clone(&modal), shutdown.clone()));

    let addr = bind_address(&config.bind());
    let router = build_router(AppState::new(Arc::clone(&alerts), config.server.clone()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "alert api listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = serve_shutdown.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;

    shutdown.cancel();
    commands.abort();
    alerts.destroy().await;
    Ok(())
}
