use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::{CorsConfig, DEFAULT_BIND};
use crate::server::routes;
use crate::server::state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        state
            .server_config
            .as_ref()
            .and_then(|cfg| cfg.cors.as_ref()),
    );

    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status))
        .route("/api/v1/channels", get(routes::list_channels))
        .route(
            "/api/v1/alerts",
            get(routes::list_pending).post(routes::send_alert),
        )
        .route("/api/v1/alerts/history", get(routes::history))
        .route("/api/v1/alerts/{id}/ack", post(routes::acknowledge))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TraceLayer::new_for_http()),
        )
        .layer(cors_layer)
}

pub fn bind_address(bind: &str) -> SocketAddr {
    bind.parse().unwrap_or_else(|_| {
        tracing::warn!(bind, fallback = DEFAULT_BIND, "invalid bind address");
        SocketAddr::from(([127, 0, 0, 1], 8787))
    })
}

fn build_cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
    let Some(config) = config.filter(|cfg| !cfg.allowed_origins.is_empty()) else {
        return CorsLayer::new().allow_origin(Any);
    };
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect::<Vec<_>>();
    CorsLayer::new().allow_origin(origins)
}
