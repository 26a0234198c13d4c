use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::notifications::types::AlertRequest;

use super::middleware::check_api_key;
use super::state::AppState;

fn ensure_api_key(headers: &HeaderMap, state: &AppState) -> Result<(), Box<Response>> {
    check_api_key(
        headers,
        state
            .server_config
            .as_ref()
            .and_then(|cfg| cfg.auth.as_ref()),
    )
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub id: String,
    pub acknowledged: bool,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.alerts.channel_report();
    let available: Vec<&str> = report.available().map(|c| c.name.as_str()).collect();
    let subscribed = state.alerts.subscriptions().current().await.is_some();
    Json(serde_json::json!({
        "initialized": state.alerts.is_initialized(),
        "sweeping": state.alerts.queue().is_running().await,
        "pending": state.alerts.queue().len().await,
        "subscribed": subscribed,
        "available_channels": available,
        "background_capable": report.background_capable(),
    }))
}

pub async fn list_channels(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = ensure_api_key(&headers, &state) {
        return *response;
    }
    (StatusCode::OK, Json(state.alerts.channel_report())).into_response()
}

pub async fn send_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AlertRequest>,
) -> Response {
    if let Err(response) = ensure_api_key(&headers, &state) {
        return *response;
    }
    if payload.title.trim().is_empty() || payload.target_provider_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "title and target_provider_id are required".to_string(),
            }),
        )
            .into_response();
    }

    let id = state.alerts.send_critical_notification(payload).await;
    (StatusCode::ACCEPTED, Json(AcceptedResponse { id })).into_response()
}

pub async fn list_pending(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = ensure_api_key(&headers, &state) {
        return *response;
    }
    (StatusCode::OK, Json(state.alerts.pending().await)).into_response()
}

pub async fn history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = ensure_api_key(&headers, &state) {
        return *response;
    }
    (StatusCode::OK, Json(state.alerts.records().await)).into_response()
}

pub async fn acknowledge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = ensure_api_key(&headers, &state) {
        return *response;
    }
    let acknowledged = state.alerts.acknowledge(&id).await;
    (StatusCode::OK, Json(AckResponse { id, acknowledged })).into_response()
}
