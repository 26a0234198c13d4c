use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::AuthConfig;

/// Accepts `x-api-key: <key>` or `authorization: Bearer <key>`. No configured keys means open.
pub fn check_api_key(headers: &HeaderMap, auth: Option<&AuthConfig>) -> Result<(), Box<Response>> {
    let Some(auth) = auth.filter(|auth| !auth.api_keys.is_empty()) else {
        return Ok(());
    };

    let presented = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .map(|value| value.to_str());
    let key = match presented {
        None => return Err(unauthorized("missing api key")),
        Some(Err(_)) => return Err(unauthorized("invalid api key")),
        Some(Ok(value)) => value.strip_prefix("Bearer ").unwrap_or(value),
    };
    if auth.api_keys.iter().any(|allowed| allowed == key) {
        Ok(())
    } else {
        Err(unauthorized("invalid api key"))
    }
}

fn unauthorized(message: &'static str) -> Box<Response> {
    Box::new((StatusCode::UNAUTHORIZED, message).into_response())
}
