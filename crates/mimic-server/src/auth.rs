//! HTTP Basic auth.
//!
//! The vendor contract authenticates with the API key as the basic-auth
//! *username*; the password field is ignored entirely. Failures get a 401
//! with `WWW-Authenticate: Basic` and the error envelope.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::ServerContext;
use crate::error::ApiError;

/// Middleware guarding every authenticated route.
pub async fn require_basic_auth(
    State(ctx): State<ServerContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match header {
        Some(value) if username_matches(value, &ctx.api_key) => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Check a raw `Authorization` header value against the configured key.
fn username_matches(header_value: &str, api_key: &str) -> bool {
    let Some(encoded) = header_value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = BASE64.decode(encoded.trim()) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };
    // Only the username is checked; anything after the first colon is the
    // ignored password.
    let username = credentials.split(':').next().unwrap_or_default();
    !api_key.is_empty() && username == api_key
}
