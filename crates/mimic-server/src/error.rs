//! Request-scoped error kinds and their HTTP rendering.
//!
//! Every handler failure maps to one of these kinds; the `IntoResponse`
//! impl renders the `{"error": msg}` envelope with the matching status and
//! any side-channel headers (`WWW-Authenticate`, `Retry-After`). Seed and
//! config errors never reach this type; they abort startup before the
//! router exists.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use mimic::envelope::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or wrong basic-auth username.
    #[error("Unauthorized")]
    Unauthorized,
    /// Token bucket exhausted; carries the suggested retry delay.
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    /// Unparseable dates, out-of-range pagination, unknown metric.
    #[error("{0}")]
    BadRequest(String),
    /// Unknown user, repository, or PR number.
    #[error("{0}")]
    NotFound(String),
    /// Anything unexpected; details go to the log, not the client.
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref error) = self {
            tracing::error!(?error, "handler failed");
        }

        let status = self.status();
        let body = match &self {
            // The envelope hides internal details; the log has them.
            ApiError::Internal(_) => ErrorBody::new("internal server error"),
            other => ErrorBody::new(other.to_string()),
        };

        let mut response = (status, Json(body)).into_response();
        match self {
            ApiError::Unauthorized => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"mimic\""),
                );
            }
            ApiError::RateLimited { retry_after_secs } => {
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            _ => {}
        }
        response
    }
}
