//! HTTP surface for mimic.
//!
//! The router serves the vendor-shaped analytics API over a frozen corpus.
//! Middleware stack, outermost first: panic recovery → request logger →
//! request timeout → (on authenticated routes) rate limiter → basic auth →
//! handler. `/health` stays outside the auth/rate-limit fence.
//!
//! Handlers receive a [`ServerContext`] with the shared corpus, API key,
//! and rate limiter; there is no process-wide state.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;

use mimic::envelope::ErrorBody;
use mimic_store::Corpus;

pub mod auth;
pub mod dates;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod request_log;

use error::ApiError;
use rate_limit::RateLimiter;

/// Server tuning knobs, all settable from the CLI/environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Basic-auth username clients must present.
    pub api_key: String,
    /// Token-bucket capacity per refill window.
    pub rate_limit_capacity: u32,
    /// Token-bucket refill window.
    pub rate_limit_window: Duration,
    /// Upper bound on handling plus writing a single response.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_key: "mimic-dev-key".to_string(),
            rate_limit_capacity: 120,
            rate_limit_window: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared state handed to middleware and handlers.
#[derive(Clone)]
pub struct ServerContext {
    pub corpus: Arc<Corpus>,
    pub api_key: Arc<String>,
    pub limiter: Arc<RateLimiter>,
    pub started: Instant,
}

impl ServerContext {
    pub fn new(corpus: Arc<Corpus>, config: &ServerConfig) -> Self {
        Self {
            corpus,
            api_key: Arc::new(config.api_key.clone()),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_capacity,
                config.rate_limit_window,
            )),
            started: Instant::now(),
        }
    }
}

/// Assemble the full router over a frozen corpus.
pub fn build(corpus: Arc<Corpus>, config: &ServerConfig) -> Router {
    let ctx = ServerContext::new(corpus, config);

    let protected = Router::new()
        .route("/v1/analytics/team/:metric", get(handlers::team::team_metric))
        .route(
            "/v1/analytics/by-user/:metric",
            get(handlers::by_user::by_user_metric),
        )
        .route("/v1/analytics/ai-code/commits", get(handlers::ai_code::commits))
        .route(
            "/v1/analytics/ai-code/commits.csv",
            get(handlers::ai_code::commits_csv),
        )
        .route("/v1/analytics/ai-code/changes", get(handlers::ai_code::changes))
        .route(
            "/v1/analytics/ai-code/changes.csv",
            get(handlers::ai_code::changes_csv),
        )
        .route("/teams/members", get(handlers::members::members))
        .route("/repos/:owner/:repo/pulls", get(handlers::repos::pulls))
        .route("/repos/:owner/:repo/commits", get(handlers::repos::commits))
        .route("/repos/:owner/:repo/issues", get(handlers::repos::issues))
        .route(
            "/repos/:owner/:repo/pulls/:number/reviews",
            get(handlers::repos::reviews),
        )
        // route_layer order: the last layer added runs first, so requests
        // hit the rate limiter before auth.
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::require_basic_auth,
        ))
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(protected)
        .fallback(unknown_endpoint)
        .layer(middleware::from_fn(envelope_method_not_allowed))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(middleware::from_fn(request_log::log_requests))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(ctx)
}

/// Serve until the shutdown future resolves, then drain gracefully. The
/// caller (the lifecycle controller) owns signal handling and the grace
/// deadline.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

async fn enforce_rate_limit(
    State(ctx): State<ServerContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    ctx.limiter
        .try_acquire()
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;
    Ok(next.run(request).await)
}

async fn unknown_endpoint() -> ApiError {
    ApiError::NotFound("unknown endpoint".to_string())
}

/// axum answers wrong-verb requests with an empty 405; rewrap it in the
/// error envelope the contract promises, keeping the `Allow` header.
async fn envelope_method_not_allowed(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replacement = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("method not allowed")),
    )
        .into_response();
    if let Some(allow) = allow {
        replacement.headers_mut().insert(header::ALLOW, allow);
    }
    replacement
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> axum::http::Response<axum::body::Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("internal server error")),
    )
        .into_response()
}
