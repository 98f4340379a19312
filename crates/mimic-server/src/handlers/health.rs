//! `GET /health` — the only unauthenticated endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::ServerContext;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub developers: usize,
    pub repositories: usize,
    pub commits: usize,
    pub pull_requests: usize,
    pub reviews: usize,
    pub issues: usize,
    pub usage_events: usize,
}

pub async fn health(State(ctx): State<ServerContext>) -> Json<HealthBody> {
    let counts = ctx.corpus.counts();
    Json(HealthBody {
        status: "healthy",
        uptime_seconds: ctx.started.elapsed().as_secs(),
        developers: counts.developers,
        repositories: counts.repositories,
        commits: counts.commits,
        pull_requests: counts.pull_requests,
        reviews: counts.reviews,
        issues: counts.issues,
        usage_events: counts.usage_events,
    })
}
