//! Repo-level raw-array endpoints.
//!
//! These deliberately return bare JSON arrays — no envelope — because the
//! downstream ETL loader consumes them in the upstream vendor's raw shape.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use mimic_types::{Commit, Issue, PullRequest, Review};

use crate::ServerContext;
use crate::error::ApiError;

fn full_name(owner: &str, repo: &str) -> String {
    format!("{owner}/{repo}")
}

fn require_repo(ctx: &ServerContext, owner: &str, repo: &str) -> Result<String, ApiError> {
    let full = full_name(owner, repo);
    if ctx.corpus.has_repository(&full) {
        Ok(full)
    } else {
        Err(ApiError::NotFound(format!("unknown repository: {full}")))
    }
}

/// `GET /repos/{owner}/{repo}/pulls`
pub async fn pulls(
    State(ctx): State<ServerContext>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let full = require_repo(&ctx, &owner, &repo)?;
    let rows: Vec<PullRequest> = ctx
        .corpus
        .prs_by_repo(&full)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows).into_response())
}

/// `GET /repos/{owner}/{repo}/commits`
pub async fn commits(
    State(ctx): State<ServerContext>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let full = require_repo(&ctx, &owner, &repo)?;
    let rows: Vec<Commit> = ctx
        .corpus
        .commits_by_repo(&full)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows).into_response())
}

/// `GET /repos/{owner}/{repo}/issues`
pub async fn issues(
    State(ctx): State<ServerContext>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let full = require_repo(&ctx, &owner, &repo)?;
    let rows: Vec<Issue> = ctx
        .corpus
        .issues_by_repo(&full)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows).into_response())
}

/// `GET /repos/{owner}/{repo}/pulls/{number}/reviews`
pub async fn reviews(
    State(ctx): State<ServerContext>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
) -> Result<Response, ApiError> {
    let full = require_repo(&ctx, &owner, &repo)?;
    if ctx.corpus.pr(&full, number).is_none() {
        return Err(ApiError::NotFound(format!(
            "unknown pull request: {full}#{number}"
        )));
    }
    let rows: Vec<Review> = ctx
        .corpus
        .reviews_by_pr(&full, number)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows).into_response())
}
