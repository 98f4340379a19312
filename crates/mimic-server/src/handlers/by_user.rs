//! `GET /v1/analytics/by-user/{metric}` — the by-user envelope.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use mimic::aggregate::{self, Metric};
use mimic::envelope::{RequestParams, by_user_envelope};

use crate::ServerContext;
use crate::dates::{pagination, resolve_window};
use crate::error::ApiError;
use crate::handlers::{AnalyticsQuery, resolve_users};

const DEFAULT_PAGE_SIZE: usize = 50;

pub async fn by_user_metric(
    State(ctx): State<ServerContext>,
    Path(metric): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, ApiError> {
    let metric = Metric::parse(&metric)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown metric: {metric}")))?;
    let window = resolve_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        Utc::now(),
    )
    .map_err(ApiError::BadRequest)?;
    let (page, page_size) =
        pagination(query.page, query.page_size, DEFAULT_PAGE_SIZE).map_err(ApiError::BadRequest)?;

    // Resolve the filter up front so unknown users 404 before any folding.
    let filter = query.user_filter();
    let keep_emails: Option<Vec<String>> = match &filter {
        Some(tokens) => Some(
            resolve_users(&ctx.corpus, tokens)?
                .into_iter()
                .map(|dev| dev.email.clone())
                .collect(),
        ),
        None => None,
    };

    let mappings: BTreeMap<String, String> = ctx
        .corpus
        .developers_list()
        .iter()
        .map(|dev| (dev.email.clone(), dev.user_id.clone()))
        .collect();

    let params = RequestParams::new(
        metric.as_str(),
        query.team_id.unwrap_or_else(|| ctx.corpus.team_id()),
        window.start_label,
        window.end_label,
        filter,
        page,
        page_size,
    );

    let (from, to) = (window.from, window.to);
    let response = match metric {
        Metric::Models => envelope(
            aggregate::per_user_models(&ctx.corpus, from, to),
            keep_emails,
            &mappings,
            params,
        ),
        Metric::ClientVersions => envelope(
            aggregate::per_user_versions(&ctx.corpus, from, to),
            keep_emails,
            &mappings,
            params,
        ),
        Metric::TopFileExtensions => envelope(
            aggregate::per_user_extensions(&ctx.corpus, from, to),
            keep_emails,
            &mappings,
            params,
        ),
        Metric::Leaderboard => envelope(
            aggregate::per_user_leaderboard(&ctx.corpus, from, to),
            keep_emails,
            &mappings,
            params,
        ),
        daily => envelope(
            aggregate::per_user_daily(&ctx.corpus, daily, from, to),
            keep_emails,
            &mappings,
            params,
        ),
    };
    Ok(response)
}

fn envelope<T: Serialize>(
    mut all: BTreeMap<String, Vec<T>>,
    keep_emails: Option<Vec<String>>,
    mappings: &BTreeMap<String, String>,
    params: RequestParams,
) -> Response {
    if let Some(keep) = keep_emails {
        all.retain(|email, _| keep.contains(email));
    }
    Json(by_user_envelope(all, mappings, params)).into_response()
}
