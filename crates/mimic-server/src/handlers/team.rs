//! `GET /v1/analytics/team/{metric}` — the team envelope.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use mimic::aggregate::{self, Metric};
use mimic::envelope::{RequestParams, TeamEnvelope, page_slice};
use mimic_types::UsageStream;

use crate::ServerContext;
use crate::dates::{pagination, resolve_window};
use crate::error::ApiError;
use crate::handlers::{AnalyticsQuery, collect_commits, collect_events, resolve_users};

const DEFAULT_PAGE_SIZE: usize = 100;

pub async fn team_metric(
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

    let filter = query.user_filter();
    let devs = match &filter {
        Some(tokens) => Some(resolve_users(&ctx.corpus, tokens)?),
        None => None,
    };
    let devs = devs.as_deref();

    let params = RequestParams::new(
        metric.as_str(),
        query.team_id.unwrap_or_else(|| ctx.corpus.team_id()),
        window.start_label,
        window.end_label,
        filter.clone(),
        page,
        page_size,
    );

    let (from, to) = (window.from, window.to);
    let response = match metric {
        Metric::Dau => {
            let commits = collect_commits(&ctx.corpus, devs, from, to);
            envelope(aggregate::dau_daily(&commits, from, to), params)
        }
        Metric::AgentEdits => {
            let commits = collect_commits(&ctx.corpus, devs, from, to);
            envelope(aggregate::agent_edits_daily(&commits, from, to), params)
        }
        Metric::Tabs => {
            let commits = collect_commits(&ctx.corpus, devs, from, to);
            envelope(aggregate::tabs_daily(&commits, from, to), params)
        }
        Metric::Models => {
            let events = collect_events(&ctx.corpus, UsageStream::Model, devs, from, to);
            envelope(aggregate::model_distribution(&events), params)
        }
        Metric::ClientVersions => {
            let events = collect_events(&ctx.corpus, UsageStream::ClientVersion, devs, from, to);
            envelope(aggregate::version_distribution(&events), params)
        }
        Metric::TopFileExtensions => {
            let events = collect_events(&ctx.corpus, UsageStream::FileExtension, devs, from, to);
            envelope(aggregate::extension_distribution(&events), params)
        }
        Metric::Mcp | Metric::Commands | Metric::Plans | Metric::AskMode => {
            let events = collect_events(&ctx.corpus, UsageStream::Feature, devs, from, to);
            let kind = metric
                .feature_kind()
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("feature metric without kind")))?;
            envelope(aggregate::feature_daily(&events, kind, from, to), params)
        }
        Metric::Leaderboard => envelope(
            aggregate::leaderboard(&ctx.corpus, from, to, filter.as_deref()),
            params,
        ),
    };
    Ok(response)
}

fn envelope<T: Serialize + Clone>(rows: Vec<T>, params: RequestParams) -> Response {
    let data = page_slice(&rows, params.page, params.page_size).to_vec();
    Json(TeamEnvelope { data, params }).into_response()
}
