//! `GET /v1/analytics/ai-code/{commits,changes}` and their `.csv` twins.
//!
//! These are flat list endpoints: `{ data, pagination, params }` in JSON,
//! or the same page of rows as CSV with serde field names for headers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use mimic::envelope::{ChangeRow, ListEnvelope, RequestParams, page_slice, paginate};
use mimic::render::to_csv;
use mimic_types::Commit;

use crate::ServerContext;
use crate::dates::{DateWindow, pagination, resolve_window};
use crate::error::ApiError;
use crate::handlers::{AnalyticsQuery, collect_commits, resolve_users};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Window, page, and user filter shared by the four endpoints.
struct ListRequest {
    window: DateWindow,
    page: usize,
    page_size: usize,
    filter: Option<Vec<String>>,
    team_id: Option<u64>,
}

fn parse_request(ctx: &ServerContext, query: &AnalyticsQuery) -> Result<ListRequest, ApiError> {
    let window = resolve_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        Utc::now(),
    )
    .map_err(ApiError::BadRequest)?;
    let (page, page_size) =
        pagination(query.page, query.page_size, DEFAULT_PAGE_SIZE).map_err(ApiError::BadRequest)?;
    let filter = query.user_filter();
    if let Some(tokens) = &filter {
        resolve_users(&ctx.corpus, tokens)?;
    }
    Ok(ListRequest {
        window,
        page,
        page_size,
        filter,
        team_id: query.team_id,
    })
}

fn commit_rows(ctx: &ServerContext, req: &ListRequest) -> Result<Vec<Commit>, ApiError> {
    let devs = match &req.filter {
        Some(tokens) => Some(resolve_users(&ctx.corpus, tokens)?),
        None => None,
    };
    Ok(
        collect_commits(&ctx.corpus, devs.as_deref(), req.window.from, req.window.to)
            .into_iter()
            .cloned()
            .collect(),
    )
}

fn change_rows(ctx: &ServerContext, req: &ListRequest) -> Result<Vec<ChangeRow>, ApiError> {
    let authors: Option<Vec<String>> = match &req.filter {
        Some(tokens) => Some(
            resolve_users(&ctx.corpus, tokens)?
                .into_iter()
                .map(|dev| dev.user_id.clone())
                .collect(),
        ),
        None => None,
    };
    Ok(ctx
        .corpus
        .prs_by_time(req.window.from, req.window.to)
        .into_iter()
        .filter(|pr| match &authors {
            None => true,
            Some(list) => list.contains(&pr.author),
        })
        .map(ChangeRow::from)
        .collect())
}

fn json_list<T: Serialize + Clone>(rows: Vec<T>, metric: &str, ctx: &ServerContext, req: &ListRequest) -> Response {
    let data = page_slice(&rows, req.page, req.page_size).to_vec();
    let envelope = ListEnvelope {
        data,
        pagination: paginate(rows.len(), req.page, req.page_size),
        params: RequestParams::new(
            metric,
            req.team_id.unwrap_or_else(|| ctx.corpus.team_id()),
            req.window.start_label,
            req.window.end_label,
            req.filter.clone(),
            req.page,
            req.page_size,
        ),
    };
    Json(envelope).into_response()
}

fn csv_list<T: Serialize>(rows: Vec<T>, req: &ListRequest) -> Result<Response, ApiError> {
    let page = page_slice(&rows, req.page, req.page_size);
    let body = to_csv(page).map_err(ApiError::Internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    )
        .into_response())
}

pub async fn commits(
    State(ctx): State<ServerContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, ApiError> {
    let req = parse_request(&ctx, &query)?;
    let rows = commit_rows(&ctx, &req)?;
    Ok(json_list(rows, "commits", &ctx, &req))
}

pub async fn commits_csv(
    State(ctx): State<ServerContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, ApiError> {
    let req = parse_request(&ctx, &query)?;
    let rows = commit_rows(&ctx, &req)?;
    csv_list(rows, &req)
}

pub async fn changes(
    State(ctx): State<ServerContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, ApiError> {
    let req = parse_request(&ctx, &query)?;
    let rows = change_rows(&ctx, &req)?;
    Ok(json_list(rows, "changes", &ctx, &req))
}

pub async fn changes_csv(
    State(ctx): State<ServerContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, ApiError> {
    let req = parse_request(&ctx, &query)?;
    let rows = change_rows(&ctx, &req)?;
    csv_list(rows, &req)
}
