use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mimic_server::{ServerConfig, build};
use mimic_store::{Corpus, CorpusBuilder};
use mimic_types::{Commit, Developer, HourBand, UsageEvent, UsageStream};

const API_KEY: &str = "test-key";

fn dev(user_id: &str) -> Developer {
    Developer {
        user_id: user_id.into(),
        email: format!("{user_id}@example.com"),
        working_hours: HourBand { start: 0, end: 0 },
        ai_preference: 0.5,
        preferred_models: vec!["claude-sonnet-4.5".into()],
        seniority: None,
    }
}

fn commit(i: usize, user: &str) -> Commit {
    let at = Utc::now() - TimeDelta::minutes(i as i64 + 1);
    Commit {
        hash: format!("{i:016x}"),
        timestamp: at,
        user_id: user.into(),
        email: format!("{user}@example.com"),
        repo: "acme/api".into(),
        branch: "main".into(),
        message: format!("Change {i}"),
        total_lines: 40,
        tab_lines: 10,
        composer_lines: 10,
        non_ai_lines: 15,
        ingested_at: at,
    }
}

fn corpus_with_commits(n: usize) -> Arc<Corpus> {
    let mut builder = CorpusBuilder::new(
        vec![dev("alice"), dev("bob")],
        vec!["acme/api".into()],
        1,
    );
    for i in 0..n {
        let user = if i % 2 == 0 { "alice" } else { "bob" };
        builder.push_commit(commit(i, user));
        builder.push_usage(
            UsageStream::Model,
            UsageEvent {
                timestamp: Utc::now() - TimeDelta::minutes(i as i64 + 1),
                user_id: user.into(),
                value: "claude-sonnet-4.5".into(),
                count: 1,
            },
        );
    }
    Arc::new(builder.build().expect("corpus"))
}

fn app_with(corpus: Arc<Corpus>, config: ServerConfig) -> Router {
    build(corpus, &config)
}

fn app(corpus: Arc<Corpus>) -> Router {
    app_with(
        corpus,
        ServerConfig {
            api_key: API_KEY.to_string(),
            rate_limit_capacity: 10_000,
            rate_limit_window: Duration::from_secs(60),
            ..ServerConfig::default()
        },
    )
}

fn authed(uri: &str) -> Request<Body> {
    let credentials = BASE64.encode(format!("{API_KEY}:"));
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Basic {credentials}"))
        .body(Body::empty())
        .expect("request")
}

fn anonymous(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, headers, body)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_requires_no_auth() {
    let app = app(corpus_with_commits(3));
    let (status, body) = send_json(&app, anonymous("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["commits"], 3);
}

#[tokio::test]
async fn missing_auth_is_401_with_challenge() {
    let app = app(corpus_with_commits(1));
    let (status, headers, body) = send(&app, anonymous("/v1/analytics/team/dau")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let challenge = headers.get(header::WWW_AUTHENTICATE).expect("challenge");
    assert!(challenge.to_str().unwrap().starts_with("Basic"));
    let value: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(value["error"], "Unauthorized");
}

#[tokio::test]
async fn wrong_username_is_401_but_password_is_ignored() {
    let app = app(corpus_with_commits(1));

    let wrong_user = Request::builder()
        .uri("/v1/analytics/team/dau")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", BASE64.encode("intruder:whatever")),
        )
        .body(Body::empty())
        .expect("request");
    let (status, _) = send_json(&app, wrong_user).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let any_password = Request::builder()
        .uri("/v1/analytics/team/dau")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", BASE64.encode(format!("{API_KEY}:hunter2"))),
        )
        .body(Body::empty())
        .expect("request");
    let (status, _) = send_json(&app, any_password).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn date_shortcuts_resolve_against_now() {
    let app = app(corpus_with_commits(5));
    let before = (Utc::now() - TimeDelta::days(7)).date_naive();
    let (status, body) = send_json(
        &app,
        authed("/v1/analytics/team/dau?start_date=7d&end_date=now"),
    )
    .await;
    let after = (Utc::now() - TimeDelta::days(7)).date_naive();

    assert_eq!(status, StatusCode::OK);
    let echoed = body["params"]["start_date"].as_str().expect("start_date");
    assert!(
        echoed == before.to_string() || echoed == after.to_string(),
        "start_date {echoed} should be now minus 7 days"
    );
    assert_eq!(body["params"]["metric"], "dau");
    assert_eq!(body["params"]["page"], 1);
}

#[tokio::test]
async fn commits_paginate_in_disjoint_pages() {
    let app = app(corpus_with_commits(250));

    let (status, page1) = send_json(
        &app,
        authed("/v1/analytics/ai-code/commits?page_size=100"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page1["data"].as_array().expect("data").len(), 100);
    assert_eq!(page1["pagination"]["total_pages"], 3);
    assert_eq!(page1["pagination"]["has_next_page"], true);
    assert_eq!(page1["pagination"]["has_previous_page"], false);

    let (_, page3) = send_json(
        &app,
        authed("/v1/analytics/ai-code/commits?page_size=100&page=3"),
    )
    .await;
    assert_eq!(page3["data"].as_array().expect("data").len(), 50);
    assert_eq!(page3["pagination"]["has_next_page"], false);
    assert_eq!(page3["pagination"]["has_previous_page"], true);

    // Pages are disjoint: no hash from page 1 appears on page 3.
    let hashes = |v: &Value| {
        v["data"]
            .as_array()
            .expect("data")
            .iter()
            .map(|row| row["hash"].as_str().expect("hash").to_string())
            .collect::<Vec<_>>()
    };
    let first = hashes(&page1);
    for hash in hashes(&page3) {
        assert!(!first.contains(&hash));
    }
}

#[tokio::test]
async fn page_size_bounds_are_enforced() {
    let app = app(corpus_with_commits(5));

    let (status, _) = send_json(
        &app,
        authed("/v1/analytics/ai-code/commits?page_size=1000"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &app,
        authed("/v1/analytics/ai-code/commits?page_size=1001"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"].as_str().expect("error").contains("page_size"),
        "{body}"
    );
}

#[tokio::test]
async fn empty_corpus_page_one_is_empty_with_zero_pages() {
    let app = app(Arc::new(Corpus::empty()));
    let (status, body) = send_json(&app, authed("/v1/analytics/ai-code/commits")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().expect("data").len(), 0);
    assert_eq!(body["pagination"]["total_pages"], 0);
    assert_eq!(body["pagination"]["has_next_page"], false);
}

#[tokio::test]
async fn unknown_metric_is_400() {
    let app = app(corpus_with_commits(1));
    let (status, body) = send_json(&app, authed("/v1/analytics/team/velocity")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").contains("unknown metric"));
}

#[tokio::test]
async fn bad_date_is_400_naming_the_field() {
    let app = app(corpus_with_commits(1));
    let (status, body) = send_json(
        &app,
        authed("/v1/analytics/team/dau?start_date=whenever"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").contains("start_date"));
}

#[tokio::test]
async fn unknown_user_filter_is_404() {
    let app = app(corpus_with_commits(1));
    let (status, body) = send_json(
        &app,
        authed("/v1/analytics/team/tabs?users=alice,mallory"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error").contains("mallory"));
}

#[tokio::test]
async fn by_user_envelope_has_pagination_and_mappings() {
    let app = app(corpus_with_commits(6));
    let (status, body) = send_json(&app, authed("/v1/analytics/by-user/tabs")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["pagination"]["total_users"], 2);
    assert_eq!(body["pagination"]["page_size"], 50);
    let mappings = body["params"]["user_mappings"].as_array().expect("mappings");
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0]["user_id"], "alice");
    assert_eq!(mappings[0]["email"], "alice@example.com");

    let data = body["data"].as_object().expect("data map");
    assert!(data.contains_key("alice@example.com"));
    assert!(data.contains_key("bob@example.com"));
}

#[tokio::test]
async fn by_user_filter_restricts_emails_or_404s() {
    let app = app(corpus_with_commits(4));

    let (status, body) = send_json(&app, authed("/v1/analytics/by-user/tabs?users=alice")).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_object().expect("data map");
    assert!(data.contains_key("alice@example.com"));
    assert!(!data.contains_key("bob@example.com"));

    let (status, _) = send_json(&app, authed("/v1/analytics/by-user/tabs?users=ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn changes_endpoint_serves_flat_pr_rows() {
    let corpus = {
        let mut builder = CorpusBuilder::new(
            vec![dev("alice"), dev("bob")],
            vec!["acme/api".into()],
            1,
        );
        builder.push_commit(commit(0, "alice"));
        builder.push_pr(mimic_types::PullRequest {
            repo: "acme/api".into(),
            number: 1,
            title: "Change 0".into(),
            author: "alice".into(),
            created_at: Utc::now() - TimeDelta::minutes(1),
            first_review_at: None,
            merged_at: None,
            state: mimic_types::PrState::Open,
            commit_hashes: vec![format!("{:016x}", 0)],
            lines_added: 35,
            lines_deleted: 5,
            ai_ratio: 0.57,
            reviewers: vec!["bob".into()],
            revert_of: None,
        });
        Arc::new(builder.build().expect("corpus"))
    };
    let app = app(corpus);

    let (status, body) = send_json(&app, authed("/v1/analytics/ai-code/changes")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["number"], 1);
    assert_eq!(rows[0]["commit_count"], 1);
    assert_eq!(rows[0]["state"], "open");
    assert!(rows[0]["merged_at"].is_null());
    assert_eq!(body["params"]["metric"], "changes");

    let (status, headers, csv) = send(&app, authed("/v1/analytics/ai-code/changes.csv")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let text = String::from_utf8(csv).expect("utf8");
    assert!(text.starts_with("repo,number,title,author,created_at"));
}

#[tokio::test]
async fn by_user_leaderboard_rows_carry_rank() {
    let app = app(corpus_with_commits(4));
    let (status, body) = send_json(&app, authed("/v1/analytics/by-user/leaderboard")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"]["alice@example.com"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["rank"].as_u64().expect("rank") >= 1);
}

#[tokio::test]
async fn team_models_returns_distribution() {
    let app = app(corpus_with_commits(4));
    let (status, body) = send_json(&app, authed("/v1/analytics/team/models")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().expect("rows");
    assert_eq!(rows[0]["model"], "claude-sonnet-4.5");
    assert_eq!(rows[0]["count"], 4);
}

#[tokio::test]
async fn commits_csv_has_serde_headers() {
    let app = app(corpus_with_commits(3));
    let (status, headers, body) = send(
        &app,
        authed("/v1/analytics/ai-code/commits.csv?page_size=2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers
            .get(header::CONTENT_TYPE)
            .expect("content type")
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let text = String::from_utf8(body).expect("utf8");
    let header_line = text.lines().next().expect("header");
    assert!(header_line.starts_with("hash,timestamp,user_id,email,repo"));
    assert_eq!(text.lines().count(), 3, "header plus one page of rows");
}

#[tokio::test]
async fn repo_endpoints_return_raw_arrays() {
    let app = app(corpus_with_commits(3));

    let (status, body) = send_json(&app, authed("/repos/acme/api/commits")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array(), "raw array, no envelope");

    let (status, body) = send_json(&app, authed("/repos/acme/ghost/commits")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error").contains("acme/ghost"));

    let (status, body) = send_json(&app, authed("/repos/acme/api/pulls/99/reviews")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error").contains("#99"));

    let (status, body) = send_json(&app, authed("/repos/acme/api/issues")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
}

#[tokio::test]
async fn team_id_query_parameter_is_echoed() {
    let app = app(corpus_with_commits(2));
    let (status, body) = send_json(&app, authed("/v1/analytics/team/dau?team_id=42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["params"]["team_id"], 42);

    let (_, body) = send_json(&app, authed("/v1/analytics/team/dau")).await;
    assert_eq!(body["params"]["team_id"], 1, "defaults to the corpus team id");
}

#[tokio::test]
async fn members_returns_roster() {
    let app = app(corpus_with_commits(1));
    let (status, body) = send_json(&app, authed("/teams/members")).await;
    assert_eq!(status, StatusCode::OK);
    let roster = body.as_array().expect("array");
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0]["user_id"], "alice");
}

#[tokio::test]
async fn wrong_verb_gets_enveloped_405() {
    let app = app(corpus_with_commits(1));
    let request = Request::builder()
        .method("POST")
        .uri("/teams/members")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", BASE64.encode(format!("{API_KEY}:"))),
        )
        .body(Body::empty())
        .expect("request");
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "method not allowed");
}

#[tokio::test]
async fn unknown_endpoint_gets_enveloped_404() {
    let app = app(corpus_with_commits(1));
    let (status, body) = send_json(&app, authed("/v2/analytics/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown endpoint");
}

#[tokio::test]
async fn rate_limit_exhaustion_is_429_with_retry_after() {
    let app = app_with(
        corpus_with_commits(1),
        ServerConfig {
            api_key: API_KEY.to_string(),
            rate_limit_capacity: 2,
            rate_limit_window: Duration::from_secs(60),
            ..ServerConfig::default()
        },
    );

    for _ in 0..2 {
        let (status, _) = send_json(&app, authed("/teams/members")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = send(&app, authed("/teams/members")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = headers
        .get(header::RETRY_AFTER)
        .expect("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .expect("seconds");
    assert!((1..=60).contains(&retry));
    let value: Value = serde_json::from_slice(&body).expect("json");
    assert!(value["error"].as_str().expect("error").contains("rate limit"));
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = app(corpus_with_commits(1));
    let (_, headers, _) = send(&app, anonymous("/health")).await;
    let id = headers.get("x-request-id").expect("request id");
    assert_eq!(id.to_str().unwrap().len(), 36, "uuid format");

    let (_, headers2, _) = send(&app, anonymous("/health")).await;
    assert_ne!(headers2.get("x-request-id"), Some(id));
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let app = app_with(
        corpus_with_commits(1),
        ServerConfig {
            api_key: API_KEY.to_string(),
            rate_limit_capacity: 1,
            rate_limit_window: Duration::from_secs(60),
            ..ServerConfig::default()
        },
    );

    let (status, _) = send_json(&app, authed("/teams/members")).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..3 {
        let (status, _) = send_json(&app, anonymous("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
