//! Endpoint handlers and the query-string plumbing they share.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use mimic_store::Corpus;
use mimic_types::{Commit, Developer, UsageEvent, UsageStream};

use crate::error::ApiError;

pub mod ai_code;
pub mod by_user;
pub mod health;
pub mod members;
pub mod repos;
pub mod team;

/// Query parameters shared by the analytics endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Single-user filter (id or email).
    pub user: Option<String>,
    /// Comma-separated multi-user filter (ids or emails).
    pub users: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Echoed into response params; defaults to the corpus team id.
    pub team_id: Option<u64>,
}

impl AnalyticsQuery {
    /// Merge `user` and `users` into one filter list, preserving order.
    pub fn user_filter(&self) -> Option<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        if let Some(user) = &self.user {
            if !user.is_empty() {
                out.push(user.clone());
            }
        }
        if let Some(users) = &self.users {
            out.extend(
                users
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        (!out.is_empty()).then_some(out)
    }
}

/// Resolve a user token (id or email) against the roster.
pub fn resolve_user<'a>(corpus: &'a Corpus, token: &str) -> Option<&'a Developer> {
    corpus
        .developer_by_id(token)
        .or_else(|| corpus.developer_by_email(token))
}

/// Resolve every token or fail with the 404 the error table prescribes.
pub fn resolve_users<'a>(
    corpus: &'a Corpus,
    tokens: &[String],
) -> Result<Vec<&'a Developer>, ApiError> {
    tokens
        .iter()
        .map(|token| {
            resolve_user(corpus, token)
                .ok_or_else(|| ApiError::NotFound(format!("unknown user: {token}")))
        })
        .collect()
}

/// Commits in the window, optionally restricted to a user set, ascending by
/// `(timestamp, hash)` either way.
pub fn collect_commits<'a>(
    corpus: &'a Corpus,
    users: Option<&[&Developer]>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<&'a Commit> {
    match users {
        None => corpus.commits_by_time(from, to),
        Some(devs) => {
            let mut commits: Vec<&Commit> = devs
                .iter()
                .flat_map(|dev| corpus.commits_by_user(&dev.user_id, from, to))
                .collect();
            commits.sort_by(|a, b| (a.timestamp, &a.hash).cmp(&(b.timestamp, &b.hash)));
            commits
        }
    }
}

/// Usage events in the window, optionally restricted to a user set,
/// ascending by `(timestamp, user_id)` either way.
pub fn collect_events<'a>(
    corpus: &'a Corpus,
    stream: UsageStream,
    users: Option<&[&Developer]>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<&'a UsageEvent> {
    match users {
        None => corpus.events_by_time(stream, from, to),
        Some(devs) => {
            let mut events: Vec<&UsageEvent> = devs
                .iter()
                .flat_map(|dev| corpus.events_by_user_and_time(stream, &dev.user_id, from, to))
                .collect();
            events.sort_by(|a, b| {
                (a.timestamp, &a.user_id, &a.value).cmp(&(b.timestamp, &b.user_id, &b.value))
            });
            events
        }
    }
}
