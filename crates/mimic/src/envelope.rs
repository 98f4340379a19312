//! Response envelopes.
//!
//! Two envelope shapes exist and must stay byte-stable: the team envelope
//! (`data` array + echoed `params`) and the by-user envelope (`data` map
//! keyed by email + `pagination` + `params` with `user_mappings`). The
//! repo-level endpoints deliberately bypass both and return raw arrays —
//! downstream loaders rely on the distinction.
//!
//! Serde struct order here IS the wire order; reordering fields is a
//! breaking change for consumers that diff responses bytewise.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mimic_types::{PrState, PullRequest};

/// The error envelope used by every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Echoed request parameters, shared by the team and list envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    pub metric: String,
    pub team_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    pub page: usize,
    pub page_size: usize,
}

impl RequestParams {
    pub fn new(
        metric: &str,
        team_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        users: Option<Vec<String>>,
        page: usize,
        page_size: usize,
    ) -> Self {
        Self {
            metric: metric.to_string(),
            team_id,
            start_date,
            end_date,
            users,
            page,
            page_size,
        }
    }
}

/// `user_mappings` entry of the by-user envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMapping {
    pub user_id: String,
    pub email: String,
}

/// By-user `params`: the shared fields plus the id↔email mapping for the
/// emails present on this page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByUserParams {
    #[serde(flatten)]
    pub base: RequestParams,
    pub user_mappings: Vec<UserMapping>,
}

/// Pagination block for flat list endpoints (ai-code commits/changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Pagination block for the by-user envelope; pages run over users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPagination {
    pub page: usize,
    pub page_size: usize,
    pub total_users: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Team envelope: `{ data, params }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamEnvelope<T: Serialize> {
    pub data: Vec<T>,
    pub params: RequestParams,
}

/// Flat list envelope used by the ai-code endpoints: `{ data, pagination,
/// params }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEnvelope<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: Pagination,
    pub params: RequestParams,
}

/// By-user envelope: `{ data: { email: rows }, pagination, params }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ByUserEnvelope<T: Serialize> {
    pub data: BTreeMap<String, Vec<T>>,
    pub pagination: UserPagination,
    pub params: ByUserParams,
}

/// CSV-safe flattening of a [`PullRequest`] for the ai-code changes
/// endpoint; the JSON body uses the identical shape.
///
/// Absent timestamps serialize as explicit nulls (JSON) / empty cells (CSV)
/// rather than vanishing: the CSV renderer needs every row to carry the
/// same columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRow {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub first_review_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub state: PrState,
    pub commit_count: usize,
    pub lines_added: u32,
    pub lines_deleted: u32,
    pub ai_ratio: f64,
    pub revert_of: Option<u64>,
}

impl From<&PullRequest> for ChangeRow {
    fn from(pr: &PullRequest) -> Self {
        Self {
            repo: pr.repo.clone(),
            number: pr.number,
            title: pr.title.clone(),
            author: pr.author.clone(),
            created_at: pr.created_at,
            first_review_at: pr.first_review_at,
            merged_at: pr.merged_at,
            state: pr.state,
            commit_count: pr.commit_hashes.len(),
            lines_added: pr.lines_added,
            lines_deleted: pr.lines_deleted,
            ai_ratio: pr.ai_ratio,
            revert_of: pr.revert_of,
        }
    }
}

/// Slice one page out of `items`. Pages are 1-based; a page past the end is
/// empty rather than an error.
pub fn page_slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let start = (page.saturating_sub(1)).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

fn page_counts(total: usize, page: usize, page_size: usize) -> (usize, bool, bool) {
    let total_pages = total.div_ceil(page_size.max(1));
    let has_next = page < total_pages;
    let has_previous = page > 1 && total_pages > 0;
    (total_pages, has_next, has_previous)
}

/// Pagination metadata for a flat list.
///
/// ```
/// use mimic::envelope::paginate;
///
/// let meta = paginate(250, 1, 100);
/// assert_eq!(meta.total_pages, 3);
/// assert!(meta.has_next_page);
/// assert!(!meta.has_previous_page);
/// ```
pub fn paginate(total: usize, page: usize, page_size: usize) -> Pagination {
    let (total_pages, has_next_page, has_previous_page) = page_counts(total, page, page_size);
    Pagination {
        page,
        page_size,
        total_items: total,
        total_pages,
        has_next_page,
        has_previous_page,
    }
}

/// Pagination metadata for the by-user envelope.
pub fn paginate_users(total_users: usize, page: usize, page_size: usize) -> UserPagination {
    let (total_pages, has_next_page, has_previous_page) = page_counts(total_users, page, page_size);
    UserPagination {
        page,
        page_size,
        total_users,
        total_pages,
        has_next_page,
        has_previous_page,
    }
}

/// Assemble a by-user envelope: page over the email-sorted map, keep only
/// the current page's users, and echo their id↔email mapping.
pub fn by_user_envelope<T: Serialize>(
    all: BTreeMap<String, Vec<T>>,
    mappings: &BTreeMap<String, String>,
    base: RequestParams,
) -> ByUserEnvelope<T> {
    let emails: Vec<&String> = all.keys().collect();
    let page_emails: Vec<String> = page_slice(&emails, base.page, base.page_size)
        .iter()
        .map(|e| (*e).clone())
        .collect();
    let pagination = paginate_users(emails.len(), base.page, base.page_size);

    let user_mappings = page_emails
        .iter()
        .map(|email| UserMapping {
            user_id: mappings.get(email).cloned().unwrap_or_default(),
            email: email.clone(),
        })
        .collect();

    let mut data = all;
    data.retain(|email, _| page_emails.contains(email));

    ByUserEnvelope {
        data,
        pagination,
        params: ByUserParams {
            base,
            user_mappings,
        },
    }
}
