//! Aggregation: pure functions from query results (plus a date window) to
//! the metric rows the response builder serializes.
//!
//! Team-level folds take the slices the store's query layer returned, so a
//! `users=` filter upstream composes for free. Per-user folds take the
//! corpus directly and fan out over the roster. Daily series are dense:
//! every UTC date in the window appears, with zero values where nothing
//! happened. Distributions sort by count descending with a name tie-break.
//! Nothing here caches; every call is a fresh fold.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use mimic_store::Corpus;
use mimic_types::{Commit, FeatureKind, UsageEvent, UsageStream};

/// The metric families served by the team and by-user endpoint trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Dau,
    AgentEdits,
    Tabs,
    Models,
    ClientVersions,
    TopFileExtensions,
    Mcp,
    Commands,
    Plans,
    AskMode,
    Leaderboard,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::Dau,
        Metric::AgentEdits,
        Metric::Tabs,
        Metric::Models,
        Metric::ClientVersions,
        Metric::TopFileExtensions,
        Metric::Mcp,
        Metric::Commands,
        Metric::Plans,
        Metric::AskMode,
        Metric::Leaderboard,
    ];

    /// Parse the URL path segment. Unknown names are the caller's 400.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dau" => Some(Metric::Dau),
            "agent-edits" => Some(Metric::AgentEdits),
            "tabs" => Some(Metric::Tabs),
            "models" => Some(Metric::Models),
            "client-versions" => Some(Metric::ClientVersions),
            "top-file-extensions" => Some(Metric::TopFileExtensions),
            "mcp" => Some(Metric::Mcp),
            "commands" => Some(Metric::Commands),
            "plans" => Some(Metric::Plans),
            "ask-mode" => Some(Metric::AskMode),
            "leaderboard" => Some(Metric::Leaderboard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Dau => "dau",
            Metric::AgentEdits => "agent-edits",
            Metric::Tabs => "tabs",
            Metric::Models => "models",
            Metric::ClientVersions => "client-versions",
            Metric::TopFileExtensions => "top-file-extensions",
            Metric::Mcp => "mcp",
            Metric::Commands => "commands",
            Metric::Plans => "plans",
            Metric::AskMode => "ask-mode",
            Metric::Leaderboard => "leaderboard",
        }
    }

    /// The feature-stream kind behind this metric, when there is one.
    pub fn feature_kind(&self) -> Option<FeatureKind> {
        match self {
            Metric::Mcp => Some(FeatureKind::Mcp),
            Metric::Commands => Some(FeatureKind::Commands),
            Metric::Plans => Some(FeatureKind::Plans),
            Metric::AskMode => Some(FeatureKind::AskMode),
            _ => None,
        }
    }
}

/// One day of a dense daily series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCount {
    pub model: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCount {
    pub version: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionCount {
    pub extension: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub user_id: String,
    pub email: String,
    pub ai_lines: u64,
    pub total_lines: u64,
    pub commits: u64,
}

/// Every UTC date in `[from, to)`, inclusive of the day `to` falls on when
/// `to` has a time-of-day component.
fn window_dates(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let last = (to - TimeDelta::nanoseconds(1)).date_naive();
    let mut day = from.date_naive();
    while day <= last {
        dates.push(day);
        day = day + TimeDelta::days(1);
    }
    dates
}

fn densify(
    mut sums: BTreeMap<NaiveDate, u64>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<DailyPoint> {
    window_dates(from, to)
        .into_iter()
        .map(|date| DailyPoint {
            date,
            value: sums.remove(&date).unwrap_or(0),
        })
        .collect()
}

/// Distinct committing developers per day.
pub fn dau_daily(commits: &[&Commit], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DailyPoint> {
    let mut active: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for commit in commits {
        active
            .entry(commit.timestamp.date_naive())
            .or_default()
            .insert(commit.user_id.as_str());
    }
    let sums = active
        .into_iter()
        .map(|(date, users)| (date, users.len() as u64))
        .collect();
    densify(sums, from, to)
}

/// Composer ("agent edit") lines per day.
pub fn agent_edits_daily(
    commits: &[&Commit],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<DailyPoint> {
    commit_lines_daily(commits, from, to, |c| u64::from(c.composer_lines))
}

/// Tab-completion lines per day.
pub fn tabs_daily(commits: &[&Commit], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DailyPoint> {
    commit_lines_daily(commits, from, to, |c| u64::from(c.tab_lines))
}

fn commit_lines_daily(
    commits: &[&Commit],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    pick: impl Fn(&Commit) -> u64,
) -> Vec<DailyPoint> {
    let mut sums: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for commit in commits {
        *sums.entry(commit.timestamp.date_naive()).or_default() += pick(commit);
    }
    densify(sums, from, to)
}

/// Feature-stream counts per day for one kind.
pub fn feature_daily(
    events: &[&UsageEvent],
    kind: FeatureKind,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<DailyPoint> {
    let mut sums: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for event in events {
        if event.value == kind.as_str() {
            *sums.entry(event.timestamp.date_naive()).or_default() += u64::from(event.count);
        }
    }
    densify(sums, from, to)
}

fn distribution(events: &[&UsageEvent]) -> Vec<(String, u64)> {
    let mut sums: HashMap<&str, u64> = HashMap::new();
    for event in events {
        *sums.entry(event.value.as_str()).or_default() += u64::from(event.count);
    }
    let mut rows: Vec<(String, u64)> = sums
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Model usage summed across the window, heaviest first.
pub fn model_distribution(events: &[&UsageEvent]) -> Vec<ModelCount> {
    distribution(events)
        .into_iter()
        .map(|(model, count)| ModelCount { model, count })
        .collect()
}

/// Client versions summed across the window, heaviest first.
pub fn version_distribution(events: &[&UsageEvent]) -> Vec<VersionCount> {
    distribution(events)
        .into_iter()
        .map(|(version, count)| VersionCount { version, count })
        .collect()
}

/// File extensions summed across the window, heaviest first.
pub fn extension_distribution(events: &[&UsageEvent]) -> Vec<ExtensionCount> {
    distribution(events)
        .into_iter()
        .map(|(extension, count)| ExtensionCount { extension, count })
        .collect()
}

/// Developers ranked by AI-attributed lines over the window. Ties break on
/// user id so pagination is stable. `users`, when given, restricts the
/// board to that subset (ids or emails).
pub fn leaderboard(
    corpus: &Corpus,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    users: Option<&[String]>,
) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = corpus
        .developers_list()
        .iter()
        .filter(|dev| match users {
            None => true,
            Some(list) => list
                .iter()
                .any(|u| *u == dev.user_id || *u == dev.email),
        })
        .map(|dev| {
            let commits = corpus.commits_by_user(&dev.user_id, from, to);
            let ai_lines: u64 = commits.iter().map(|c| u64::from(c.ai_lines())).sum();
            let total_lines: u64 = commits.iter().map(|c| u64::from(c.total_lines)).sum();
            LeaderboardRow {
                rank: 0,
                user_id: dev.user_id.clone(),
                email: dev.email.clone(),
                ai_lines,
                total_lines,
                commits: commits.len() as u64,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.ai_lines
            .cmp(&a.ai_lines)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as u32 + 1;
    }
    rows
}

/// Per-user dense daily series for a daily-shaped metric, keyed by email in
/// sorted order.
pub fn per_user_daily(
    corpus: &Corpus,
    metric: Metric,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> BTreeMap<String, Vec<DailyPoint>> {
    let mut out = BTreeMap::new();
    for dev in corpus.developers_list() {
        let mut sums: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        match metric {
            Metric::Dau => {
                for commit in corpus.commits_by_user(&dev.user_id, from, to) {
                    sums.insert(commit.timestamp.date_naive(), 1);
                }
            }
            Metric::AgentEdits | Metric::Tabs => {
                for commit in corpus.commits_by_user(&dev.user_id, from, to) {
                    let lines = if metric == Metric::Tabs {
                        commit.tab_lines
                    } else {
                        commit.composer_lines
                    };
                    *sums.entry(commit.timestamp.date_naive()).or_default() += u64::from(lines);
                }
            }
            _ => {
                if let Some(kind) = metric.feature_kind() {
                    for event in
                        corpus.events_by_user_and_time(UsageStream::Feature, &dev.user_id, from, to)
                    {
                        if event.value == kind.as_str() {
                            *sums.entry(event.timestamp.date_naive()).or_default() +=
                                u64::from(event.count);
                        }
                    }
                }
            }
        }
        out.insert(dev.email.clone(), densify(sums, from, to));
    }
    out
}

/// Per-user model distribution, keyed by email.
pub fn per_user_models(
    corpus: &Corpus,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> BTreeMap<String, Vec<ModelCount>> {
    per_user_stream(corpus, UsageStream::Model, from, to, |rows| {
        rows.into_iter()
            .map(|(model, count)| ModelCount { model, count })
            .collect()
    })
}

/// Per-user client-version distribution, keyed by email.
pub fn per_user_versions(
    corpus: &Corpus,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> BTreeMap<String, Vec<VersionCount>> {
    per_user_stream(corpus, UsageStream::ClientVersion, from, to, |rows| {
        rows.into_iter()
            .map(|(version, count)| VersionCount { version, count })
            .collect()
    })
}

/// Per-user extension distribution, keyed by email.
pub fn per_user_extensions(
    corpus: &Corpus,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> BTreeMap<String, Vec<ExtensionCount>> {
    per_user_stream(corpus, UsageStream::FileExtension, from, to, |rows| {
        rows.into_iter()
            .map(|(extension, count)| ExtensionCount { extension, count })
            .collect()
    })
}

/// Per-user leaderboard rows (one row each), keyed by email.
pub fn per_user_leaderboard(
    corpus: &Corpus,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> BTreeMap<String, Vec<LeaderboardRow>> {
    leaderboard(corpus, from, to, None)
        .into_iter()
        .map(|row| (row.email.clone(), vec![row]))
        .collect()
}

fn per_user_stream<T>(
    corpus: &Corpus,
    stream: UsageStream,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    convert: impl Fn(Vec<(String, u64)>) -> Vec<T>,
) -> BTreeMap<String, Vec<T>> {
    let mut out = BTreeMap::new();
    for dev in corpus.developers_list() {
        let events = corpus.events_by_user_and_time(stream, &dev.user_id, from, to);
        out.insert(dev.email.clone(), convert(distribution(&events)));
    }
    out
}
