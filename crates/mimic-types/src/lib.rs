//! Core domain types for the mimic corpus.
//!
//! Every entity the generation pipeline fabricates and the HTTP surface
//! serves is defined here: developers, commits, pull requests, reviews,
//! issues, and the four categorical usage streams. The structs double as
//! the wire shapes. Serde field order is the JSON field order, and the CSV
//! renderer reuses the same field identifiers as column headers, so nothing
//! in this crate may be reordered casually.

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Model names the seed validator recognizes. Unknown names are soft
/// warnings, not failures.
pub const KNOWN_MODELS: &[&str] = &[
    "claude-sonnet-4.5",
    "claude-opus-4.1",
    "claude-haiku-4.5",
    "gpt-4o",
    "gpt-4.1",
    "gpt-5",
    "o3",
    "gemini-2.5-pro",
    "deepseek-v3",
];

/// Client IDE versions emitted by the version stream, oldest first.
pub const CLIENT_VERSIONS: &[&str] = &["1.6.3", "1.7.0", "1.7.2", "1.8.0", "1.8.1"];

/// File extensions with relative weights for the extension stream.
pub const FILE_EXTENSIONS: &[(&str, u32)] = &[
    ("ts", 24),
    ("tsx", 18),
    ("py", 16),
    ("go", 10),
    ("rs", 8),
    ("js", 7),
    ("java", 5),
    ("rb", 4),
    ("sql", 3),
    ("css", 2),
    ("md", 2),
    ("yaml", 1),
];

/// A developer's allowed commit hours, as hours of the day. `start > end`
/// wraps past midnight.
///
/// ```
/// use mimic_types::HourBand;
///
/// let night = HourBand { start: 22, end: 6 };
/// assert!(night.contains(23));
/// assert!(night.contains(5));
/// assert!(!night.contains(12));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBand {
    pub start: u8,
    pub end: u8,
}

impl HourBand {
    /// Whether the given hour of day (0..=23) falls inside the band.
    ///
    /// The band is half-open: `start` is in, `end` is out. A band with
    /// `start == end` covers the whole day.
    pub fn contains(&self, hour: u32) -> bool {
        let (start, end) = (self.start as u32, self.end as u32);
        if start == end {
            true
        } else if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    /// Whether a timestamp's UTC hour falls inside the band.
    pub fn contains_time(&self, ts: DateTime<Utc>) -> bool {
        self.contains(ts.hour())
    }

    /// Number of in-band hours per day.
    pub fn hours_per_day(&self) -> u32 {
        let (start, end) = (self.start as u32, self.end as u32);
        if start == end {
            24
        } else if start < end {
            end - start
        } else {
            24 - start + end
        }
    }
}

/// Seniority tag carried through from the seed roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
    Staff,
}

impl Seniority {
    /// Multiplier applied to a developer's commit rate. Untagged developers
    /// sit at 1.0.
    pub fn rate_factor(tag: Option<Seniority>) -> f64 {
        match tag {
            None | Some(Seniority::Mid) => 1.0,
            Some(Seniority::Junior) => 0.85,
            Some(Seniority::Senior) => 1.1,
            Some(Seniority::Staff) => 1.15,
        }
    }
}

/// A member of the fabricated team. Immutable after seed load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub user_id: String,
    pub email: String,
    pub working_hours: HourBand,
    /// Target expected AI fraction of added lines per commit, in [0, 1].
    pub ai_preference: f64,
    /// Ordered model preference; the first entry is weighted heaviest.
    pub preferred_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<Seniority>,
}

/// Categorical commit-rate knob, mapped to a Poisson rate in events/hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Velocity {
    Low,
    #[default]
    Medium,
    High,
}

impl Velocity {
    /// Base Poisson rate for this velocity, in events per hour.
    pub fn events_per_hour(&self) -> f64 {
        match self {
            Velocity::Low => 5.0,
            Velocity::Medium => 25.0,
            Velocity::High => 50.0,
        }
    }
}

impl fmt::Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Velocity::Low => "low",
            Velocity::Medium => "medium",
            Velocity::High => "high",
        };
        f.write_str(s)
    }
}

/// One fabricated commit. `total_lines >= tab_lines + composer_lines +
/// non_ai_lines`; the remainder is deletions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Content-address stand-in: 16 lowercase hex chars, unique corpus-wide.
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub email: String,
    pub repo: String,
    pub branch: String,
    pub message: String,
    pub total_lines: u32,
    pub tab_lines: u32,
    pub composer_lines: u32,
    pub non_ai_lines: u32,
    /// Equal to `timestamp`; the vendor contract carries both.
    pub ingested_at: DateTime<Utc>,
}

impl Commit {
    /// AI-attributed added lines (tab + composer).
    pub fn ai_lines(&self) -> u32 {
        self.tab_lines + self.composer_lines
    }
}

/// Pull request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// One fabricated pull request. Numbers are contiguous per repo from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_review_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    pub state: PrState,
    /// Non-empty; every hash resolves to a stored commit in `repo`.
    pub commit_hashes: Vec<String>,
    pub lines_added: u32,
    pub lines_deleted: u32,
    /// Line-weighted average of the constituent commits' AI fractions.
    pub ai_ratio: f64,
    pub reviewers: Vec<String>,
    /// For revert PRs: the number of the PR being reverted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_of: Option<u64>,
}

/// Review verdict on a PR iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

/// One review event in a PR's thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique corpus-wide, assigned in generation order.
    pub id: u64,
    pub repo: String,
    pub pr_number: u64,
    pub reviewer: String,
    pub submitted_at: DateTime<Utc>,
    pub state: ReviewState,
    /// Increases across the PR's review thread, starting at 1.
    pub iteration: u32,
}

/// Whether an issue records a plain bug fix or an actual revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Bug,
    Revert,
}

/// A defect report linked back to the merged PR that introduced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub repo: String,
    pub pr_number: u64,
    pub opened_at: DateTime<Utc>,
    pub kind: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// The four categorical per-user streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStream {
    Model,
    ClientVersion,
    FileExtension,
    Feature,
}

/// Sub-kinds of the feature stream; the wire names are the metric names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    Mcp,
    Commands,
    Plans,
    AskMode,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Mcp,
        FeatureKind::Commands,
        FeatureKind::Plans,
        FeatureKind::AskMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Mcp => "mcp",
            FeatureKind::Commands => "commands",
            FeatureKind::Plans => "plans",
            FeatureKind::AskMode => "ask-mode",
        }
    }
}

/// One event in a categorical stream: who, when, which category, how many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    /// Category value: a model name, a client version, a file extension, or
    /// a [`FeatureKind`] wire name.
    pub value: String,
    pub count: u32,
}

/// Tuning parameters for the generation pipeline. All knobs the CLI and the
/// seed document can influence funnel through this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenParams {
    /// Length of the generation window ending at `now`, in days.
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default)]
    pub velocity: Velocity,
    /// Symmetric per-developer rate jitter: multiplier uniform in [1-v, 1+v].
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Replicate the roster up to this many developers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developers: Option<usize>,
    /// Per-developer commit cap across the whole window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_commits_per_dev: Option<u32>,
    /// Global commit cap across the whole corpus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_commits_total: Option<u64>,
    /// Mean of the exponential PR merge lag, in hours.
    #[serde(default = "default_merge_lag")]
    pub merge_lag_mean_hours: f64,
    /// Fraction of merged PRs that spawn a bug-fix issue.
    #[serde(default = "default_issue_fraction")]
    pub issue_fraction: f64,
    /// Fraction of bug issues that escalate to a revert PR.
    #[serde(default = "default_revert_fraction")]
    pub revert_fraction: f64,
    /// Upper bound on reviews per PR.
    #[serde(default = "default_max_reviews")]
    pub max_reviews_per_pr: u32,
}

fn default_days() -> u32 {
    30
}

fn default_volatility() -> f64 {
    0.3
}

fn default_merge_lag() -> f64 {
    18.0
}

fn default_issue_fraction() -> f64 {
    0.07
}

fn default_revert_fraction() -> f64 {
    0.5
}

fn default_max_reviews() -> u32 {
    3
}

impl Default for GenParams {
    fn default() -> Self {
        Self {
            days: default_days(),
            velocity: Velocity::default(),
            volatility: default_volatility(),
            developers: None,
            max_commits_per_dev: None,
            max_commits_total: None,
            merge_lag_mean_hours: default_merge_lag(),
            issue_fraction: default_issue_fraction(),
            revert_fraction: default_revert_fraction(),
            max_reviews_per_pr: default_max_reviews(),
        }
    }
}

impl GenParams {
    /// Window length in months, 30 days apiece. Used by the CLI's `--months`
    /// override.
    pub fn with_months(mut self, months: u32) -> Self {
        self.days = months.saturating_mul(30);
        self
    }
}

/// Roster entry shape for the `/teams/members` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<Seniority>,
}

impl From<&Developer> for TeamMember {
    fn from(dev: &Developer) -> Self {
        Self {
            user_id: dev.user_id.clone(),
            email: dev.email.clone(),
            seniority: dev.seniority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hour_band_plain_range() {
        let band = HourBand { start: 9, end: 17 };
        assert!(band.contains(9));
        assert!(band.contains(16));
        assert!(!band.contains(17));
        assert!(!band.contains(8));
        assert!(!band.contains(23));
        assert_eq!(band.hours_per_day(), 8);
    }

    #[test]
    fn hour_band_wraps_midnight() {
        let band = HourBand { start: 22, end: 6 };
        assert!(band.contains(22));
        assert!(band.contains(23));
        assert!(band.contains(0));
        assert!(band.contains(5));
        assert!(!band.contains(6));
        assert!(!band.contains(12));
        assert_eq!(band.hours_per_day(), 8);
    }

    #[test]
    fn hour_band_full_day_when_start_equals_end() {
        let band = HourBand { start: 3, end: 3 };
        for hour in 0..24 {
            assert!(band.contains(hour), "hour {hour} should be in band");
        }
        assert_eq!(band.hours_per_day(), 24);
    }

    #[test]
    fn hour_band_contains_time_uses_utc_hour() {
        let band = HourBand { start: 22, end: 6 };
        let late = Utc.with_ymd_and_hms(2025, 3, 10, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 3, 11, 5, 59, 0).unwrap();
        let noon = Utc.with_ymd_and_hms(2025, 3, 11, 12, 0, 0).unwrap();
        assert!(band.contains_time(late));
        assert!(band.contains_time(early));
        assert!(!band.contains_time(noon));
    }

    #[test]
    fn seniority_rate_factors() {
        assert_eq!(Seniority::rate_factor(None), 1.0);
        assert_eq!(Seniority::rate_factor(Some(Seniority::Mid)), 1.0);
        assert!(Seniority::rate_factor(Some(Seniority::Junior)) < 1.0);
        assert!(
            Seniority::rate_factor(Some(Seniority::Staff))
                > Seniority::rate_factor(Some(Seniority::Senior))
        );
    }

    #[test]
    fn velocity_rates() {
        assert_eq!(Velocity::Low.events_per_hour(), 5.0);
        assert_eq!(Velocity::Medium.events_per_hour(), 25.0);
        assert_eq!(Velocity::High.events_per_hour(), 50.0);
    }

    #[test]
    fn velocity_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&Velocity::Low).unwrap(), "\"low\"");
        let v: Velocity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(v, Velocity::High);
    }

    #[test]
    fn review_state_serde_is_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ReviewState::ChangesRequested).unwrap(),
            "\"changes-requested\""
        );
    }

    #[test]
    fn feature_kind_wire_names() {
        assert_eq!(FeatureKind::AskMode.as_str(), "ask-mode");
        assert_eq!(
            serde_json::to_string(&FeatureKind::AskMode).unwrap(),
            "\"ask-mode\""
        );
    }

    #[test]
    fn commit_ai_lines_sums_tab_and_composer() {
        let c = sample_commit();
        assert_eq!(c.ai_lines(), 70);
        assert!(c.total_lines >= c.tab_lines + c.composer_lines + c.non_ai_lines);
    }

    #[test]
    fn commit_json_field_order_is_stable() {
        let json = serde_json::to_string(&sample_commit()).unwrap();
        let hash_pos = json.find("\"hash\"").unwrap();
        let ts_pos = json.find("\"timestamp\"").unwrap();
        let total_pos = json.find("\"total_lines\"").unwrap();
        let ingested_pos = json.find("\"ingested_at\"").unwrap();
        assert!(hash_pos < ts_pos && ts_pos < total_pos && total_pos < ingested_pos);
    }

    #[test]
    fn pull_request_omits_absent_timestamps() {
        let pr = PullRequest {
            repo: "acme/api".into(),
            number: 1,
            title: "Add request validation".into(),
            author: "alice".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            first_review_at: None,
            merged_at: None,
            state: PrState::Open,
            commit_hashes: vec!["ab12cd34ef56ab78".into()],
            lines_added: 120,
            lines_deleted: 8,
            ai_ratio: 0.5,
            reviewers: vec![],
            revert_of: None,
        };
        let json = serde_json::to_string(&pr).unwrap();
        assert!(!json.contains("merged_at"));
        assert!(!json.contains("first_review_at"));
        assert!(!json.contains("revert_of"));
    }

    #[test]
    fn gen_params_defaults() {
        let p = GenParams::default();
        assert_eq!(p.days, 30);
        assert_eq!(p.velocity, Velocity::Medium);
        assert!(p.developers.is_none());
        assert!(p.max_commits_total.is_none());
    }

    #[test]
    fn gen_params_months_override() {
        let p = GenParams::default().with_months(3);
        assert_eq!(p.days, 90);
    }

    #[test]
    fn gen_params_deserializes_from_empty_object() {
        let p: GenParams = serde_json::from_str("{}").unwrap();
        assert_eq!(p, GenParams::default());
    }

    #[test]
    fn team_member_from_developer() {
        let dev = Developer {
            user_id: "alice".into(),
            email: "alice@example.com".into(),
            working_hours: HourBand { start: 9, end: 17 },
            ai_preference: 0.55,
            preferred_models: vec!["claude-sonnet-4.5".into()],
            seniority: Some(Seniority::Senior),
        };
        let member = TeamMember::from(&dev);
        assert_eq!(member.user_id, "alice");
        assert_eq!(member.seniority, Some(Seniority::Senior));
    }

    fn sample_commit() -> Commit {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap();
        Commit {
            hash: "ab12cd34ef56ab78".into(),
            timestamp: ts,
            user_id: "alice".into(),
            email: "alice@example.com".into(),
            repo: "acme/api".into(),
            branch: "main".into(),
            message: "Fix pagination off-by-one".into(),
            total_lines: 100,
            tab_lines: 40,
            composer_lines: 30,
            non_ai_lines: 20,
            ingested_at: ts,
        }
    }
}
