//! Seed document loading for mimic.
//!
//! A seed document carries the developer roster and optional tuning fields.
//! The on-disk format is auto-detected from the file extension — `.json`
//! parses as JSON, `.yaml`/`.yml` as YAML (comments included), anything else
//! tries JSON first and falls back to YAML. Both deserialize into the same
//! [`SeedDocument`] shape.
//!
//! Validation distinguishes hard failures ([`SeedError`], which abort
//! startup with exit code 1) from soft warnings (unknown model names), which
//! are collected on [`LoadedSeed::warnings`] and surfaced by preview mode.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mimic_types::{Developer, KNOWN_MODELS};

/// Structural or semantic problems that make a seed unusable.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("seed file {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("seed file {path} is not valid YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("seed file {path} is neither valid JSON nor valid YAML")]
    UnknownFormat { path: String },
    #[error("seed contains no developers")]
    EmptyRoster,
    #[error("duplicate email in seed: {0}")]
    DuplicateEmail(String),
    #[error("duplicate user id in seed: {0}")]
    DuplicateUserId(String),
    #[error("developer {user_id}: working hour {value} out of range 0..=23")]
    HourOutOfRange { user_id: String, value: u8 },
    #[error("developer {user_id}: ai_preference {value} out of range 0..=1")]
    PreferenceOutOfRange { user_id: String, value: f64 },
    #[error("repository {0:?} is not in owner/repo form")]
    BadRepoName(String),
}

/// The raw seed document shape shared by JSON and YAML seeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedDocument {
    pub developers: Vec<Developer>,
    /// Optional explicit repository list ("owner/repo"). When absent, a
    /// deterministic default set is derived from the roster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
    /// Team id echoed in analytics response params.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u64>,
}

/// A validated seed, optionally replicated, ready for the pipeline.
#[derive(Debug, Clone)]
pub struct LoadedSeed {
    pub developers: Vec<Developer>,
    pub repositories: Vec<String>,
    pub team_id: u64,
    /// Soft-validation findings: unknown model names, empty preference
    /// lists. Never fatal.
    pub warnings: Vec<String>,
}

/// Repository short names used when the seed does not list repositories.
const DEFAULT_REPO_NAMES: &[&str] = &[
    "platform",
    "web-app",
    "api",
    "infra",
    "mobile",
    "data-pipeline",
];

/// Load, parse, and validate a seed file, replicating the roster up to
/// `developer_count` when requested.
pub fn load_seed(path: &Path, developer_count: Option<usize>) -> Result<LoadedSeed, SeedError> {
    let doc = parse_seed_file(path)?;
    finish(doc, developer_count)
}

/// Parse a seed file into the raw document without validating it.
pub fn parse_seed_file(path: &Path) -> Result<SeedDocument, SeedError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: display.clone(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&raw).map_err(|source| SeedError::Json {
            path: display,
            source,
        }),
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&raw).map_err(|source| SeedError::Yaml {
                path: display,
                source,
            })
        }
        _ => serde_json::from_str(&raw)
            .or_else(|_| serde_yaml::from_str(&raw))
            .map_err(|_| SeedError::UnknownFormat { path: display }),
    }
}

/// Validate a parsed document and apply replication. Exposed separately so
/// preview mode and tests can feed documents straight in.
pub fn finish(doc: SeedDocument, developer_count: Option<usize>) -> Result<LoadedSeed, SeedError> {
    validate(&doc)?;
    let warnings = soft_warnings(&doc.developers);

    let developers = match developer_count {
        Some(n) => replicate(&doc.developers, n),
        None => doc.developers.clone(),
    };

    let repositories = match doc.repositories {
        Some(repos) if !repos.is_empty() => repos,
        _ => derive_repositories(&developers),
    };

    Ok(LoadedSeed {
        developers,
        repositories,
        team_id: doc.team_id.unwrap_or(1),
        warnings,
    })
}

fn validate(doc: &SeedDocument) -> Result<(), SeedError> {
    if doc.developers.is_empty() {
        return Err(SeedError::EmptyRoster);
    }

    let mut emails = BTreeSet::new();
    let mut ids = BTreeSet::new();
    for dev in &doc.developers {
        if !emails.insert(dev.email.as_str()) {
            return Err(SeedError::DuplicateEmail(dev.email.clone()));
        }
        if !ids.insert(dev.user_id.as_str()) {
            return Err(SeedError::DuplicateUserId(dev.user_id.clone()));
        }
        for value in [dev.working_hours.start, dev.working_hours.end] {
            if value > 23 {
                return Err(SeedError::HourOutOfRange {
                    user_id: dev.user_id.clone(),
                    value,
                });
            }
        }
        if !(0.0..=1.0).contains(&dev.ai_preference) {
            return Err(SeedError::PreferenceOutOfRange {
                user_id: dev.user_id.clone(),
                value: dev.ai_preference,
            });
        }
    }

    if let Some(repos) = &doc.repositories {
        for repo in repos {
            let mut parts = repo.splitn(2, '/');
            let owner = parts.next().unwrap_or_default();
            let name = parts.next().unwrap_or_default();
            if owner.is_empty() || name.is_empty() {
                return Err(SeedError::BadRepoName(repo.clone()));
            }
        }
    }

    Ok(())
}

fn soft_warnings(developers: &[Developer]) -> Vec<String> {
    let mut warnings = Vec::new();
    for dev in developers {
        for model in &dev.preferred_models {
            if !KNOWN_MODELS.contains(&model.as_str()) {
                warnings.push(format!(
                    "developer {}: unknown model {:?}",
                    dev.user_id, model
                ));
            }
        }
        if dev.preferred_models.is_empty() {
            warnings.push(format!(
                "developer {}: no preferred models, falling back to {}",
                dev.user_id, KNOWN_MODELS[0]
            ));
        }
    }
    warnings
}

/// Deterministically resize the roster to exactly `n` developers.
///
/// When the seed has fewer entries than requested, entries are cloned in
/// round-robin order with a replica suffix on the id (`alice-2`) and a plus
/// tag on the email local part (`alice+2@example.com`) to keep both unique.
/// When it has more, the head of the roster is kept.
pub fn replicate(developers: &[Developer], n: usize) -> Vec<Developer> {
    if developers.is_empty() || n == 0 {
        return Vec::new();
    }
    if n <= developers.len() {
        return developers[..n].to_vec();
    }

    let mut out = developers.to_vec();
    let mut round = 2usize;
    'fill: loop {
        for base in developers {
            if out.len() == n {
                break 'fill;
            }
            let mut clone = base.clone();
            clone.user_id = format!("{}-{}", base.user_id, round);
            clone.email = tag_email(&base.email, round);
            out.push(clone);
        }
        round += 1;
    }
    out
}

fn tag_email(email: &str, round: usize) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{local}+{round}@{domain}"),
        None => format!("{email}+{round}"),
    }
}

/// Derive a deterministic repository set from the roster: the owner comes
/// from the first developer's email domain, the count scales with roster
/// size, names come from a fixed table.
pub fn derive_repositories(developers: &[Developer]) -> Vec<String> {
    let owner = developers
        .first()
        .and_then(|d| d.email.split_once('@'))
        .map(|(_, domain)| domain.split('.').next().unwrap_or("acme").to_string())
        .unwrap_or_else(|| "acme".to_string());

    let count = (1 + developers.len() / 4).clamp(2, DEFAULT_REPO_NAMES.len());
    DEFAULT_REPO_NAMES[..count]
        .iter()
        .map(|name| format!("{owner}/{name}"))
        .collect()
}
