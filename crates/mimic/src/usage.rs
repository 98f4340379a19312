//! Categorical usage streams.
//!
//! The already-generated commits drive everything: each commit yields a
//! model-usage event and a file-extension event, and occasionally feature
//! events (MCP / commands / plans / ask-mode). The client-version stream is
//! daily: one event per developer per active day, with a sticky version that
//! occasionally upgrades.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mimic_types::{
    CLIENT_VERSIONS, Commit, FILE_EXTENSIONS, FeatureKind, KNOWN_MODELS, UsageEvent, UsageStream,
};

use crate::pipeline::GenContext;

/// Per-kind emission probability (out of 100) and that's per commit.
const FEATURE_ODDS: &[(FeatureKind, u32)] = &[
    (FeatureKind::Mcp, 4),
    (FeatureKind::Commands, 12),
    (FeatureKind::Plans, 6),
    (FeatureKind::AskMode, 9),
];

/// Chance (out of 100) that a developer upgrades their client on any
/// given active day.
const UPGRADE_ODDS: u32 = 5;

/// Generate all four streams from the finished commit history.
pub fn generate(ctx: &GenContext, commits: &[Commit]) -> Vec<(UsageStream, UsageEvent)> {
    let mut events = Vec::new();
    let mut rng = ChaCha8Rng::seed_from_u64(ctx.rng_seed.rotate_left(43) ^ 0x2545_f491_4f6c_dd1d);

    for commit in commits {
        let dev = ctx
            .developers
            .iter()
            .find(|d| d.user_id == commit.user_id);

        let model = pick_model(dev.map(|d| d.preferred_models.as_slice()), &mut rng);
        events.push((
            UsageStream::Model,
            UsageEvent {
                timestamp: commit.timestamp,
                user_id: commit.user_id.clone(),
                value: model,
                count: 1,
            },
        ));

        events.push((
            UsageStream::FileExtension,
            UsageEvent {
                timestamp: commit.timestamp,
                user_id: commit.user_id.clone(),
                value: pick_extension(&mut rng),
                count: 1,
            },
        ));

        for (kind, odds) in FEATURE_ODDS {
            if rng.gen_range(0..100) < *odds {
                events.push((
                    UsageStream::Feature,
                    UsageEvent {
                        timestamp: commit.timestamp,
                        user_id: commit.user_id.clone(),
                        value: kind.as_str().to_string(),
                        count: rng.gen_range(1..=3),
                    },
                ));
            }
        }
    }

    events.extend(client_version_stream(ctx, commits));
    events
}

/// Weighted pick from the author's preference list: the first entry gets
/// triple weight. Falls back to the flagship model for empty lists.
fn pick_model(preferred: Option<&[String]>, rng: &mut ChaCha8Rng) -> String {
    match preferred {
        Some(models) if !models.is_empty() => {
            let total = models.len() as u32 + 2;
            let roll = rng.gen_range(0..total);
            let index = (roll.saturating_sub(2)) as usize;
            models[index.min(models.len() - 1)].clone()
        }
        _ => KNOWN_MODELS[0].to_string(),
    }
}

fn pick_extension(rng: &mut ChaCha8Rng) -> String {
    let total: u32 = FILE_EXTENSIONS.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (ext, weight) in FILE_EXTENSIONS {
        if roll < *weight {
            return (*ext).to_string();
        }
        roll -= weight;
    }
    FILE_EXTENSIONS[0].0.to_string()
}

/// One event per developer per active day (a day with at least one commit),
/// carrying a sticky client version that never downgrades.
fn client_version_stream(
    ctx: &GenContext,
    commits: &[Commit],
) -> Vec<(UsageStream, UsageEvent)> {
    let mut active_days: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
    for commit in commits {
        active_days
            .entry(commit.user_id.as_str())
            .or_default()
            .insert(commit.timestamp.date_naive());
    }

    let mut events = Vec::new();
    for (dev_index, dev) in ctx.developers.iter().enumerate() {
        let Some(days) = active_days.get(dev.user_id.as_str()) else {
            continue;
        };
        let mut rng = ChaCha8Rng::seed_from_u64(
            ctx.rng_seed.rotate_left(51) ^ (dev_index as u64).wrapping_mul(0xff51_afd7_ed55_8ccd),
        );
        // Earlier roster entries started on older versions.
        let mut version_index = dev_index % 2;

        for day in days {
            if rng.gen_range(0..100) < UPGRADE_ODDS {
                version_index = (version_index + 1).min(CLIENT_VERSIONS.len() - 1);
            }
            let noon = day
                .and_hms_opt(12, 0, 0)
                .map(|t| t.and_utc())
                .unwrap_or_else(Utc::now);
            events.push((
                UsageStream::ClientVersion,
                UsageEvent {
                    timestamp: noon,
                    user_id: dev.user_id.clone(),
                    value: CLIENT_VERSIONS[version_index].to_string(),
                    count: 1,
                },
            ));
        }
    }
    events
}
