//! Commit generation.
//!
//! For each developer and each day in the window: seed a per-developer
//! Poisson timer, accumulate intervals from day start, gate each candidate
//! through the developer's working-hour band, and emit a commit whenever the
//! gated timestamp still falls inside the day. Line counts realize the
//! developer's AI preference as the expected fraction of added lines coming
//! from tab and composer sources.

use std::collections::HashSet;

use chrono::TimeDelta;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mimic_sampler::{PoissonTimer, developer_rate, next_in_band, stream_seed};
use mimic_types::{Commit, Seniority};

use crate::pipeline::GenContext;

const BRANCHES: &[&str] = &[
    "main",
    "develop",
    "feature/checkout",
    "feature/auth",
    "hotfix/regression",
];

const MESSAGE_VERBS: &[&str] = &[
    "Fix", "Add", "Refactor", "Remove", "Tighten", "Speed up", "Document", "Inline",
];

const MESSAGE_AREAS: &[&str] = &[
    "pagination",
    "rate limiting",
    "session handling",
    "retry logic",
    "schema validation",
    "cache invalidation",
    "error mapping",
    "metrics export",
    "billing rollups",
    "feature flags",
];

/// Generate every commit in the window, in developer-then-time order.
pub fn generate(ctx: &GenContext) -> Vec<Commit> {
    let per_dev: Vec<Vec<Commit>> = (0..ctx.developers.len())
        .map(|dev_index| generate_for_developer(ctx, dev_index))
        .collect();
    merge(ctx, per_dev)
}

/// The same corpus as [`generate`], fanned out per developer across
/// threads. Developer streams are seeded independently, so stitching the
/// per-developer results back together in roster order reproduces the
/// sequential output exactly.
pub fn generate_parallel(ctx: &GenContext) -> Vec<Commit> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let indices: Vec<usize> = (0..ctx.developers.len()).collect();
    let chunk = indices.len().div_ceil(workers).max(1);

    let mut per_dev: Vec<Vec<Commit>> = Vec::with_capacity(indices.len());
    std::thread::scope(|scope| {
        let handles: Vec<_> = indices
            .chunks(chunk)
            .map(|devs| {
                scope.spawn(move || {
                    devs.iter()
                        .map(|&dev_index| generate_for_developer(ctx, dev_index))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            match handle.join() {
                Ok(batch) => per_dev.extend(batch),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
    });
    merge(ctx, per_dev)
}

/// Concatenate per-developer output in roster order and apply the global
/// commit cap. Truncating the concatenation is equivalent to stopping
/// generation mid-roster, which keeps the sequential and parallel paths
/// byte-identical.
fn merge(ctx: &GenContext, per_dev: Vec<Vec<Commit>>) -> Vec<Commit> {
    let mut commits: Vec<Commit> = per_dev.into_iter().flatten().collect();
    if let Some(cap) = ctx.params.max_commits_total {
        commits.truncate(usize::try_from(cap).unwrap_or(usize::MAX));
    }
    commits
}

fn generate_for_developer(ctx: &GenContext, dev_index: usize) -> Vec<Commit> {
    let dev = &ctx.developers[dev_index];
    let repos = ctx.repos_for(dev_index);
    if repos.is_empty() {
        return Vec::new();
    }

    let seed = stream_seed(ctx.rng_seed, dev_index);
    let rate = developer_rate(ctx.params.velocity, ctx.params.volatility, seed)
        * Seniority::rate_factor(dev.seniority);
    let mut timer = PoissonTimer::new(rate, seed);
    // Separate stream for everything that is not timing, so adding a draw
    // to one never shifts the other.
    let mut aux = ChaCha8Rng::seed_from_u64(seed.rotate_left(17) ^ 0xa076_1d64_78bd_642f);

    let mut commits = Vec::new();
    let mut hashes: HashSet<String> = HashSet::new();
    let dev_cap = ctx.params.max_commits_per_dev;
    let global_cap = ctx.params.max_commits_total;

    'days: for day in 0..ctx.params.days {
        let day_start = ctx.window_start + TimeDelta::days(i64::from(day));
        let day_end = (day_start + TimeDelta::days(1)).min(ctx.window_end);
        let mut t = day_start;

        loop {
            let interval = TimeDelta::from_std(timer.next_interval())
                .unwrap_or_else(|_| TimeDelta::days(3650));
            t = next_in_band(dev.working_hours, t + interval);
            if t >= day_end {
                break;
            }

            commits.push(fabricate(ctx, dev_index, &mut aux, &mut hashes, t));

            if let Some(cap) = dev_cap {
                if commits.len() as u32 >= cap {
                    break 'days;
                }
            }
            // One developer alone can satisfy the global cap; anything past
            // it gets truncated in merge anyway.
            if let Some(cap) = global_cap {
                if commits.len() as u64 >= cap {
                    break 'days;
                }
            }
        }
    }

    commits
}

fn fabricate(
    ctx: &GenContext,
    dev_index: usize,
    aux: &mut ChaCha8Rng,
    hashes: &mut HashSet<String>,
    at: chrono::DateTime<chrono::Utc>,
) -> Commit {
    let dev = &ctx.developers[dev_index];
    let repos = ctx.repos_for(dev_index);

    let hash = loop {
        let candidate = format!("{:016x}", aux.next_u64());
        if hashes.insert(candidate.clone()) {
            break candidate;
        }
    };

    // Primary repo gets the bulk of the work.
    let repo_index = if repos.len() == 1 || aux.gen_range(0..100) < 75 {
        repos[0]
    } else {
        repos[1]
    };

    let branch = match aux.gen_range(0..100u32) {
        0..=54 => BRANCHES[0],
        55..=74 => BRANCHES[1],
        n => BRANCHES[2 + (n as usize % (BRANCHES.len() - 2))],
    };

    let message = format!(
        "{} {}",
        MESSAGE_VERBS[aux.gen_range(0..MESSAGE_VERBS.len())],
        MESSAGE_AREAS[aux.gen_range(0..MESSAGE_AREAS.len())],
    );

    let (total_lines, tab_lines, composer_lines, non_ai_lines) =
        split_lines(dev.ai_preference, aux);

    Commit {
        hash,
        timestamp: at,
        user_id: dev.user_id.clone(),
        email: dev.email.clone(),
        repo: ctx.repositories[repo_index].clone(),
        branch: branch.to_string(),
        message,
        total_lines,
        tab_lines,
        composer_lines,
        non_ai_lines,
        ingested_at: at,
    }
}

/// Sample a commit's line counts.
///
/// `total` is bounded to 10..=500 and skewed toward small commits; the
/// AI-attributed share realizes `ai_preference` with ±20% relative jitter;
/// whatever `total` leaves beyond added lines counts as deletions, so
/// `total >= tab + composer + non_ai` always holds.
fn split_lines(ai_preference: f64, rng: &mut ChaCha8Rng) -> (u32, u32, u32, u32) {
    let spread: f64 = rng.gen_range(0.0..1.0);
    let scale = 0.7 + 0.6 * ai_preference;
    let total = ((10.0 + spread * spread * 490.0 * scale) as u32).clamp(10, 500);

    let realized = (ai_preference * rng.gen_range(0.8..=1.2)).clamp(0.0, 1.0);
    let ai = ((f64::from(total) * realized).round() as u32).min(total);

    let tab_share: f64 = rng.gen_range(0.45..=0.75);
    let tab = (f64::from(ai) * tab_share).round() as u32;
    let composer = ai - tab.min(ai);

    let deleted = (f64::from(total) * rng.gen_range(0.0..=0.12)) as u32;
    let non_ai = (total - ai).saturating_sub(deleted);

    (total, tab.min(ai), composer, non_ai)
}
