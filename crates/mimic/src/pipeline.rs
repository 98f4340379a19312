//! Generation orchestration.
//!
//! Runs the generators in fixed order — commits, pull requests, reviews,
//! issues/reverts, usage streams — against a shared [`GenContext`], then
//! freezes everything into an immutable `Corpus`. The order is part of the
//! determinism contract: every generator seeds its own RNG streams from the
//! context, so the same inputs always reproduce the same corpus.

use anyhow::{Context as _, Result};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use mimic_seed::LoadedSeed;
use mimic_store::{Corpus, CorpusBuilder};
use mimic_types::{Developer, GenParams};

/// Everything the generators need to know, fixed for one pipeline run.
#[derive(Debug, Clone)]
pub struct GenContext {
    pub developers: Vec<Developer>,
    pub repositories: Vec<String>,
    pub team_id: u64,
    pub params: GenParams,
    pub rng_seed: u64,
    /// Inclusive lower bound of the generation window.
    pub window_start: DateTime<Utc>,
    /// Exclusive upper bound ("now").
    pub window_end: DateTime<Utc>,
    /// Per-developer repository assignment, as indices into `repositories`.
    dev_repos: Vec<Vec<usize>>,
}

impl GenContext {
    pub fn new(
        seed: &LoadedSeed,
        params: GenParams,
        rng_seed: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let window_start = now - TimeDelta::days(i64::from(params.days));
        let dev_repos = assign_repos(seed.developers.len(), seed.repositories.len());
        Self {
            developers: seed.developers.clone(),
            repositories: seed.repositories.clone(),
            team_id: seed.team_id,
            params,
            rng_seed,
            window_start,
            window_end: now,
            dev_repos,
        }
    }

    /// Repositories (as indices) the given developer contributes to.
    pub fn repos_for(&self, dev_index: usize) -> &[usize] {
        &self.dev_repos[dev_index]
    }

    /// User ids contributing to the given repository, in roster order.
    pub fn repo_contributors(&self, repo_index: usize) -> Vec<&str> {
        self.developers
            .iter()
            .enumerate()
            .filter(|(i, _)| self.dev_repos[*i].contains(&repo_index))
            .map(|(_, d)| d.user_id.as_str())
            .collect()
    }

    pub fn repo_index(&self, repo: &str) -> Option<usize> {
        self.repositories.iter().position(|r| r == repo)
    }
}

/// Deterministic roster-to-repository assignment: everyone gets a primary
/// repo round-robin; every other developer also picks up the next one.
fn assign_repos(dev_count: usize, repo_count: usize) -> Vec<Vec<usize>> {
    (0..dev_count)
        .map(|i| {
            if repo_count == 0 {
                return Vec::new();
            }
            let primary = i % repo_count;
            let mut repos = vec![primary];
            if repo_count > 1 && i % 2 == 1 {
                repos.push((i + 1) % repo_count);
            }
            repos
        })
        .collect()
}

/// Fold a string into a seed; FNV-1a so the result is stable across builds
/// (std's `DefaultHasher` makes no such promise).
pub(crate) fn mix_str(seed: u64, s: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        h ^= u64::from(byte);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    seed ^ h
}

/// Roster size at which commit generation fans out across threads.
const PARALLEL_ROSTER_THRESHOLD: usize = 16;

/// Run the full generation pipeline and freeze the result.
///
/// This is an offline batch: it completes before the HTTP server opens, so
/// handlers only ever see the finished corpus.
pub fn build_corpus(
    seed: &LoadedSeed,
    params: GenParams,
    rng_seed: u64,
    now: DateTime<Utc>,
) -> Result<Corpus> {
    let ctx = GenContext::new(seed, params, rng_seed, now);
    info!(
        developers = ctx.developers.len(),
        repositories = ctx.repositories.len(),
        days = ctx.params.days,
        velocity = %ctx.params.velocity,
        rng_seed = ctx.rng_seed,
        "generating corpus"
    );

    // Per-developer fan-out pays off once the roster is big; either path
    // produces the identical corpus.
    let mut commits = if ctx.developers.len() >= PARALLEL_ROSTER_THRESHOLD {
        crate::commits::generate_parallel(&ctx)
    } else {
        crate::commits::generate(&ctx)
    };
    info!(commits = commits.len(), "commits generated");

    let mut prs = crate::pulls::generate(&ctx, &commits);
    let reviews = crate::reviews::generate(&ctx, &mut prs);
    info!(pull_requests = prs.len(), reviews = reviews.len(), "pull requests and reviews generated");

    let issues = crate::issues::generate(&ctx, &mut commits, &mut prs);
    info!(issues = issues.len(), "issues and reverts generated");

    let usage = crate::usage::generate(&ctx, &commits);
    info!(usage_events = usage.len(), "usage streams generated");

    let mut builder = CorpusBuilder::new(
        ctx.developers.clone(),
        ctx.repositories.clone(),
        ctx.team_id,
    );
    for commit in commits {
        builder.push_commit(commit);
    }
    for pr in prs {
        builder.push_pr(pr);
    }
    for review in reviews {
        builder.push_review(review);
    }
    for issue in issues {
        builder.push_issue(issue);
    }
    for (stream, event) in usage {
        builder.push_usage(stream, event);
    }

    let corpus = builder
        .build()
        .context("generated corpus failed referential validation")?;
    let counts = corpus.counts();
    info!(
        commits = counts.commits,
        pull_requests = counts.pull_requests,
        reviews = counts.reviews,
        issues = counts.issues,
        usage_events = counts.usage_events,
        "corpus frozen"
    );
    Ok(corpus)
}
