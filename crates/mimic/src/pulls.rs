//! Pull-request generation.
//!
//! Walks each repository's commits in timestamp order, grouping consecutive
//! runs from the same author into PRs. Numbers increment per repo from 1;
//! the merge timestamp is an exponential lag past the last commit; the AI
//! ratio is the line-weighted average of the constituent commits.

use chrono::TimeDelta;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mimic_types::{Commit, PrState, PullRequest};

use crate::pipeline::{GenContext, mix_str};

/// Commits further apart than this start a new PR even for the same author.
const GROUP_GAP_HOURS: i64 = 36;

/// Generate all PRs, repo by repo in seed order.
pub fn generate(ctx: &GenContext, commits: &[Commit]) -> Vec<PullRequest> {
    let mut prs = Vec::new();

    for (repo_index, repo) in ctx.repositories.iter().enumerate() {
        let mut repo_commits: Vec<&Commit> = commits.iter().filter(|c| &c.repo == repo).collect();
        repo_commits.sort_by(|a, b| (a.timestamp, &a.hash).cmp(&(b.timestamp, &b.hash)));
        if repo_commits.is_empty() {
            continue;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(mix_str(ctx.rng_seed, repo));
        let contributors = ctx.repo_contributors(repo_index);
        let mut number: u64 = 0;

        let mut group: Vec<&Commit> = Vec::new();
        let mut group_cap = rng.gen_range(1..=6);
        for commit in repo_commits {
            let breaks = match group.last() {
                None => false,
                Some(last) => {
                    last.user_id != commit.user_id
                        || group.len() >= group_cap
                        || commit.timestamp - last.timestamp > TimeDelta::hours(GROUP_GAP_HOURS)
                }
            };
            if breaks {
                number += 1;
                prs.push(assemble(ctx, repo, number, &group, &contributors, &mut rng));
                group.clear();
                group_cap = rng.gen_range(1..=6);
            }
            group.push(commit);
        }
        if !group.is_empty() {
            number += 1;
            prs.push(assemble(ctx, repo, number, &group, &contributors, &mut rng));
        }
    }

    prs
}

fn assemble(
    ctx: &GenContext,
    repo: &str,
    number: u64,
    group: &[&Commit],
    contributors: &[&str],
    rng: &mut ChaCha8Rng,
) -> PullRequest {
    let first = group[0];
    let last = group[group.len() - 1];
    let author = first.user_id.as_str();

    let lines_added: u32 = group
        .iter()
        .map(|c| c.tab_lines + c.composer_lines + c.non_ai_lines)
        .sum();
    let lines_deleted: u32 = group
        .iter()
        .map(|c| c.total_lines - (c.tab_lines + c.composer_lines + c.non_ai_lines))
        .sum();
    let ai_lines: u32 = group.iter().map(|c| c.ai_lines()).sum();
    let ai_ratio = if lines_added == 0 {
        0.0
    } else {
        f64::from(ai_lines) / f64::from(lines_added)
    };

    // Exponential merge lag past the last commit.
    let u: f64 = rng.gen_range(0.0..1.0);
    let lag_hours = -(1.0 - u).ln() * ctx.params.merge_lag_mean_hours;
    let merge_candidate = last.timestamp + TimeDelta::seconds((lag_hours * 3600.0) as i64);

    let roll: f64 = rng.gen_range(0.0..1.0);
    let state = if roll < 0.80 && merge_candidate < ctx.window_end {
        PrState::Merged
    } else if roll < 0.92 {
        PrState::Open
    } else {
        PrState::Closed
    };
    let merged_at = (state == PrState::Merged).then_some(merge_candidate);

    let mut pool: Vec<&str> = contributors.iter().copied().filter(|c| *c != author).collect();
    pool.shuffle(rng);
    let desired = match state {
        PrState::Open => rng.gen_range(0..=2),
        _ => rng.gen_range(1..=3),
    };
    let reviewers: Vec<String> = pool
        .into_iter()
        .take(desired)
        .map(str::to_string)
        .collect();

    PullRequest {
        repo: repo.to_string(),
        number,
        title: first.message.clone(),
        author: author.to_string(),
        created_at: first.timestamp,
        first_review_at: None,
        merged_at,
        state,
        commit_hashes: group.iter().map(|c| c.hash.clone()).collect(),
        lines_added,
        lines_deleted,
        ai_ratio,
        reviewers,
        revert_of: None,
    }
}
