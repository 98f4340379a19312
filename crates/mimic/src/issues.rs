//! Issue and revert derivation.
//!
//! A configurable fraction of merged PRs turn out to have introduced a
//! defect: each spawns a bug-fix issue shortly after the merge, and about
//! half escalate to a revert — a synthetic revert commit plus a revert PR
//! carrying `revert_of`, appended so the per-repo PR numbering stays
//! contiguous and the store's referential checks keep holding.

use std::collections::{HashMap, HashSet};

use chrono::TimeDelta;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mimic_sampler::next_in_band;
use mimic_types::{Commit, Issue, IssueKind, PrState, PullRequest};

use crate::pipeline::GenContext;

/// Derive issues (and revert commits/PRs) from the merged PRs. Appends to
/// `commits` and `prs` in place; returns the issues with ids from 1.
pub fn generate(
    ctx: &GenContext,
    commits: &mut Vec<Commit>,
    prs: &mut Vec<PullRequest>,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut rng = ChaCha8Rng::seed_from_u64(ctx.rng_seed.rotate_left(27) ^ 0x94d0_49bb_1331_11eb);

    let mut hashes: HashSet<String> = commits.iter().map(|c| c.hash.clone()).collect();
    let mut next_number: HashMap<String, u64> = HashMap::new();
    for pr in prs.iter() {
        let max = next_number.entry(pr.repo.clone()).or_default();
        *max = (*max).max(pr.number);
    }

    let merged: Vec<usize> = prs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.state == PrState::Merged)
        .map(|(i, _)| i)
        .collect();

    let mut next_id: u64 = 1;
    for idx in merged {
        if rng.gen_range(0.0..1.0) >= ctx.params.issue_fraction {
            continue;
        }

        let (repo, number, author, merged_at, title) = {
            let pr = &prs[idx];
            let Some(merged_at) = pr.merged_at else { continue };
            (
                pr.repo.clone(),
                pr.number,
                pr.author.clone(),
                merged_at,
                pr.title.clone(),
            )
        };

        let opened_at = merged_at + TimeDelta::hours(rng.gen_range(1..=48));
        if opened_at >= ctx.window_end {
            continue;
        }

        let wants_revert = rng.gen_range(0.0..1.0) < ctx.params.revert_fraction;
        let reverted = wants_revert
            && push_revert(
                ctx, commits, prs, &mut hashes, &mut next_number, &mut rng, &repo, number,
                &author, opened_at, &title,
            );

        let resolved_at = if reverted {
            // The revert closes the issue when it lands.
            prs.last().and_then(|p| p.merged_at)
        } else if rng.gen_range(0.0..1.0) < 0.7 {
            let candidate = opened_at + TimeDelta::hours(rng.gen_range(2..=96));
            (candidate < ctx.window_end).then_some(candidate)
        } else {
            None
        };

        issues.push(Issue {
            id: next_id,
            repo,
            pr_number: number,
            opened_at,
            kind: if reverted {
                IssueKind::Revert
            } else {
                IssueKind::Bug
            },
            resolved_at,
        });
        next_id += 1;
    }

    issues
}

/// Append a revert commit and its PR. Returns false when the revert would
/// land outside the generation window, in which case nothing is appended
/// and the caller downgrades to a plain bug issue.
#[allow(clippy::too_many_arguments)]
fn push_revert(
    ctx: &GenContext,
    commits: &mut Vec<Commit>,
    prs: &mut Vec<PullRequest>,
    hashes: &mut HashSet<String>,
    next_number: &mut HashMap<String, u64>,
    rng: &mut ChaCha8Rng,
    repo: &str,
    original_number: u64,
    author: &str,
    opened_at: chrono::DateTime<chrono::Utc>,
    original_title: &str,
) -> bool {
    let Some(dev) = ctx.developers.iter().find(|d| d.user_id == author) else {
        return false;
    };

    let candidate = opened_at + TimeDelta::minutes(rng.gen_range(20..=600));
    let commit_at = next_in_band(dev.working_hours, candidate);
    if commit_at >= ctx.window_end {
        return false;
    }

    let hash = loop {
        let candidate = format!("{:016x}", rng.next_u64());
        if hashes.insert(candidate.clone()) {
            break candidate;
        }
    };

    // Reverts are deletion-heavy: a small glue diff on top of removing the
    // original change.
    let total = rng.gen_range(20..=200);
    let non_ai = total / 10;
    let commit = Commit {
        hash: hash.clone(),
        timestamp: commit_at,
        user_id: dev.user_id.clone(),
        email: dev.email.clone(),
        repo: repo.to_string(),
        branch: "hotfix/regression".to_string(),
        message: format!("Revert \"{original_title}\""),
        total_lines: total,
        tab_lines: 0,
        composer_lines: 0,
        non_ai_lines: non_ai,
        ingested_at: commit_at,
    };

    let number = {
        let counter = next_number.entry(repo.to_string()).or_default();
        *counter += 1;
        *counter
    };

    let merge_candidate = commit_at + TimeDelta::minutes(rng.gen_range(10..=360));
    let (state, merged_at) = if merge_candidate < ctx.window_end {
        (PrState::Merged, Some(merge_candidate))
    } else {
        (PrState::Open, None)
    };

    let reviewer = ctx
        .repo_index(repo)
        .map(|ri| ctx.repo_contributors(ri))
        .unwrap_or_default()
        .into_iter()
        .find(|c| *c != author)
        .map(str::to_string);

    commits.push(commit);
    prs.push(PullRequest {
        repo: repo.to_string(),
        number,
        title: format!("Revert \"{original_title}\""),
        author: author.to_string(),
        created_at: commit_at,
        first_review_at: None,
        merged_at,
        state,
        commit_hashes: vec![hash],
        lines_added: non_ai,
        lines_deleted: total - non_ai,
        ai_ratio: 0.0,
        reviewers: reviewer.into_iter().collect(),
        revert_of: Some(original_number),
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ctx_with, test_seed};
    use mimic_types::GenParams;

    fn generated() -> (
        crate::pipeline::GenContext,
        Vec<Commit>,
        Vec<PullRequest>,
        Vec<Issue>,
    ) {
        let params = GenParams {
            issue_fraction: 0.25,
            ..GenParams::default()
        };
        let ctx = ctx_with(test_seed(4), params, 55);
        let mut commits = crate::commits::generate(&ctx);
        let mut prs = crate::pulls::generate(&ctx, &commits);
        let _ = crate::reviews::generate(&ctx, &mut prs);
        let issues = generate(&ctx, &mut commits, &mut prs);
        (ctx, commits, prs, issues)
    }

    #[test]
    fn issues_are_deterministic() {
        let (a, b) = (generated(), generated());
        assert_eq!(a.3, b.3);
        assert_eq!(a.2, b.2);
    }

    #[test]
    fn every_issue_references_a_merged_pr() {
        let (_, _, prs, issues) = generated();
        for issue in &issues {
            let pr = prs
                .iter()
                .find(|p| p.repo == issue.repo && p.number == issue.pr_number)
                .expect("referenced PR exists");
            assert_eq!(pr.state, PrState::Merged);
            assert!(issue.opened_at > pr.merged_at.expect("merged"));
        }
    }

    #[test]
    fn revert_prs_link_back_and_stay_in_window() {
        let (ctx, commits, prs, issues) = generated();
        let reverts: Vec<&PullRequest> = prs.iter().filter(|p| p.revert_of.is_some()).collect();
        assert!(
            !reverts.is_empty(),
            "with issue_fraction 0.25 some reverts should exist"
        );
        for revert in reverts {
            let original = revert.revert_of.expect("revert_of");
            assert!(prs.iter().any(|p| p.repo == revert.repo && p.number == original));
            assert!(revert.title.starts_with("Revert \""));
            assert_eq!(revert.ai_ratio, 0.0);

            let commit = commits
                .iter()
                .find(|c| c.hash == revert.commit_hashes[0])
                .expect("revert commit stored");
            assert!(commit.timestamp < ctx.window_end);
            let dev = ctx
                .developers
                .iter()
                .find(|d| d.user_id == commit.user_id)
                .expect("author");
            assert!(dev.working_hours.contains_time(commit.timestamp));
        }
        assert!(issues.iter().any(|i| i.kind == IssueKind::Revert));
    }

    #[test]
    fn pr_numbers_stay_contiguous_after_reverts() {
        let (_, _, prs, _) = generated();
        let mut per_repo: HashMap<&str, Vec<u64>> = HashMap::new();
        for pr in &prs {
            per_repo.entry(pr.repo.as_str()).or_default().push(pr.number);
        }
        for (repo, mut numbers) in per_repo {
            numbers.sort_unstable();
            let expected: Vec<u64> = (1..=numbers.len() as u64).collect();
            assert_eq!(numbers, expected, "repo {repo}");
        }
    }

    #[test]
    fn issue_ids_are_unique() {
        let (_, _, _, issues) = generated();
        let ids: HashSet<u64> = issues.iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), issues.len());
    }

    #[test]
    fn resolved_issues_resolve_after_opening() {
        let (_, _, _, issues) = generated();
        for issue in &issues {
            if let Some(resolved) = issue.resolved_at {
                assert!(resolved > issue.opened_at);
            }
        }
    }
}
