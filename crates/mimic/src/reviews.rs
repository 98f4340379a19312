//! Review-thread synthesis.
//!
//! Merged and closed PRs receive 1..=K review events with monotone
//! timestamps inside the PR's review window. Merged threads end in an
//! approval; earlier entries are comments with an occasional
//! changes-requested iteration. The PR's `first_review_at` is back-filled
//! from the first event.

use chrono::TimeDelta;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mimic_types::{PrState, PullRequest, Review, ReviewState};

use crate::pipeline::{GenContext, mix_str};

/// Generate review threads for every reviewable PR, assigning ids in
/// generation order starting at 1. Mutates each PR's `first_review_at`.
pub fn generate(ctx: &GenContext, prs: &mut [PullRequest]) -> Vec<Review> {
    let mut reviews = Vec::new();
    let mut next_id: u64 = 1;

    for pr in prs.iter_mut() {
        if pr.state == PrState::Open || pr.reviewers.is_empty() {
            continue;
        }

        let key = format!("{}#{}", pr.repo, pr.number);
        let mut rng = ChaCha8Rng::seed_from_u64(mix_str(ctx.rng_seed.rotate_left(9), &key));

        let span_end = match pr.merged_at {
            Some(merged) => merged,
            None => {
                // Closed without merge: the thread still happened, inside a
                // sampled window after creation, capped at "now".
                let u: f64 = rng.gen_range(0.0..1.0);
                let hours = -(1.0 - u).ln() * ctx.params.merge_lag_mean_hours;
                (pr.created_at + TimeDelta::seconds((hours * 3600.0) as i64))
                    .min(ctx.window_end)
                    .max(pr.created_at)
            }
        };
        let span_secs = (span_end - pr.created_at).num_seconds().max(0);

        let n = rng.gen_range(1..=ctx.params.max_reviews_per_pr.max(1));
        let mut fractions: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..=1.0)).collect();
        fractions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // One changes-requested iteration shows up in about half of the
        // longer threads, always before the final verdict.
        let changes_at = (n >= 2 && rng.gen_range(0..2) == 0).then(|| n - 2);

        for (i, frac) in fractions.iter().enumerate() {
            let offset = (span_secs as f64 * frac) as i64;
            let submitted_at = pr.created_at + TimeDelta::seconds(offset);
            let is_last = i as u32 == n - 1;

            let state = if pr.state == PrState::Merged && is_last {
                ReviewState::Approved
            } else if changes_at == Some(i as u32) {
                ReviewState::ChangesRequested
            } else {
                ReviewState::Commented
            };

            if i == 0 {
                pr.first_review_at = Some(submitted_at);
            }

            reviews.push(Review {
                id: next_id,
                repo: pr.repo.clone(),
                pr_number: pr.number,
                reviewer: pr.reviewers[i % pr.reviewers.len()].clone(),
                submitted_at,
                state,
                iteration: i as u32 + 1,
            });
            next_id += 1;
        }
    }

    reviews
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ctx_with, test_seed};
    use mimic_types::GenParams;
    use std::collections::{HashMap, HashSet};

    fn generated() -> (Vec<PullRequest>, Vec<Review>) {
        let ctx = ctx_with(test_seed(4), GenParams::default(), 33);
        let commits = crate::commits::generate(&ctx);
        let mut prs = crate::pulls::generate(&ctx, &commits);
        let reviews = generate(&ctx, &mut prs);
        (prs, reviews)
    }

    #[test]
    fn reviews_are_deterministic() {
        let ctx = ctx_with(test_seed(4), GenParams::default(), 33);
        let commits = crate::commits::generate(&ctx);
        let mut prs_a = crate::pulls::generate(&ctx, &commits);
        let mut prs_b = prs_a.clone();
        assert_eq!(generate(&ctx, &mut prs_a), generate(&ctx, &mut prs_b));
        assert_eq!(prs_a, prs_b);
    }

    #[test]
    fn open_prs_have_no_reviews() {
        let (prs, reviews) = generated();
        let open: HashSet<(&str, u64)> = prs
            .iter()
            .filter(|p| p.state == PrState::Open)
            .map(|p| (p.repo.as_str(), p.number))
            .collect();
        assert!(reviews
            .iter()
            .all(|r| !open.contains(&(r.repo.as_str(), r.pr_number))));
    }

    #[test]
    fn review_timestamps_bounded_by_pr_window() {
        let (prs, reviews) = generated();
        let by_key: HashMap<(&str, u64), &PullRequest> = prs
            .iter()
            .map(|p| ((p.repo.as_str(), p.number), p))
            .collect();
        for review in &reviews {
            let pr = by_key[&(review.repo.as_str(), review.pr_number)];
            assert!(review.submitted_at >= pr.created_at);
            if let Some(merged) = pr.merged_at {
                assert!(review.submitted_at <= merged);
            }
        }
    }

    #[test]
    fn threads_are_monotone_with_increasing_iterations() {
        let (_, reviews) = generated();
        let mut by_pr: HashMap<(&str, u64), Vec<&Review>> = HashMap::new();
        for review in &reviews {
            by_pr
                .entry((review.repo.as_str(), review.pr_number))
                .or_default()
                .push(review);
        }
        for thread in by_pr.values() {
            for pair in thread.windows(2) {
                assert!(pair[1].submitted_at >= pair[0].submitted_at);
                assert_eq!(pair[1].iteration, pair[0].iteration + 1);
            }
            assert_eq!(thread[0].iteration, 1);
        }
    }

    #[test]
    fn merged_threads_end_approved() {
        let (prs, reviews) = generated();
        let mut last_state: HashMap<(&str, u64), ReviewState> = HashMap::new();
        for review in &reviews {
            last_state.insert((review.repo.as_str(), review.pr_number), review.state);
        }
        for pr in prs.iter().filter(|p| p.state == PrState::Merged) {
            if let Some(state) = last_state.get(&(pr.repo.as_str(), pr.number)) {
                assert_eq!(*state, ReviewState::Approved, "{}#{}", pr.repo, pr.number);
            }
        }
    }

    #[test]
    fn first_review_at_backfilled_between_created_and_merged() {
        let (prs, reviews) = generated();
        let reviewed: HashSet<(&str, u64)> = reviews
            .iter()
            .map(|r| (r.repo.as_str(), r.pr_number))
            .collect();
        for pr in &prs {
            if reviewed.contains(&(pr.repo.as_str(), pr.number)) {
                let first = pr.first_review_at.expect("first_review_at set");
                assert!(first >= pr.created_at);
                if let Some(merged) = pr.merged_at {
                    assert!(first <= merged);
                }
            } else {
                assert!(pr.first_review_at.is_none());
            }
        }
    }

    #[test]
    fn review_ids_are_unique_and_dense() {
        let (_, reviews) = generated();
        let ids: HashSet<u64> = reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), reviews.len());
        assert_eq!(ids.iter().max().copied(), (!reviews.is_empty()).then(|| reviews.len() as u64));
    }

    #[test]
    fn thread_length_respects_cap() {
        let (_, reviews) = generated();
        let mut counts: HashMap<(&str, u64), u32> = HashMap::new();
        for review in &reviews {
            *counts.entry((review.repo.as_str(), review.pr_number)).or_default() += 1;
        }
        assert!(counts.values().all(|&c| (1..=3).contains(&c)));
    }
}
