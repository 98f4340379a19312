//! In-memory corpus store for mimic.
//!
//! The store follows a build-then-freeze discipline: the generation pipeline
//! feeds a [`CorpusBuilder`] single-threaded, then [`CorpusBuilder::build`]
//! validates referential integrity, sorts everything into its canonical
//! order, and produces an immutable [`Corpus`]. Handlers share the frozen
//! corpus behind an `Arc` and never synchronize.
//!
//! Range scans are half-open `[from, to)` and ascend by timestamp with a
//! stable tie-break: commit hash, `(repo, number)` for PRs, id for reviews,
//! issues, and usage events.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use mimic_types::{
    Commit, Developer, Issue, PrState, PullRequest, Review, UsageEvent, UsageStream,
};

/// Referential-integrity violations caught when freezing the corpus.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("commit {hash} authored by unknown developer {user_id}")]
    UnknownAuthor { hash: String, user_id: String },
    #[error("duplicate commit hash {0}")]
    DuplicateHash(String),
    #[error("pull request {repo}#{number} has no commits")]
    EmptyPr { repo: String, number: u64 },
    #[error("pull request {repo}#{number} references unknown commit {hash}")]
    UnknownPrCommit {
        repo: String,
        number: u64,
        hash: String,
    },
    #[error("pull request {repo}#{number} references commit {hash} from another repository")]
    CrossRepoPrCommit {
        repo: String,
        number: u64,
        hash: String,
    },
    #[error("repository {repo} PR numbers are not contiguous from 1 (found {found} PRs, max number {max})")]
    NonContiguousPrNumbers { repo: String, found: usize, max: u64 },
    #[error("review {id} references unknown pull request {repo}#{pr_number}")]
    UnknownReviewPr {
        id: u64,
        repo: String,
        pr_number: u64,
    },
    #[error("issue {id} references pull request {repo}#{pr_number} which is not merged")]
    IssueOnUnmergedPr {
        id: u64,
        repo: String,
        pr_number: u64,
    },
}

/// Entity counts for startup logging, `/health`, and preview summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorpusCounts {
    pub developers: usize,
    pub repositories: usize,
    pub commits: usize,
    pub pull_requests: usize,
    pub reviews: usize,
    pub issues: usize,
    pub usage_events: usize,
}

/// Write-side accumulator. Only the startup pipeline touches this; it is
/// consumed by [`CorpusBuilder::build`] before the server opens.
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    developers: Vec<Developer>,
    repositories: Vec<String>,
    team_id: u64,
    commits: Vec<Commit>,
    prs: Vec<PullRequest>,
    reviews: Vec<Review>,
    issues: Vec<Issue>,
    usage: BTreeMap<UsageStream, Vec<UsageEvent>>,
}

impl CorpusBuilder {
    pub fn new(developers: Vec<Developer>, repositories: Vec<String>, team_id: u64) -> Self {
        Self {
            developers,
            repositories,
            team_id,
            ..Default::default()
        }
    }

    pub fn push_commit(&mut self, commit: Commit) {
        self.commits.push(commit);
    }

    pub fn push_pr(&mut self, pr: PullRequest) {
        self.prs.push(pr);
    }

    pub fn push_review(&mut self, review: Review) {
        self.reviews.push(review);
    }

    pub fn push_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn push_usage(&mut self, stream: UsageStream, event: UsageEvent) {
        self.usage.entry(stream).or_default().push(event);
    }

    /// Read access during generation: later stages (PR grouping, usage
    /// streams) consume the commits emitted by earlier ones.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn prs(&self) -> &[PullRequest] {
        &self.prs
    }

    pub fn developers(&self) -> &[Developer] {
        &self.developers
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    /// Validate invariants, sort into canonical order, build indices, and
    /// freeze. After this nothing mutates.
    pub fn build(self) -> Result<Corpus, StoreError> {
        let Self {
            developers,
            repositories,
            team_id,
            mut commits,
            mut prs,
            mut reviews,
            mut issues,
            usage,
        } = self;

        let dev_by_id: HashMap<String, usize> = developers
            .iter()
            .enumerate()
            .map(|(i, d)| (d.user_id.clone(), i))
            .collect();
        let dev_by_email: HashMap<String, usize> = developers
            .iter()
            .enumerate()
            .map(|(i, d)| (d.email.clone(), i))
            .collect();

        commits.sort_by(|a, b| (a.timestamp, &a.hash).cmp(&(b.timestamp, &b.hash)));
        prs.sort_by(|a, b| (&a.repo, a.number).cmp(&(&b.repo, b.number)));
        reviews.sort_by_key(|r| r.id);
        issues.sort_by_key(|i| i.id);

        let mut commit_by_hash = HashMap::with_capacity(commits.len());
        let mut commits_by_user: HashMap<String, Vec<usize>> = HashMap::new();
        let mut commits_by_repo: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, commit) in commits.iter().enumerate() {
            if !dev_by_id.contains_key(commit.user_id.as_str()) {
                return Err(StoreError::UnknownAuthor {
                    hash: commit.hash.clone(),
                    user_id: commit.user_id.clone(),
                });
            }
            if commit_by_hash.insert(commit.hash.clone(), idx).is_some() {
                return Err(StoreError::DuplicateHash(commit.hash.clone()));
            }
            commits_by_user
                .entry(commit.user_id.clone())
                .or_default()
                .push(idx);
            commits_by_repo
                .entry(commit.repo.clone())
                .or_default()
                .push(idx);
        }

        let mut pr_index = HashMap::with_capacity(prs.len());
        let mut prs_by_user: HashMap<String, Vec<usize>> = HashMap::new();
        let mut prs_by_repo: HashMap<String, Vec<usize>> = HashMap::new();
        let mut max_number_per_repo: HashMap<&str, u64> = HashMap::new();
        for (idx, pr) in prs.iter().enumerate() {
            if pr.commit_hashes.is_empty() {
                return Err(StoreError::EmptyPr {
                    repo: pr.repo.clone(),
                    number: pr.number,
                });
            }
            for hash in &pr.commit_hashes {
                match commit_by_hash.get(hash) {
                    None => {
                        return Err(StoreError::UnknownPrCommit {
                            repo: pr.repo.clone(),
                            number: pr.number,
                            hash: hash.clone(),
                        });
                    }
                    Some(&cidx) if commits[cidx].repo != pr.repo => {
                        return Err(StoreError::CrossRepoPrCommit {
                            repo: pr.repo.clone(),
                            number: pr.number,
                            hash: hash.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
            pr_index.insert((pr.repo.clone(), pr.number), idx);
            prs_by_user.entry(pr.author.clone()).or_default().push(idx);
            prs_by_repo.entry(pr.repo.clone()).or_default().push(idx);
            let max = max_number_per_repo.entry(pr.repo.as_str()).or_default();
            *max = (*max).max(pr.number);
        }
        for (repo, indices) in &prs_by_repo {
            let max = max_number_per_repo.get(repo.as_str()).copied().unwrap_or(0);
            if max != indices.len() as u64 {
                return Err(StoreError::NonContiguousPrNumbers {
                    repo: repo.clone(),
                    found: indices.len(),
                    max,
                });
            }
        }

        let mut prs_by_created: Vec<usize> = (0..prs.len()).collect();
        prs_by_created.sort_by(|&a, &b| {
            (prs[a].created_at, &prs[a].repo, prs[a].number)
                .cmp(&(prs[b].created_at, &prs[b].repo, prs[b].number))
        });

        let mut reviews_by_pr: HashMap<(String, u64), Vec<usize>> = HashMap::new();
        for (idx, review) in reviews.iter().enumerate() {
            let key = (review.repo.clone(), review.pr_number);
            if !pr_index.contains_key(&key) {
                return Err(StoreError::UnknownReviewPr {
                    id: review.id,
                    repo: review.repo.clone(),
                    pr_number: review.pr_number,
                });
            }
            reviews_by_pr.entry(key).or_default().push(idx);
        }

        let mut issues_by_repo: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, issue) in issues.iter().enumerate() {
            let merged = pr_index
                .get(&(issue.repo.clone(), issue.pr_number))
                .map(|&pidx| prs[pidx].state == PrState::Merged)
                .unwrap_or(false);
            if !merged {
                return Err(StoreError::IssueOnUnmergedPr {
                    id: issue.id,
                    repo: issue.repo.clone(),
                    pr_number: issue.pr_number,
                });
            }
            issues_by_repo
                .entry(issue.repo.clone())
                .or_default()
                .push(idx);
        }

        let mut usage_sorted: HashMap<UsageStream, Vec<UsageEvent>> = HashMap::new();
        let mut usage_by_user: HashMap<(UsageStream, String), Vec<usize>> = HashMap::new();
        for (stream, mut events) in usage {
            // Stable: equal timestamps keep generation order.
            events.sort_by_key(|e| e.timestamp);
            for (idx, event) in events.iter().enumerate() {
                usage_by_user
                    .entry((stream, event.user_id.clone()))
                    .or_default()
                    .push(idx);
            }
            usage_sorted.insert(stream, events);
        }

        Ok(Corpus {
            developers,
            dev_by_id,
            dev_by_email,
            repositories,
            team_id,
            commits,
            commit_by_hash,
            commits_by_user,
            commits_by_repo,
            prs,
            pr_index,
            prs_by_user,
            prs_by_repo,
            prs_by_created,
            reviews,
            reviews_by_pr,
            issues,
            issues_by_repo,
            usage: usage_sorted,
            usage_by_user,
        })
    }
}

/// The frozen corpus. All queries are read-only; the struct is `Sync` and is
/// shared across handler tasks as `Arc<Corpus>`.
#[derive(Debug, Default)]
pub struct Corpus {
    developers: Vec<Developer>,
    dev_by_id: HashMap<String, usize>,
    dev_by_email: HashMap<String, usize>,
    repositories: Vec<String>,
    team_id: u64,

    commits: Vec<Commit>,
    commit_by_hash: HashMap<String, usize>,
    commits_by_user: HashMap<String, Vec<usize>>,
    commits_by_repo: HashMap<String, Vec<usize>>,

    prs: Vec<PullRequest>,
    pr_index: HashMap<(String, u64), usize>,
    prs_by_user: HashMap<String, Vec<usize>>,
    prs_by_repo: HashMap<String, Vec<usize>>,
    prs_by_created: Vec<usize>,

    reviews: Vec<Review>,
    reviews_by_pr: HashMap<(String, u64), Vec<usize>>,

    issues: Vec<Issue>,
    issues_by_repo: HashMap<String, Vec<usize>>,

    usage: HashMap<UsageStream, Vec<UsageEvent>>,
    usage_by_user: HashMap<(UsageStream, String), Vec<usize>>,
}

impl Corpus {
    /// An empty corpus; handy for handler tests.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn developers_list(&self) -> &[Developer] {
        &self.developers
    }

    pub fn developer_by_id(&self, user_id: &str) -> Option<&Developer> {
        self.dev_by_id.get(user_id).map(|&i| &self.developers[i])
    }

    pub fn developer_by_email(&self, email: &str) -> Option<&Developer> {
        self.dev_by_email.get(email).map(|&i| &self.developers[i])
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    pub fn has_repository(&self, repo: &str) -> bool {
        self.repositories.iter().any(|r| r == repo)
    }

    pub fn team_id(&self) -> u64 {
        self.team_id
    }

    pub fn commit_by_hash(&self, hash: &str) -> Option<&Commit> {
        self.commit_by_hash.get(hash).map(|&i| &self.commits[i])
    }

    /// All commits with `from <= timestamp < to`, ascending by
    /// `(timestamp, hash)`.
    pub fn commits_by_time(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Commit> {
        let lo = self.commits.partition_point(|c| c.timestamp < from);
        let hi = self.commits.partition_point(|c| c.timestamp < to);
        self.commits[lo..hi].iter().collect()
    }

    /// One user's commits inside `[from, to)`, ascending.
    pub fn commits_by_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&Commit> {
        self.commits_by_user
            .get(user_id)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| &self.commits[i])
                    .filter(|c| c.timestamp >= from && c.timestamp < to)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A repository's commits in timestamp order (full history).
    pub fn commits_by_repo(&self, repo: &str) -> Vec<&Commit> {
        self.commits_by_repo
            .get(repo)
            .map(|indices| indices.iter().map(|&i| &self.commits[i]).collect())
            .unwrap_or_default()
    }

    pub fn pr(&self, repo: &str, number: u64) -> Option<&PullRequest> {
        self.pr_index
            .get(&(repo.to_string(), number))
            .map(|&i| &self.prs[i])
    }

    /// A repository's PRs ordered by number.
    pub fn prs_by_repo(&self, repo: &str) -> Vec<&PullRequest> {
        self.prs_by_repo
            .get(repo)
            .map(|indices| indices.iter().map(|&i| &self.prs[i]).collect())
            .unwrap_or_default()
    }

    pub fn prs_by_user(&self, user_id: &str) -> Vec<&PullRequest> {
        self.prs_by_user
            .get(user_id)
            .map(|indices| indices.iter().map(|&i| &self.prs[i]).collect())
            .unwrap_or_default()
    }

    /// All PRs whose `created_at` lies in `[from, to)`, ascending by
    /// `(created_at, repo, number)`.
    pub fn prs_by_time(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&PullRequest> {
        let lo = self
            .prs_by_created
            .partition_point(|&i| self.prs[i].created_at < from);
        let hi = self
            .prs_by_created
            .partition_point(|&i| self.prs[i].created_at < to);
        self.prs_by_created[lo..hi]
            .iter()
            .map(|&i| &self.prs[i])
            .collect()
    }

    /// Reviews for one PR, ascending by iteration (equivalently, id).
    pub fn reviews_by_pr(&self, repo: &str, number: u64) -> Vec<&Review> {
        self.reviews_by_pr
            .get(&(repo.to_string(), number))
            .map(|indices| indices.iter().map(|&i| &self.reviews[i]).collect())
            .unwrap_or_default()
    }

    pub fn issues_by_repo(&self, repo: &str) -> Vec<&Issue> {
        self.issues_by_repo
            .get(repo)
            .map(|indices| indices.iter().map(|&i| &self.issues[i]).collect())
            .unwrap_or_default()
    }

    /// All events of one stream inside `[from, to)`, ascending.
    pub fn events_by_time(
        &self,
        stream: UsageStream,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&UsageEvent> {
        self.usage
            .get(&stream)
            .map(|events| {
                let lo = events.partition_point(|e| e.timestamp < from);
                let hi = events.partition_point(|e| e.timestamp < to);
                events[lo..hi].iter().collect()
            })
            .unwrap_or_default()
    }

    /// One user's events of one stream inside `[from, to)`, ascending.
    pub fn events_by_user_and_time(
        &self,
        stream: UsageStream,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&UsageEvent> {
        let Some(events) = self.usage.get(&stream) else {
            return Vec::new();
        };
        self.usage_by_user
            .get(&(stream, user_id.to_string()))
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| &events[i])
                    .filter(|e| e.timestamp >= from && e.timestamp < to)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn counts(&self) -> CorpusCounts {
        CorpusCounts {
            developers: self.developers.len(),
            repositories: self.repositories.len(),
            commits: self.commits.len(),
            pull_requests: self.prs.len(),
            reviews: self.reviews.len(),
            issues: self.issues.len(),
            usage_events: self.usage.values().map(Vec::len).sum(),
        }
    }
}
