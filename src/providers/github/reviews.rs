use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use super::client::GithubApi;
use super::types::{PullRequest, PullRequestMetric, Review, ReviewLatency, TagCommit};
use crate::diffscan::PullRequestMatcher;

/// How far past creation to scan for tag commits while a PR is still open.
const OPEN_PR_TAG_WINDOW_DAYS: i64 = 30;

/// Settings for one review-latency run.
#[derive(Debug, Clone, Default)]
pub struct ReviewConfig {
    pub owner: String,
    pub repo: String,
    /// Logins whose PRs and reviews are ignored entirely (bots, release
    /// automation).
    pub denylist: Vec<String>,
    /// `(owner, repo)` of the tags repository to scan for deploy
    /// references, if any.
    pub tags_repo: Option<(String, String)>,
}

impl ReviewConfig {
    fn denies(&self, login: &str) -> bool {
        self.denylist.iter().any(|denied| denied == login)
    }
}

/// Turns pull requests into review-latency metrics.
///
/// Drafts, PRs closed without merging and deny-listed authors are filtered
/// out. Every surviving PR is emitted even when it has no qualifying review;
/// "nobody reviewed this yet" is itself a reportable state. A failed review
/// fetch drops only that PR.
pub async fn process_pull_requests<G: GithubApi>(
    client: &G,
    prs: &[PullRequest],
    config: &ReviewConfig,
) -> Vec<PullRequestMetric> {
    let mut results = Vec::new();

    for pr in prs {
        if pr.draft {
            continue;
        }
        if pr.is_closed() && pr.merged_at.is_none() {
            continue;
        }
        if config.denies(&pr.user.login) {
            continue;
        }

        let reviews = match client
            .fetch_pull_request_reviews(&config.owner, &config.repo, pr.number)
            .await
        {
            Ok(reviews) => reviews,
            Err(err) => {
                warn!("Error fetching reviews for PR #{}: {err}", pr.number);
                continue;
            }
        };

        let (first_review, approval) = select_reviews(&reviews, pr, config);

        let tag_commits = match &config.tags_repo {
            Some((tags_owner, tags_repo)) => {
                collect_tag_commits(client, pr, tags_owner, tags_repo).await
            }
            None => Vec::new(),
        };

        results.push(PullRequestMetric {
            number: pr.number,
            title: pr.title.clone(),
            author: pr.user.login.clone(),
            first_review,
            approval,
            time_since_creation: Utc::now() - pr.created_at,
            tag_commits,
        });
    }

    info!("Processed {} of {} pull requests", results.len(), prs.len());
    results
}

/// Picks the earliest qualifying review and the earliest approval. Pending
/// reviews, self-reviews and deny-listed reviewers never qualify.
fn select_reviews(
    reviews: &[Review],
    pr: &PullRequest,
    config: &ReviewConfig,
) -> (Option<ReviewLatency>, Option<ReviewLatency>) {
    let mut first: Option<(DateTime<Utc>, &Review)> = None;
    let mut approved: Option<(DateTime<Utc>, &Review)> = None;

    for review in reviews {
        if review.state == "PENDING" || review.user.login == pr.user.login {
            continue;
        }
        if config.denies(&review.user.login) {
            continue;
        }
        let Some(submitted_at) = review.submitted_at else {
            continue;
        };

        if first.map_or(true, |(at, _)| submitted_at < at) {
            first = Some((submitted_at, review));
        }
        if review.state == "APPROVED" && approved.map_or(true, |(at, _)| submitted_at < at) {
            approved = Some((submitted_at, review));
        }
    }

    let latency = |(at, review): (DateTime<Utc>, &Review)| ReviewLatency {
        reviewer: review.user.login.clone(),
        state: review.state.clone(),
        elapsed: at - pr.created_at,
    };

    (first.map(latency), approved.map(latency))
}

/// Fetches tags-repo commits inside the PR's lifetime and keeps those whose
/// diff references the PR, either by number or by head branch. All matching
/// commits are collected; any fetch error empties the result for this PR.
async fn collect_tag_commits<G: GithubApi>(
    client: &G,
    pr: &PullRequest,
    tags_owner: &str,
    tags_repo: &str,
) -> Vec<TagCommit> {
    let matcher = match PullRequestMatcher::new(pr.number, Some(&pr.head.ref_name)) {
        Ok(matcher) => matcher,
        Err(err) => {
            warn!("Error building deploy tag patterns for PR #{}: {err}", pr.number);
            return Vec::new();
        }
    };

    let until = pr
        .merged_at
        .or(pr.closed_at)
        .unwrap_or_else(|| pr.created_at + Duration::days(OPEN_PR_TAG_WINDOW_DAYS));

    let commits = match client
        .fetch_commits(tags_owner, tags_repo, pr.created_at, until)
        .await
    {
        Ok(commits) => commits,
        Err(err) => {
            warn!("Error fetching tags repo commits for PR #{}: {err}", pr.number);
            return Vec::new();
        }
    };

    let mut tag_commits = Vec::new();
    for candidate in commits {
        // The list endpoint omits diffs; each commit has to be refetched
        // individually to see its patches.
        let commit = match client.fetch_commit(tags_owner, tags_repo, &candidate.sha).await {
            Ok(commit) => commit,
            Err(err) => {
                warn!("Error fetching tags repo commit {}: {err}", candidate.sha);
                continue;
            }
        };

        let matched = matcher.matches(commit.files.iter().filter_map(|f| f.patch.as_deref()));
        if matched {
            tag_commits.push(TagCommit {
                sha: commit.sha,
                message: commit.commit.message,
                date: commit.commit.author.date,
                author: commit.commit.author.name,
            });
        }
    }

    tag_commits
}
