use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::{GithubApi, GithubClient};
use super::types::{PullRequest, RepositoryCommit, Review};
use crate::cache::{self, Cache, KeyBuilder, TtlPolicy};
use crate::error::Result;

/// GitHub client with read-through caching for PR lists, individual closed
/// PRs and reviews. Commit lookups always go to the API: tag scans touch a
/// wide, ever-growing commit range that would only churn the cache.
pub struct CachedGithubClient<C> {
    client: GithubClient,
    cache: C,
    keys: KeyBuilder,
    ttl: TtlPolicy,
}

impl<C: Cache> CachedGithubClient<C> {
    pub fn new(client: GithubClient, cache: C, ttl: TtlPolicy) -> Self {
        Self {
            client,
            cache,
            keys: KeyBuilder::new("github"),
            ttl,
        }
    }
}

#[async_trait]
impl<C: Cache + Send + Sync> GithubApi for CachedGithubClient<C> {
    async fn fetch_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PullRequest>> {
        let list_key = self.keys.prs_list(owner, repo, start, end);
        if let Some(prs) = cache::read(&self.cache, &list_key, "PR list") {
            return Ok(prs);
        }

        let prs = self.client.fetch_pull_requests(owner, repo, start, end).await?;

        cache::write(
            &self.cache,
            &list_key,
            &prs,
            self.ttl.for_window_end(end),
            "PR list",
        );

        // Closed PRs no longer change; keeping them on their own key lets
        // the review TTL decision below see their final state.
        for pr in &prs {
            if pr.is_closed() {
                let key = self.keys.pr(owner, repo, pr.number);
                cache::write(&self.cache, &key, pr, self.ttl.settled, "PR");
            }
        }

        Ok(prs)
    }

    async fn fetch_pull_request_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Review>> {
        let key = self.keys.pr_reviews(owner, repo, number);
        if let Some(reviews) = cache::read(&self.cache, &key, "PR reviews") {
            return Ok(reviews);
        }

        let reviews = self
            .client
            .fetch_pull_request_reviews(owner, repo, number)
            .await?;

        // Reviews of a closed PR are settled; anything else may still gain
        // reviews and has to expire quickly.
        let pr: Option<PullRequest> = cache::read(&self.cache, &self.keys.pr(owner, repo, number), "PR");
        let ttl = match &pr {
            Some(pr) if pr.is_closed() => self.ttl.settled,
            _ => self.ttl.active,
        };
        cache::write(&self.cache, &key, &reviews, ttl, "PR reviews");

        Ok(reviews)
    }

    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RepositoryCommit>> {
        self.client.fetch_commits(owner, repo, since, until).await
    }

    async fn fetch_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<RepositoryCommit> {
        self.client.fetch_commit(owner, repo, sha).await
    }
}
