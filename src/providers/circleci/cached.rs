use async_trait::async_trait;

use super::client::{CircleCIApi, CircleCIClient};
use super::types::FlakyTest;
use crate::cache::{self, Cache, KeyBuilder, TtlPolicy};
use crate::error::Result;

/// CircleCI client with read-through caching. Flaky-test data churns with
/// every pipeline run, so everything is cached on the short TTL.
pub struct CachedCircleCIClient<C> {
    client: CircleCIClient,
    cache: C,
    keys: KeyBuilder,
    ttl: TtlPolicy,
}

impl<C: Cache> CachedCircleCIClient<C> {
    pub fn new(client: CircleCIClient, cache: C, ttl: TtlPolicy) -> Self {
        Self {
            client,
            cache,
            keys: KeyBuilder::new("circleci"),
            ttl,
        }
    }

    /// Access checks are cheap and must reflect the live token; they bypass
    /// the cache entirely.
    pub async fn verify_project_access(&self, org: &str, repo: &str) -> Result<()> {
        self.client.verify_project_access(org, repo).await
    }
}

#[async_trait]
impl<C: Cache + Send + Sync> CircleCIApi for CachedCircleCIClient<C> {
    async fn fetch_flaky_tests(&self, org: &str, repo: &str) -> Result<Vec<FlakyTest>> {
        let key = self.keys.flaky_tests(org, repo);
        if let Some(tests) = cache::read(&self.cache, &key, "flaky tests") {
            return Ok(tests);
        }

        let tests = self.client.fetch_flaky_tests(org, repo).await?;

        cache::write(&self.cache, &key, &tests, self.ttl.active, "flaky tests");

        Ok(tests)
    }
}
