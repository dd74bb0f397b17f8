use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::{CloudDeployClient, DeployApi};
use super::types::{Release, Rollout};
use crate::cache::{self, Cache, KeyBuilder, TtlPolicy};
use crate::error::Result;

/// Cloud Deploy client with read-through caching. Rollouts are only written
/// through once their release has finished rendering; before that the set
/// can still grow.
pub struct CachedDeployClient<C> {
    client: CloudDeployClient,
    cache: C,
    keys: KeyBuilder,
    ttl: TtlPolicy,
}

impl<C: Cache> CachedDeployClient<C> {
    pub fn new(client: CloudDeployClient, cache: C, ttl: TtlPolicy) -> Self {
        Self {
            client,
            cache,
            keys: KeyBuilder::new("deploy"),
            ttl,
        }
    }
}

#[async_trait]
impl<C: Cache + Send + Sync> DeployApi for CachedDeployClient<C> {
    async fn fetch_releases(
        &self,
        pipeline_filter: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Release>> {
        let list_key = self.keys.releases_list(
            self.client.project(),
            self.client.region(),
            pipeline_filter,
            start,
            end,
        );
        if let Some(releases) = cache::read(&self.cache, &list_key, "release list") {
            return Ok(releases);
        }

        let releases = self.client.fetch_releases(pipeline_filter, start, end).await?;

        cache::write(
            &self.cache,
            &list_key,
            &releases,
            self.ttl.for_window_end(end),
            "release list",
        );

        for release in &releases {
            if release.is_final() {
                let key = self.keys.release(
                    self.client.project(),
                    self.client.region(),
                    &release.name,
                );
                cache::write(&self.cache, &key, release, self.ttl.settled, "release");
            }
        }

        Ok(releases)
    }

    async fn fetch_rollouts(&self, release: &Release) -> Result<Vec<Rollout>> {
        let key = self
            .keys
            .rollouts(self.client.project(), self.client.region(), &release.name);
        if let Some(rollouts) = cache::read(&self.cache, &key, "rollouts") {
            return Ok(rollouts);
        }

        let rollouts = self.client.fetch_rollouts(release).await?;

        if release.is_final() {
            cache::write(&self.cache, &key, &rollouts, self.ttl.settled, "rollouts");
        }

        Ok(rollouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::cache::FileCache;
    use tempfile::TempDir;

    const RELEASE_NAME: &str =
        "projects/proj/locations/us-east4/deliveryPipelines/test-pipe/releases/rel-1";

    fn release(render_state: &str) -> Release {
        Release {
            name: RELEASE_NAME.to_string(),
            create_time: "2024-03-10T00:00:00Z".parse().unwrap(),
            render_state: render_state.to_string(),
            annotations: Default::default(),
        }
    }

    fn rollouts_body() -> String {
        serde_json::json!({
            "rollouts": [
                {"name": format!("{RELEASE_NAME}/rollouts/ro-1"), "state": "SUCCEEDED", "deployEndTime": "2024-03-10T01:00:00Z"}
            ]
        })
        .to_string()
    }

    fn cached_client(server_url: &str) -> (TempDir, CachedDeployClient<FileCache>) {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::with_dir(dir.path().join("cache")).unwrap();
        let client = CloudDeployClient::with_base_url(
            server_url,
            "proj".to_string(),
            "us-east4".to_string(),
            Token::from("t"),
        )
        .unwrap();
        (dir, CachedDeployClient::new(client, cache, TtlPolicy::default()))
    }

    #[tokio::test]
    async fn test_final_release_rollouts_are_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/projects/proj/locations/us-east4/deliveryPipelines/test-pipe/releases/rel-1/rollouts",
            )
            .with_header("content-type", "application/json")
            .with_body(rollouts_body())
            .expect(1)
            .create_async()
            .await;

        let (_dir, client) = cached_client(&server.url());
        let release = release("SUCCEEDED");

        let first = client.fetch_rollouts(&release).await.unwrap();
        let second = client.fetch_rollouts(&release).await.unwrap();

        mock.assert_async().await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_unrendered_release_rollouts_are_refetched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/projects/proj/locations/us-east4/deliveryPipelines/test-pipe/releases/rel-1/rollouts",
            )
            .with_header("content-type", "application/json")
            .with_body(rollouts_body())
            .expect(2)
            .create_async()
            .await;

        let (_dir, client) = cached_client(&server.url());
        let release = release("IN_PROGRESS");

        client.fetch_rollouts(&release).await.unwrap();
        client.fetch_rollouts(&release).await.unwrap();

        mock.assert_async().await;
    }
}
