use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::types::{DeliveryPipeline, Release, Rollout};
use crate::auth::Token;
use crate::error::{Result, ShipLensError};
use crate::providers::parse_base_url;

const CLOUD_DEPLOY_API_URL: &str = "https://clouddeploy.googleapis.com/v1";

/// Operations the deployment correlator needs from Cloud Deploy.
#[async_trait]
pub trait DeployApi {
    /// Succeeded releases created inside `[start, end]`, gathered from
    /// every delivery pipeline whose name contains `pipeline_filter`.
    async fn fetch_releases(
        &self,
        pipeline_filter: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Release>>;

    /// All rollouts belonging to `release`.
    async fn fetch_rollouts(&self, release: &Release) -> Result<Vec<Rollout>>;
}

pub struct CloudDeployClient {
    client: Client,
    api_url: Url,
    token: Token,
    project: String,
    region: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPipelinesResponse {
    #[serde(default)]
    delivery_pipelines: Vec<DeliveryPipeline>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListReleasesResponse {
    #[serde(default)]
    releases: Vec<Release>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRolloutsResponse {
    #[serde(default)]
    rollouts: Vec<Rollout>,
    next_page_token: Option<String>,
}

impl CloudDeployClient {
    pub fn new(project: String, region: String, token: Token) -> Result<Self> {
        Self::with_base_url(CLOUD_DEPLOY_API_URL, project, region, token)
    }

    /// Used by tests to point the client at a mock server.
    pub fn with_base_url(
        base_url: &str,
        project: String,
        region: String,
        token: Token,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent("shiplens/0.1.0")
            .build()
            .map_err(|e| ShipLensError::ConfigError(format!("Failed to create HTTP client: {e}")))?;
        let api_url = parse_base_url(base_url)?;

        Ok(Self {
            client,
            api_url,
            token,
            project,
            region,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn resource_url(&self, resource: &str) -> Result<Url> {
        self.api_url
            .join(resource)
            .map_err(|e| ShipLensError::ConfigError(format!("Invalid resource path: {e}")))
    }

    /// Walks a `pageToken`-paginated list endpoint to exhaustion. `split`
    /// pulls the items and the next token out of one response body.
    async fn list_pages<B, T>(
        &self,
        url: Url,
        split: impl Fn(B) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>>
    where
        B: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(url.clone()).bearer_auth(self.token.as_str());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?.error_for_status()?;
            let (mut page, next) = split(response.json::<B>().await?);
            items.append(&mut page);

            page_token = next.filter(|token| !token.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn list_delivery_pipelines(&self) -> Result<Vec<DeliveryPipeline>> {
        let url = self.resource_url(&format!(
            "projects/{}/locations/{}/deliveryPipelines",
            self.project, self.region
        ))?;
        self.list_pages(url, |body: ListPipelinesResponse| {
            (body.delivery_pipelines, body.next_page_token)
        })
        .await
    }

    async fn list_releases(&self, pipeline_name: &str) -> Result<Vec<Release>> {
        let url = self.resource_url(&format!("{pipeline_name}/releases"))?;
        self.list_pages(url, |body: ListReleasesResponse| {
            (body.releases, body.next_page_token)
        })
        .await
    }

    async fn list_rollouts(&self, release_name: &str) -> Result<Vec<Rollout>> {
        let url = self.resource_url(&format!("{release_name}/rollouts"))?;
        self.list_pages(url, |body: ListRolloutsResponse| {
            (body.rollouts, body.next_page_token)
        })
        .await
    }
}

#[async_trait]
impl DeployApi for CloudDeployClient {
    async fn fetch_releases(
        &self,
        pipeline_filter: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Release>> {
        let filter = pipeline_filter.to_lowercase();
        let pipelines = self.list_delivery_pipelines().await?;
        let selected: Vec<DeliveryPipeline> = pipelines
            .into_iter()
            .filter(|pipeline| pipeline.name.to_lowercase().contains(&filter))
            .collect();

        if selected.is_empty() {
            return Err(ShipLensError::ApiError(format!(
                "No delivery pipelines matching '{pipeline_filter}' found in {}/{}",
                self.project, self.region
            )));
        }
        info!(
            "Found {} delivery pipelines matching '{pipeline_filter}'",
            selected.len()
        );

        let mut all_releases = Vec::new();
        for pipeline in &selected {
            let releases = self.list_releases(&pipeline.name).await?;
            let total = releases.len();

            // Only fully rendered releases inside the window can be
            // correlated with a commit.
            let mut kept: Vec<Release> = releases
                .into_iter()
                .filter(|release| release.create_time >= start && release.create_time <= end)
                .filter(|release| release.render_state == "SUCCEEDED")
                .collect();

            info!(
                "Pipeline {}: {} of {total} releases in range and succeeded",
                pipeline.name,
                kept.len()
            );
            all_releases.append(&mut kept);
        }

        Ok(all_releases)
    }

    async fn fetch_rollouts(&self, release: &Release) -> Result<Vec<Rollout>> {
        self.list_rollouts(&release.name).await
    }
}
