use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::types::FlakyTest;
use crate::auth::Token;
use crate::error::{Result, ShipLensError};
use crate::providers::parse_base_url;

const CIRCLECI_API_URL: &str = "https://circleci.com/api/v2";
/// The insights API only covers GitHub-backed projects here.
const VCS_SLUG: &str = "gh";

/// Operations the flaky-test tracker needs from CircleCI.
#[async_trait]
pub trait CircleCIApi {
    async fn fetch_flaky_tests(&self, org: &str, repo: &str) -> Result<Vec<FlakyTest>>;
}

pub struct CircleCIClient {
    client: Client,
    api_url: Url,
    token: Token,
}

#[derive(Debug, Deserialize)]
struct FlakyTestResponse {
    #[serde(rename = "flaky-tests", default)]
    flaky_tests: Vec<FlakyTest>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl CircleCIClient {
    pub fn new(token: Token) -> Result<Self> {
        Self::with_base_url(CIRCLECI_API_URL, token)
    }

    /// Used by tests to point the client at a mock server.
    pub fn with_base_url(base_url: &str, token: Token) -> Result<Self> {
        let client = Client::builder()
            .user_agent("shiplens/0.1.0")
            .build()
            .map_err(|e| ShipLensError::ConfigError(format!("Failed to create HTTP client: {e}")))?;
        let api_url = parse_base_url(base_url)?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    fn endpoint(&self, tail: &str) -> Result<Url> {
        self.api_url
            .join(tail)
            .map_err(|e| ShipLensError::ConfigError(format!("Invalid endpoint path: {e}")))
    }

    /// Fails with a descriptive error when the project is missing or the
    /// token cannot see it, so the tracker can stop before burning through
    /// the insights API.
    pub async fn verify_project_access(&self, org: &str, repo: &str) -> Result<()> {
        let project_slug = format!("{VCS_SLUG}/{org}/{repo}");
        let url = self.endpoint(&format!("project/{project_slug}"))?;

        let response = self
            .client
            .get(url)
            .header("Circle-Token", self.token.as_str())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ShipLensError::ApiError(format!(
                "Project {project_slug} not found or token has no access to it"
            )));
        }
        if !status.is_success() {
            return Err(ShipLensError::ApiError(format!(
                "API returned status {status} verifying access to {project_slug}"
            )));
        }

        Ok(())
    }

    async fn fetch_flaky_tests_page(
        &self,
        project_slug: &str,
        page_token: Option<&str>,
    ) -> Result<FlakyTestResponse> {
        let url = self.endpoint(&format!("insights/{project_slug}/flaky-tests"))?;

        let mut request = self
            .client
            .get(url)
            .header("Circle-Token", self.token.as_str())
            .header("Accept", "application/json");
        if let Some(token) = page_token {
            request = request.query(&[("page-token", token)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ShipLensError::ApiError(format!(
                "Project {project_slug} not found or flaky test insights are not available \
                 (check that the project exists and the token can see it)"
            )));
        }
        if !status.is_success() {
            return Err(ShipLensError::ApiError(format!(
                "API returned status {status} fetching flaky tests for {project_slug}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CircleCIApi for CircleCIClient {
    async fn fetch_flaky_tests(&self, org: &str, repo: &str) -> Result<Vec<FlakyTest>> {
        let project_slug = format!("{VCS_SLUG}/{org}/{repo}");
        let mut all_tests = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let body = self
                .fetch_flaky_tests_page(&project_slug, page_token.as_deref())
                .await?;
            all_tests.extend(body.flaky_tests);

            page_token = body.next_page_token.filter(|token| !token.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(all_tests)
    }
}
