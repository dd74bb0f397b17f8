use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, LINK};
use reqwest::Client;
use url::Url;

use super::types::{PullRequest, RepositoryCommit, Review};
use crate::auth::Token;
use crate::error::{Result, ShipLensError};
use crate::providers::parse_base_url;

const GITHUB_API_URL: &str = "https://api.github.com";
const PAGE_SIZE: u32 = 100;
/// Review listings are fetched per PR inside larger loops; a hung call here
/// must not stall the whole run.
const REVIEW_FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Operations the trackers need from GitHub.
#[async_trait]
pub trait GithubApi {
    /// Pull requests created inside `[start, end]`, newest first.
    async fn fetch_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PullRequest>>;

    async fn fetch_pull_request_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Review>>;

    /// Commits on the default branch inside `[since, until]`, without diffs.
    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RepositoryCommit>>;

    /// A single commit with its file patches populated.
    async fn fetch_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<RepositoryCommit>;
}

pub struct GithubClient {
    client: Client,
    api_url: Url,
    token: Token,
}

impl GithubClient {
    pub fn new(token: Token) -> Result<Self> {
        Self::with_base_url(GITHUB_API_URL, token)
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

    fn repo_url(&self, owner: &str, repo: &str, tail: &str) -> Result<Url> {
        self.api_url
            .join(&format!("repos/{owner}/{repo}/{tail}"))
            .map_err(|e| ShipLensError::ConfigError(format!("Invalid repository URL: {e}")))
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn fetch_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PullRequest>> {
        let url = self.repo_url(owner, repo, "pulls")?;
        let mut all_prs = Vec::new();
        let mut page: u32 = 1;

        loop {
            let response = self
                .client
                .get(url.clone())
                .query(&[("state", "all"), ("sort", "created"), ("direction", "desc")])
                .query(&[("per_page", PAGE_SIZE), ("page", page)])
                .bearer_auth(self.token.as_str())
                .send()
                .await?
                .error_for_status()?;

            let has_next = has_next_page(response.headers());
            let prs: Vec<PullRequest> = response.json().await?;
            if prs.is_empty() {
                break;
            }

            debug!("Fetched page {page} with {} pull requests", prs.len());

            // Pages arrive newest-first, so once a page ends before the
            // window opens no older page can contain a match.
            let page_ends_before_window = prs
                .last()
                .is_some_and(|pr| pr.created_at < start);

            all_prs.extend(
                prs.into_iter()
                    .filter(|pr| pr.created_at >= start && pr.created_at <= end),
            );

            if !has_next || page_ends_before_window {
                break;
            }
            page += 1;
        }

        Ok(all_prs)
    }

    async fn fetch_pull_request_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Review>> {
        let url = self.repo_url(owner, repo, &format!("pulls/{number}/reviews"))?;

        let response = self
            .client
            .get(url)
            .timeout(REVIEW_FETCH_TIMEOUT)
            .bearer_auth(self.token.as_str())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RepositoryCommit>> {
        let url = self.repo_url(owner, repo, "commits")?;
        let mut all_commits = Vec::new();
        let mut page: u32 = 1;

        loop {
            let response = self
                .client
                .get(url.clone())
                .query(&[("since", since.to_rfc3339()), ("until", until.to_rfc3339())])
                .query(&[("per_page", PAGE_SIZE), ("page", page)])
                .bearer_auth(self.token.as_str())
                .send()
                .await?
                .error_for_status()?;

            let has_next = has_next_page(response.headers());
            let commits: Vec<RepositoryCommit> = response.json().await?;
            if commits.is_empty() {
                break;
            }

            all_commits.extend(commits);

            if !has_next {
                break;
            }
            page += 1;
        }

        Ok(all_commits)
    }

    async fn fetch_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<RepositoryCommit> {
        let url = self.repo_url(owner, repo, &format!("commits/{sha}"))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.as_str())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// True when a GitHub `Link` header advertises another page.
fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|link| link.split(',').any(|part| part.contains("rel=\"next\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use reqwest::header::HeaderValue;

    fn pr_json(number: u64, created_at: &str) -> serde_json::Value {
        serde_json::json!({
            "number": number,
            "title": format!("PR {number}"),
            "state": "open",
            "draft": false,
            "user": {"login": "octocat"},
            "created_at": created_at,
            "merged_at": null,
            "closed_at": null,
            "head": {"ref": format!("branch-{number}")}
        })
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            "2024-01-01T00:00:00Z".parse().unwrap(),
            "2024-02-01T00:00:00Z".parse().unwrap(),
        )
    }

    #[test]
    fn test_has_next_page_detects_next_relation() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/x?page=2>; rel=\"next\", <https://api.github.com/x?page=9>; rel=\"last\"",
            ),
        );

        assert!(has_next_page(&headers));
    }

    #[test]
    fn test_has_next_page_on_last_page() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"prev\""),
        );

        assert!(!has_next_page(&headers));
        assert!(!has_next_page(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn test_fetch_pull_requests_filters_to_window() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!([
            pr_json(3, "2024-02-10T00:00:00Z"),
            pr_json(2, "2024-01-15T00:00:00Z"),
            pr_json(1, "2024-01-02T00:00:00Z"),
        ]);
        let mock = server
            .mock("GET", "/repos/acme/widgets/pulls")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer test-token")
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = GithubClient::with_base_url(&server.url(), Token::from("test-token")).unwrap();
        let (start, end) = window();
        let prs = client
            .fetch_pull_requests("acme", "widgets", start, end)
            .await
            .unwrap();

        mock.assert_async().await;
        let numbers: Vec<u64> = prs.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_fetch_pull_requests_stops_once_page_predates_window() {
        let mut server = mockito::Server::new_async().await;
        // The page advertises a successor, but its oldest PR is already
        // before the window: no second request may be issued.
        let body = serde_json::json!([
            pr_json(5, "2024-01-20T00:00:00Z"),
            pr_json(4, "2023-12-20T00:00:00Z"),
        ]);
        let page1 = server
            .mock("GET", "/repos/acme/widgets/pulls")
            .match_query(Matcher::Any)
            .with_header(
                "link",
                "<https://api.github.com/repos/acme/widgets/pulls?page=2>; rel=\"next\"",
            )
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let client = GithubClient::with_base_url(&server.url(), Token::from("t")).unwrap();
        let (start, end) = window();
        let prs = client
            .fetch_pull_requests("acme", "widgets", start, end)
            .await
            .unwrap();

        page1.assert_async().await;
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].number, 5);
    }

    #[tokio::test]
    async fn test_fetch_pull_requests_follows_link_pagination() {
        let mut server = mockito::Server::new_async().await;
        let page1_body = serde_json::json!([pr_json(9, "2024-01-25T00:00:00Z")]);
        let page2_body = serde_json::json!([pr_json(8, "2024-01-05T00:00:00Z")]);
        let page1 = server
            .mock("GET", "/repos/acme/widgets/pulls")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_header(
                "link",
                "<https://api.github.com/repos/acme/widgets/pulls?page=2>; rel=\"next\"",
            )
            .with_header("content-type", "application/json")
            .with_body(page1_body.to_string())
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/repos/acme/widgets/pulls")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_header("content-type", "application/json")
            .with_body(page2_body.to_string())
            .create_async()
            .await;

        let client = GithubClient::with_base_url(&server.url(), Token::from("t")).unwrap();
        let (start, end) = window();
        let prs = client
            .fetch_pull_requests("acme", "widgets", start, end)
            .await
            .unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        assert_eq!(prs.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_pull_request_reviews() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!([
            {"user": {"login": "alice"}, "state": "APPROVED", "submitted_at": "2024-01-12T08:00:00Z"},
            {"user": {"login": "bob"}, "state": "PENDING"}
        ]);
        let mock = server
            .mock("GET", "/repos/acme/widgets/pulls/42/reviews")
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = GithubClient::with_base_url(&server.url(), Token::from("t")).unwrap();
        let reviews = client
            .fetch_pull_request_reviews("acme", "widgets", 42)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].user.login, "alice");
        assert_eq!(reviews[1].submitted_at, None);
    }

    #[tokio::test]
    async fn test_fetch_commit_returns_patches() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "sha": "abc1234",
            "commit": {
                "message": "deploy widgets",
                "author": {"name": "CI", "date": "2024-01-15T14:30:45Z"},
                "committer": {"name": "CI", "date": "2024-01-15T14:30:45Z"}
            },
            "files": [
                {"filename": "tags.yaml", "patch": "+web: pull-42_abc1234"}
            ]
        });
        let mock = server
            .mock("GET", "/repos/acme/tags/commits/abc1234")
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = GithubClient::with_base_url(&server.url(), Token::from("t")).unwrap();
        let commit = client.fetch_commit("acme", "tags", "abc1234").await.unwrap();

        mock.assert_async().await;
        assert_eq!(commit.files.len(), 1);
        assert_eq!(commit.files[0].patch.as_deref(), Some("+web: pull-42_abc1234"));
    }

    #[tokio::test]
    async fn test_http_error_surfaces_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/widgets/pulls/42/reviews")
            .with_status(500)
            .create_async()
            .await;

        let client = GithubClient::with_base_url(&server.url(), Token::from("t")).unwrap();
        let result = client.fetch_pull_request_reviews("acme", "widgets", 42).await;

        assert!(result.is_err());
    }
}
