use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Pull request as returned by the REST list endpoint. Only the fields the
/// trackers consume are kept; everything else in the payload is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    /// `open` or `closed`; merged PRs are `closed` with `merged_at` set.
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub user: User,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub head: Branch,
}

impl PullRequest {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// Review on a pull request. `submitted_at` is absent while a review is
/// still pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub user: User,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Commit as returned by the commits endpoints. `files` carries the unified
/// diff patches and is only populated by the single-commit endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryCommit {
    pub sha: String,
    pub commit: CommitDetail,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: CommitSignature,
    pub committer: CommitSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSignature {
    pub name: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    pub patch: Option<String>,
}

/// One review event attributed to a pull request, with the latency from PR
/// creation to the review landing.
#[derive(Debug, Clone)]
pub struct ReviewLatency {
    pub reviewer: String,
    pub state: String,
    pub elapsed: Duration,
}

/// Review metrics for one eligible pull request.
#[derive(Debug, Clone)]
pub struct PullRequestMetric {
    pub number: u64,
    pub title: String,
    pub author: String,
    /// Earliest qualifying review of any state.
    pub first_review: Option<ReviewLatency>,
    /// Earliest `APPROVED` review; never earlier than `first_review`, and
    /// possibly by a different reviewer.
    pub approval: Option<ReviewLatency>,
    /// Age of the PR at processing time; this is the reported figure while
    /// no qualifying review exists.
    pub time_since_creation: Duration,
    /// Tags-repo commits whose diff references this PR.
    pub tag_commits: Vec<TagCommit>,
}

impl PullRequestMetric {
    pub fn has_review(&self) -> bool {
        self.first_review.is_some()
    }
}

/// Tags-repository commit that deployed a pull request.
#[derive(Debug, Clone)]
pub struct TagCommit {
    pub sha: String,
    pub message: String,
    pub date: DateTime<Utc>,
    pub author: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_deserializes_from_api_payload() {
        let raw = serde_json::json!({
            "number": 42,
            "title": "Add retry logic",
            "state": "closed",
            "draft": false,
            "user": {"login": "octocat", "id": 1},
            "created_at": "2024-01-10T09:00:00Z",
            "merged_at": "2024-01-11T10:00:00Z",
            "closed_at": "2024-01-11T10:00:00Z",
            "head": {"ref": "retry-logic", "sha": "abc"},
            "base": {"ref": "master"}
        });

        let pr: PullRequest = serde_json::from_value(raw).unwrap();

        assert_eq!(pr.number, 42);
        assert!(pr.is_closed());
        assert!(pr.merged_at.is_some());
        assert_eq!(pr.head.ref_name, "retry-logic");
    }

    #[test]
    fn test_pull_request_tolerates_missing_draft_and_null_dates() {
        let raw = serde_json::json!({
            "number": 7,
            "title": "WIP",
            "state": "open",
            "user": {"login": "octocat"},
            "created_at": "2024-01-10T09:00:00Z",
            "merged_at": null,
            "closed_at": null,
            "head": {"ref": "wip"}
        });

        let pr: PullRequest = serde_json::from_value(raw).unwrap();

        assert!(!pr.draft);
        assert_eq!(pr.merged_at, None);
        assert_eq!(pr.closed_at, None);
    }

    #[test]
    fn test_review_without_submitted_at_deserializes() {
        let raw = serde_json::json!({
            "user": {"login": "reviewer"},
            "state": "PENDING"
        });

        let review: Review = serde_json::from_value(raw).unwrap();

        assert_eq!(review.submitted_at, None);
    }

    #[test]
    fn test_commit_files_default_to_empty() {
        let raw = serde_json::json!({
            "sha": "abc1234",
            "commit": {
                "message": "deploy",
                "author": {"name": "CI", "date": "2024-02-01T00:00:00Z"},
                "committer": {"name": "CI", "date": "2024-02-01T00:00:00Z"}
            }
        });

        let commit: RepositoryCommit = serde_json::from_value(raw).unwrap();

        assert!(commit.files.is_empty());
    }
}
