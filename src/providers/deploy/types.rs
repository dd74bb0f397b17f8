use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Delivery pipeline resource; only the fully qualified name is consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPipeline {
    pub name: String,
}

/// Release resource. `name` is the fully qualified
/// `projects/.../deliveryPipelines/.../releases/...` path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub render_state: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Release {
    /// Trailing path segment of the fully qualified name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// A release stops changing once rendering has finished either way.
    pub fn is_final(&self) -> bool {
        self.render_state == "SUCCEEDED" || self.render_state == "FAILED"
    }
}

/// Rollout resource; one target's execution of a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    pub name: String,
    pub state: String,
    pub deploy_end_time: Option<DateTime<Utc>>,
}

/// Commit-to-deploy latency for one correlated release.
#[derive(Debug, Clone)]
pub struct DeploymentMetric {
    pub release_id: String,
    pub release_name: String,
    pub commit_sha: String,
    /// From `pull-<number>_<sha>` deploy tags; `None` for main-branch
    /// deploys.
    pub pr_number: Option<String>,
    pub commit_time: DateTime<Utc>,
    pub release_start_time: DateTime<Utc>,
    /// When the last succeeded rollout of the release finished.
    pub release_finish_time: DateTime<Utc>,
    /// Finish time minus commit time. Kept signed: a negative value means
    /// the annotations or clocks disagree, and hiding that would mask the
    /// data problem.
    pub latency: Duration,
    /// Always true today; the correlator drops failures instead of emitting
    /// failed records.
    pub successful: bool,
}

/// Deployment statistics for all releases of one pull request.
#[derive(Debug, Clone)]
pub struct PrDeploymentStats {
    pub pr_number: String,
    pub deployment_count: usize,
    pub first_commit_time: DateTime<Utc>,
    pub last_finish_time: DateTime<Utc>,
    pub first_to_last: Duration,
    /// Distinct commit SHAs deployed for this PR. Membership is what
    /// matters; the order is unspecified.
    pub commit_shas: Vec<String>,
    pub deployments: Vec<DeploymentMetric>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_deserializes_from_api_payload() {
        let raw = serde_json::json!({
            "name": "projects/p/locations/us-east4/deliveryPipelines/test-pipe/releases/rel-1",
            "uid": "ignored",
            "createTime": "2024-03-01T12:00:00Z",
            "renderState": "SUCCEEDED",
            "annotations": {"git-sha": "abc1234"}
        });

        let release: Release = serde_json::from_value(raw).unwrap();

        assert_eq!(release.id(), "rel-1");
        assert!(release.is_final());
        assert_eq!(release.annotations["git-sha"], "abc1234");
    }

    #[test]
    fn test_release_without_annotations() {
        let raw = serde_json::json!({
            "name": "projects/p/locations/r/deliveryPipelines/d/releases/rel-2",
            "createTime": "2024-03-01T12:00:00Z",
            "renderState": "IN_PROGRESS"
        });

        let release: Release = serde_json::from_value(raw).unwrap();

        assert!(release.annotations.is_empty());
        assert!(!release.is_final());
    }

    #[test]
    fn test_rollout_deploy_end_time_is_optional() {
        let raw = serde_json::json!({
            "name": "projects/p/locations/r/deliveryPipelines/d/releases/rel/rollouts/ro-1",
            "state": "IN_PROGRESS"
        });

        let rollout: Rollout = serde_json::from_value(raw).unwrap();

        assert_eq!(rollout.deploy_end_time, None);
    }
}
