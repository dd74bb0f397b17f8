use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{info, warn};

use super::client::DeployApi;
use super::types::{DeploymentMetric, PrDeploymentStats, Release};
use crate::diffscan::ReleaseMatcher;
use crate::error::{Result, ShipLensError};
use crate::providers::github::client::GithubApi;

/// Repositories and conventions needed to trace a release back to the
/// commit it shipped.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub github_org: String,
    /// Repository whose commits record deploy tags.
    pub tags_repo: String,
    /// Repository holding the deployed application code.
    pub services_repo: String,
    /// Literal branch token of main-branch deploy tags.
    pub main_branch: String,
}

/// Resolved origin of one release: the application commit it deployed.
#[derive(Debug, Clone)]
struct ReleaseOrigin {
    commit_sha: String,
    pr_number: Option<String>,
    commit_time: DateTime<Utc>,
}

/// Correlates releases with their originating commits and computes
/// commit-to-deploy latency.
///
/// Each release resolves through release annotations → tags-repo commit →
/// diff reference → application commit. A release that fails any step is
/// logged and dropped; the batch itself only fails on setup problems.
pub async fn process_releases<D: DeployApi, G: GithubApi>(
    deploy: &D,
    github: &G,
    config: &DeployConfig,
    releases: &[Release],
) -> Result<Vec<DeploymentMetric>> {
    let matcher = ReleaseMatcher::new(&config.main_branch)?;
    let mut results = Vec::new();

    for release in releases {
        let origin = match resolve_origin(github, config, &matcher, release).await {
            Ok(origin) => origin,
            Err(err) => {
                warn!("Error resolving commit for release {}: {err}", release.id());
                continue;
            }
        };

        let finish_time = match release_finish_time(deploy, release).await {
            Ok(finish_time) => finish_time,
            Err(err) => {
                warn!("Error getting finish time for release {}: {err}", release.id());
                continue;
            }
        };

        info!(
            "Release {}: commit {} deployed in {}",
            release.id(),
            origin.commit_sha,
            finish_time - origin.commit_time
        );

        results.push(DeploymentMetric {
            release_id: release.id().to_string(),
            release_name: release.name.clone(),
            commit_sha: origin.commit_sha,
            pr_number: origin.pr_number,
            commit_time: origin.commit_time,
            release_start_time: release.create_time,
            release_finish_time: finish_time,
            latency: finish_time - origin.commit_time,
            successful: true,
        });
    }

    info!("Correlated {} of {} releases", results.len(), releases.len());
    Ok(results)
}

/// Walks release annotations → tags-repo commit diff → application commit.
/// The application commit's committer timestamp anchors the latency
/// measurement.
async fn resolve_origin<G: GithubApi>(
    github: &G,
    config: &DeployConfig,
    matcher: &ReleaseMatcher,
    release: &Release,
) -> Result<ReleaseOrigin> {
    let tags_sha = annotated_commit_sha(release).ok_or_else(|| {
        ShipLensError::CorrelationError("no commit SHA in release annotations".to_string())
    })?;

    let tags_commit = github
        .fetch_commit(&config.github_org, &config.tags_repo, &tags_sha)
        .await?;

    let reference = matcher
        .find(tags_commit.files.iter().filter_map(|f| f.patch.as_deref()))
        .ok_or_else(|| {
            ShipLensError::CorrelationError(format!(
                "no deploy tag found in diff of tags commit {tags_sha}"
            ))
        })?;

    let service_commit = github
        .fetch_commit(&config.github_org, &config.services_repo, &reference.commit_sha)
        .await?;

    Ok(ReleaseOrigin {
        commit_sha: reference.commit_sha,
        pr_number: reference.pr_number,
        commit_time: service_commit.commit.committer.date,
    })
}

/// SHA of the tags-repo commit recorded on the release, either as a bare
/// `git-sha` annotation or as the trailing segment of a `commit` URL.
fn annotated_commit_sha(release: &Release) -> Option<String> {
    release
        .annotations
        .get("git-sha")
        .cloned()
        .or_else(|| {
            release
                .annotations
                .get("commit")
                .and_then(|url| url.rsplit('/').next())
                .map(str::to_string)
        })
        .filter(|sha| !sha.is_empty())
}

/// A release is finished when its last succeeded rollout completed. No
/// succeeded rollout means the release never landed anywhere.
async fn release_finish_time<D: DeployApi>(
    deploy: &D,
    release: &Release,
) -> Result<DateTime<Utc>> {
    let rollouts = deploy.fetch_rollouts(release).await?;

    rollouts
        .iter()
        .filter(|rollout| rollout.state == "SUCCEEDED")
        .filter_map(|rollout| rollout.deploy_end_time)
        .max()
        .ok_or_else(|| ShipLensError::CorrelationError("no succeeded rollout".to_string()))
}

/// Groups metrics by PR number. Deploys without one (main-branch
/// promotions) belong to no group and are left out entirely.
pub fn group_by_pull_request(deployments: &[DeploymentMetric]) -> Vec<PrDeploymentStats> {
    let mut groups: IndexMap<String, Vec<DeploymentMetric>> = IndexMap::new();
    for deployment in deployments {
        if let Some(pr_number) = &deployment.pr_number {
            groups
                .entry(pr_number.clone())
                .or_default()
                .push(deployment.clone());
        }
    }

    groups
        .into_iter()
        .map(|(pr_number, deployments)| {
            let mut first_commit_time = deployments[0].commit_time;
            let mut last_finish_time = deployments[0].release_finish_time;
            let mut shas = HashSet::new();
            for deployment in &deployments {
                first_commit_time = first_commit_time.min(deployment.commit_time);
                last_finish_time = last_finish_time.max(deployment.release_finish_time);
                shas.insert(deployment.commit_sha.clone());
            }

            PrDeploymentStats {
                pr_number,
                deployment_count: deployments.len(),
                first_commit_time,
                last_finish_time,
                first_to_last: last_finish_time - first_commit_time,
                commit_shas: shas.into_iter().collect(),
                deployments,
            }
        })
        .collect()
}
