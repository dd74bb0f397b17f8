use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use log::info;

use crate::auth::Token;
use crate::cache::{FileCache, TtlPolicy};
use crate::error::ShipLensError;
use crate::providers::circleci::{insights, CachedCircleCIClient, CircleCIApi, CircleCIClient};
use crate::providers::deploy::latency::{self, DeployConfig};
use crate::providers::deploy::{CachedDeployClient, CloudDeployClient, DeployApi};
use crate::providers::github::reviews::{self, ReviewConfig};
use crate::providers::github::{CachedGithubClient, GithubApi, GithubClient};
use crate::report;

const CACHE_APP_NAME: &str = "shiplens";
const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Parser)]
#[command(name = "shiplens")]
#[command(author, version, about = "Delivery metrics from GitHub, Cloud Deploy and CircleCI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track PR review latency for a repository
    Prs {
        /// Repository in "owner/repo" form
        repo: String,

        /// Start date, YYYY-MM-DD (defaults to 30 days ago)
        #[arg(long)]
        since: Option<String>,

        /// End date, YYYY-MM-DD (defaults to now)
        #[arg(long)]
        until: Option<String>,

        /// Comma-separated logins to ignore as authors and reviewers
        #[arg(long, default_value = "")]
        exclude: String,

        /// Tags repository ("owner/repo") to scan for deploy references
        #[arg(long)]
        tags_repo: Option<String>,

        /// GitHub API token
        #[arg(short, long, env = "GITHUB_TOKEN")]
        token: String,
    },

    /// Track commit-to-deploy latency for Cloud Deploy releases
    Deploys {
        /// Google Cloud project ID
        #[arg(long)]
        project: String,

        /// Google Cloud region
        #[arg(long, default_value = "us-east4")]
        region: String,

        /// GitHub organization owning the tags and services repositories
        #[arg(long)]
        github_org: String,

        /// Repository whose commits carry deploy tags
        #[arg(long)]
        tags_repo: String,

        /// Repository holding the deployed application code
        #[arg(long)]
        services_repo: String,

        /// Only analyze delivery pipelines whose name contains this
        #[arg(long, default_value = "test")]
        pipeline_filter: String,

        /// Branch token used by main-branch deploy tags
        #[arg(long, default_value = "master")]
        main_branch: String,

        /// Start date, YYYY-MM-DD (defaults to 30 days ago)
        #[arg(long)]
        since: Option<String>,

        /// End date, YYYY-MM-DD (defaults to now)
        #[arg(long)]
        until: Option<String>,

        /// GitHub API token
        #[arg(long, env = "GITHUB_TOKEN")]
        token: String,

        /// Google Cloud bearer token
        #[arg(long, env = "GCLOUD_TOKEN")]
        deploy_token: String,
    },

    /// Track flaky tests recorded by CircleCI
    FlakyTests {
        /// Organization name
        org: String,

        /// Repository name
        repo: String,

        /// CircleCI API token
        #[arg(short, long, env = "CIRCLECI_TOKEN")]
        token: String,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Prs {
                repo,
                since,
                until,
                exclude,
                tags_repo,
                token,
            } => {
                run_prs(
                    repo,
                    since.as_deref(),
                    until.as_deref(),
                    exclude,
                    tags_repo.as_deref(),
                    token,
                )
                .await
            }
            Commands::Deploys {
                project,
                region,
                github_org,
                tags_repo,
                services_repo,
                pipeline_filter,
                main_branch,
                since,
                until,
                token,
                deploy_token,
            } => {
                let config = DeployConfig {
                    github_org: github_org.clone(),
                    tags_repo: tags_repo.clone(),
                    services_repo: services_repo.clone(),
                    main_branch: main_branch.clone(),
                };
                run_deploys(
                    project,
                    region,
                    config,
                    pipeline_filter,
                    since.as_deref(),
                    until.as_deref(),
                    token,
                    deploy_token,
                )
                .await
            }
            Commands::FlakyTests { org, repo, token } => run_flaky_tests(org, repo, token).await,
        }
    }
}

async fn run_prs(
    repo: &str,
    since: Option<&str>,
    until: Option<&str>,
    exclude: &str,
    tags_repo: Option<&str>,
    token: &str,
) -> Result<()> {
    let (owner, repo) = parse_repo(repo)?;
    let (start, end) = resolve_window(since, until)?;
    let tags_repo = tags_repo.map(parse_repo).transpose()?;

    let cache = FileCache::new(CACHE_APP_NAME)?;
    let client = CachedGithubClient::new(
        GithubClient::new(Token::from(token))?,
        cache,
        TtlPolicy::default(),
    );

    info!(
        "Fetching pull requests for {owner}/{repo} from {} to {}",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );
    let prs = client.fetch_pull_requests(&owner, &repo, start, end).await?;
    info!("Found {} pull requests", prs.len());

    let config = ReviewConfig {
        owner,
        repo,
        denylist: parse_denylist(exclude),
        tags_repo,
    };
    let results = reviews::process_pull_requests(&client, &prs, &config).await;

    report::print_pull_request_report(&results);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_deploys(
    project: &str,
    region: &str,
    config: DeployConfig,
    pipeline_filter: &str,
    since: Option<&str>,
    until: Option<&str>,
    token: &str,
    deploy_token: &str,
) -> Result<()> {
    let (start, end) = resolve_window(since, until)?;

    let cache = FileCache::new(CACHE_APP_NAME)?;
    let deploy_client = CachedDeployClient::new(
        CloudDeployClient::new(
            project.to_string(),
            region.to_string(),
            Token::from(deploy_token),
        )?,
        cache,
        TtlPolicy::default(),
    );
    let github = GithubClient::new(Token::from(token))?;

    info!(
        "Fetching releases for {project}/{region} from {} to {}",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );
    let releases = deploy_client.fetch_releases(pipeline_filter, start, end).await?;
    info!("Found {} releases", releases.len());

    let results = latency::process_releases(&deploy_client, &github, &config, &releases).await?;
    let pr_stats = latency::group_by_pull_request(&results);

    report::print_deployment_report(&results, &pr_stats);
    Ok(())
}

async fn run_flaky_tests(org: &str, repo: &str, token: &str) -> Result<()> {
    let cache = FileCache::new(CACHE_APP_NAME)?;
    let client = CachedCircleCIClient::new(
        CircleCIClient::new(Token::from(token))?,
        cache,
        TtlPolicy::default(),
    );

    info!("Verifying access to {org}/{repo}");
    client.verify_project_access(org, repo).await?;

    info!("Fetching flaky tests for {org}/{repo}");
    let tests = client.fetch_flaky_tests(org, repo).await?;
    info!("Found {} flaky tests", tests.len());

    let results = insights::process_flaky_tests(tests);
    report::print_flaky_test_report(&results);
    Ok(())
}

/// Splits an "owner/repo" argument.
fn parse_repo(arg: &str) -> Result<(String, String), ShipLensError> {
    match arg.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(ShipLensError::ConfigError(format!(
            "Invalid repository '{arg}'; expected owner/repo"
        ))),
    }
}

fn parse_denylist(exclude: &str) -> Vec<String> {
    exclude
        .split(',')
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .map(String::from)
        .collect()
}

/// Parses the date window, defaulting to the last 30 days. The window must
/// have positive width.
fn resolve_window(
    since: Option<&str>,
    until: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ShipLensError> {
    let start = match since {
        Some(raw) => parse_date(raw)?,
        None => Utc::now() - Duration::days(DEFAULT_WINDOW_DAYS),
    };
    let end = match until {
        Some(raw) => parse_date(raw)?,
        None => Utc::now(),
    };

    if start >= end {
        return Err(ShipLensError::ConfigError(
            "Start date must be before end date".to_string(),
        ));
    }

    Ok((start, end))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, ShipLensError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ShipLensError::ConfigError(format!("Invalid date '{raw}'; expected YYYY-MM-DD"))
    })?;

    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_splits_owner_and_repo() {
        assert_eq!(
            parse_repo("acme/widgets").unwrap(),
            ("acme".to_string(), "widgets".to_string())
        );
    }

    #[test]
    fn test_parse_repo_rejects_malformed_input() {
        assert!(parse_repo("widgets").is_err());
        assert!(parse_repo("/widgets").is_err());
        assert!(parse_repo("acme/").is_err());
        assert!(parse_repo("a/b/c").is_err());
    }

    #[test]
    fn test_parse_denylist_trims_and_drops_empties() {
        assert_eq!(
            parse_denylist("dependabot, release-bot ,"),
            vec!["dependabot".to_string(), "release-bot".to_string()]
        );
        assert!(parse_denylist("").is_empty());
    }

    #[test]
    fn test_parse_date_midnight_utc() {
        let parsed = parse_date("2024-03-05").unwrap();

        assert_eq!(parsed, "2024-03-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(parse_date("03/05/2024").is_err());
        assert!(parse_date("2024-3-5T10:00").is_err());
    }

    #[test]
    fn test_resolve_window_defaults_to_last_30_days() {
        let (start, end) = resolve_window(None, None).unwrap();

        assert!(end > start);
        let width = end - start;
        assert!(width >= Duration::days(29) && width <= Duration::days(31));
    }

    #[test]
    fn test_resolve_window_rejects_inverted_range() {
        assert!(resolve_window(Some("2024-03-10"), Some("2024-03-01")).is_err());
    }

    #[test]
    fn test_resolve_window_rejects_zero_width_range() {
        assert!(resolve_window(Some("2024-03-10"), Some("2024-03-10")).is_err());
    }

    #[test]
    fn test_resolve_window_accepts_explicit_range() {
        let (start, end) = resolve_window(Some("2024-03-01"), Some("2024-03-10")).unwrap();

        assert_eq!(end - start, Duration::days(9));
    }
}
