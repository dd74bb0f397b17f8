use regex::Regex;

use crate::error::{Result, ShipLensError};

const HEX_SHA: &str = "[a-f0-9]{7,40}";
const DEPLOY_TIMESTAMP: &str = r"\d{4}_\d{2}_\d{2}__\d{2}_\d{2}_\d{2}";

/// Reference to the application commit a tags-repo diff deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRef {
    pub commit_sha: String,
    /// Populated only for `pull-<number>_<sha>` deploy lines.
    pub pr_number: Option<String>,
}

/// Recovers the application commit behind a release from the added lines of
/// a tags-repo commit diff.
///
/// Deploy tags come in two line shapes: `<app>: pull-<number>_<sha>` for PR
/// deploys, and `<app>: YYYY_MM_DD__HH_MM_SS__<branch>__<sha>` for deploys
/// of the main branch. Scanning walks files in diff order and added lines in
/// line order; the first line matching either shape wins and nothing past it
/// is considered.
pub struct ReleaseMatcher {
    pull: Regex,
    main_branch: Regex,
}

impl ReleaseMatcher {
    /// `main_branch` is the literal branch token expected in branch-deploy
    /// lines.
    pub fn new(main_branch: &str) -> Result<Self> {
        let pull = compile(&format!(r"\+\s*\w+:\s*pull-(\d+)_({HEX_SHA})"))?;
        let main_branch = compile(&format!(
            r"\+\s*\w+:\s*{DEPLOY_TIMESTAMP}__{}__({HEX_SHA})",
            regex::escape(main_branch)
        ))?;

        Ok(Self { pull, main_branch })
    }

    /// First deploy reference in the diff, or `None` when no added line
    /// carries one. An empty or missing diff is a plain no-match.
    pub fn find<'a, I>(&self, patches: I) -> Option<ReleaseRef>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for patch in patches {
            for line in added_lines(patch) {
                if let Some(caps) = self.pull.captures(line) {
                    return Some(ReleaseRef {
                        commit_sha: caps[2].to_string(),
                        pr_number: Some(caps[1].to_string()),
                    });
                }
                if let Some(caps) = self.main_branch.captures(line) {
                    return Some(ReleaseRef {
                        commit_sha: caps[1].to_string(),
                        pr_number: None,
                    });
                }
            }
        }

        None
    }
}

/// Answers whether a tags-repo diff deploys one specific pull request,
/// either directly by number or through its head branch.
pub struct PullRequestMatcher {
    direct: Regex,
    branch: Option<Regex>,
}

impl PullRequestMatcher {
    /// Branchless matching (an absent or empty `head_branch`) falls back to
    /// the direct `pull-<number>` shape only.
    pub fn new(pr_number: u64, head_branch: Option<&str>) -> Result<Self> {
        let direct = compile(&format!(r"\+\s*\w+:\s*pull-{pr_number}_{HEX_SHA}"))?;
        let branch = head_branch
            .filter(|branch| !branch.is_empty())
            .map(|branch| {
                compile(&format!(
                    r"\+\s*\w+:\s*{DEPLOY_TIMESTAMP}__{}__{HEX_SHA}",
                    regex::escape(branch)
                ))
            })
            .transpose()?;

        Ok(Self { direct, branch })
    }

    pub fn matches<'a, I>(&self, patches: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        for patch in patches {
            for line in added_lines(patch) {
                if self.direct.is_match(line) {
                    return true;
                }
                if let Some(branch) = &self.branch {
                    if branch.is_match(line) {
                        return true;
                    }
                }
            }
        }

        false
    }
}

fn added_lines(patch: &str) -> impl Iterator<Item = &str> {
    patch.lines().filter(|line| line.starts_with('+'))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ShipLensError::ConfigError(format!("Invalid deploy tag pattern: {e}")))
}
