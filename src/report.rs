use chrono::{DateTime, Duration, Utc};

use crate::providers::circleci::types::FlakyTestMetric;
use crate::providers::deploy::types::{DeploymentMetric, PrDeploymentStats};
use crate::providers::github::types::PullRequestMetric;
use crate::stats;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Renders a duration as `1d 2h 3m 4s`, dropping leading zero units.
/// Negative durations keep their sign.
pub fn format_duration(duration: Duration) -> String {
    let negative = duration < Duration::zero();
    let mut total = duration.num_seconds().abs();

    let days = total / 86_400;
    total %= 86_400;
    let hours = total / 3_600;
    total %= 3_600;
    let minutes = total / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }

    let rendered = parts.join(" ");
    if negative {
        format!("-{rendered}")
    } else {
        rendered
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn print_header(title: &str, underline: char) {
    println!("\n{title}");
    println!("{}", underline.to_string().repeat(title.len()));
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}

pub fn print_pull_request_report(results: &[PullRequestMetric]) {
    if results.is_empty() {
        println!("No pull requests found in the requested window");
        return;
    }

    let reviewed: Vec<&PullRequestMetric> = results.iter().filter(|m| m.has_review()).collect();
    let awaiting: Vec<&PullRequestMetric> = results.iter().filter(|m| !m.has_review()).collect();

    print_header("Pull Requests With Reviews:", '-');
    if reviewed.is_empty() {
        println!("  None found");
    }
    for metric in &reviewed {
        println!("PR #{}: {}", metric.number, metric.title);
        if let Some(first) = &metric.first_review {
            println!(
                "  Time to First Review: {} (by {} - {})",
                format_duration(first.elapsed),
                first.reviewer,
                first.state
            );
        }
        match &metric.approval {
            Some(approval) => println!(
                "  Time to Approval: {} (by {})",
                format_duration(approval.elapsed),
                approval.reviewer
            ),
            None => println!("  Time to Approval: Not yet approved"),
        }
        print_tag_commits(metric);
        println!();
    }

    print_header("Pull Requests Awaiting Review:", '-');
    if awaiting.is_empty() {
        println!("  None found");
    }
    for metric in &awaiting {
        println!("PR #{}: {}", metric.number, metric.title);
        println!("  Author: {}", metric.author);
        println!("  Waiting for: {}", format_duration(metric.time_since_creation));
        print_tag_commits(metric);
        println!();
    }

    print_header("Summary Statistics:", '-');
    println!("Total PRs analyzed: {}", results.len());

    let first_times: Vec<Duration> = reviewed
        .iter()
        .filter_map(|m| m.first_review.as_ref())
        .map(|r| r.elapsed)
        .filter(|elapsed| *elapsed > Duration::zero())
        .collect();
    print_latency_summary("Time to First Review", &first_times);

    let approval_times: Vec<Duration> = reviewed
        .iter()
        .filter_map(|m| m.approval.as_ref())
        .map(|r| r.elapsed)
        .filter(|elapsed| *elapsed > Duration::zero())
        .collect();
    print_latency_summary("Time to Approval", &approval_times);

    println!("PRs Awaiting Review: {}", awaiting.len());
    if !awaiting.is_empty() {
        let wait_times: Vec<Duration> = awaiting.iter().map(|m| m.time_since_creation).collect();
        println!("  Mean wait: {}", format_duration(stats::mean(&wait_times)));
        println!("  Median wait: {}", format_duration(stats::median(&wait_times)));
    }
}

fn print_tag_commits(metric: &PullRequestMetric) {
    if metric.tag_commits.is_empty() {
        return;
    }

    println!("  Deployed by {} tag commit(s):", metric.tag_commits.len());
    for commit in &metric.tag_commits {
        let subject = commit.message.lines().next().unwrap_or("");
        println!(
            "    {} {} ({}, {})",
            short_sha(&commit.sha),
            subject,
            commit.author,
            format_time(commit.date)
        );
    }
}

fn print_latency_summary(label: &str, samples: &[Duration]) {
    if samples.is_empty() {
        println!("{label}: No data");
        return;
    }

    println!("{label}:");
    println!("  Mean: {}", format_duration(stats::mean(samples)));
    println!("  Median: {}", format_duration(stats::median(samples)));
}

pub fn print_deployment_report(results: &[DeploymentMetric], pr_stats: &[PrDeploymentStats]) {
    if results.is_empty() {
        println!("No deployment metrics found in the requested window");
        return;
    }

    print_header("Successful Deployments (Commit to Deploy Latency):", '-');
    for metric in results {
        println!("Release: {} ({})", metric.release_id, metric.release_name);
        match &metric.pr_number {
            Some(pr_number) => println!(
                "  Commit: {} (PR #{pr_number})",
                short_sha(&metric.commit_sha)
            ),
            None => println!("  Commit: {} (main branch)", short_sha(&metric.commit_sha)),
        }
        println!("  Commit Time: {}", format_time(metric.commit_time));
        println!("  Release Started: {}", format_time(metric.release_start_time));
        println!("  Deploy Finished: {}", format_time(metric.release_finish_time));
        println!("  Latency: {}", format_duration(metric.latency));
        println!();
    }

    print_header("Summary Statistics:", '-');
    println!("Total deployments correlated: {}", results.len());
    let latencies: Vec<Duration> = results
        .iter()
        .filter(|m| m.successful && m.latency > Duration::zero())
        .map(|m| m.latency)
        .collect();
    print_latency_summary("Commit to Deploy Latency", &latencies);

    print_pr_deployment_stats(pr_stats);
}

fn print_pr_deployment_stats(pr_stats: &[PrDeploymentStats]) {
    print_header("PR Deployment Statistics:", '-');
    if pr_stats.is_empty() {
        println!("No PR deployments found");
        return;
    }

    let mut sorted = pr_stats.to_vec();
    sorted.sort_by(|a, b| b.deployment_count.cmp(&a.deployment_count));

    for stat in &sorted {
        println!(
            "PR #{}: {} deployment(s), {} unique commit(s)",
            stat.pr_number,
            stat.deployment_count,
            stat.commit_shas.len()
        );
        println!("  First Commit: {}", format_time(stat.first_commit_time));
        println!("  Last Deploy Finished: {}", format_time(stat.last_finish_time));
        println!("  First Commit to Last Deploy: {}", format_duration(stat.first_to_last));
        let releases: Vec<String> = stat
            .deployments
            .iter()
            .map(|d| format!("{} ({})", d.release_id, format_duration(d.latency)))
            .collect();
        println!("  Releases: {}", releases.join(", "));
        println!();
    }

    let total_deployments: usize = sorted.iter().map(|s| s.deployment_count).sum();
    let redeployed = sorted.iter().filter(|s| s.deployment_count > 1).count();
    let max_deployments = sorted.iter().map(|s| s.deployment_count).max().unwrap_or(0);

    println!("PRs with deployments: {}", sorted.len());
    println!("Total PR deployments: {total_deployments}");
    println!("PRs deployed more than once: {redeployed}");
    println!("Most deployments for one PR: {max_deployments}");
}

pub fn print_flaky_test_report(results: &[FlakyTestMetric]) {
    if results.is_empty() {
        println!("No flaky tests found");
        return;
    }

    print_header("Flaky Tests (sorted by frequency):", '=');
    for metric in results {
        println!("Test: {}", metric.test_name);
        if !metric.classname.is_empty() {
            println!("  Class: {}", metric.classname);
        }
        println!("  Times Flaky: {}", metric.times_flaky);
        if let Some(last_occurred) = metric.last_occurred {
            println!("  Last Occurred: {}", format_time(last_occurred));
        }
        println!();
    }

    let counts: Vec<u64> = results.iter().map(|m| m.times_flaky).collect();
    let total: u64 = counts.iter().sum();

    print_header("Summary Statistics:", '-');
    println!("Total flaky tests: {}", results.len());
    println!("Total flaky occurrences: {total}");
    #[allow(clippy::cast_precision_loss)]
    let mean_occurrences = total as f64 / counts.len() as f64;
    println!("Mean occurrences per test: {mean_occurrences:.1}");
    println!(
        "Median occurrences per test: {:.1}",
        stats::median_count(&counts)
    );
    println!(
        "Most flaky: {} occurrences",
        counts.iter().max().unwrap_or(&0)
    );
    println!(
        "Least flaky: {} occurrences",
        counts.iter().min().unwrap_or(&0)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_zero() {
        assert_eq!(format_duration(Duration::zero()), "0s");
    }

    #[test]
    fn test_format_duration_drops_leading_zero_units() {
        assert_eq!(format_duration(Duration::minutes(5)), "5m");
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
    }

    #[test]
    fn test_format_duration_mixed_units() {
        let duration = Duration::days(1) + Duration::hours(2) + Duration::seconds(4);

        assert_eq!(format_duration(duration), "1d 2h 4s");
    }

    #[test]
    fn test_format_duration_negative_keeps_sign() {
        assert_eq!(format_duration(Duration::hours(-4)), "-4h");
    }

    #[test]
    fn test_format_duration_subminute_precision() {
        let duration = Duration::minutes(90) + Duration::seconds(15);

        assert_eq!(format_duration(duration), "1h 30m 15s");
    }

    #[test]
    fn test_short_sha_handles_short_input() {
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha("a1b2c3d4e5f6"), "a1b2c3d4");
    }

    #[test]
    fn test_print_functions_tolerate_empty_input() {
        // Printing only; this guards against panics on the empty paths.
        print_pull_request_report(&[]);
        print_deployment_report(&[], &[]);
        print_flaky_test_report(&[]);
    }
}
