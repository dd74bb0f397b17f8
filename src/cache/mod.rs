mod file;

pub use file::FileCache;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Contract shared by every cache implementation. Values are serialized to
/// JSON on the way in and deserialized on the way out, so callers only ever
/// see their own types.
pub trait Cache {
    /// Looks up `key`. A missing or expired entry is reported as `Ok(None)`.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

    /// Stores `value` under `key`. `None` for `ttl` keeps the entry until
    /// explicitly deleted.
    fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>;

    /// Removes `key`. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Stored envelope around a cached value.
#[derive(Debug, Serialize, Deserialize)]
pub struct Entry {
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// An entry past its `expires_at` is logically absent. Entries without
    /// one never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at < Utc::now())
    }
}

/// Cache read used on the hot path of the cached clients: failures are
/// logged and reported as misses so a broken cache can only cost API calls.
pub fn read<C: Cache, T: DeserializeOwned>(cache: &C, key: &str, what: &str) -> Option<T> {
    match cache.get(key) {
        Ok(hit) => hit,
        Err(err) => {
            warn!("Cache read failed for {what}: {err}");
            None
        }
    }
}

/// Cache write with the same guarantee as [`read`]: failures are logged and
/// dropped, never surfaced to the caller.
pub fn write<C: Cache, T: Serialize>(cache: &C, key: &str, value: &T, ttl: Duration, what: &str) {
    if let Err(err) = cache.set(key, value, Some(ttl)) {
        warn!("Failed to cache {what}: {err}");
    }
}

/// Builds the cache keys for one provider namespace. Keys are plain
/// colon-joined strings and date bounds are truncated to days, so two runs
/// covering the same day window share entries.
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
        }
    }

    pub fn pr(&self, owner: &str, repo: &str, number: u64) -> String {
        self.build(&["pr", owner, repo, &number.to_string()])
    }

    pub fn pr_reviews(&self, owner: &str, repo: &str, number: u64) -> String {
        self.build(&["pr_reviews", owner, repo, &number.to_string()])
    }

    pub fn prs_list(
        &self,
        owner: &str,
        repo: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        self.build(&["prs_list", owner, repo, &day(start), &day(end)])
    }

    pub fn release(&self, project: &str, region: &str, release_name: &str) -> String {
        self.build(&["release", project, region, release_name])
    }

    pub fn rollouts(&self, project: &str, region: &str, release_name: &str) -> String {
        self.build(&["rollouts", project, region, release_name])
    }

    pub fn releases_list(
        &self,
        project: &str,
        region: &str,
        pipeline: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        self.build(&["releases_list", project, region, pipeline, &day(start), &day(end)])
    }

    pub fn flaky_tests(&self, org: &str, repo: &str) -> String {
        self.build(&["flaky-tests", org, repo])
    }

    fn build(&self, parts: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }
}

fn day(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// TTLs applied by the cached clients, keyed by how settled a record is.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    /// Records in a final state: closed PRs, fully rendered releases.
    pub settled: Duration,
    /// Records that may still change under us.
    pub active: Duration,
    /// List windows ending within this many days of now count as active.
    pub recent_days: i64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            settled: Duration::hours(24),
            active: Duration::hours(1),
            recent_days: 7,
        }
    }
}

impl TtlPolicy {
    /// TTL for a list query ending at `end`: historical windows are stable,
    /// recent ones may still gain records.
    pub fn for_window_end(&self, end: DateTime<Utc>) -> Duration {
        if Utc::now() - end > Duration::days(self.recent_days) {
            self.settled
        } else {
            self.active
        }
    }
}
