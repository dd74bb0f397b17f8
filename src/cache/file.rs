use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{Cache, Entry};
use crate::error::{Result, ShipLensError};

/// File-backed cache. Each key is hashed with SHA-256 and stored under a
/// subdirectory named after the first two hex characters of the hash, so no
/// single directory has to hold every entry.
#[derive(Debug, Clone)]
pub struct FileCache {
    base_dir: PathBuf,
}

impl FileCache {
    /// Creates a cache rooted in the OS user cache directory under
    /// `app_name`.
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            ShipLensError::ConfigError("Could not determine the user cache directory".to_string())
        })?;

        Self::with_dir(cache_dir.join(app_name))
    }

    /// Creates a cache rooted at an explicit directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = dir.into();
        fs::create_dir_all(&base_dir)?;

        Ok(Self { base_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let hash = format!("{:x}", Sha256::digest(key.as_bytes()));
        self.base_dir
            .join(&hash[..2])
            .join(format!("{}.json", &hash[2..]))
    }
}

impl Cache for FileCache {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry: Entry = serde_json::from_slice(&raw)?;
        if entry.is_expired() {
            // Lazy expiry: the entry is gone as far as callers are
            // concerned, and a failed removal must not turn the miss into
            // an error.
            let _ = self.delete(key);
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(entry.data)?))
    }

    fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            data: serde_json::to_value(value)?,
            created_at: Utc::now(),
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        };

        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_vec(&entry)?)?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
