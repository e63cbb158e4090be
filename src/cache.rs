use std::{
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A fetched sitemap body, remembered per source URL.
#[derive(Debug, Deserialize, Serialize)]
pub struct CacheData {
    pub created_at: u64,
    pub source: String,
    pub body: String,
}

pub struct CacheStore {
    path: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self { path, ttl }
    }

    /// Returns the cached body for `source` if present and still fresh.
    /// Unreadable or mismatched cache files count as a miss.
    pub fn load(&self, source: &str) -> Option<String> {
        let data = std::fs::read(&self.path).ok()?;
        let cache: CacheData = match serde_json::from_slice(&data) {
            Ok(cache) => cache,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "ignoring unreadable cache");
                return None;
            }
        };
        if cache.source != source || !cache_is_valid(cache.created_at, self.ttl, SystemTime::now()) {
            return None;
        }
        Some(cache.body)
    }

    pub fn store(&self, source: &str, body: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache dir {}", parent.display()))?;
        }
        let cache = CacheData {
            created_at: now_secs(),
            source: source.to_string(),
            body: body.to_string(),
        };
        let data = serde_json::to_vec_pretty(&cache)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("writing cache {}", self.path.display()))?;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn cache_is_valid(created_at: u64, ttl: Duration, now: SystemTime) -> bool {
    if ttl.is_zero() {
        return false;
    }
    let Ok(now) = now.duration_since(UNIX_EPOCH) else {
        return false;
    };
    now.as_secs().saturating_sub(created_at) <= ttl.as_secs()
}
