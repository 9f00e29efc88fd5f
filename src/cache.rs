//! Cache for remote spec documents.
//!
//! Entries are keyed by the SHA-256 of the spec URL and expire after a TTL.
//! Cache failures are logged and otherwise ignored; the spec is fetched again.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::warn;

/// Key/value store for fetched spec content.
pub trait SpecCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str, ttl: Duration);
}

/// A cache store paired with the TTL used for new entries.
#[derive(Clone)]
pub struct CachePolicy {
    store: Arc<dyn SpecCache>,
    ttl: Duration,
}

impl CachePolicy {
    pub fn new(store: Arc<dyn SpecCache>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn get(&self, url: &str) -> Option<String> {
        self.store.get(&cache_key(url))
    }

    pub fn put(&self, url: &str, content: &str) {
        self.store.put(&cache_key(url), content, self.ttl);
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

/// Cache key for a spec URL.
pub fn cache_key(url: &str) -> String {
    format!("openapi-cmd.spec.{:x}", Sha256::digest(url.as_bytes()))
}

/// Stores each entry as `<dir>/<key>` with the expiry timestamp on the first line.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl SpecCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.dir.join(key);
        let raw = fs::read_to_string(&path).ok()?;
        let (expiry, content) = raw.split_once('\n')?;
        let expiry: u64 = expiry.trim().parse().ok()?;
        if now_secs() >= expiry {
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(content.to_string())
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) {
        let expiry = now_secs().saturating_add(ttl.as_secs());
        let result = fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(self.dir.join(key), format!("{expiry}\n{value}")));
        if let Err(err) = result {
            warn!(dir = %self.dir.display(), error = %err, "failed to write spec cache entry");
        }
    }
}
