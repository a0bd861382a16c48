//! In-process cache of loaded configuration files.
//!
//! Entries are keyed by absolute path and are valid while both hold:
//! - the entry is younger than the TTL
//! - the file's (name, size, mtime) hash is unchanged
//!
//! Anything else is a miss and evicts the entry. Callers must behave the
//! same with the cache disabled.

use super::types::Config;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How long an entry stays valid regardless of its hash.
pub fn default_ttl() -> Duration {
    Duration::minutes(5)
}

/// One cached file.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub config: Config,
    pub loaded_at: DateTime<Utc>,
    pub hash: String,
}

/// Concurrency-safe map of path to loaded configuration.
#[derive(Debug)]
pub struct ConfigCache {
    entries: DashMap<PathBuf, CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(default_ttl())
    }
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            enabled: true,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached config for `path`, if still fresh.
    pub fn get(&self, path: &Path) -> Option<Config> {
        if !self.enabled {
            return None;
        }
        let key = cache_key(path);
        let stale = {
            let entry = self.entries.get(&key)?;
            let age = Utc::now() - entry.loaded_at;
            let current = file_info_hash(&key);
            if age < self.ttl && current.as_deref() == Some(entry.hash.as_str()) {
                debug!("config cache hit for {}", key.display());
                return Some(entry.config.clone());
            }
            entry.hash.clone()
        };
        debug!("config cache entry for {} is stale, evicting", key.display());
        // A concurrent put may have replaced the entry since it was checked.
        self.entries.remove_if(&key, |_, entry| entry.hash == stale);
        None
    }

    /// Remember `config` as the content of `path`. Unreadable files are not cached.
    pub fn put(&self, path: &Path, config: &Config) {
        if !self.enabled {
            return;
        }
        let key = cache_key(path);
        let Some(hash) = file_info_hash(&key) else {
            return;
        };
        self.entries.insert(
            key,
            CacheEntry {
                config: config.clone(),
                loaded_at: Utc::now(),
                hash,
            },
        );
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(&cache_key(path));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

fn cache_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// SHA-256 over the file's name, size and modification time.
pub fn file_info_hash(path: &Path) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    let name = path.file_name()?.to_string_lossy();
    let modified = metadata.modified().ok()?;
    let info = format!("{}-{}-{:?}", name, metadata.len(), modified);
    Some(format!("{:x}", Sha256::digest(info.as_bytes())))
}
