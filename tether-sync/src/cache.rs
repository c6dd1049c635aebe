//! Content-hash cache: SHA-256 digests of local files keyed by path.
//!
//! Persists one JSON document per sync type at
//! `<project>/.tether/cache/<type>.json`:
//!
//! ```json
//! { "modules/util.lua": { "content_hash": "ab12…", "recorded_mtime": "2024-05-01T10:00:00Z" } }
//! ```
//!
//! An entry is only trusted while the file's modification time still equals
//! `recorded_mtime`. Writes use the same atomic `.tmp` + rename pattern as the
//! project config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// One cached digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub content_hash: String,
    pub recorded_mtime: DateTime<Utc>,
}

/// In-memory cache for one sync type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashCache {
    entries: BTreeMap<String, CacheEntry>,
    /// Number of files actually read to compute a digest. Diagnostic only.
    reads: usize,
}

/// Path to the cache JSON for a given sync type, rooted at `project`.
///
/// `<project>/.tether/cache/<kind>.json`
pub fn cache_path_at(project: &Path, kind: &str) -> PathBuf {
    project
        .join(".tether")
        .join("cache")
        .join(format!("{kind}.json"))
}

/// SHA-256 hex digest of `content`.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Modification time of `path` as a UTC timestamp.
pub fn file_mtime(path: &Path) -> Result<DateTime<Utc>, SyncError> {
    let meta = std::fs::metadata(path).map_err(|e| io_err(path, e))?;
    let modified = meta.modified().map_err(|e| io_err(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache for `kind`. Returns an empty cache if the file does not
    /// yet exist.
    pub fn load_at(project: &Path, kind: &str) -> Result<Self, SyncError> {
        let path = cache_path_at(project, kind);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let entries = match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                // A corrupt cache only costs a rehash.
                tracing::warn!("discarding unreadable cache {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Ok(Self { entries, reads: 0 })
    }

    /// Save the cache for `kind` atomically.
    ///
    /// Entries whose file no longer exists are dropped first.
    pub fn save_at(&mut self, project: &Path, kind: &str) -> Result<(), SyncError> {
        self.entries
            .retain(|key, _| Path::new(file_part(key)).exists());

        let path = cache_path_at(project, kind);
        let Some(dir) = path.parent() else {
            return Err(io_err(path, std::io::Error::other("invalid cache path")));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times [`HashCache::digest`] had to read a file.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Digest of the content at `path`, cached under `key`.
    ///
    /// If the file's mtime matches the entry, the cached digest is returned
    /// without touching the file's content. Otherwise `read` produces the
    /// content, which is hashed and recorded.
    pub fn digest<F>(&mut self, key: &str, path: &Path, read: F) -> Result<String, SyncError>
    where
        F: FnOnce(&Path) -> Result<String, SyncError>,
    {
        let mtime = file_mtime(path)?;
        if let Some(entry) = self.entries.get(key) {
            if entry.recorded_mtime == mtime {
                tracing::debug!("cache hit: {key}");
                return Ok(entry.content_hash.clone());
            }
        }

        let content = read(path)?;
        self.reads += 1;
        let content_hash = hash_content(&content);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                content_hash: content_hash.clone(),
                recorded_mtime: mtime,
            },
        );
        Ok(content_hash)
    }
}

/// Strip a `#L<start>-<end>` block suffix from a cache key.
fn file_part(key: &str) -> &str {
    let Some(idx) = key.rfind("#L") else {
        return key;
    };
    let is_span = key[idx + 2..].split_once('-').is_some_and(|(start, end)| {
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        digits(start) && digits(end)
    });
    if is_span {
        &key[..idx]
    } else {
        key
    }
}
