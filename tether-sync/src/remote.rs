//! Remote service interface and the in-memory / snapshot-file implementation.
//!
//! Items crossing this boundary use the *remote* field names. Handlers
//! convert with [`normalize`] and [`denormalize`] so the reconciler only ever
//! sees canonical names.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use tether_core::{Item, SyncKey};

use crate::error::{io_err, RemoteError, SyncError};

/// Operations the engine needs from the remote side.
///
/// Every call is blocking request/response; there is no retry here.
pub trait RemoteService {
    /// Every item in `collection`, fully materialized (pagination handled inside).
    fn list(&self, collection: &str) -> Result<Vec<Item>, RemoteError>;

    fn fetch(&self, collection: &str, key: &SyncKey) -> Result<Item, RemoteError>;

    /// Create a new item. `Conflict` when `key` already exists.
    fn create(&mut self, collection: &str, key: &SyncKey, item: &Item)
        -> Result<Item, RemoteError>;

    /// Replace an existing item in full. `NotFound` when `key` is absent.
    fn update(&mut self, collection: &str, key: &SyncKey, item: &Item)
        -> Result<Item, RemoteError>;

    fn remove(&mut self, collection: &str, key: &SyncKey) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// Field-name mapping
// ---------------------------------------------------------------------------

/// `(canonical, remote)` field-name pairs.
pub type FieldRenames = &'static [(&'static str, &'static str)];

/// Rename remote field names to canonical ones.
pub fn normalize(mut item: Item, renames: FieldRenames) -> Item {
    for (canonical, remote) in renames {
        if let Some(value) = item.fields.remove(*remote) {
            item.fields.insert((*canonical).to_string(), value);
        }
    }
    item
}

/// Copy of `item` with canonical names mapped to remote names and local
/// provenance stripped.
pub fn denormalize(item: &Item, renames: FieldRenames) -> Item {
    let mut out = Item {
        fields: item.fields.clone(),
        local: None,
        remote_id: item.remote_id.clone(),
        updated_at: None,
    };
    for (canonical, remote) in renames {
        if let Some(value) = out.fields.remove(*canonical) {
            out.fields.insert((*remote).to_string(), value);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// MemoryRemote
// ---------------------------------------------------------------------------

/// One stored item and the key the remote knows it by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub key: SyncKey,
    pub item: Item,
}

/// In-memory remote with insertion-ordered collections.
///
/// Assigns `remote_id` and `updated_at` the way a real service would. Can be
/// persisted as a JSON snapshot, which is what `file://` remote URLs use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRemote {
    #[serde(default)]
    collections: BTreeMap<String, Vec<RemoteRecord>>,
    #[serde(default)]
    next_id: u64,
    #[serde(skip)]
    writes: usize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot; a missing file is an empty remote.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save a snapshot atomically (`.tmp` + rename).
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }

    /// Seed an item without counting it as a write.
    pub fn insert(&mut self, collection: &str, key: impl Into<SyncKey>, item: Item) {
        let key = key.into();
        let stamped = self.stamp(item, None);
        let records = self.collections.entry(collection.to_string()).or_default();
        match records.iter_mut().find(|r| r.key == key) {
            Some(existing) => existing.item = stamped,
            None => records.push(RemoteRecord { key, item: stamped }),
        }
    }

    /// Number of create/update/remove calls that succeeded.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn keys(&self, collection: &str) -> Vec<SyncKey> {
        self.collections
            .get(collection)
            .map(|records| records.iter().map(|r| r.key.clone()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, collection: &str, key: &SyncKey) -> Option<&Item> {
        self.collections
            .get(collection)?
            .iter()
            .find(|r| &r.key == key)
            .map(|r| &r.item)
    }

    fn stamp(&mut self, mut item: Item, keep_id: Option<String>) -> Item {
        item.local = None;
        item.remote_id = match keep_id {
            Some(id) => Some(id),
            None => {
                self.next_id += 1;
                Some(format!("{:06}", self.next_id))
            }
        };
        item.updated_at = Some(Utc::now());
        item
    }

    fn position(&self, collection: &str, key: &SyncKey) -> Option<usize> {
        self.collections
            .get(collection)?
            .iter()
            .position(|r| &r.key == key)
    }
}

fn not_found(collection: &str, key: &SyncKey) -> RemoteError {
    RemoteError::NotFound {
        collection: collection.to_string(),
        key: key.to_string(),
    }
}

impl RemoteService for MemoryRemote {
    fn list(&self, collection: &str) -> Result<Vec<Item>, RemoteError> {
        Ok(self
            .collections
            .get(collection)
            .map(|records| records.iter().map(|r| r.item.clone()).collect())
            .unwrap_or_default())
    }

    fn fetch(&self, collection: &str, key: &SyncKey) -> Result<Item, RemoteError> {
        self.get(collection, key)
            .cloned()
            .ok_or_else(|| not_found(collection, key))
    }

    fn create(
        &mut self,
        collection: &str,
        key: &SyncKey,
        item: &Item,
    ) -> Result<Item, RemoteError> {
        if self.position(collection, key).is_some() {
            return Err(RemoteError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        let stored = self.stamp(item.clone(), None);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(RemoteRecord {
                key: key.clone(),
                item: stored.clone(),
            });
        self.writes += 1;
        Ok(stored)
    }

    fn update(
        &mut self,
        collection: &str,
        key: &SyncKey,
        item: &Item,
    ) -> Result<Item, RemoteError> {
        let idx = self
            .position(collection, key)
            .ok_or_else(|| not_found(collection, key))?;
        let id = self.collections[collection][idx].item.remote_id.clone();
        let stored = self.stamp(item.clone(), id);
        if let Some(records) = self.collections.get_mut(collection) {
            records[idx].item = stored.clone();
        }
        self.writes += 1;
        Ok(stored)
    }

    fn remove(&mut self, collection: &str, key: &SyncKey) -> Result<(), RemoteError> {
        let idx = self
            .position(collection, key)
            .ok_or_else(|| not_found(collection, key))?;
        if let Some(records) = self.collections.get_mut(collection) {
            records.remove(idx);
        }
        self.writes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RENAMES: FieldRenames = &[("content_type", "contentType")];

    #[test]
    fn create_then_conflict() {
        let mut remote = MemoryRemote::new();
        let key = SyncKey::from("a");
        let item = Item::new().with_field("name", "a");
        let stored = remote.create("modules", &key, &item).expect("create");
        assert!(stored.remote_id.is_some());
        assert!(stored.updated_at.is_some());

        let err = remote.create("modules", &key, &item).unwrap_err();
        assert!(matches!(err, RemoteError::Conflict { .. }));
        assert_eq!(remote.write_count(), 1);
    }

    #[test]
    fn update_keeps_id_and_missing_is_not_found() {
        let mut remote = MemoryRemote::new();
        let key = SyncKey::from("a");
        let first = remote
            .create("modules", &key, &Item::new().with_field("v", 1))
            .unwrap();
        let second = remote
            .update("modules", &key, &Item::new().with_field("v", 2))
            .unwrap();
        assert_eq!(first.remote_id, second.remote_id);
        assert_eq!(remote.get("modules", &key).unwrap().field("v"), Some(&serde_json::json!(2)));

        let err = remote
            .update("modules", &SyncKey::from("zz"), &Item::new())
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut remote = MemoryRemote::new();
        for key in ["c", "a", "b"] {
            remote.insert("files", key, Item::new().with_field("path", key));
        }
        let listed: Vec<_> = remote
            .list("files")
            .unwrap()
            .iter()
            .map(|i| i.str_field("path").unwrap().to_string())
            .collect();
        assert_eq!(listed, ["c", "a", "b"]);
        assert_eq!(remote.write_count(), 0, "seeding is not a write");
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut remote = MemoryRemote::new();
        let err = remote.remove("files", &SyncKey::from("/x")).unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[test]
    fn snapshot_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remote.json");
        let mut remote = MemoryRemote::new();
        remote
            .create("modules", &SyncKey::from("util"), &Item::new().with_field("name", "util"))
            .unwrap();
        remote.save(&path).expect("save");
        assert!(!path.with_extension("json.tmp").exists());

        let mut loaded = MemoryRemote::load(&path).expect("load");
        assert_eq!(loaded.keys("modules"), vec![SyncKey::from("util")]);
        let next = loaded
            .create("modules", &SyncKey::from("other"), &Item::new())
            .unwrap();
        assert_eq!(next.remote_id.as_deref(), Some("000002"));
    }

    #[test]
    fn load_missing_snapshot_is_empty() {
        let tmp = TempDir::new().unwrap();
        let remote = MemoryRemote::load(&tmp.path().join("none.json")).expect("load");
        assert!(remote.list("anything").unwrap().is_empty());
    }

    #[test]
    fn normalize_and_denormalize_rename_fields() {
        let remote_item = Item::new()
            .with_field("contentType", "text/plain")
            .with_field("path", "/a");
        let canonical = normalize(remote_item, RENAMES);
        assert_eq!(canonical.str_field("content_type"), Some("text/plain"));
        assert!(canonical.field("contentType").is_none());

        let local = canonical
            .clone()
            .with_local(tether_core::LocalRef::file("routes/a.lua"));
        let back = denormalize(&local, RENAMES);
        assert_eq!(back.str_field("contentType"), Some("text/plain"));
        assert!(back.local.is_none());
    }
}
