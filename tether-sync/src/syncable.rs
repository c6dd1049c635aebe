//! The per-type capability interface.
//!
//! A handler teaches the engine one kind of configuration item: where its
//! local files live, how to key and compare items, and how to write each
//! side. Optional capabilities are queried through [`Syncable::multi_item`]
//! and [`Syncable::batch_writer`].
//!
//! The `apply_*` methods have default implementations built on the smaller
//! `to_remote` / `write_local` / `remove_local` hooks, so most handlers only
//! describe their local layout. Remote writes go through [`push_create`],
//! [`push_update`] and [`push_remove`], which stage into the open [`Batch`]
//! instead when the handler's remote is an aggregate document.

use std::path::Path;

use serde_json::{Map, Value};

use tether_core::{Direction, Item, SyncKey, TypeRegistry};

use crate::compare::CompareContext;
use crate::error::{RemoteError, SyncError};
use crate::remote::{denormalize, normalize, FieldRenames, RemoteService};
use crate::scanner::{ScanScope, ScopeDefaults};

/// Registry of boxed handlers, as built by [`crate::types::builtin_registry`].
pub type HandlerRegistry = TypeRegistry<Box<dyn Syncable>>;

/// Everything a handler needs while applying one action.
pub struct ApplyContext<'a> {
    pub direction: Direction,
    pub dry_run: bool,
    pub remote: &'a mut dyn RemoteService,
    pub scope: &'a ScanScope,
    /// Open aggregate-document batch, when the handler has a [`BatchWriter`].
    pub batch: Option<Batch>,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        direction: Direction,
        dry_run: bool,
        remote: &'a mut dyn RemoteService,
        scope: &'a ScanScope,
    ) -> Self {
        Self {
            direction,
            dry_run,
            remote,
            scope,
            batch: None,
        }
    }
}

/// One sync type.
pub trait Syncable {
    /// Registry name, also the default remote collection.
    fn name(&self) -> &'static str;

    fn collection(&self) -> &'static str {
        self.name()
    }

    /// `(canonical, remote)` field-name pairs.
    fn renames(&self) -> FieldRenames {
        &[]
    }

    /// Where local files live when `tether.yaml` does not say otherwise.
    fn default_scope(&self) -> ScopeDefaults;

    fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError>;

    /// Values a `--match` pattern is tested against, most significant first.
    fn match_fields(&self, item: &Item) -> Vec<String>;

    /// Whether the first match field compares case-insensitively.
    fn match_first_ignores_case(&self) -> bool {
        false
    }

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError>;

    /// Remote items in canonical field names.
    fn list_remote(&self, remote: &dyn RemoteService) -> Result<Vec<Item>, RemoteError> {
        let renames = self.renames();
        Ok(remote
            .list(self.collection())?
            .into_iter()
            .map(|item| normalize(item, renames))
            .collect())
    }

    /// True when `local` and `remote` differ in a way that needs an update.
    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        ctx: &mut CompareContext,
    ) -> Result<bool, SyncError>;

    /// Remote representation of a local item: content materialized, remote
    /// field names applied.
    fn to_remote(&self, item: &Item) -> Result<Item, SyncError> {
        Ok(denormalize(item, self.renames()))
    }

    /// Write a remote item into the local tree. `existing` is the local item
    /// being replaced, if any.
    fn write_local(
        &self,
        item: &Item,
        existing: Option<&Item>,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError>;

    fn remove_local(&self, item: &Item, ctx: &mut ApplyContext) -> Result<(), SyncError>;

    /// Text shown by `tether diff` for one side of a modified item.
    fn display_text(&self, item: &Item) -> Result<String, SyncError> {
        Ok(serde_yaml::to_string(&item.fields)?)
    }

    fn apply_add(&self, item: &Item, ctx: &mut ApplyContext) -> Result<(), SyncError> {
        match ctx.direction {
            Direction::Up => {
                let key = self.synckey(item)?;
                let payload = self.to_remote(item)?;
                push_create(ctx, self.collection(), &key, &payload)
            }
            Direction::Down => self.write_local(item, None, ctx),
        }
    }

    /// `item` lives on the target side.
    fn apply_del(&self, item: &Item, ctx: &mut ApplyContext) -> Result<(), SyncError> {
        match ctx.direction {
            Direction::Up => {
                let key = self.synckey(item)?;
                push_remove(ctx, self.collection(), &key)
            }
            Direction::Down => self.remove_local(item, ctx),
        }
    }

    /// Overwrite `target` with `source` in full.
    fn apply_mod(
        &self,
        source: &Item,
        target: &Item,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError> {
        match ctx.direction {
            Direction::Up => {
                let key = self.synckey(source)?;
                let payload = self.to_remote(source)?;
                push_update(ctx, self.collection(), &key, &payload)
            }
            Direction::Down => self.write_local(source, Some(target), ctx),
        }
    }

    fn multi_item(&self) -> Option<&dyn MultiItemSource> {
        None
    }

    fn batch_writer(&self) -> Option<&dyn BatchWriter> {
        None
    }
}

/// Files holding several items, each introduced by a header marker.
pub trait MultiItemSource {
    /// Split file content into items, each with its block span set.
    fn split(&self, path: &Path, content: &str) -> Result<Vec<Item>, SyncError>;

    /// Render one item as a block (header plus body, newline-terminated).
    fn render(&self, item: &Item) -> Result<String, SyncError>;
}

/// Remote stores that keep a whole collection as one document.
pub trait BatchWriter {
    /// Fetch the current document.
    fn begin(&self, remote: &dyn RemoteService) -> Result<Batch, RemoteError>;

    /// Write the staged document back in one call.
    fn commit(&self, remote: &mut dyn RemoteService, batch: Batch) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Staged contents of an aggregate document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    entries: Map<String, Value>,
    existed: bool,
    staged: usize,
}

impl Batch {
    pub fn new(entries: Map<String, Value>, existed: bool) -> Self {
        Self {
            entries,
            existed,
            staged: 0,
        }
    }

    pub fn put(&mut self, key: &SyncKey, value: Value) {
        self.entries.insert(key.to_string(), value);
        self.staged += 1;
    }

    pub fn remove(&mut self, key: &SyncKey) {
        self.entries.remove(key.as_str());
        self.staged += 1;
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Whether the document was present on the remote when the batch began.
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn staged(&self) -> usize {
        self.staged
    }

    pub fn into_entries(self) -> Map<String, Value> {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Remote write helpers
// ---------------------------------------------------------------------------

/// Create `key` on the remote. A `Conflict` falls back to an update of the
/// same item.
pub fn push_create(
    ctx: &mut ApplyContext,
    collection: &str,
    key: &SyncKey,
    payload: &Item,
) -> Result<(), SyncError> {
    if let Some(batch) = ctx.batch.as_mut() {
        batch.put(key, Value::Object(payload.fields.clone()));
        return Ok(());
    }
    match ctx.remote.create(collection, key, payload) {
        Ok(_) => Ok(()),
        Err(RemoteError::Conflict { .. }) => {
            tracing::info!("{collection} {key} already exists remotely; updating instead");
            ctx.remote.update(collection, key, payload)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn push_update(
    ctx: &mut ApplyContext,
    collection: &str,
    key: &SyncKey,
    payload: &Item,
) -> Result<(), SyncError> {
    if let Some(batch) = ctx.batch.as_mut() {
        batch.put(key, Value::Object(payload.fields.clone()));
        return Ok(());
    }
    ctx.remote.update(collection, key, payload)?;
    Ok(())
}

pub fn push_remove(ctx: &mut ApplyContext, collection: &str, key: &SyncKey) -> Result<(), SyncError> {
    if let Some(batch) = ctx.batch.as_mut() {
        batch.remove(key);
        return Ok(());
    }
    ctx.remote.remove(collection, key)?;
    Ok(())
}

/// Required string field, or `MissingField`.
pub fn require_str<'i>(
    kind: &str,
    item: &'i Item,
    field: &'static str,
) -> Result<&'i str, SyncError> {
    item.str_field(field)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SyncError::MissingField {
            kind: kind.to_string(),
            field,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;

    #[test]
    fn create_conflict_falls_back_to_update() {
        let mut remote = MemoryRemote::new();
        remote.insert("modules", "util", Item::new().with_field("script", "old"));
        let scope = ScanScope::new("modules", &["*.lua"], &[]);
        let mut ctx = ApplyContext::new(Direction::Up, false, &mut remote, &scope);

        let payload = Item::new().with_field("script", "new");
        push_create(&mut ctx, "modules", &SyncKey::from("util"), &payload).expect("create");

        assert_eq!(remote.write_count(), 1);
        assert_eq!(
            remote
                .get("modules", &SyncKey::from("util"))
                .unwrap()
                .str_field("script"),
            Some("new")
        );
    }

    #[test]
    fn open_batch_stages_instead_of_calling_remote() {
        let mut remote = MemoryRemote::new();
        let scope = ScanScope::new("specs/resources.yaml", &["*.yaml"], &[]);
        let mut ctx = ApplyContext::new(Direction::Up, false, &mut remote, &scope);
        ctx.batch = Some(Batch::default());

        let payload = Item::new().with_field("format", "string");
        push_create(&mut ctx, "resources", &SyncKey::from("temp"), &payload).unwrap();
        push_update(&mut ctx, "resources", &SyncKey::from("hum"), &payload).unwrap();
        push_remove(&mut ctx, "resources", &SyncKey::from("temp")).unwrap();

        let batch = ctx.batch.take().unwrap();
        assert_eq!(batch.staged(), 3);
        assert_eq!(batch.entries().keys().collect::<Vec<_>>(), ["hum"]);
        assert_eq!(remote.write_count(), 0);
    }

    #[test]
    fn require_str_rejects_empty() {
        let item = Item::new().with_field("name", "");
        let err = require_str("modules", &item, "name").unwrap_err();
        assert!(matches!(err, SyncError::MissingField { field: "name", .. }));
    }
}
