//! Device resources: a YAML map of alias → spec in `specs/resources.yaml`.
//!
//! ```yaml
//! temperature:
//!   format: number
//!   settable: false
//! state:
//!   format: string
//!   settable: true
//!   allowed: [on, off]
//! ```
//!
//! The remote keeps every resource in one aggregate document (collection
//! `resources`, key `resources`, field `resources`), so up-sync stages all
//! changes into a [`Batch`] and writes the document once.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::Mapping;

use tether_core::{Item, LocalRef, SyncKey};

use crate::compare::{fields_differ, CompareContext};
use crate::error::{invalid, RemoteError, SyncError};
use crate::remote::RemoteService;
use crate::scanner::{scan_files, ScanScope, ScopeDefaults};
use crate::syncable::{require_str, ApplyContext, Batch, BatchWriter, Syncable};
use crate::writer::{atomic_write, read_text};

const DOCUMENT_KEY: &str = "resources";
const DOCUMENT_FIELD: &str = "resources";
const COMPARED: &[&str] = &["format", "settable", "allowed"];
const DEFAULT_FORMAT: &str = "string";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceSpec {
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    settable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allowed: Option<Vec<Value>>,
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

#[derive(Debug, Default)]
pub struct Resources;

/// Canonical item for `alias` from a spec object, with defaults filled in.
fn spec_item(alias: &str, spec: &Map<String, Value>) -> Item {
    let mut item = Item::new()
        .with_field("alias", alias)
        .with_field(
            "format",
            spec.get("format")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_FORMAT),
        )
        .with_field(
            "settable",
            spec.get("settable").and_then(Value::as_bool).unwrap_or(false),
        );
    if let Some(allowed) = spec.get("allowed").filter(|v| !v.is_null()) {
        item.set("allowed", allowed.clone());
    }
    item
}

/// The YAML file down-sync writes to.
fn spec_file(scope: &ScanScope) -> PathBuf {
    if scope.is_file_root() {
        scope.root.clone()
    } else {
        scope.root.join("resources.yaml")
    }
}

fn read_mapping(path: &Path) -> Result<Mapping, SyncError> {
    if !path.exists() {
        return Ok(Mapping::new());
    }
    let content = read_text(path)?;
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    serde_yaml::from_str(&content).map_err(|e| invalid(path, e.to_string()))
}

fn write_mapping(path: &Path, mapping: &Mapping) -> Result<(), SyncError> {
    atomic_write(path, serde_yaml::to_string(mapping)?)
}

fn parse_specs(content: &str) -> Result<Vec<(String, ResourceSpec)>, serde_yaml::Error> {
    let map: Mapping = serde_yaml::from_str(content)?;
    let mut specs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let alias: String = serde_yaml::from_value(key)?;
        let spec: ResourceSpec = serde_yaml::from_value(value)?;
        specs.push((alias, spec));
    }
    Ok(specs)
}

/// Spec fields (no alias) in the shape both the YAML file and the remote
/// document use.
fn spec_fields(item: &Item) -> Map<String, Value> {
    let mut fields = item.fields.clone();
    fields.remove("alias");
    fields
}

impl Syncable for Resources {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn default_scope(&self) -> ScopeDefaults {
        ScopeDefaults {
            location: "specs/resources.yaml",
            include: &["*.yaml", "*.yml"],
            exclude: &[],
        }
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError> {
        Ok(SyncKey::from(require_str(self.name(), item, "alias")?))
    }

    fn match_fields(&self, item: &Item) -> Vec<String> {
        vec![item.str_field("alias").unwrap_or_default().to_string()]
    }

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
        let mut items = Vec::new();
        for path in scan_files(self.name(), scope)? {
            let content = read_text(&path)?;
            if content.trim().is_empty() {
                continue;
            }
            let specs = parse_specs(&content).map_err(|e| invalid(&path, e.to_string()))?;
            for (alias, spec) in specs {
                let Value::Object(spec) = serde_json::to_value(&spec)? else {
                    return Err(invalid(&path, format!("resource '{alias}' is not a map")));
                };
                items.push(spec_item(&alias, &spec).with_local(LocalRef::file(&path)));
            }
        }
        Ok(items)
    }

    fn list_remote(&self, remote: &dyn RemoteService) -> Result<Vec<Item>, RemoteError> {
        let document = match remote.fetch(self.collection(), &SyncKey::from(DOCUMENT_KEY)) {
            Ok(document) => document,
            Err(RemoteError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let entries = document_entries(&document)?;
        entries
            .iter()
            .map(|(alias, spec)| match spec {
                Value::Object(spec) => Ok(spec_item(alias, spec)),
                other => Err(RemoteError::Decode(format!(
                    "resource '{alias}' is {other}, expected an object"
                ))),
            })
            .collect()
    }

    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        _ctx: &mut CompareContext,
    ) -> Result<bool, SyncError> {
        Ok(fields_differ(local, remote, COMPARED))
    }

    fn to_remote(&self, item: &Item) -> Result<Item, SyncError> {
        Ok(Item {
            fields: spec_fields(item),
            ..Item::default()
        })
    }

    fn write_local(
        &self,
        item: &Item,
        existing: Option<&Item>,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError> {
        let alias = require_str(self.name(), item, "alias")?;
        let path = existing
            .and_then(|e| e.local.as_ref())
            .map(|l| l.path.clone())
            .unwrap_or_else(|| spec_file(ctx.scope));
        let mut mapping = read_mapping(&path)?;
        let spec: serde_yaml::Value = serde_yaml::to_value(spec_fields(item))?;
        mapping.insert(serde_yaml::Value::String(alias.to_string()), spec);
        write_mapping(&path, &mapping)
    }

    fn remove_local(&self, item: &Item, _ctx: &mut ApplyContext) -> Result<(), SyncError> {
        let Some(local) = item.local.as_ref() else {
            return Ok(());
        };
        let alias = require_str(self.name(), item, "alias")?;
        let mut mapping = read_mapping(&local.path)?;
        if mapping.remove(alias).is_some() {
            write_mapping(&local.path, &mapping)?;
        }
        Ok(())
    }

    fn batch_writer(&self) -> Option<&dyn BatchWriter> {
        Some(self)
    }
}

fn document_entries(document: &Item) -> Result<Map<String, Value>, RemoteError> {
    match document.field(DOCUMENT_FIELD) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(entries)) => Ok(entries.clone()),
        Some(other) => Err(RemoteError::Decode(format!(
            "'{DOCUMENT_FIELD}' is {other}, expected an object"
        ))),
    }
}

impl BatchWriter for Resources {
    fn begin(&self, remote: &dyn RemoteService) -> Result<Batch, RemoteError> {
        match remote.fetch(self.collection(), &SyncKey::from(DOCUMENT_KEY)) {
            Ok(document) => Ok(Batch::new(document_entries(&document)?, true)),
            Err(RemoteError::NotFound { .. }) => Ok(Batch::new(Map::new(), false)),
            Err(e) => Err(e),
        }
    }

    fn commit(&self, remote: &mut dyn RemoteService, batch: Batch) -> Result<(), RemoteError> {
        let key = SyncKey::from(DOCUMENT_KEY);
        let existed = batch.existed();
        let document = Item::new().with_field(DOCUMENT_FIELD, Value::Object(batch.into_entries()));
        if existed {
            remote.update(self.collection(), &key, &document)?;
        } else {
            remote.create(self.collection(), &key, &document)?;
        }
        Ok(())
    }
}
