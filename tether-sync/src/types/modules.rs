//! Lua modules: one module per file under `modules/`.
//!
//! The module name is the file's path relative to the scan root with the
//! `.lua` extension dropped and `/` replaced by `.` (`util/strings.lua` is
//! `util.strings`). Local items are path references; their content is only
//! hashed when the hash cache cannot vouch for it. Files that are not UTF-8
//! are skipped with a warning at scan time.

use std::path::PathBuf;

use tether_core::{Item, LocalRef, SyncKey};

use crate::compare::{script_differs, CompareContext};
use crate::error::SyncError;
use crate::remote::denormalize;
use crate::scanner::{relative_slash_path, scan_files, ScanScope, ScopeDefaults};
use crate::syncable::{require_str, ApplyContext, Syncable};
use crate::writer::{atomic_write, is_text, read_text, remove_file};

#[derive(Debug, Default)]
pub struct Modules;

/// `util/strings.lua` → `util.strings`.
pub fn module_name(relative: &str) -> String {
    let stem = relative.strip_suffix(".lua").unwrap_or(relative);
    stem.replace('/', ".")
}

/// `util.strings` → `<root>/util/strings.lua`.
pub fn module_path(scope: &ScanScope, name: &str) -> PathBuf {
    let mut path = scope.root.clone();
    for part in name.split('.') {
        path.push(part);
    }
    path.set_extension("lua");
    path
}

impl Syncable for Modules {
    fn name(&self) -> &'static str {
        "modules"
    }

    fn default_scope(&self) -> ScopeDefaults {
        ScopeDefaults {
            location: "modules",
            include: &["*.lua"],
            exclude: &[],
        }
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError> {
        Ok(SyncKey::from(require_str(self.name(), item, "name")?))
    }

    fn match_fields(&self, item: &Item) -> Vec<String> {
        vec![item.str_field("name").unwrap_or_default().to_string()]
    }

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
        let mut items = Vec::new();
        for path in scan_files(self.name(), scope)? {
            if !is_text(&path)? {
                tracing::warn!("{}: skipping {}: not UTF-8", self.name(), path.display());
                continue;
            }
            let name = module_name(&relative_slash_path(&scope.root, &path));
            items.push(
                Item::new()
                    .with_field("name", name)
                    .with_local(LocalRef::file(path)),
            );
        }
        Ok(items)
    }

    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        ctx: &mut CompareContext,
    ) -> Result<bool, SyncError> {
        script_differs(local, remote, "script", ctx)
    }

    fn to_remote(&self, item: &Item) -> Result<Item, SyncError> {
        let mut out = denormalize(item, self.renames());
        if let Some(local) = item.local.as_ref() {
            out.set("script", read_text(&local.path)?);
        }
        Ok(out)
    }

    fn write_local(
        &self,
        item: &Item,
        existing: Option<&Item>,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError> {
        let path = match existing.and_then(|e| e.local.as_ref()) {
            Some(local) => local.path.clone(),
            None => module_path(ctx.scope, require_str(self.name(), item, "name")?),
        };
        let script = item.str_field("script").unwrap_or_default().trim_end();
        atomic_write(&path, format!("{script}\n"))
    }

    fn remove_local(&self, item: &Item, ctx: &mut ApplyContext) -> Result<(), SyncError> {
        match item.local.as_ref() {
            Some(local) => remove_file(&local.path, &ctx.scope.root),
            None => Ok(()),
        }
    }

    fn display_text(&self, item: &Item) -> Result<String, SyncError> {
        match (item.str_field("script"), item.local.as_ref()) {
            (Some(script), _) => Ok(format!("{}\n", script.trim_end())),
            (None, Some(local)) => Ok(format!("{}\n", read_text(&local.path)?.trim_end())),
            (None, None) => Ok(String::new()),
        }
    }
}
