//! HTTP endpoints: Lua blocks under `routes/`, one `--#ENDPOINT` header each.

use std::path::PathBuf;

use tether_core::{Item, SyncKey};

use crate::compare::{fields_differ, script_differs, CompareContext};
use crate::error::{RemoteError, SyncError};
use crate::remote::{normalize, FieldRenames, RemoteService};
use crate::scanner::{ScanScope, ScopeDefaults};
use crate::syncable::{ApplyContext, MultiItemSource, Syncable};
use crate::types::script::{list_blocks, remove_block, write_block, HeaderBlocks};

const RENAMES: FieldRenames = &[("content_type", "contentType")];

pub struct Endpoints {
    blocks: HeaderBlocks,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            blocks: HeaderBlocks {
                kind: "endpoints",
                marker: "--#ENDPOINT",
                fields: &["method", "path"],
                optional: Some(("content_type", "application/json")),
                upper_first: true,
            },
        }
    }
}

impl Endpoints {
    /// File a new endpoint lands in: named after the first path segment.
    fn default_file(&self, scope: &ScanScope, item: &Item) -> PathBuf {
        let path = item.str_field("path").unwrap_or_default();
        let segment = path
            .split('/')
            .find(|s| !s.is_empty() && !s.starts_with('{'))
            .unwrap_or("index");
        let name: String = segment
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        scope.root.join(format!("{name}.lua"))
    }
}

impl Syncable for Endpoints {
    fn name(&self) -> &'static str {
        "endpoints"
    }

    fn renames(&self) -> FieldRenames {
        RENAMES
    }

    fn default_scope(&self) -> ScopeDefaults {
        ScopeDefaults {
            location: "routes",
            include: &["*.lua"],
            exclude: &[],
        }
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError> {
        self.blocks.key(item)
    }

    fn match_fields(&self, item: &Item) -> Vec<String> {
        self.blocks.match_fields(item)
    }

    /// HTTP methods.
    fn match_first_ignores_case(&self) -> bool {
        true
    }

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
        list_blocks(&self.blocks, scope)
    }

    fn list_remote(&self, remote: &dyn RemoteService) -> Result<Vec<Item>, RemoteError> {
        Ok(remote
            .list(self.collection())?
            .into_iter()
            .map(|item| self.blocks.with_defaults(normalize(item, RENAMES)))
            .collect())
    }

    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        ctx: &mut CompareContext,
    ) -> Result<bool, SyncError> {
        if fields_differ(local, remote, &["content_type"]) {
            return Ok(true);
        }
        script_differs(local, remote, "script", ctx)
    }

    fn write_local(
        &self,
        item: &Item,
        existing: Option<&Item>,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError> {
        let key = self.synckey(item)?;
        let local = existing.and_then(|e| e.local.as_ref());
        let path = match local {
            Some(local) => local.path.clone(),
            None => self.default_file(ctx.scope, item),
        };
        write_block(&self.blocks, &path, &key, local.and_then(|l| l.span), item)
    }

    fn remove_local(&self, item: &Item, ctx: &mut ApplyContext) -> Result<(), SyncError> {
        let Some(local) = item.local.as_ref() else {
            return Ok(());
        };
        let key = self.synckey(item)?;
        remove_block(&self.blocks, &local.path, &key, local.span, &ctx.scope.root)
    }

    fn display_text(&self, item: &Item) -> Result<String, SyncError> {
        self.blocks.render(item)
    }

    fn multi_item(&self) -> Option<&dyn MultiItemSource> {
        Some(&self.blocks)
    }
}
