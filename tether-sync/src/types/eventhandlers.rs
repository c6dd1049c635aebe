//! Event handlers: Lua blocks under `services/`, one `--#EVENT` header each.

use std::path::PathBuf;

use tether_core::{Item, SyncKey};

use crate::compare::{script_differs, CompareContext};
use crate::error::SyncError;
use crate::scanner::{ScanScope, ScopeDefaults};
use crate::syncable::{ApplyContext, MultiItemSource, Syncable};
use crate::types::script::{list_blocks, remove_block, write_block, HeaderBlocks};

pub struct EventHandlers {
    blocks: HeaderBlocks,
}

impl Default for EventHandlers {
    fn default() -> Self {
        Self {
            blocks: HeaderBlocks {
                kind: "eventhandlers",
                marker: "--#EVENT",
                fields: &["service", "event"],
                optional: None,
                upper_first: false,
            },
        }
    }
}

impl EventHandlers {
    /// New handlers are grouped one file per service.
    fn default_file(&self, scope: &ScanScope, item: &Item) -> PathBuf {
        let service = item.str_field("service").unwrap_or("unknown");
        let name: String = service
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        scope.root.join(format!("{name}.lua"))
    }
}

impl Syncable for EventHandlers {
    fn name(&self) -> &'static str {
        "eventhandlers"
    }

    fn default_scope(&self) -> ScopeDefaults {
        ScopeDefaults {
            location: "services",
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

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
        list_blocks(&self.blocks, scope)
    }

    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        ctx: &mut CompareContext,
    ) -> Result<bool, SyncError> {
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
