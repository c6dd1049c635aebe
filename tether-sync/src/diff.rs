//! Unified diffs for `tether diff`.
//!
//! Each changed key is rendered through the handler's
//! [`Syncable::display_text`], target side as the old text and source side
//! as the new, so the diff reads as "what the sync would do".

use similar::TextDiff;

use tether_core::{DiffResult, Direction, Item, SyncKey};

use crate::apply::{key_items, ActionKind};
use crate::error::SyncError;
use crate::syncable::Syncable;

/// A single rendered item diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDiff {
    pub kind: ActionKind,
    pub key: SyncKey,
    pub unified_diff: String,
}

/// Render diffs for every add, modify and delete in `diff`.
pub fn item_diffs(
    handler: &dyn Syncable,
    diff: &DiffResult,
    local: &[Item],
    remote: &[Item],
    direction: Direction,
) -> Result<Vec<ItemDiff>, SyncError> {
    let local = key_items(handler, local);
    let remote = key_items(handler, remote);
    let (source, target) = match direction {
        Direction::Up => (&local, &remote),
        Direction::Down => (&remote, &local),
    };

    let mut out = Vec::with_capacity(diff.changes());
    let steps = [
        (ActionKind::Add, &diff.toadd),
        (ActionKind::Modify, &diff.tomod),
        (ActionKind::Delete, &diff.todel),
    ];
    for (kind, keys) in steps {
        for key in keys {
            let old = render(handler, target.get(key).copied())?;
            let new = match kind {
                ActionKind::Delete => String::new(),
                _ => render(handler, source.get(key).copied())?,
            };
            if old == new {
                continue;
            }
            out.push(ItemDiff {
                kind,
                key: key.clone(),
                unified_diff: unified(&old, &new, key.as_str()),
            });
        }
    }
    Ok(out)
}

/// Unified diff between two texts, headed `a/<label>` and `b/<label>`.
pub fn unified(old: &str, new: &str, label: &str) -> String {
    let old_header = format!("a/{label}");
    let new_header = format!("b/{label}");
    TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

fn render(handler: &dyn Syncable, item: Option<&Item>) -> Result<String, SyncError> {
    match item {
        Some(item) => Ok(normalize_line_endings(&handler.display_text(item)?)),
        None => Ok(String::new()),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
