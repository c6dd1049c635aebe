//! Applier: turns a [`DiffResult`] into create / update / delete actions.
//!
//! Actions run in `toadd`, `tomod`, `todel` order. Per-item remote failures
//! are recorded and the run continues; anything else stops it.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use tether_core::{DiffResult, Direction, Item, SyncKey};

use crate::error::SyncError;
use crate::syncable::{ApplyContext, Syncable};

/// What an action does to the target side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Add,
    Modify,
    Delete,
}

impl ActionKind {
    /// Single-character marker used in CLI output.
    pub fn marker(&self) -> char {
        match self {
            ActionKind::Add => '+',
            ActionKind::Modify => '~',
            ActionKind::Delete => '-',
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Modify => "modify",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    WouldApply,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAction {
    pub kind: ActionKind,
    pub key: SyncKey,
    pub outcome: Outcome,
}

/// Everything the applier did (or would have done) for one type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub actions: Vec<ItemAction>,
}

impl ApplyReport {
    pub fn applied(&self) -> impl Iterator<Item = &ItemAction> {
        self.actions
            .iter()
            .filter(|a| a.outcome == Outcome::Applied)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemAction> {
        self.actions
            .iter()
            .filter(|a| matches!(a.outcome, Outcome::Failed { .. }))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Apply `diff` for one handler.
///
/// `local` and `remote` are the items `diff` was computed from.
pub fn apply(
    handler: &dyn Syncable,
    diff: &DiffResult,
    local: &[Item],
    remote: &[Item],
    ctx: &mut ApplyContext,
) -> Result<ApplyReport, SyncError> {
    let local = key_items(handler, local);
    let remote = key_items(handler, remote);
    let (source, target) = match ctx.direction {
        Direction::Up => (&local, &remote),
        Direction::Down => (&remote, &local),
    };

    let batch_writer = match ctx.direction {
        Direction::Up if !ctx.dry_run && !diff.is_empty() => handler.batch_writer(),
        _ => None,
    };
    if let Some(writer) = batch_writer {
        match writer.begin(&*ctx.remote) {
            Ok(batch) => ctx.batch = Some(batch),
            Err(e) => {
                tracing::warn!("{}: could not open batch: {e}", handler.name());
                return Ok(fail_all(diff, &e.to_string()));
            }
        }
    }

    let mut report = ApplyReport::default();
    let steps = [
        (ActionKind::Add, &diff.toadd),
        (ActionKind::Modify, &diff.tomod),
        (ActionKind::Delete, &diff.todel),
    ];
    for (kind, keys) in steps {
        for key in keys {
            let outcome = if ctx.dry_run {
                tracing::info!("[dry-run] would {kind} {} {key}", handler.name());
                Outcome::WouldApply
            } else {
                let result = match kind {
                    ActionKind::Add => {
                        let item = lookup(source, handler, key)?;
                        handler.apply_add(item, ctx)
                    }
                    ActionKind::Modify => {
                        let item = lookup(source, handler, key)?;
                        let existing = lookup(target, handler, key)?;
                        handler.apply_mod(item, existing, ctx)
                    }
                    ActionKind::Delete => {
                        let item = lookup(target, handler, key)?;
                        handler.apply_del(item, ctx)
                    }
                };
                match result {
                    Ok(()) => {
                        if ctx.batch.is_none() {
                            tracing::info!("{kind} {} {key}", handler.name());
                        }
                        Outcome::Applied
                    }
                    Err(SyncError::Remote(e)) => {
                        tracing::warn!("{kind} {} {key} failed: {e}", handler.name());
                        Outcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                    Err(e) => {
                        ctx.batch = None;
                        return Err(e);
                    }
                }
            };
            report.actions.push(ItemAction {
                kind,
                key: key.clone(),
                outcome,
            });
        }
    }

    if let (Some(writer), Some(batch)) = (batch_writer, ctx.batch.take()) {
        let staged = batch.staged();
        match writer.commit(&mut *ctx.remote, batch) {
            Ok(()) => {
                for action in &report.actions {
                    tracing::info!("{} {} {}", action.kind, handler.name(), action.key);
                }
                tracing::info!("{}: committed {staged} staged change(s)", handler.name());
            }
            Err(e) => {
                tracing::warn!("{}: batch commit failed: {e}", handler.name());
                let reason = e.to_string();
                for action in &mut report.actions {
                    action.outcome = Outcome::Failed {
                        reason: reason.clone(),
                    };
                }
            }
        }
    }

    Ok(report)
}

/// Items by synckey; the first item wins and unkeyable items are skipped.
pub(crate) fn key_items<'a>(
    handler: &dyn Syncable,
    items: &'a [Item],
) -> HashMap<SyncKey, &'a Item> {
    let mut keyed = HashMap::with_capacity(items.len());
    for item in items {
        if let Ok(key) = handler.synckey(item) {
            keyed.entry(key).or_insert(item);
        }
    }
    keyed
}

fn lookup<'a>(
    items: &HashMap<SyncKey, &'a Item>,
    handler: &dyn Syncable,
    key: &SyncKey,
) -> Result<&'a Item, SyncError> {
    items
        .get(key)
        .copied()
        .ok_or_else(|| SyncError::UnknownKey {
            kind: handler.name().to_string(),
            key: key.clone(),
        })
}

fn fail_all(diff: &DiffResult, reason: &str) -> ApplyReport {
    let steps = [
        (ActionKind::Add, &diff.toadd),
        (ActionKind::Modify, &diff.tomod),
        (ActionKind::Delete, &diff.todel),
    ];
    let actions = steps
        .into_iter()
        .flat_map(|(kind, keys)| {
            keys.iter().map(move |key| ItemAction {
                kind,
                key: key.clone(),
                outcome: Outcome::Failed {
                    reason: reason.to_string(),
                },
            })
        })
        .collect();
    ApplyReport { actions }
}
