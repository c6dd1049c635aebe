//! Sync pipeline entrypoint used by the CLI.
//!
//! Per selected type, in registry order:
//!
//! 1. Resolve the scan scope from the type defaults and `tether.yaml`.
//! 2. Load the type's content-hash cache.
//! 3. Scan local items and list remote items.
//! 4. Reconcile into a [`DiffResult`].
//! 5. Apply (or, for [`plan`], render per-item diffs instead).
//! 6. Save the cache, except in dry-run.

use std::path::Path;

use tether_core::{DiffResult, Invocation, Item, ProjectConfig, RegistryEntry};

use crate::apply::{apply, ApplyReport};
use crate::cache::HashCache;
use crate::compare::CompareContext;
use crate::diff::{item_diffs, ItemDiff};
use crate::error::SyncError;
use crate::pattern::MatchPattern;
use crate::reconcile::{reconcile, ReconcileOptions};
use crate::remote::RemoteService;
use crate::scanner::ScanScope;
use crate::syncable::{ApplyContext, HandlerRegistry, Syncable};

/// Outcome of syncing one type.
#[derive(Debug, Clone)]
pub struct TypeSyncResult {
    pub kind: String,
    pub diff: DiffResult,
    pub report: ApplyReport,
}

/// What a sync of one type would change, with rendered item diffs.
#[derive(Debug, Clone)]
pub struct TypePlan {
    pub kind: String,
    pub diff: DiffResult,
    pub items: Vec<ItemDiff>,
}

struct Prepared {
    scope: ScanScope,
    compare: CompareContext,
    local: Vec<Item>,
    remote: Vec<Item>,
    diff: DiffResult,
}

/// Run a sync for every type `invocation` selects.
pub fn run(
    registry: &HandlerRegistry,
    project: &Path,
    config: &ProjectConfig,
    remote: &mut dyn RemoteService,
    invocation: &Invocation,
) -> Result<Vec<TypeSyncResult>, SyncError> {
    let (entries, pattern) = select(registry, config, invocation)?;

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let handler = entry.handler.as_ref();
        let mut prepared = prepare(handler, project, config, &*remote, invocation, pattern.as_ref())?;

        let mut ctx = ApplyContext::new(
            invocation.direction,
            invocation.dry_run,
            &mut *remote,
            &prepared.scope,
        );
        let report = apply(
            handler,
            &prepared.diff,
            &prepared.local,
            &prepared.remote,
            &mut ctx,
        )?;

        if !invocation.dry_run {
            prepared.compare.cache.save_at(project, handler.name())?;
        }

        tracing::info!(
            "{}: {} applied, {} failed, {} unchanged",
            handler.name(),
            report.applied().count(),
            report.failure_count(),
            prepared.diff.unchg.len()
        );
        results.push(TypeSyncResult {
            kind: entry.name.clone(),
            diff: prepared.diff,
            report,
        });
    }
    Ok(results)
}

/// Reconcile every selected type and render per-item diffs. Nothing is
/// written, locally or remotely.
pub fn plan(
    registry: &HandlerRegistry,
    project: &Path,
    config: &ProjectConfig,
    remote: &dyn RemoteService,
    invocation: &Invocation,
) -> Result<Vec<TypePlan>, SyncError> {
    let (entries, pattern) = select(registry, config, invocation)?;

    let mut plans = Vec::with_capacity(entries.len());
    for entry in entries {
        let handler = entry.handler.as_ref();
        let prepared = prepare(handler, project, config, remote, invocation, pattern.as_ref())?;
        let items = item_diffs(
            handler,
            &prepared.diff,
            &prepared.local,
            &prepared.remote,
            invocation.direction,
        )?;
        plans.push(TypePlan {
            kind: entry.name.clone(),
            diff: prepared.diff,
            items,
        });
    }
    Ok(plans)
}

type Selected<'r> = (Vec<&'r RegistryEntry<Box<dyn Syncable>>>, Option<MatchPattern>);

fn select<'r>(
    registry: &'r HandlerRegistry,
    config: &ProjectConfig,
    invocation: &Invocation,
) -> Result<Selected<'r>, SyncError> {
    config.validate()?;

    let unknown = registry.unknown_names(&invocation.selection);
    if !unknown.is_empty() {
        return Err(SyncError::UnknownType { names: unknown });
    }

    let pattern = invocation
        .match_pattern
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(MatchPattern::parse)
        .transpose()?;

    let entries = registry.each_filtered(&invocation.selection);
    tracing::debug!(
        "selected types: {}",
        entries
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok((entries, pattern))
}

fn prepare(
    handler: &dyn Syncable,
    project: &Path,
    config: &ProjectConfig,
    remote: &dyn RemoteService,
    invocation: &Invocation,
    pattern: Option<&MatchPattern>,
) -> Result<Prepared, SyncError> {
    let scope = ScanScope::resolve(
        project,
        handler.default_scope(),
        config.type_config(handler.name()),
    );
    let cache = HashCache::load_at(project, handler.name())?;
    let mut compare = CompareContext::new(invocation.direction, cache);

    let local = handler.list_local(&scope)?;
    let remote = handler.list_remote(remote)?;

    let opts = ReconcileOptions {
        direction: invocation.direction,
        delete: invocation.delete,
        pattern,
    };
    let diff = reconcile(handler, &local, &remote, &opts, &mut compare)?;

    Ok(Prepared {
        scope,
        compare,
        local,
        remote,
        diff,
    })
}
