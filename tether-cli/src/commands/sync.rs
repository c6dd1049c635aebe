//! `tether sync`: reconcile and apply, in either direction.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tether_sync::{pipeline, ActionKind, ItemAction, Outcome, TypeSyncResult};

use super::{open_project, registry, SyncOptions};
use crate::remote::Remote;

/// Arguments for `tether sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub options: SyncOptions,

    /// Report what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, project: Option<&Path>) -> Result<()> {
        let project = open_project(project)?;
        let registry = registry()?;
        let mut remote = Remote::open(&project.root, &project.config)?;
        let invocation = self.options.invocation(self.dry_run);

        let results = pipeline::run(
            &registry,
            &project.root,
            &project.config,
            remote.service(),
            &invocation,
        )
        .context("sync failed")?;

        if !self.dry_run {
            remote.persist()?;
        }

        let failures = print_results(&results, self.dry_run);
        if failures > 0 {
            anyhow::bail!("{failures} item(s) failed to sync");
        }
        Ok(())
    }
}

/// Print every action and a per-type summary. Returns the failure count.
fn print_results(results: &[TypeSyncResult], dry_run: bool) -> usize {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let mut failures = 0;

    for result in results {
        for action in &result.report.actions {
            println!("{prefix}{}", action_line(&result.kind, action));
        }
        let failed = result.report.failure_count();
        failures += failed;

        let summary = format!(
            "{prefix}{}: {} added, {} modified, {} deleted, {} unchanged",
            result.kind,
            result.diff.toadd.len(),
            result.diff.tomod.len(),
            result.diff.todel.len(),
            result.diff.unchg.len(),
        );
        if failed > 0 {
            println!("{summary}, {}", format!("{failed} failed").red().bold());
        } else {
            println!("{summary}");
        }
    }

    if results.iter().all(|r| r.diff.is_empty()) {
        println!("{prefix}✓ everything in sync");
    }
    failures
}

fn action_line(kind: &str, action: &ItemAction) -> String {
    let marker = action.kind.marker().to_string();
    let marker = match action.kind {
        ActionKind::Add => marker.green(),
        ActionKind::Modify => marker.yellow(),
        ActionKind::Delete => marker.red(),
    };
    match &action.outcome {
        Outcome::Failed { reason } => format!(
            "{} {kind} {} {}",
            "!".red().bold(),
            action.key,
            format!("({} failed: {reason})", action.kind).red()
        ),
        Outcome::Applied | Outcome::WouldApply => format!("{marker} {kind} {}", action.key),
    }
}
