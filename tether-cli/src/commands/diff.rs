//! `tether diff`: unified diffs for what sync would change.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tether_sync::pipeline;

use super::{open_project, registry, SyncOptions};
use crate::remote::Remote;

/// Arguments for `tether diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub options: SyncOptions,
}

impl DiffArgs {
    pub fn run(self, project: Option<&Path>) -> Result<()> {
        let project = open_project(project)?;
        let registry = registry()?;
        let remote = Remote::open(&project.root, &project.config)?;
        let invocation = self.options.invocation(true);

        let plans = pipeline::plan(
            &registry,
            &project.root,
            &project.config,
            remote.view(),
            &invocation,
        )
        .context("diff failed")?;

        let mut shown = 0;
        for plan in plans {
            for item in plan.items {
                println!(
                    "{}",
                    format!("{} {} {} ({})", item.kind.marker(), plan.kind, item.key, item.kind)
                        .bold()
                );
                print!("{}", item.unified_diff);
                if !item.unified_diff.ends_with('\n') {
                    println!();
                }
                shown += 1;
            }
        }

        if shown == 0 {
            println!("No differences.");
        }
        Ok(())
    }
}
