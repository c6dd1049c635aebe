//! `tether init`: scaffold `tether.yaml`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use tether_core::{config, ProjectConfig, RemoteConfig};

/// Arguments for `tether init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Solution identifier on the remote service.
    #[arg(long)]
    pub solution: Option<String>,

    /// Remote URL (`https://…` or `file://state.json`).
    #[arg(long)]
    pub url: Option<String>,

    /// Replace an existing tether.yaml.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, project: Option<&Path>) -> Result<()> {
        let root = match project {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().context("could not determine working directory")?,
        };
        let path = config::config_path_at(&root);
        if path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite",
                path.display()
            );
        }

        let cfg = ProjectConfig {
            solution_id: self.solution,
            remote: RemoteConfig {
                url: self.url,
                ..RemoteConfig::default()
            },
            types: Default::default(),
        };
        config::save_at(&root, &cfg)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!("✓ Wrote {}", path.display());
        if cfg.solution_id.is_none() || cfg.remote.url.is_none() {
            println!("  Fill in solution_id and remote.url before running `tether sync`.");
        }
        Ok(())
    }
}
