//! Subcommands and the argument groups they share.

pub mod diff;
pub mod init;
pub mod sync;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use tether_core::{config, Direction, Invocation, ProjectConfig, Selection};
use tether_sync::{types::builtin_registry, HandlerRegistry};

// ---------------------------------------------------------------------------
// Type selection
// ---------------------------------------------------------------------------

/// Per-type selection flags. With none set, the default types are synced.
#[derive(Args, Debug, Default, Clone)]
pub struct TypeFlags {
    /// Include every registered type.
    #[arg(long)]
    pub all: bool,

    /// Endpoints.
    #[arg(short = 'a')]
    pub endpoints: bool,

    /// Event handlers.
    #[arg(short = 'e')]
    pub eventhandlers: bool,

    /// Modules.
    #[arg(short = 'm')]
    pub modules: bool,

    /// Static files.
    #[arg(short = 's')]
    pub files: bool,

    /// Resource specs.
    #[arg(short = 'r')]
    pub resources: bool,

    /// Access rules.
    #[arg(short = 'c')]
    pub accessrules: bool,

    /// Select types by name (repeatable).
    #[arg(long = "only", value_name = "TYPE")]
    pub only: Vec<String>,
}

impl TypeFlags {
    pub fn selection(&self) -> Selection {
        let short = [
            ("endpoints", self.endpoints),
            ("eventhandlers", self.eventhandlers),
            ("modules", self.modules),
            ("files", self.files),
            ("resources", self.resources),
            ("accessrules", self.accessrules),
        ];
        let mut selection = Selection {
            all: self.all,
            ..Selection::default()
        };
        for (name, on) in short {
            if on {
                selection.flags.insert(name.to_string(), true);
            }
        }
        for name in &self.only {
            selection.flags.insert(name.clone(), true);
        }
        selection
    }
}

/// Direction, delete and match options shared by `sync` and `diff`.
#[derive(Args, Debug, Default, Clone)]
pub struct SyncOptions {
    /// Push local changes to the remote (default).
    #[arg(long, conflicts_with = "down")]
    pub up: bool,

    /// Pull remote changes into the local tree.
    #[arg(long)]
    pub down: bool,

    /// Also delete target items missing from the source side.
    #[arg(long)]
    pub delete: bool,

    /// Only act on items matching this pattern (`#METHOD#/path/*` or a glob).
    #[arg(long = "match", value_name = "PATTERN")]
    pub pattern: Option<String>,

    #[command(flatten)]
    pub types: TypeFlags,
}

impl SyncOptions {
    pub fn invocation(&self, dry_run: bool) -> Invocation {
        Invocation {
            selection: self.types.selection(),
            direction: if self.down {
                Direction::Down
            } else {
                Direction::Up
            },
            delete: self.delete,
            dry_run,
            match_pattern: self.pattern.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Project loading
// ---------------------------------------------------------------------------

/// A located project: its root directory and effective config.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

/// Find `tether.yaml` (from `explicit` or by walking up from the working
/// directory), load it and apply environment overrides.
pub fn open_project(explicit: Option<&Path>) -> Result<Project> {
    let root = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => {
            let cwd = std::env::current_dir().context("could not determine working directory")?;
            config::find_project_root(&cwd)
                .context("no tether.yaml found; run `tether init` first")?
        }
    };
    let config = config::load_at(&root)
        .with_context(|| format!("failed to load project config in {}", root.display()))?
        .with_env(|key| std::env::var(key).ok());
    Ok(Project { root, config })
}

pub fn registry() -> Result<HandlerRegistry> {
    builtin_registry().context("failed to register built-in sync types")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags_and_only_merge_into_selection() {
        let flags = TypeFlags {
            endpoints: true,
            resources: true,
            only: vec!["modules".into()],
            ..TypeFlags::default()
        };
        let selection = flags.selection();
        assert_eq!(selection.flag("endpoints"), Some(true));
        assert_eq!(selection.flag("resources"), Some(true));
        assert_eq!(selection.flag("modules"), Some(true));
        assert_eq!(selection.flag("files"), None);
        assert!(!selection.all);
    }

    #[test]
    fn down_flag_sets_direction() {
        let opts = SyncOptions {
            down: true,
            delete: true,
            ..SyncOptions::default()
        };
        let invocation = opts.invocation(true);
        assert_eq!(invocation.direction, Direction::Down);
        assert!(invocation.delete);
        assert!(invocation.dry_run);
    }
}
