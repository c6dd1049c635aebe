//! tether: keep a project's local configuration tree in step with its
//! remote solution.
//!
//! # Usage
//!
//! ```text
//! tether init [--solution <id>] [--url <url>]
//! tether sync [--up|--down] [--delete] [--dry-run] [--all] [-a -e -m -s -r -c]
//!             [--only <type>...] [--match <pattern>]
//! tether diff [--down] [--delete] [type flags] [--match <pattern>]
//! tether types [--json]
//! ```
//!
//! Every command accepts `--project <dir>` (default: walk up from the
//! working directory to the nearest `tether.yaml`) and `-v` for debug logs.

mod commands;
mod remote;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, sync::SyncArgs, types::TypesArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tether",
    version,
    about = "Synchronize local configuration files with a remote solution",
    long_about = None,
)]
struct Cli {
    /// Project directory holding `tether.yaml`.
    #[arg(long, global = true, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Log debug detail (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter tether.yaml.
    Init(InitArgs),

    /// Reconcile local items with the remote and apply the differences.
    Sync(SyncArgs),

    /// Show unified diffs of what sync would change.
    Diff(DiffArgs),

    /// List the registered sync types.
    Types(TypesArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project = cli.project.as_deref();
    match cli.command {
        Commands::Init(args) => args.run(project),
        Commands::Sync(args) => args.run(project),
        Commands::Diff(args) => args.run(project),
        Commands::Types(args) => args.run(),
    }
}

/// Logs go to stderr so command output on stdout stays clean. The engine
/// logs through the `log` facade; the subscriber picks those records up.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
