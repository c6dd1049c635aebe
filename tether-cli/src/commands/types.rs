//! `tether types`: list the registered sync types.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::registry;

/// Arguments for `tether types`.
#[derive(Args, Debug)]
pub struct TypesArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct TypeRow {
    #[tabled(rename = "type")]
    name: String,
    #[tabled(rename = "flag")]
    flag: String,
    #[tabled(rename = "default")]
    default: bool,
    #[tabled(rename = "description")]
    description: String,
}

impl TypesArgs {
    pub fn run(self) -> Result<()> {
        let registry = registry()?;
        let rows: Vec<TypeRow> = registry
            .each()
            .map(|entry| TypeRow {
                name: entry.name.clone(),
                flag: format!("-{}", entry.selector),
                default: entry.default_included,
                description: entry.description.clone(),
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize types JSON")?
            );
            return Ok(());
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
