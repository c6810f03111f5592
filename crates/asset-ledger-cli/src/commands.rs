use std::path::PathBuf;

use asset_ledger_core::EntityKind;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "asset-ledger")]
#[command(about = "Reconcile discovered devices against the asset ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Match a discovery export (.csv or .json) against canonical assets
    Reconcile {
        /// Path to the discovered records
        input: PathBuf,
        /// Stamp last-seen dates on matched assets
        #[arg(long)]
        record_sightings: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// License compliance, true-up and downgrade report
    Licenses {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the audit trail of one asset or license
    Audit {
        #[arg(value_enum)]
        entity: EntityArg,
        id: String,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EntityArg {
    Asset,
    License,
}

impl From<EntityArg> for EntityKind {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Asset => EntityKind::Asset,
            EntityArg::License => EntityKind::License,
        }
    }
}
