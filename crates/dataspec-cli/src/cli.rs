//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dataspec: content-addressed dataset lineage with shared readiness status
#[derive(Parser)]
#[command(name = "dataspec")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Protect, adjust and budget tables, then export the result
    Run {
        /// JSON catalog describing the tables
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// URI of the data source (default: the catalog's own URI)
        #[arg(long)]
        uri: Option<String>,

        /// Tables to load, as schema.table
        #[arg(long = "table", value_name = "SCHEMA.TABLE", required = true)]
        tables: Vec<String>,

        /// SQLite database shared by managers
        #[arg(long, value_name = "DB")]
        store: PathBuf,

        /// Directory receiving dataset.json, schema.json and size.json
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,

        /// Manager configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Classify the source as big data (leave unset to keep the stored classification)
        #[arg(long, value_name = "BOOL")]
        big_data: Option<bool>,
    },

    /// List the statuses of a node
    Status {
        /// SQLite database shared by managers
        #[arg(long, value_name = "DB")]
        store: PathBuf,

        /// Node identity
        #[arg(value_name = "NODE_ID")]
        node: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the status of a node task
    SetStatus {
        /// SQLite database shared by managers
        #[arg(long, value_name = "DB")]
        store: PathBuf,

        /// Node identity
        #[arg(value_name = "NODE_ID")]
        node: String,

        /// Task name (e.g. big_data, compute)
        #[arg(long)]
        task: String,

        /// New state: pending, ready or error
        #[arg(long)]
        state: String,

        /// Status property, as KEY=VALUE
        #[arg(long = "property", value_name = "KEY=VALUE")]
        properties: Vec<String>,

        /// Replace a terminal status (reconciliation)
        #[arg(long)]
        force: bool,
    },

    /// Decode an artifact file and print a summary
    Inspect {
        /// Path to dataset.json, schema.json or size.json
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the full decoded artifact as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the registered transforms
    Transforms,
}
