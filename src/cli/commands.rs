//! CLI commands and argument parsing

use crate::config::Environment;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paginated queries and settings for a managed key-value table
#[derive(Parser, Debug)]
#[command(name = "dynamo-pager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Deployment environment (defaults to $APP_ENV, then dev)
    #[arg(short, long, global = true)]
    pub env: Option<Environment>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show resolved settings
    Settings,

    /// Query items from a JSON file through the paginating iterator
    Query {
        /// JSON file holding an array of items
        #[arg(short, long)]
        items: PathBuf,

        /// Partition key value to match
        #[arg(long)]
        pk: String,

        /// Only sort keys starting with this prefix
        #[arg(long)]
        sk_prefix: Option<String>,

        /// Query a secondary index instead of the table
        #[arg(long, requires = "index_pk")]
        index: Option<String>,

        /// Partition key attribute of the index
        #[arg(long)]
        index_pk: Option<String>,

        /// Sort key attribute of the index
        #[arg(long)]
        index_sk: Option<String>,

        /// Equality filters, `attr=value` (repeatable, combined with AND)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Page size
        #[arg(long)]
        limit: Option<usize>,

        /// Print only the first record
        #[arg(long)]
        first: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one record per line)
    Json,
    /// Human-readable output
    Pretty,
}
