//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pulumi Cloud extraction tap
#[derive(Parser, Debug)]
#[command(name = "tap-pulumi-cloud")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON, takes precedence over --config
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration and API token
    Check,

    /// Print the stream catalog as JSON
    Discover,

    /// List available stream names
    Streams,

    /// Read records from streams
    Read {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long)]
        streams: Option<String>,

        /// State file (JSON), read at start and rewritten at checkpoints
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Inline state JSON, takes precedence over the contents of --state
        #[arg(long)]
        state_json: Option<String>,

        /// Partitions of one stream fetched concurrently
        #[arg(long, default_value = "1")]
        max_concurrent_partitions: usize,

        /// Records emitted between checkpoints
        #[arg(long, default_value = "1")]
        checkpoint_interval: usize,
    },
}
