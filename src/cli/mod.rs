//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `check` - Validate the config and token against the API
//! - `discover` - Print the stream catalog
//! - `streams` - List stream names
//! - `read` - Extract records and bookmarks

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
