// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # tap-pulumi-cloud
//!
//! Incremental extraction connector for the Pulumi Cloud REST API.
//!
//! Reads stacks, updates, deployments, teams, policies, webhooks, audit
//! logs and more for a set of organizations and writes them as
//! newline-delimited JSON messages, with bookmarks that let the next run
//! resume where this one stopped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tap_pulumi_cloud::cli::Runner;
//! use tap_pulumi_cloud::engine::{SyncConfig, SyncEngine};
//! use tap_pulumi_cloud::output::JsonLinesSink;
//! use tap_pulumi_cloud::state::StateManager;
//! use tap_pulumi_cloud::streams::Catalog;
//!
//! let engine = SyncEngine::new(client, StateManager::from_file("state.json")?, Catalog::pulumi(), orgs)
//!     .with_config(SyncConfig::new().with_streams(["stacks", "audit_logs"]));
//! let summary = engine.run(&JsonLinesSink::stdout()).await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                   SyncEngine (DependencyGraph)                   │
//! │   roots once per organization, children once per parent record  │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │
//! ┌───────────┬───────────┬───────┴───────┬────────────┬─────────────┐
//! │  Streams  │   HTTP    │   Paginate    │   State    │   Output    │
//! ├───────────┼───────────┼───────────────┼────────────┼─────────────┤
//! │ Catalog   │ Retry     │ Cursor        │ Bookmarks  │ RECORD      │
//! │ Templates │ 429 wait  │ Offset        │ Monotonic  │ STATE       │
//! │ Partition │ Cache     │ Page number   │ Atomic     │ JSON lines  │
//! │           │ Governor  │ Link header   │ checkpoint │             │
//! └───────────┴───────────┴───────────────┴────────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// Authentication
pub mod auth;

/// HTTP executor with retry, rate limiting and caching
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Partition contexts and routing
pub mod partition;

/// Response decoding and record normalization
pub mod decode;

/// Bookmarks and checkpointing
pub mod state;

/// Stream catalog
pub mod streams;

/// Path and query templates
pub mod template;

/// Main execution engine
pub mod engine;

/// Sink messages
pub mod output;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::TapConfig;
pub use engine::{SyncConfig, SyncEngine, SyncSummary};
pub use error::{Error, Result};
pub use streams::{Catalog, StreamId};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
