//! CLI runner - executes commands

use crate::auth::AuthConfig;
use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, MemoryResponseCache};
use crate::output::JsonLinesSink;
use crate::pagination::PageRequest;
use crate::state::StateManager;
use crate::streams::Catalog;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Endpoint used to validate the token
const CHECK_PATH: &str = "/api/user";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover(),
            Commands::Streams => self.streams(),
            Commands::Read {
                streams,
                state,
                state_json,
                max_concurrent_partitions,
                checkpoint_interval,
            } => {
                let sync = SyncConfig::new()
                    .with_max_concurrent_partitions(*max_concurrent_partitions)
                    .with_checkpoint_interval(*checkpoint_interval);
                let sync = match parse_stream_list(streams.as_deref()) {
                    Some(selected) => sync.with_streams(selected),
                    None => sync,
                };
                self.read(sync, state.as_deref(), state_json.as_deref()).await
            }
        }
    }

    /// Load configuration. Inline JSON takes precedence over the file.
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json) = &self.cli.config_json {
            return TapConfig::from_json(json);
        }
        if let Some(path) = &self.cli.config {
            return TapConfig::from_file(path);
        }
        Err(Error::config(
            "No configuration given (use --config or --config-json)",
        ))
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = build_client(&config)?;

        info!(api_url = config.api_url(), "Checking connection");

        match client.execute(&PageRequest::get(CHECK_PATH)).await {
            Ok(response) => {
                let user = response
                    .body
                    .get("githubLogin")
                    .or_else(|| response.body.get("name"))
                    .cloned()
                    .unwrap_or(Value::Null);
                output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Connection successful",
                        "user": user,
                        "organizations": config.organizations(),
                    }
                }));
                Ok(())
            }
            Err(e) => {
                output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
                Err(e)
            }
        }
    }

    /// Print the catalog
    fn discover(&self) -> Result<()> {
        let streams: Vec<Value> = Catalog::pulumi().iter().map(|s| s.describe()).collect();
        output_message(&json!({
            "type": "CATALOG",
            "catalog": { "streams": streams }
        }));
        Ok(())
    }

    /// List available streams
    fn streams(&self) -> Result<()> {
        output_message(&json!({
            "type": "STREAMS",
            "streams": Catalog::pulumi().names()
        }));
        Ok(())
    }

    /// Read data
    async fn read(
        &self,
        sync: SyncConfig,
        state_path: Option<&Path>,
        state_json: Option<&str>,
    ) -> Result<()> {
        let config = self.load_config()?;
        let client = build_client(&config)?;
        let state = load_state(state_path, state_json, config.start_date)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, finishing in-flight requests");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        });

        let engine = SyncEngine::new(
            client,
            state,
            Catalog::pulumi(),
            config.organizations().to_vec(),
        )
        .with_config(sync)
        .with_shutdown(shutdown_rx);

        let sink = JsonLinesSink::stdout();
        let summary = engine.run(&sink).await?;

        if summary.is_success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "{} stream partition(s) failed",
                summary.failures.len()
            )))
        }
    }
}

/// Build the request executor from the tap configuration
pub(crate) fn build_client(config: &TapConfig) -> Result<HttpClient> {
    let http_config = HttpClientConfig::builder()
        .base_url(config.api_url())
        .user_agent(format!("{}/{}", crate::NAME, crate::VERSION))
        .build();
    let client = HttpClient::with_auth(http_config, AuthConfig::token(config.token()))?;

    if config.cache_enabled() {
        debug!(expire_after = ?config.cache_expire_after(), "Response cache enabled");
        let cache = MemoryResponseCache::with_expiry(config.cache_expire_after());
        return Ok(client.with_cache(Arc::new(cache)));
    }
    Ok(client)
}

/// Load state. Inline JSON wins over the file contents; the file, when
/// given, still receives the checkpoints.
pub(crate) fn load_state(
    path: Option<&Path>,
    inline: Option<&str>,
    start_date: Option<DateTime<Utc>>,
) -> Result<StateManager> {
    let manager = match (inline, path) {
        (Some(json), Some(path)) => StateManager::from_json(json)?.with_path(path),
        (Some(json), None) => StateManager::from_json(json)?,
        (None, Some(path)) => StateManager::from_file(path)?,
        (None, None) => StateManager::in_memory(),
    };
    Ok(manager.with_start_date(start_date))
}

/// Split `a, b,c` into stream names; `None` or an empty list selects all
pub(crate) fn parse_stream_list(streams: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = streams?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!names.is_empty()).then_some(names)
}

fn output_message(msg: &Value) {
    println!("{msg}");
}
