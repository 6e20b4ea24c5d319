//! Agency client configuration
//!
//! Values come from an optional YAML file overlaid by `CLI_`-prefixed
//! environment variables (`CLI_ID`, `CLI_SERVER_ADDRESS`, ...).

use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::protocol::{max_batch_payload, CSV_DELIMITER, WIRE_DELIMITER};
use crate::reader::DEFAULT_CHUNK_SIZE;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CLI";

/// Default config file, overridable with `CLI_CONFIG_FILE`
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Agency identifier sent in every handshake
    pub id: String,
    /// Server `host:port`
    pub server_address: String,
    /// CSV file with this agency's bets
    pub bets_file: String,
    #[serde(default = "default_batch_max_amount")]
    pub batch_max_amount: usize,
    /// Pause before each batch is sent
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,
    /// Pause between winner queries while the draw is pending
    #[serde(default = "default_winners_backoff_ms")]
    pub winners_backoff_ms: u64,
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ClientConfig {
    /// Load from the config file (if present) and the environment
    pub fn load() -> anyhow::Result<Self> {
        let file = std::env::var(format!("{}_CONFIG_FILE", ENV_PREFIX))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&file)
    }

    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration (file: {})", file))?;

        let config: ClientConfig = settings
            .try_deserialize()
            .context("Invalid client configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("Agency id must not be empty"));
        }
        if self.id.contains('\n') {
            return Err(anyhow!("Agency id must be a single line"));
        }
        if self.id.contains(&[WIRE_DELIMITER, CSV_DELIMITER][..]) {
            return Err(anyhow!(
                "Agency id {:?} must not contain {:?} or {:?}",
                self.id,
                WIRE_DELIMITER,
                CSV_DELIMITER
            ));
        }
        if self.server_address.trim().is_empty() {
            return Err(anyhow!("Server address must not be empty"));
        }
        if self.batch_max_amount == 0 {
            return Err(anyhow!("batch_max_amount must be at least 1"));
        }
        if max_batch_payload(self.batch_max_amount) > u32::MAX as usize {
            return Err(anyhow!(
                "batch_max_amount {} can exceed the 4-byte batch length",
                self.batch_max_amount
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(anyhow!("read_chunk_size must be at least 1"));
        }
        self.tracing_level()?;
        Ok(())
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    pub fn winners_backoff(&self) -> Duration {
        Duration::from_millis(self.winners_backoff_ms)
    }

    pub fn tracing_level(&self) -> anyhow::Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("Invalid log level: {}", self.log_level))
    }
}

fn default_batch_max_amount() -> usize { 100 }
fn default_loop_period_ms() -> u64 { 100 }
fn default_winners_backoff_ms() -> u64 { 1000 }
fn default_read_chunk_size() -> usize { DEFAULT_CHUNK_SIZE }
fn default_log_level() -> String { "INFO".to_string() }
