//! Command-line interface parsing for the catalog binary
//!
//! Every configuration knob can be given as a flag or through a `VPOBEDE_*`
//! environment variable; anything left unset keeps the `Config` default.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{
    Config, DEFAULT_CACHE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCHEDULE_DAYS,
    DEFAULT_WORKERS,
};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// Concurrency must be at least one
    #[error("Invalid worker count: {0}. Use at least 1")]
    InvalidWorkers(usize),

    /// The API URL is not an http(s) URL
    #[error("Invalid API URL: '{0}'. Expected an http:// or https:// URL")]
    InvalidApiUrl(String),
}

/// Pobeda cinema catalog - fetch, cache and inspect the event schedule
#[derive(Parser, Debug)]
#[command(name = "vpobede")]
#[command(about = "Fetch, cache and inspect the Pobeda cinema event catalog")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path of the catalog cache file
    #[arg(long, env = "VPOBEDE_CACHE_FILE", value_name = "PATH", global = true)]
    pub cache_file: Option<PathBuf>,

    /// Base URL of the venue API
    #[arg(long, env = "VPOBEDE_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Maximum catalog age in seconds before it is refetched
    #[arg(long, env = "VPOBEDE_CACHE_TTL", default_value_t = DEFAULT_CACHE_TTL_SECS, global = true)]
    pub ttl: u64,

    /// Number of days ahead to fetch events for
    #[arg(
        long,
        env = "VPOBEDE_SCHEDULE_DAYS",
        default_value_t = DEFAULT_SCHEDULE_DAYS,
        global = true
    )]
    pub days: u32,

    /// Maximum number of events to fetch (0 = unlimited)
    #[arg(long, env = "VPOBEDE_EVENTS_LIMIT", default_value_t = 0, global = true)]
    pub limit: u32,

    /// Per-request timeout in seconds
    #[arg(
        long,
        env = "VPOBEDE_TIMEOUT",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        global = true
    )]
    pub timeout: u64,

    /// Number of events resolved concurrently
    #[arg(long, env = "VPOBEDE_WORKERS", default_value_t = DEFAULT_WORKERS, global = true)]
    pub workers: usize,

    /// Deadline for a whole refresh in seconds
    #[arg(long, env = "VPOBEDE_REFRESH_TIMEOUT", value_name = "SECS", global = true)]
    pub refresh_timeout: Option<u64>,
}

/// Actions the binary can perform
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch the whole catalog and overwrite the cache (default)
    Warm,
    /// Print the catalog as JSON, refetching only when it is older than the TTL
    Show,
    /// Print the venue's public URL
    Url,
}

impl Cli {
    /// The requested command, `warm` when none was given
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Warm)
    }

    /// Builds the pipeline configuration from the parsed arguments
    ///
    /// # Returns
    /// * `Ok(Config)` with defaults for everything not given
    /// * `Err(CliError)` if a value is out of range
    pub fn config(&self) -> Result<Config, CliError> {
        if self.workers == 0 {
            return Err(CliError::InvalidWorkers(self.workers));
        }

        let mut config = Config {
            cache_ttl: Duration::from_secs(self.ttl),
            schedule_days: self.days,
            events_limit: self.limit,
            request_timeout: Duration::from_secs(self.timeout),
            workers: self.workers,
            refresh_timeout: self.refresh_timeout.map(Duration::from_secs),
            ..Config::default()
        };

        if let Some(api_url) = &self.api_url {
            if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
                return Err(CliError::InvalidApiUrl(api_url.clone()));
            }
            config = config.with_api_url(api_url.as_str());
        }
        if let Some(cache_file) = &self.cache_file {
            config = config.with_cache_file(cache_file);
        }

        Ok(config)
    }
}
