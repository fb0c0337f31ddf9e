//! Runtime configuration for the catalog pipeline
//!
//! Every knob the fetch, aggregation and cache layers depend on lives here so
//! that nothing downstream hard-codes URLs, windows or timeouts.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use directories::ProjectDirs;

/// Canonical public URL of the venue
pub const VENUE_URL: &str = "https://vpobede.ru/";

/// Base URL of the venue's backend API
pub const API_URL: &str = "https://vpobede.ru/backend/api/";

/// File name of the catalog cache
pub const CACHE_FILENAME: &str = "events.json";

/// Default maximum cache age in seconds (one day)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Default schedule window in days
pub const DEFAULT_SCHEDULE_DAYS: u32 = 31;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default number of events resolved concurrently
pub const DEFAULT_WORKERS: usize = 6;

/// Venue UTC offset in seconds (+07:00)
const VENUE_OFFSET_SECS: i32 = 7 * 3600;

/// Configuration for the catalog pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Public venue URL handed to the display layer
    pub venue_url: String,
    /// Base URL for API requests, must end with a slash
    pub api_url: String,
    /// Path of the JSON cache file
    pub cache_file: PathBuf,
    /// Maximum snapshot age before a refresh is needed
    pub cache_ttl: Duration,
    /// Number of days ahead covered by the listing query
    pub schedule_days: u32,
    /// Maximum number of listed events, 0 means unlimited
    pub events_limit: u32,
    /// Timeout applied to every single HTTP request
    pub request_timeout: Duration,
    /// Number of events whose details and sessions are resolved concurrently
    pub workers: usize,
    /// Optional deadline for a whole refresh
    pub refresh_timeout: Option<Duration>,
    /// Fixed UTC offset of the venue, used for the listing window
    pub venue_offset: FixedOffset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            venue_url: VENUE_URL.to_string(),
            api_url: API_URL.to_string(),
            cache_file: default_cache_file(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            schedule_days: DEFAULT_SCHEDULE_DAYS,
            events_limit: 0,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
            refresh_timeout: None,
            venue_offset: venue_offset(),
        }
    }
}

impl Config {
    /// Returns a copy of this config with the cache file moved to `path`
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = path.into();
        self
    }

    /// Returns a copy of this config pointing at another API base URL
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        let mut api_url = api_url.into();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        self.api_url = api_url;
        self
    }
}

/// Default cache location
///
/// Uses `~/.cache/vpobede/events.json` on Linux, or the equivalent XDG path on
/// other platforms. Falls back to `cache/events.json` relative to the working
/// directory when no home directory can be determined.
pub fn default_cache_file() -> PathBuf {
    match ProjectDirs::from("", "", "vpobede") {
        Some(dirs) => dirs.cache_dir().join(CACHE_FILENAME),
        None => PathBuf::from("cache").join(CACHE_FILENAME),
    }
}

fn venue_offset() -> FixedOffset {
    FixedOffset::east_opt(VENUE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.venue_url, "https://vpobede.ru/");
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.schedule_days, 31);
        assert_eq!(config.events_limit, 0);
        assert_eq!(config.venue_offset.local_minus_utc(), 7 * 3600);
        assert!(config.workers > 0);
    }

    #[test]
    fn test_default_cache_file_name() {
        let path = default_cache_file();
        assert_eq!(path.file_name().unwrap(), "events.json");
    }

    #[test]
    fn test_with_api_url_appends_slash() {
        let config = Config::default().with_api_url("http://localhost:8080/api");
        assert_eq!(config.api_url, "http://localhost:8080/api/");

        let config = Config::default().with_api_url("http://localhost:8080/api/");
        assert_eq!(config.api_url, "http://localhost:8080/api/");
    }
}
