//! Catalog ownership and freshness
//!
//! [`Catalog`] owns the one snapshot a process serves. Reads go through
//! [`Catalog::get`], which prefers the in-memory snapshot, then the cache
//! file, and only then refetches everything. A refresh builds its result on
//! the side and swaps it in whole, so an abandoned or failed refresh leaves
//! the previous snapshot untouched.

mod aggregator;

pub use aggregator::{build_snapshot, group_events, listing_url};

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStore};
use crate::config::Config;
use crate::data::{Event, Group, Snapshot};
use crate::fetch::Fetch;

/// Display format of the update time handed to the view
const VIEW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors that can abort a catalog refresh
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The event listing could not be fetched or had no usable entry
    #[error("Event listing is unavailable")]
    ListingUnavailable,

    /// The refresh did not finish within the configured deadline
    #[error("Catalog refresh timed out after {0:?}")]
    RefreshTimedOut(Duration),
}

/// Outcome of a cache warm-up, one result per step
#[derive(Debug)]
pub struct WarmCacheReport {
    /// Result of fetching the catalog
    pub refresh: Result<(), CatalogError>,
    /// Result of writing the cache, `None` when the refresh failed
    pub save: Option<Result<(), CacheError>>,
}

impl WarmCacheReport {
    /// Whether both steps succeeded
    pub fn is_success(&self) -> bool {
        self.refresh.is_ok() && matches!(self.save, Some(Ok(())))
    }
}

/// What the display layer renders
#[derive(Debug, Serialize)]
pub struct CatalogView<'a> {
    pub update_datetime: String,
    pub events: &'a BTreeMap<String, Event>,
    pub events_count: usize,
    pub event_groups: &'a BTreeMap<String, Group>,
    pub venue_url: &'a str,
}

/// Owner of the current catalog snapshot
#[derive(Debug)]
pub struct Catalog<F> {
    config: Config,
    fetcher: F,
    cache: CacheStore,
    snapshot: Snapshot,
}

impl<F: Fetch> Catalog<F> {
    /// Creates a catalog holding the placeholder snapshot
    pub fn new(config: Config, fetcher: F) -> Self {
        let cache = CacheStore::new(config.cache_file.clone());
        Self {
            config,
            fetcher,
            cache,
            snapshot: Snapshot::placeholder(),
        }
    }

    /// Replaces the in-memory snapshot, e.g. with one kept from a previous run
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The snapshot currently held in memory, without any freshness check
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Canonical public URL of the venue
    pub fn venue_url(&self) -> &str {
        &self.config.venue_url
    }

    /// Returns a snapshot no older than `ttl` whenever one can be obtained
    ///
    /// # Behavior
    /// - Returns the in-memory snapshot if it is younger than `ttl`
    /// - Otherwise adopts the cache file if it is no older than `ttl`
    /// - Otherwise refetches the catalog and saves it to the cache
    /// - If the refetch fails, returns the last known snapshot
    pub async fn get(&mut self, ttl: Duration) -> &Snapshot {
        if self.snapshot.is_fresh(ttl) {
            debug!("serving catalog from memory");
            return &self.snapshot;
        }

        if let Some(cached) = self.cache.load(ttl) {
            info!(path = %self.cache.path().display(), "loaded catalog from cache");
            self.snapshot = cached;
            return &self.snapshot;
        }

        if let Err(e) = self.refresh(true).await {
            warn!(error = %e, "catalog refresh failed, serving last known catalog");
        }
        &self.snapshot
    }

    /// [`Catalog::get`] with the configured cache TTL
    pub async fn current(&mut self) -> &Snapshot {
        let ttl = self.config.cache_ttl;
        self.get(ttl).await
    }

    /// Refetches the whole catalog and replaces the in-memory snapshot
    ///
    /// With `persist`, the new snapshot is also saved; a failed save is
    /// logged and does not undo the replacement.
    pub async fn refresh(&mut self, persist: bool) -> Result<&Snapshot, CatalogError> {
        let build = build_snapshot(&self.fetcher, &self.config);
        let snapshot = match self.config.refresh_timeout {
            Some(limit) => tokio::time::timeout(limit, build)
                .await
                .map_err(|_| CatalogError::RefreshTimedOut(limit))??,
            None => build.await?,
        };

        self.snapshot = snapshot;

        if persist {
            if let Err(e) = self.save() {
                warn!(error = %e, "failed to save catalog cache");
            }
        }

        Ok(&self.snapshot)
    }

    /// Writes the in-memory snapshot to the cache file
    pub fn save(&self) -> Result<(), CacheError> {
        self.cache.save(&self.snapshot)
    }

    /// Forces a refresh, then saves the result
    ///
    /// The save step is skipped when the refresh fails.
    pub async fn warm_cache(&mut self) -> WarmCacheReport {
        let refresh = self.refresh(false).await.map(|_| ());
        let save = refresh.is_ok().then(|| self.save());
        WarmCacheReport { refresh, save }
    }

    /// Borrowed view of the in-memory snapshot for rendering
    pub fn view(&self) -> CatalogView<'_> {
        CatalogView {
            update_datetime: self
                .snapshot
                .updated_at
                .format(VIEW_TIMESTAMP_FORMAT)
                .to_string(),
            events: &self.snapshot.events,
            events_count: self.snapshot.events.len(),
            event_groups: &self.snapshot.groups,
            venue_url: &self.config.venue_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{local_now, UNGROUPED_ID};
    use crate::fetch::stub::StubFetcher;
    use chrono::TimeDelta;
    use serde_json::json;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config::default()
            .with_api_url("http://stub/")
            .with_cache_file(temp_dir.path().join("cache").join("events.json"))
    }

    fn working_stub() -> StubFetcher {
        StubFetcher::new()
            .route(
                "http://stub/event/events?",
                json!([
                    {"id": 1, "name": "Брат", "genres": [{"name": "криминал"}]},
                    {"id": 2, "name": "Брат 2", "eventGroup": {"id": 3, "name": "Балабанов"}}
                ]),
            )
            .route("http://stub/event/sessions?event=", json!([]))
    }

    fn snapshot_aged(seconds: i64, marker: &str) -> Snapshot {
        let mut groups = BTreeMap::new();
        groups.insert(
            marker.to_string(),
            Group {
                id: marker.to_string(),
                name: marker.to_string(),
                events: Vec::new(),
            },
        );
        let mut snapshot = Snapshot::new(BTreeMap::new(), groups);
        snapshot.updated_at = local_now() - TimeDelta::seconds(seconds);
        snapshot
    }

    #[tokio::test]
    async fn test_get_returns_fresh_memory_without_cache_or_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        // A fresh cache file that must not be consulted
        CacheStore::new(config.cache_file.clone())
            .save(&snapshot_aged(0, "disk"))
            .unwrap();
        let memory = snapshot_aged(2, "memory");

        let mut catalog = Catalog::new(config, working_stub()).with_snapshot(memory.clone());
        let snapshot = catalog.get(Duration::from_secs(10)).await.clone();

        assert_eq!(snapshot, memory);
        assert_eq!(catalog.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_adopts_fresh_cache_over_placeholder() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let on_disk = snapshot_aged(5, "disk");
        CacheStore::new(config.cache_file.clone()).save(&on_disk).unwrap();

        let mut catalog = Catalog::new(config, working_stub());
        let snapshot = catalog.get(Duration::from_secs(60)).await.clone();

        assert_eq!(snapshot, on_disk);
        assert_eq!(catalog.snapshot(), &on_disk);
        assert_eq!(catalog.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_refreshes_and_persists_when_everything_is_stale() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        CacheStore::new(config.cache_file.clone())
            .save(&snapshot_aged(3600, "old"))
            .unwrap();

        let mut catalog = Catalog::new(config, working_stub());
        let snapshot = catalog.get(Duration::from_secs(60)).await.clone();

        assert_eq!(snapshot.events.len(), 2);
        assert_eq!(snapshot.groups["3"].events, vec!["2"]);
        assert_eq!(snapshot.groups[UNGROUPED_ID].events, vec!["1"]);
        let reloaded = catalog.cache().load(Duration::from_secs(60)).unwrap();
        assert_eq!(reloaded, snapshot);
    }

    #[tokio::test]
    async fn test_get_serves_last_snapshot_when_refresh_fails() {
        let temp_dir = TempDir::new().unwrap();
        let stale = snapshot_aged(3600, "stale");

        let mut catalog =
            Catalog::new(test_config(&temp_dir), StubFetcher::new()).with_snapshot(stale.clone());
        let snapshot = catalog.get(Duration::from_secs(60)).await.clone();

        assert_eq!(snapshot, stale);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_memory_and_disk_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let previous = snapshot_aged(10, "previous");
        CacheStore::new(config.cache_file.clone()).save(&previous).unwrap();
        let bytes_before = fs::read(&config.cache_file).unwrap();

        let mut catalog =
            Catalog::new(config.clone(), StubFetcher::new()).with_snapshot(previous.clone());
        let result = catalog.refresh(true).await;

        assert!(matches!(result, Err(CatalogError::ListingUnavailable)));
        assert_eq!(catalog.snapshot(), &previous);
        assert_eq!(fs::read(&config.cache_file).unwrap(), bytes_before);
    }

    #[tokio::test]
    async fn test_unusable_listing_leaves_memory_and_disk_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let previous = snapshot_aged(10, "previous");
        CacheStore::new(config.cache_file.clone()).save(&previous).unwrap();
        let bytes_before = fs::read(&config.cache_file).unwrap();
        let fetcher = StubFetcher::new()
            .route("http://stub/event/events?", json!([{"title": "A"}, {"name": "no id"}]));

        let mut catalog = Catalog::new(config.clone(), fetcher).with_snapshot(previous.clone());
        let result = catalog.refresh(true).await;

        assert!(matches!(result, Err(CatalogError::ListingUnavailable)));
        assert_eq!(catalog.snapshot(), &previous);
        assert_eq!(fs::read(&config.cache_file).unwrap(), bytes_before);
    }

    #[tokio::test]
    async fn test_refresh_without_persist_leaves_cache_alone() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let mut catalog = Catalog::new(config.clone(), working_stub());
        catalog.refresh(false).await.unwrap();

        assert_eq!(catalog.snapshot().events.len(), 2);
        assert!(!config.cache_file.exists());
    }

    #[tokio::test]
    async fn test_refresh_timeout_keeps_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            refresh_timeout: Some(Duration::ZERO),
            ..test_config(&temp_dir)
        };
        let previous = snapshot_aged(3600, "previous");

        let mut catalog = Catalog::new(config, working_stub()).with_snapshot(previous.clone());
        let outcome = catalog.refresh(true).await.map(|snapshot| snapshot.events.len());

        // A zero deadline may still let an immediately-ready build through
        match outcome {
            Err(CatalogError::RefreshTimedOut(limit)) => {
                assert_eq!(limit, Duration::ZERO);
                assert_eq!(catalog.snapshot(), &previous);
            }
            Ok(count) => assert_eq!(count, 2),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn test_warm_cache_reports_both_steps() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let mut catalog = Catalog::new(config.clone(), working_stub());
        let report = catalog.warm_cache().await;

        assert!(report.refresh.is_ok());
        assert!(matches!(report.save, Some(Ok(()))));
        assert!(report.is_success());
        assert!(config.cache_file.exists());
    }

    #[tokio::test]
    async fn test_warm_cache_skips_save_after_failed_refresh() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let mut catalog = Catalog::new(config.clone(), StubFetcher::new());
        let report = catalog.warm_cache().await;

        assert!(report.refresh.is_err());
        assert!(report.save.is_none());
        assert!(!report.is_success());
        assert!(!config.cache_file.exists());
    }

    #[tokio::test]
    async fn test_warm_cache_reports_failed_save() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "file in the way").unwrap();
        let config = test_config(&temp_dir).with_cache_file(blocker.join("events.json"));

        let mut catalog = Catalog::new(config, working_stub());
        let report = catalog.warm_cache().await;

        assert!(report.refresh.is_ok());
        assert!(matches!(report.save, Some(Err(_))));
        // The refreshed snapshot is kept even though it could not be saved
        assert_eq!(catalog.snapshot().events.len(), 2);
    }

    #[tokio::test]
    async fn test_view_exposes_counts_and_venue_url() {
        let temp_dir = TempDir::new().unwrap();
        let mut catalog = Catalog::new(test_config(&temp_dir), working_stub());
        catalog.refresh(false).await.unwrap();

        let view = catalog.view();

        assert_eq!(view.events_count, 2);
        assert_eq!(view.event_groups.len(), 2);
        assert_eq!(view.venue_url, "https://vpobede.ru/");
        assert_eq!(view.update_datetime.len(), "2024-01-01 00:00:00".len());
        assert_eq!(catalog.venue_url(), "https://vpobede.ru/");
    }

    #[test]
    fn test_placeholder_view() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = Catalog::new(test_config(&temp_dir), StubFetcher::new());

        let view = catalog.view();

        assert_eq!(view.update_datetime, "2012-01-01 00:00:00");
        assert_eq!(view.events_count, 0);
    }

    #[tokio::test]
    async fn test_stale_memory_with_stale_cache_after_delay() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        CacheStore::new(config.cache_file.clone())
            .save(&snapshot_aged(0, "disk"))
            .unwrap();
        thread::sleep(Duration::from_millis(10));

        let mut catalog = Catalog::new(config, working_stub());
        let snapshot = catalog.get(Duration::ZERO).await.clone();

        // Nothing is fresh under a zero TTL, so the catalog is refetched
        assert_eq!(snapshot.events.len(), 2);
        assert!(catalog.fetcher.calls() > 0);
    }
}
