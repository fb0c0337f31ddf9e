//! Cache store for the catalog snapshot
//!
//! Provides a `CacheStore` that saves the snapshot to one JSON file and loads
//! it back as long as it has not outlived the requested TTL.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::data::Snapshot;

/// Errors that can occur when saving the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Directory creation, write or rename failed
    #[error("Cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The snapshot could not be serialized
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and writes the snapshot file
///
/// Writes go to a sibling temporary file that is then renamed over the cache
/// file, so a reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Location of the cache file
    path: PathBuf,
}

impl CacheStore {
    /// Creates a store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }

    /// Writes the whole snapshot to the cache file
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if directory creation, serialization or writing fails
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let json = serde_json::to_string(snapshot)?;

        let temp = self.temp_path();
        fs::write(&temp, json)?;
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(path = %self.path.display(), events = snapshot.events.len(), "saved catalog cache");
        Ok(())
    }

    /// Reads the snapshot if it is no older than `ttl`
    ///
    /// Returns `None` if the file is missing, unreadable, unparsable or stale.
    pub fn load(&self, ttl: Duration) -> Option<Snapshot> {
        let content = fs::read_to_string(&self.path).ok()?;
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "unreadable catalog cache");
                return None;
            }
        };

        let age = snapshot.age();
        if age > ttl {
            debug!(age_secs = age.as_secs(), ttl_secs = ttl.as_secs(), "catalog cache is stale");
            return None;
        }

        Some(snapshot)
    }
}
