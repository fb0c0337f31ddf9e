//! Cache module for persisting the catalog snapshot to disk
//!
//! This module provides a store that writes the whole snapshot to a single
//! JSON file and reads it back only while it is younger than a caller-supplied
//! TTL. Every refresh replaces the file; there are no partial updates.

mod store;

pub use store::{CacheError, CacheStore};
