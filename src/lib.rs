//! Pobeda cinema catalog library
//!
//! Fetches the venue's event catalog from its JSON API, merges listing,
//! detail and session data into one snapshot grouped by event group, and
//! keeps that snapshot in a local cache with a time-to-live.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod fetch;
