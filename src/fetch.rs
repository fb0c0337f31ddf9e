//! HTTP fetch capability
//!
//! The catalog pipeline only needs one thing from the network: "give me the
//! JSON behind this URL, or tell me there is none". The [`Fetch`] trait is that
//! seam; [`HttpFetcher`] is the `reqwest` implementation used in production.
//! Transport, status and decoding errors never cross the trait boundary, they
//! are logged and collapsed to `None`.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while fetching a JSON document
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),
}

/// Source of JSON documents addressed by URL
pub trait Fetch {
    /// Fetches and parses the document at `url`
    ///
    /// Returns `None` on any network, timeout, status or parse failure.
    fn fetch(&self, url: &str) -> impl Future<Output = Option<Value>> + Send;
}

/// `reqwest`-backed fetcher with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetches `url` and decodes the body as JSON
    pub async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<Value> {
        debug!(url, "fetching");
        match self.get_json(url).await {
            Ok(value) => Some(value),
            Err(FetchError::RequestFailed(e)) if e.is_timeout() => {
                warn!(url, "request timed out");
                None
            }
            Err(e) => {
                warn!(url, error = %e, "request failed");
                None
            }
        }
    }
}

/// Canned-response fetcher shared by the unit tests
#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves `Value`s registered by URL prefix and counts every call
    #[derive(Debug, Default)]
    pub struct StubFetcher {
        routes: Vec<(String, Value)>,
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers `body` for every URL starting with `prefix`
        pub fn route(mut self, prefix: impl Into<String>, body: Value) -> Self {
            self.routes.push((prefix.into(), body));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Fetch for StubFetcher {
        async fn fetch(&self, url: &str) -> Option<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            self.routes
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .map(|(_, body)| body.clone())
        }
    }
}
