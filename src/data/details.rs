//! Event detail resolution
//!
//! Fetches the extended view of a single event and extracts its descriptive
//! fields plus the performance flags folded over all of its showings.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::{lenient_text, PerformanceFlags};
use crate::fetch::Fetch;

/// Prefix shared by every performance flag key
const PERFORMANCE_KEY_PREFIX: &str = "session";

/// Technical parameters are positional: year, country, director
const TECH_YEAR: usize = 0;
const TECH_COUNTRY: usize = 1;
const TECH_DIRECTOR: usize = 2;

/// Errors that can occur when interpreting an event detail payload
#[derive(Debug, Error)]
pub enum DetailError {
    /// The payload did not have the expected structure
    #[error("Unexpected detail payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A positional technical parameter is missing
    #[error("Missing technical parameter at index {0}")]
    MissingTechParameter(usize),

    /// The payload was empty
    #[error("Empty detail payload")]
    Empty,
}

/// Descriptive fields of one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDetails {
    pub year: Option<String>,
    pub country: Option<String>,
    pub director: Option<String>,
    pub lead: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub age_restriction: Option<String>,
    pub duration: Option<u32>,
    pub session_only_here: Option<bool>,
    pub session_baby: Option<bool>,
    pub performance: PerformanceFlags,
}

/// Extended event view as the API returns it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailResponse {
    tech_parameters: Vec<TechParameter>,
    lead: Option<String>,
    body: Option<String>,
    slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    age_restriction: Option<String>,
    duration: Option<u32>,
    session_only_here: Option<bool>,
    session_baby: Option<bool>,
    performances: Option<Vec<Map<String, Value>>>,
}

#[derive(Debug, Deserialize)]
struct TechParameter {
    #[serde(default, deserialize_with = "lenient_text")]
    value: Option<String>,
}

/// Builds the detail URL for an event
pub fn detail_url(api_url: &str, event_id: &str) -> String {
    format!("{}event/events/{}?_scope=ext_view", api_url, event_id)
}

/// Fetches and parses the details of one event
///
/// Returns `None` when the fetch fails or the payload cannot be interpreted;
/// the caller keeps the event with empty detail fields.
pub async fn resolve_details<F: Fetch>(
    fetcher: &F,
    api_url: &str,
    event_id: &str,
) -> Option<EventDetails> {
    let Some(payload) = fetcher.fetch(&detail_url(api_url, event_id)).await else {
        debug!(event_id, "no details available");
        return None;
    };

    match parse_details(&payload) {
        Ok(details) => Some(details),
        Err(e) => {
            warn!(event_id, error = %e, "ignoring event details");
            None
        }
    }
}

/// Interprets a detail payload
pub fn parse_details(payload: &Value) -> Result<EventDetails, DetailError> {
    if payload.is_null() || payload.as_object().is_some_and(Map::is_empty) {
        return Err(DetailError::Empty);
    }

    let response = DetailResponse::deserialize(payload)?;

    let tech_value = |index: usize| -> Result<Option<String>, DetailError> {
        response
            .tech_parameters
            .get(index)
            .map(|param| param.value.clone())
            .ok_or(DetailError::MissingTechParameter(index))
    };

    Ok(EventDetails {
        year: tech_value(TECH_YEAR)?,
        country: tech_value(TECH_COUNTRY)?,
        director: tech_value(TECH_DIRECTOR)?,
        lead: response.lead,
        description: response.body,
        slug: response.slug,
        age_restriction: response.age_restriction,
        duration: response.duration,
        session_only_here: response.session_only_here,
        session_baby: response.session_baby,
        performance: fold_performances(response.performances.as_deref().unwrap_or_default()),
    })
}

/// ORs every `session*` flag that is `true` on any performance
pub fn fold_performances(performances: &[Map<String, Value>]) -> PerformanceFlags {
    let mut flags = PerformanceFlags::default();
    for performance in performances {
        for (key, value) in performance {
            if key.starts_with(PERFORMANCE_KEY_PREFIX) && value.as_bool() == Some(true) {
                flags.set(key);
            }
        }
    }
    flags
}
