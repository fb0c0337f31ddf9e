//! Event session resolution
//!
//! Fetches the schedule of one event, keeps the showings that have not
//! started yet and derives the calendar days they fall on.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::fetch::Fetch;

/// Day label format used by the display layer
const DAY_FORMAT: &str = "%d/%m";

/// Future showings of one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSessions {
    /// Start times in the order the API returned them
    pub sessions: Vec<DateTime<FixedOffset>>,
    /// Distinct `DD/MM` days, in calendar order
    pub days: Vec<String>,
}

/// A single showing as the API returns it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    start_time: Option<String>,
}

/// Builds the sessions URL for an event
pub fn sessions_url(api_url: &str, event_id: &str) -> String {
    format!("{}event/sessions?event={}", api_url, event_id)
}

/// Fetches the showings of one event that start after now
///
/// A failed fetch or an unreadable payload yields no sessions.
pub async fn resolve_sessions<F: Fetch>(
    fetcher: &F,
    api_url: &str,
    event_id: &str,
) -> EventSessions {
    match fetcher.fetch(&sessions_url(api_url, event_id)).await {
        Some(payload) => future_sessions(&payload, Utc::now()),
        None => {
            debug!(event_id, "no sessions available");
            EventSessions::default()
        }
    }
}

/// Keeps the showings strictly after `now` and collects their days
///
/// Days are taken in each showing's own UTC offset, i.e. venue local time.
pub fn future_sessions(payload: &Value, now: DateTime<Utc>) -> EventSessions {
    let records = match Vec::<SessionRecord>::deserialize(payload) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "unexpected sessions payload");
            return EventSessions::default();
        }
    };

    let mut sessions = Vec::new();
    let mut dates = BTreeSet::new();

    for record in records {
        let Some(raw) = record.start_time else {
            continue;
        };
        let start = match DateTime::parse_from_rfc3339(&raw) {
            Ok(start) => start,
            Err(e) => {
                debug!(start_time = %raw, error = %e, "skipping unreadable session start");
                continue;
            }
        };
        if start > now {
            dates.insert(start.date_naive());
            sessions.push(start);
        }
    }

    EventSessions {
        sessions,
        days: day_labels(&dates),
    }
}

/// Formats sorted dates as `DD/MM`, keeping the first date of each label
///
/// Dates a year apart share a label and are not adjacent once sorted.
fn day_labels(dates: &BTreeSet<NaiveDate>) -> Vec<String> {
    let mut seen = HashSet::new();
    dates
        .iter()
        .map(|date| date.format(DAY_FORMAT).to_string())
        .filter(|label| seen.insert(label.clone()))
        .collect()
}
