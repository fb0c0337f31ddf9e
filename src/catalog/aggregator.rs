//! Catalog aggregation
//!
//! Fetches the event listing for the schedule window, resolves details and
//! sessions for every listed event on a bounded number of concurrent
//! requests, and files each event under its group.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::CatalogError;
use crate::config::Config;
use crate::data::{
    parse_listing, resolve_details, resolve_sessions, Event, Group, ListedEvent, Snapshot,
    UNGROUPED_ID,
};
use crate::fetch::Fetch;

/// Builds the listing URL for the window starting now
///
/// The window ends at 04:00 venue time, `schedule_days` days from today,
/// and is clamped to the last representable date.
pub fn listing_url(config: &Config, now: DateTime<Utc>) -> String {
    let today = now.with_timezone(&config.venue_offset).date_naive();
    let end_date = today
        .checked_add_signed(TimeDelta::days(i64::from(config.schedule_days)))
        .unwrap_or(NaiveDate::MAX);
    let end_time = format!(
        "{}T04:00:00{}",
        end_date.format("%Y-%m-%d"),
        config.venue_offset
    )
    .replace('+', "%2B");

    let limit = if config.events_limit > 0 {
        format!("_limit={}&", config.events_limit)
    } else {
        String::new()
    };

    format!(
        "{}event/events?{}_offset=0&_sort[session]=asc&endTime={}&startTime=NOW",
        config.api_url, limit, end_time
    )
}

/// Fetches the whole catalog and assembles a new snapshot
///
/// Only a missing listing, or one without a single usable entry, fails the
/// build. Events whose details or sessions cannot be fetched are kept with
/// empty fields.
pub async fn build_snapshot<F: Fetch>(
    fetcher: &F,
    config: &Config,
) -> Result<Snapshot, CatalogError> {
    let url = listing_url(config, Utc::now());
    let payload = fetcher
        .fetch(&url)
        .await
        .ok_or(CatalogError::ListingUnavailable)?;
    let listed = parse_listing(&payload).ok_or(CatalogError::ListingUnavailable)?;
    let listed = dedup_listed(listed);

    let groups = group_events(&listed);

    let api_url = config.api_url.as_str();
    let events: BTreeMap<String, Event> = stream::iter(listed)
        .map(|listed| async move {
            let (details, sessions) = tokio::join!(
                resolve_details(fetcher, api_url, &listed.id),
                resolve_sessions(fetcher, api_url, &listed.id),
            );
            let event = Event::assemble(listed, details, sessions);
            (event.id.clone(), event)
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;

    info!(events = events.len(), groups = groups.len(), "catalog refreshed");
    Ok(Snapshot::new(events, groups))
}

/// Drops repeated ids, keeping the first listing entry
fn dedup_listed(listed: Vec<ListedEvent>) -> Vec<ListedEvent> {
    let mut seen = HashSet::new();
    listed
        .into_iter()
        .filter(|event| {
            let first = seen.insert(event.id.clone());
            if !first {
                warn!(event_id = %event.id, "duplicate event in listing");
            }
            first
        })
        .collect()
}

/// Files every event under exactly one group, in listing order
///
/// The ungrouped bucket always exists, even when empty.
pub fn group_events(listed: &[ListedEvent]) -> BTreeMap<String, Group> {
    let mut groups = BTreeMap::new();
    groups.insert(
        UNGROUPED_ID.to_string(),
        Group {
            id: UNGROUPED_ID.to_string(),
            name: String::new(),
            events: Vec::new(),
        },
    );

    for event in listed {
        let group_id = event.group_id();
        groups
            .entry(group_id.to_string())
            .or_insert_with(|| Group {
                id: group_id.to_string(),
                name: event.group_name().to_string(),
                events: Vec::new(),
            })
            .events
            .push(event.id.clone());
    }

    groups
}
