//! Parsing of the bounded-window event listing
//!
//! The listing is the only payload whose failure aborts a refresh, so the
//! parser distinguishes "no listing at all" from "one unusable entry".

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{lenient_text, UNGROUPED_ID};

/// Thumbnail key holding the poster used by the catalog
const BILLBOARD_KEY: &str = "event_billboard_320";

/// Listing fields of one event plus its group reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEvent {
    pub id: String,
    pub name: String,
    pub name_eng: Option<String>,
    pub billboard_url: Option<String>,
    pub genres: Vec<String>,
    /// `None` when the event has no group
    pub group: Option<GroupRef>,
}

/// Group an event belongs to, with its resolved display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

/// A single entry of the listing as the API returns it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingEntry {
    #[serde(default, deserialize_with = "lenient_text")]
    id: Option<String>,
    name: Option<String>,
    name_eng: Option<String>,
    /// Object keyed by thumbnail size; some events carry `[]` instead
    #[serde(default)]
    billboard_thumbnails: Value,
    genres: Option<Vec<Genre>>,
    event_group: Option<EventGroup>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventGroup {
    #[serde(default, deserialize_with = "lenient_text")]
    id: Option<String>,
    name: Option<String>,
    current_set: Option<CurrentSet>,
}

#[derive(Debug, Deserialize)]
struct CurrentSet {
    name: Option<String>,
}

impl ListedEvent {
    /// Id of the group this event is filed under
    pub fn group_id(&self) -> &str {
        self.group.as_ref().map_or(UNGROUPED_ID, |group| group.id.as_str())
    }

    /// Display name of the group this event is filed under
    pub fn group_name(&self) -> &str {
        self.group.as_ref().map_or("", |group| group.name.as_str())
    }
}

/// Parses the listing payload
///
/// Returns `None` when the payload is not a non-empty array or when none of
/// its entries is usable. Entries without an id or a name are skipped with a
/// warning.
pub fn parse_listing(payload: &Value) -> Option<Vec<ListedEvent>> {
    let entries = payload.as_array().filter(|entries| !entries.is_empty())?;

    let listed: Vec<ListedEvent> = entries
        .iter()
        .filter_map(|entry| match parse_entry(entry) {
            Some(event) => Some(event),
            None => {
                warn!(entry = %entry, "skipping malformed listing entry");
                None
            }
        })
        .collect();

    if listed.is_empty() {
        warn!(entries = entries.len(), "no usable entry in listing");
        return None;
    }
    Some(listed)
}

fn parse_entry(entry: &Value) -> Option<ListedEvent> {
    let raw = ListingEntry::deserialize(entry).ok()?;

    let billboard_url = raw
        .billboard_thumbnails
        .get(BILLBOARD_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    let genres = raw.genres.into_iter().flatten().filter_map(|genre| genre.name).collect();

    let group = raw.event_group.and_then(|group| {
        let id = group.id?;
        // The current set's name wins over the group's own name
        let name = group.current_set.and_then(|set| set.name).or(group.name);
        Some(GroupRef {
            id,
            name: name.unwrap_or_default(),
        })
    });

    Some(ListedEvent {
        id: raw.id?,
        name: raw.name?,
        name_eng: raw.name_eng,
        billboard_url,
        genres,
        group,
    })
}
