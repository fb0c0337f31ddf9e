//! Core data models for the cinema catalog
//!
//! This module contains the snapshot that the rest of the crate passes
//! around, the per-event record it is made of, and the parsers that turn raw
//! API payloads into those records.

pub mod details;
pub mod listing;
pub mod sessions;

pub use details::{resolve_details, DetailError, EventDetails};
pub use listing::{parse_listing, GroupRef, ListedEvent};
pub use sessions::{resolve_sessions, EventSessions};

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Group that collects every event listed without an explicit group
pub const UNGROUPED_ID: &str = "9999";

/// Format of `update_datetime` in the cache file
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// The complete catalog: events, their groups and when they were fetched
///
/// A snapshot is built in one go and replaced wholesale; nothing mutates an
/// individual event or group once the snapshot exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Local time of the refresh that produced this snapshot
    #[serde(rename = "update_datetime", with = "update_datetime")]
    pub updated_at: NaiveDateTime,
    /// Events keyed by event id
    pub events: BTreeMap<String, Event>,
    /// Groups keyed by group id
    pub groups: BTreeMap<String, Group>,
}

/// One catalog item (movie or show) with descriptive and scheduling data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub name_eng: Option<String>,
    /// Poster thumbnail
    pub billboard_url: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<String>,
    pub country: Option<String>,
    pub director: Option<String>,
    /// Tagline
    pub lead: Option<String>,
    pub description: Option<String>,
    /// Path segment of the event page on the venue site
    pub slug: Option<String>,
    pub age_restriction: Option<String>,
    /// Running time in minutes
    pub duration: Option<u32>,
    /// Shown only at this venue
    pub session_only_here: Option<bool>,
    /// Children's screening
    pub session_baby: Option<bool>,
    pub performance: PerformanceFlags,
    /// Future session start times, in API order
    pub sessions: Vec<DateTime<FixedOffset>>,
    /// Distinct session days as `DD/MM`, chronologically sorted
    pub sessions_days: Vec<String>,
}

/// How an event is screened, aggregated over all its performances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceFlags {
    /// Original language with subtitles
    #[serde(rename = "sessionSubtitles")]
    pub subtitles: bool,
    #[serde(rename = "session2d")]
    pub format_2d: bool,
    #[serde(rename = "session3d")]
    pub format_3d: bool,
    #[serde(rename = "session4k")]
    pub format_4k: bool,
    #[serde(rename = "session48fps")]
    pub fps_48: bool,
    #[serde(rename = "sessionAutismFriendly")]
    pub autism_friendly: bool,
}

/// A named bucket of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    /// Display name, empty when the API gave none
    pub name: String,
    /// Member event ids in listing order
    pub events: Vec<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl Snapshot {
    /// Empty snapshot stamped far in the past so it is never fresh
    pub fn placeholder() -> Self {
        let updated_at = NaiveDate::from_ymd_opt(2012, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap_or(NaiveDateTime::MIN);
        Self {
            updated_at,
            events: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Builds a snapshot stamped with the current local time
    pub fn new(events: BTreeMap<String, Event>, groups: BTreeMap<String, Group>) -> Self {
        Self {
            updated_at: local_now(),
            events,
            groups,
        }
    }

    /// Time elapsed since `updated_at`, zero if the stamp lies in the future
    pub fn age(&self) -> Duration {
        (local_now() - self.updated_at).to_std().unwrap_or_default()
    }

    /// Whether the snapshot is younger than `ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

impl PerformanceFlags {
    /// Sets the flag named by an API key, returns `false` for unknown keys
    pub fn set(&mut self, key: &str) -> bool {
        let flag = match key {
            "sessionSubtitles" => &mut self.subtitles,
            "session2d" => &mut self.format_2d,
            "session3d" => &mut self.format_3d,
            "session4k" => &mut self.format_4k,
            "session48fps" => &mut self.fps_48,
            "sessionAutismFriendly" => &mut self.autism_friendly,
            _ => return false,
        };
        *flag = true;
        true
    }
}

impl Event {
    /// Merges listing fields, optional details and sessions into one record
    ///
    /// Missing details leave every detail field `None` and all flags unset.
    pub fn assemble(
        listed: ListedEvent,
        details: Option<EventDetails>,
        sessions: EventSessions,
    ) -> Self {
        let details = details.unwrap_or_default();
        Self {
            id: listed.id,
            name: listed.name,
            name_eng: listed.name_eng,
            billboard_url: listed.billboard_url,
            genres: listed.genres,
            year: details.year,
            country: details.country,
            director: details.director,
            lead: details.lead,
            description: details.description,
            slug: details.slug,
            age_restriction: details.age_restriction,
            duration: details.duration,
            session_only_here: details.session_only_here,
            session_baby: details.session_baby,
            performance: details.performance,
            sessions: sessions.sessions,
            sessions_days: sessions.days,
        }
    }
}

/// Current local time truncated to the precision stored in the cache file
pub(crate) fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

/// Accepts a JSON string or number, anything else becomes `None`
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_text))
}

pub(crate) fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

mod update_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // `%.f` also accepts a missing fraction
        NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f").map_err(serde::de::Error::custom)
    }
}
