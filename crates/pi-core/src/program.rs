//! The intermediate program format handed to downstream tooling.
//!
//! The document is a JSON array of [`Event`]s. Timestamps are written as
//! integer Unix seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One time-bounded occurrence of an event, such as its opening or closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub begin: DateTime<Utc>,
    /// Not guaranteed to be after `begin`; the upstream feed makes no promise.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
    /// Display only. Upstream may rename locations at any moment.
    pub location: String,
    pub floor: i32,
}

/// A logical event with every session that shares its upstream `eventId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The upstream `eventId`, the only identifier that is stable across imports.
    pub id: i64,
    pub hidden: bool,
    /// Sessions in the order their entries appeared upstream. Never empty.
    pub sessions: Vec<Session>,
}

/// Serializes events into the intermediate program document.
pub fn to_document(events: &[Event]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(events)
}

/// Parses an intermediate program document.
pub fn from_document(bytes: &[u8]) -> Result<Vec<Event>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Total number of sessions across `events`.
pub fn session_count(events: &[Event]) -> usize {
    events.iter().map(|event| event.sessions.len()).sum()
}
