//! Untrusted entries as decoded from the upstream feed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields every upstream entry must carry before it is considered for import.
///
/// The order here is the order in which [`crate::validate`] reports them.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "name", "start", "end", "location", "comment", "hidden", "floor", "eventId", "tsId", "opening",
];

/// A single record from the upstream feed.
///
/// The upstream schema changes without notice, so entries are kept as a plain
/// key/value mapping. Nothing about the values is trusted until the entry has
/// passed validation and normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEntry(Map<String, Value>);

impl RawEntry {
    /// Wraps an already decoded JSON object.
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns whether `field` is present, regardless of its value.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns the raw value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Removes `field`, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for RawEntry {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RawEntry {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
