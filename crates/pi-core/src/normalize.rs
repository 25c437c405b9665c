//! Conversion of validated upstream entries into the program model.
//!
//! Every entry becomes a [`Session`]. Sessions are grouped into [`Event`]s by
//! their upstream `eventId`, which is how the feed's separate "opening" and
//! "closing" entries end up as one event. No special handling of the
//! `opening` flag is needed, and events with any number of parts merge the
//! same way.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SubsecRound, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::program::{Event, Session};
use crate::raw::RawEntry;

/// Prefix in front of every floor number in the upstream feed.
pub const FLOOR_PREFIX: &str = "floor-";

/// Errors raised while transforming entry values.
///
/// Any of these aborts the whole import; a structurally wrong entry means the
/// batch cannot be trusted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A field required for normalization is absent (the batch skipped validation).
    #[error("entry {index} is missing field `{field}`")]
    MissingField { index: usize, field: &'static str },

    /// `start` or `end` is not a timestamp with an explicit UTC offset.
    #[error("entry {index}: `{field}` is not an offset-aware timestamp: {raw}")]
    BadTimestamp {
        index: usize,
        field: &'static str,
        raw: String,
    },

    /// `floor` does not look like `floor-<n>`.
    #[error("entry {index}: malformed floor code: {raw}")]
    BadFloorCode { index: usize, raw: String },

    /// A value has a JSON type the field cannot be coerced from.
    #[error("entry {index}: `{field}` must be {expected}, got {raw}")]
    BadValue {
        index: usize,
        field: &'static str,
        expected: &'static str,
        raw: String,
    },
}

/// Turns upstream entries into events, optionally dropping ignored time slots.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    ignored_time_slots: HashSet<i64>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips every entry whose `tsId` is in `slots`.
    ///
    /// Filtering happens per entry, before merging. Ignoring one part of a
    /// multi-part event leaves the remaining parts in place.
    #[must_use]
    pub fn ignore_time_slots(mut self, slots: impl IntoIterator<Item = i64>) -> Self {
        self.ignored_time_slots.extend(slots);
        self
    }

    /// Converts `entries` into events ordered by first appearance of their id.
    pub fn normalize(&self, entries: &[RawEntry]) -> Result<Vec<Event>, NormalizationError> {
        let mut events: Vec<Event> = Vec::new();
        let mut positions: HashMap<i64, usize> = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            if self.is_ignored(entry, index)? {
                continue;
            }

            let id = integer(entry, index, "eventId")?;
            let session = build_session(entry, index)?;

            if let Some(&position) = positions.get(&id) {
                events[position].sessions.push(session);
                continue;
            }

            positions.insert(id, events.len());
            events.push(Event {
                id,
                hidden: flag(entry, index, "hidden")?,
                sessions: vec![session],
            });
        }

        tracing::debug!(
            entries = entries.len(),
            events = events.len(),
            "normalized program entries"
        );
        Ok(events)
    }

    fn is_ignored(&self, entry: &RawEntry, index: usize) -> Result<bool, NormalizationError> {
        if self.ignored_time_slots.is_empty() {
            return Ok(false);
        }
        let slot = integer(entry, index, "tsId")?;
        let ignored = self.ignored_time_slots.contains(&slot);
        if ignored {
            tracing::trace!(index, time_slot = slot, "skipping entry in ignored time slot");
        }
        Ok(ignored)
    }
}

/// Converts `entries` into events without filtering any time slots.
pub fn normalize(entries: &[RawEntry]) -> Result<Vec<Event>, NormalizationError> {
    Normalizer::default().normalize(entries)
}

/// Decodes a floor code such as `floor-2` into its number.
///
/// The remainder after [`FLOOR_PREFIX`] must be the canonical decimal form of
/// an `i32`: an optional `-`, then ASCII digits without leading zeros. `-0`
/// is rejected, so every accepted code maps to exactly one floor.
pub fn decode_floor(code: &str) -> Option<i32> {
    let number = code.strip_prefix(FLOOR_PREFIX)?;
    let (negative, digits) = match number.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, number),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') && (digits.len() > 1 || negative) {
        return None;
    }
    number.parse().ok()
}

/// ISO 8601 with an offset written as `+hhmm` or `+hh`.
const ISO8601_COMPACT_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%.f%#z";

/// Parses an offset-aware timestamp, honouring whatever offset it carries.
///
/// RFC 3339 is tried first, then ISO 8601 with a compact offset (`+0100`,
/// `+01`). A timestamp without any offset is rejected. Sub-second precision
/// is dropped since the program format stores seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, ISO8601_COMPACT_OFFSET))
        .ok()
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(0))
}

fn build_session(entry: &RawEntry, index: usize) -> Result<Session, NormalizationError> {
    Ok(Session {
        name: text(entry, index, "name")?,
        description: text(entry, index, "comment")?,
        begin: timestamp(entry, index, "start")?,
        end: timestamp(entry, index, "end")?,
        location: text(entry, index, "location")?,
        floor: floor(entry, index)?,
    })
}

fn field<'a>(
    entry: &'a RawEntry,
    index: usize,
    name: &'static str,
) -> Result<&'a Value, NormalizationError> {
    entry.get(name).ok_or(NormalizationError::MissingField {
        index,
        field: name,
    })
}

fn timestamp(
    entry: &RawEntry,
    index: usize,
    name: &'static str,
) -> Result<DateTime<Utc>, NormalizationError> {
    let value = field(entry, index, name)?;
    value
        .as_str()
        .and_then(parse_timestamp)
        .ok_or_else(|| NormalizationError::BadTimestamp {
            index,
            field: name,
            raw: value.to_string(),
        })
}

fn floor(entry: &RawEntry, index: usize) -> Result<i32, NormalizationError> {
    let value = field(entry, index, "floor")?;
    value
        .as_str()
        .and_then(decode_floor)
        .ok_or_else(|| NormalizationError::BadFloorCode {
            index,
            raw: value.to_string(),
        })
}

fn integer(entry: &RawEntry, index: usize, name: &'static str) -> Result<i64, NormalizationError> {
    let value = field(entry, index, name)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| bad_value(index, name, "an integer", value))
}

// Upstream sends 0/1, but booleans and numeric strings show up too.
fn flag(entry: &RawEntry, index: usize, name: &'static str) -> Result<bool, NormalizationError> {
    let value = field(entry, index, name)?;
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v.abs() > 0.0)),
        Value::String(s) => Ok(!(s.is_empty() || s == "0")),
        Value::Array(_) | Value::Object(_) => Err(bad_value(index, name, "a 0/1 flag", value)),
    }
}

fn text(entry: &RawEntry, index: usize, name: &'static str) -> Result<String, NormalizationError> {
    let value = field(entry, index, name)?;
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => Err(bad_value(index, name, "text", value)),
    }
}

fn bad_value(
    index: usize,
    field: &'static str,
    expected: &'static str,
    value: &Value,
) -> NormalizationError {
    NormalizationError::BadValue {
        index,
        field,
        expected,
        raw: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(event_id: i64, ts_id: i64, name: &str) -> RawEntry {
        serde_json::from_value(json!({
            "name": name,
            "start": "2018-08-25T15:00:00+01:00",
            "end": "2018-08-25T18:00:00+01:00",
            "location": "Jacco's Man Cave",
            "comment": "",
            "hidden": 0,
            "floor": "floor-1",
            "eventId": event_id,
            "tsId": ts_id,
            "opening": 0
        }))
        .unwrap()
    }

    fn with(entry: RawEntry, field: &str, value: Value) -> RawEntry {
        let mut fields = entry.into_fields();
        fields.insert(field.to_string(), value);
        RawEntry::new(fields)
    }

    #[test]
    fn test_decodes_floor_codes() {
        assert_eq!(decode_floor("floor-0"), Some(0));
        assert_eq!(decode_floor("floor-1"), Some(1));
        assert_eq!(decode_floor("floor-12"), Some(12));
        assert_eq!(decode_floor("floor--1"), Some(-1));
        assert_eq!(decode_floor("floor--10"), Some(-10));
        for n in [0, 3, 99, 2_147_483_647] {
            assert_eq!(decode_floor(&format!("floor-{n}")), Some(n));
        }
    }

    #[test]
    fn test_rejects_malformed_floor_codes() {
        for code in [
            "", "floor-", "floor-a", "floor-1a", "floor- 1", "floor-+1", "floor--", "Floor-1",
            "level-1", "1", "floor-99999999999", "floor-01", "floor-007", "floor-00",
            "floor--0", "floor--01",
        ] {
            assert_eq!(decode_floor(code), None, "{code:?} should be rejected");
        }
    }

    #[test]
    fn test_parses_any_offset() {
        let plus_one = parse_timestamp("2018-08-25T15:00:00+01:00").unwrap();
        let utc = parse_timestamp("2018-08-25T14:00:00Z").unwrap();
        let minus_five = parse_timestamp("2018-08-25T09:00:00-05:00").unwrap();
        assert_eq!(plus_one, utc);
        assert_eq!(minus_five, utc);
        assert_eq!(utc.timestamp(), 1_535_205_600);
    }

    #[test]
    fn test_parses_compact_iso8601_offsets() {
        let utc = parse_timestamp("2018-08-25T14:00:00Z").unwrap();
        assert_eq!(parse_timestamp("2018-08-25T15:00:00+0100"), Some(utc));
        assert_eq!(parse_timestamp("2018-08-25T15:00:00+01"), Some(utc));
        assert_eq!(parse_timestamp("2018-08-25T09:00:00-0500"), Some(utc));
        assert_eq!(parse_timestamp("2018-08-25T19:30:00+0530"), Some(utc));
    }

    #[test]
    fn test_compact_offset_entry_normalizes() {
        let raw = with(entry(1, 0, "x"), "start", json!("2018-08-25T15:00:00+0100"));
        let events = normalize(&[raw]).unwrap();
        assert_eq!(events[0].sessions[0].begin.timestamp(), 1_535_205_600);
    }

    #[test]
    fn test_rejects_timestamps_without_offset() {
        assert_eq!(parse_timestamp("2018-08-25T15:00:00"), None);
        assert_eq!(parse_timestamp("2018-08-25 15:00:00"), None);
        assert_eq!(parse_timestamp("tomorrow"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_truncates_subsecond_precision() {
        let ts = parse_timestamp("2018-08-25T14:00:00.750Z").unwrap();
        assert_eq!(ts.timestamp_subsec_nanos(), 0);
        assert_eq!(ts.timestamp(), 1_535_205_600);
    }

    #[test]
    fn test_coerces_hidden_flag() {
        let cases = [
            (json!(0), false),
            (json!(1), true),
            (json!("0"), false),
            (json!("1"), true),
            (json!(""), false),
            (json!(true), true),
            (json!(false), false),
            (Value::Null, false),
            (json!(0.0), false),
            (json!(2), true),
        ];
        for (raw, expected) in cases {
            let events = normalize(&[with(entry(1, 0, "x"), "hidden", raw.clone())]).unwrap();
            assert_eq!(events[0].hidden, expected, "hidden = {raw}");
        }
    }

    #[test]
    fn test_hidden_comes_from_first_entry() {
        let first = with(entry(9, 0, "open"), "hidden", json!(1));
        let second = with(entry(9, 1, "close"), "hidden", json!(0));
        let events = normalize(&[first, second]).unwrap();
        assert!(events[0].hidden);
    }

    #[test]
    fn test_accepts_string_identifiers() {
        let events = normalize(&[with(entry(0, 0, "x"), "eventId", json!("42"))]).unwrap();
        assert_eq!(events[0].id, 42);
    }

    #[test]
    fn test_renders_scalar_text_fields() {
        let raw = with(entry(1, 0, "x"), "name", json!(2018));
        let raw = with(raw, "comment", Value::Null);
        let events = normalize(&[raw]).unwrap();
        assert_eq!(events[0].sessions[0].name, "2018");
        assert_eq!(events[0].sessions[0].description, "");
    }

    #[test]
    fn test_bad_timestamp_names_field_and_value() {
        let raw = with(entry(1, 0, "x"), "end", json!("2018-08-25 18:00"));
        let err = normalize(&[entry(2, 0, "ok"), raw]).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::BadTimestamp {
                index: 1,
                field: "end",
                raw: "\"2018-08-25 18:00\"".to_string(),
            }
        );
    }

    #[test]
    fn test_numeric_timestamp_is_rejected() {
        let raw = with(entry(1, 0, "x"), "start", json!(1_535_205_600));
        assert!(matches!(
            normalize(&[raw]),
            Err(NormalizationError::BadTimestamp { field: "start", .. })
        ));
    }

    #[test]
    fn test_bad_floor_code_is_fatal() {
        let raw = with(entry(1, 0, "x"), "floor", json!("basement"));
        let err = normalize(&[raw]).unwrap_err();
        assert_eq!(err.to_string(), "entry 0: malformed floor code: \"basement\"");

        let raw = with(entry(1, 0, "x"), "floor", json!(1));
        assert!(matches!(
            normalize(&[raw]),
            Err(NormalizationError::BadFloorCode { index: 0, .. })
        ));
    }

    #[test]
    fn test_non_integer_event_id_is_rejected() {
        let raw = with(entry(1, 0, "x"), "eventId", json!("abc"));
        assert!(matches!(
            normalize(&[raw]),
            Err(NormalizationError::BadValue {
                field: "eventId",
                expected: "an integer",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_field_is_reported_instead_of_panicking() {
        let mut raw = entry(1, 0, "x");
        raw.remove("location");
        assert_eq!(
            normalize(&[raw]),
            Err(NormalizationError::MissingField {
                index: 0,
                field: "location"
            })
        );
    }

    #[test]
    fn test_ignored_time_slots_are_skipped() {
        let normalizer = Normalizer::new().ignore_time_slots([7]);
        let events = normalizer
            .normalize(&[entry(1, 7, "skipped"), entry(2, 8, "kept"), entry(3, 7, "skipped")])
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 2);
    }

    #[test]
    fn test_ignoring_one_part_keeps_the_rest_of_the_event() {
        let normalizer = Normalizer::new().ignore_time_slots([10]);
        let events = normalizer
            .normalize(&[entry(5, 10, "opening"), entry(5, 11, "closing")])
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sessions.len(), 1);
        assert_eq!(events[0].sessions[0].name, "closing");
    }

    #[test]
    fn test_time_slot_ids_are_not_required_without_filter() {
        let raw = with(entry(1, 0, "x"), "tsId", json!("n/a"));
        assert!(normalize(&[raw.clone()]).is_ok());
        assert!(Normalizer::new().ignore_time_slots([1]).normalize(&[raw]).is_err());
    }
}
