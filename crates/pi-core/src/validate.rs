//! Required-field gate for upstream entries.

use thiserror::Error;

use crate::raw::{REQUIRED_FIELDS, RawEntry};

/// Reasons a batch of upstream entries is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An entry lacks one of the [`REQUIRED_FIELDS`].
    #[error("entry {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
}

/// Checks that every entry carries every required field.
///
/// Only presence is checked: empty strings, zeroes and nulls all pass. The
/// first entry with a missing field rejects the whole batch, since a missing
/// field means the upstream format changed and needs a human to look at it.
/// When an entry lacks several fields the first one in [`REQUIRED_FIELDS`]
/// order is reported.
pub fn validate(entries: &[RawEntry]) -> Result<(), ValidationError> {
    for (index, entry) in entries.iter().enumerate() {
        if let Some(field) = REQUIRED_FIELDS
            .iter()
            .copied()
            .find(|field| !entry.contains(field))
        {
            return Err(ValidationError::MissingField { index, field });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn complete_entry() -> RawEntry {
        REQUIRED_FIELDS
            .iter()
            .map(|field| (*field, json!("")))
            .collect()
    }

    #[test]
    fn test_accepts_empty_batch() {
        assert_eq!(validate(&[]), Ok(()));
    }

    #[test]
    fn test_accepts_present_fields_regardless_of_value() {
        let falsy: RawEntry = REQUIRED_FIELDS
            .iter()
            .zip([json!(""), json!(0), Value::Null, json!(false)].into_iter().cycle())
            .map(|(field, value)| (*field, value))
            .collect();
        assert_eq!(validate(&[complete_entry(), falsy]), Ok(()));
    }

    #[test]
    fn test_reports_each_missing_field() {
        for field in REQUIRED_FIELDS {
            let mut entry = complete_entry();
            entry.remove(field);
            assert_eq!(
                validate(&[entry]),
                Err(ValidationError::MissingField { index: 0, field }),
                "missing {field} should be reported"
            );
        }
    }

    #[test]
    fn test_reports_index_of_first_broken_entry() {
        let mut second = complete_entry();
        second.remove("comment");
        let mut third = complete_entry();
        third.remove("name");

        let err = validate(&[complete_entry(), second, third]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                index: 1,
                field: "comment"
            }
        );
        assert_eq!(err.to_string(), "entry 1 is missing required field `comment`");
    }

    #[test]
    fn test_reports_fields_in_declared_order() {
        let mut entry = complete_entry();
        entry.remove("opening");
        entry.remove("start");
        assert_eq!(
            validate(&[entry]),
            Err(ValidationError::MissingField {
                index: 0,
                field: "start"
            })
        );
    }
}
