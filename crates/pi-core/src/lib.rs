//! Core import pipeline for upstream program feeds.
//!
//! This crate contains the parts of an import that need no I/O:
//! - Validation: rejecting batches whose entries lack required fields
//! - Normalization: merging entries into events with ordered sessions
//! - The intermediate program document consumed downstream

pub mod normalize;
pub mod program;
pub mod raw;
mod validate;

pub use normalize::{FLOOR_PREFIX, NormalizationError, Normalizer, decode_floor, normalize};
pub use program::{Event, Session, from_document, session_count, to_document};
pub use raw::{REQUIRED_FIELDS, RawEntry};
pub use validate::{ValidationError, validate};
