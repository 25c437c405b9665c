//! Scheduled import of an upstream program feed.
//!
//! Wires the pure pipeline from `pi-core` between a [`pi_fetch::Fetch`]
//! implementation and a [`DocumentWriter`], driven by an [`ImportConfig`].

mod config;
mod service;
mod write;

pub use config::{ConfigError, ImportConfig, ImportOptions};
pub use service::{IDENTIFIER, ImportError, ImportProgramService, ImportSummary};
pub use write::{DocumentWriter, FileWriter, WriteError};
