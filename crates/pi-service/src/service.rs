//! The program import service.
//!
//! One call to [`ImportProgramService::execute`] runs a complete import:
//! fetch → validate → normalize → serialize → write. The service keeps no
//! state between runs, and each successful run replaces the destination
//! document. Scheduling runs every [`ImportProgramService::frequency_minutes`]
//! is up to the caller, which must not start a run while another is active.

use pi_core::{
    Event, NormalizationError, Normalizer, RawEntry, ValidationError, session_count, to_document,
    validate,
};
use pi_fetch::{Fetch, FetchError, HttpFetcher};
use thiserror::Error;

use crate::config::ImportConfig;
use crate::write::{DocumentWriter, FileWriter, WriteError};

/// Identifier the service is registered under.
pub const IDENTIFIER: &str = "import-program-service";

/// Reasons an import run fails. Nothing is retried or partially written.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to fetch program: {0}")]
    Fetch(#[from] FetchError),
    #[error("program failed validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to normalize program: {0}")]
    Normalization(#[from] NormalizationError),
    #[error("failed to serialize program: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write program: {0}")]
    Write(#[from] WriteError),
}

impl ImportError {
    /// The pipeline stage that failed.
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Validation(_) => "validate",
            Self::Normalization(_) => "normalize",
            Self::Serialize(_) => "serialize",
            Self::Write(_) => "write",
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub events: usize,
    pub sessions: usize,
    /// Size of the document written to the destination.
    pub bytes: usize,
}

/// Imports the upstream program into the intermediate program format.
#[derive(Debug)]
pub struct ImportProgramService<F, W = FileWriter> {
    config: ImportConfig,
    fetcher: F,
    writer: W,
    normalizer: Normalizer,
}

impl ImportProgramService<HttpFetcher, FileWriter> {
    /// Creates a service that downloads over HTTP and writes to the local filesystem.
    pub fn with_http(config: ImportConfig) -> Result<Self, FetchError> {
        Ok(Self::new(config, HttpFetcher::new()?, FileWriter))
    }
}

impl<F: Fetch, W: DocumentWriter> ImportProgramService<F, W> {
    pub fn new(config: ImportConfig, fetcher: F, writer: W) -> Self {
        let normalizer =
            Normalizer::new().ignore_time_slots(config.ignored_time_slots().iter().copied());
        Self {
            config,
            fetcher,
            writer,
            normalizer,
        }
    }

    pub const fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    /// Minutes the caller should wait between runs.
    pub const fn frequency_minutes(&self) -> u32 {
        self.config.frequency_minutes()
    }

    /// Validates and normalizes `entries` without any I/O.
    pub fn convert(&self, entries: &[RawEntry]) -> Result<Vec<Event>, ImportError> {
        validate(entries)?;
        Ok(self.normalizer.normalize(entries)?)
    }

    /// Runs one complete import.
    pub async fn execute(&self) -> Result<ImportSummary, ImportError> {
        let result = self.run().await;
        match &result {
            Ok(summary) => tracing::info!(
                service = IDENTIFIER,
                events = summary.events,
                sessions = summary.sessions,
                bytes = summary.bytes,
                "imported program"
            ),
            Err(err) => tracing::warn!(
                service = IDENTIFIER,
                stage = err.stage(),
                error = %err,
                "program import failed"
            ),
        }
        result
    }

    async fn run(&self) -> Result<ImportSummary, ImportError> {
        let source = self.config.source();
        let entries = self.fetcher.fetch(source).await?;
        tracing::debug!(url = %source, entries = entries.len(), "fetched program entries");

        let events = self.convert(&entries)?;
        let document = to_document(&events).map_err(ImportError::Serialize)?;
        self.writer.write(self.config.destination(), &document)?;

        Ok(ImportSummary {
            events: events.len(),
            sessions: session_count(&events),
            bytes: document.len(),
        })
    }
}
