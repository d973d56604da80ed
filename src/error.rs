//! Error taxonomy for the ingestion pipeline.
//!
//! Every stage reports failures as a [`PipelineError`]. The run boundary in
//! [`crate::pipeline`] turns these into the string error list of a
//! [`RunReport`](crate::pipeline::RunReport); nothing here is fatal to the
//! process.
//!
//! A rejected duplicate primary key is not an error at all: stores report it
//! as [`InsertOutcome::DuplicateKey`](crate::store::InsertOutcome::DuplicateKey).

use std::path::PathBuf;

/// Result alias for pipeline stages.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Feed or source payload is missing or could not be read.
    #[error("input not found: {origin}: {reason}")]
    InputNotFound { origin: String, reason: String },

    /// Input was readable but not parseable, or not the expected shape.
    #[error("malformed input in {origin}: {reason}")]
    MalformedInput { origin: String, reason: String },

    /// A raw category string has no entry in the category table.
    /// Raised before any ID of the batch is allocated.
    #[error("unknown category {label:?} at entry {key}")]
    UnknownCategory { key: String, label: String },

    /// Sequence counters could not be persisted after an allocation.
    #[error("failed to persist sequence counters: {0:#}")]
    CounterPersist(anyhow::Error),

    /// A family's counter reached its maximum; no further id can be allocated.
    #[error("sequence counter {family} is exhausted")]
    CounterExhausted { family: &'static str },

    /// The durable store failed a read or write.
    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    /// The staging document could not be flushed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn input_not_found(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::InputNotFound {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedInput {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unknown_category(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::UnknownCategory {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Sync stopped by a failure after committing `inserted` records.
///
/// Each insert is its own atomic unit, so the committed prefix stands.
#[derive(Debug, thiserror::Error)]
#[error("sync failed after {inserted} inserts: {source}")]
pub struct SyncFailed {
    pub inserted: usize,
    #[source]
    pub source: PipelineError,
}

impl From<PipelineError> for SyncFailed {
    fn from(source: PipelineError) -> Self {
        Self {
            inserted: 0,
            source,
        }
    }
}
