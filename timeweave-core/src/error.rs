//! Structured error types for alignment and loading.
//!
//! An absence of data is not an error: it is reported through
//! [`EmptyReason`](crate::table::EmptyReason) on a successful outcome.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::Category;

/// Errors raised by the alignment engine.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("unsupported alignment mode '{0}' (expected 'dense' or 'sparse')")]
    UnsupportedMode(String),

    #[error("unknown dataset category '{0}'")]
    UnknownCategory(String),

    #[error(transparent)]
    SourceRead(#[from] SourceReadError),
}

impl AlignError {
    /// Validation errors are the caller's fault and never worth retrying.
    pub fn is_validation(&self) -> bool {
        !matches!(self, AlignError::SourceRead(_))
    }
}

/// A loader could not read persisted data for an entity.
///
/// "Not found" is never reported this way; loaders return an empty dataset.
#[derive(Debug, Error)]
#[error("failed to read {category} data for '{entity}': {kind}")]
pub struct SourceReadError {
    pub entity: String,
    pub category: Category,
    pub kind: SourceErrorKind,
}

#[derive(Debug, Error)]
pub enum SourceErrorKind {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Malformed(String),
}

impl SourceReadError {
    pub fn io(entity: impl Into<String>, category: Category, err: std::io::Error) -> Self {
        Self {
            entity: entity.into(),
            category,
            kind: SourceErrorKind::Io(err),
        }
    }

    pub fn malformed(
        entity: impl Into<String>,
        category: Category,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            category,
            kind: SourceErrorKind::Malformed(reason.into()),
        }
    }
}
