//! Alignment engine facade.
//!
//! Validates the request, loads every dataset through the injected loader,
//! and dispatches to the dense or sparse aligner. Each call builds fresh
//! tables from the loader's snapshot and keeps no state between calls.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dense::align_dense;
use crate::domain::Datasets;
use crate::error::AlignError;
use crate::layout::CollisionPolicy;
use crate::loader::DatasetLoader;
use crate::sparse::align_sparse;
use crate::table::{AlignMode, AlignmentOutcome};

/// Tunables shared by both aligners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignOptions {
    #[serde(default)]
    pub collision: CollisionPolicy,
}

/// Reject `start > end`.
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), AlignError> {
    if start > end {
        return Err(AlignError::InvalidRange { start, end });
    }
    Ok(())
}

/// Align already-loaded datasets. No I/O.
pub fn align_datasets(
    entity: &str,
    start: NaiveDate,
    end: NaiveDate,
    mode: AlignMode,
    datasets: &Datasets,
    options: &AlignOptions,
) -> Result<AlignmentOutcome, AlignError> {
    validate_range(start, end)?;

    let outcome = match mode {
        AlignMode::Dense => align_dense(entity, start, end, datasets, options),
        AlignMode::Sparse => align_sparse(entity, start, end, datasets, options),
    };

    match &outcome {
        AlignmentOutcome::Aligned(table) => {
            tracing::info!(
                entity,
                %mode,
                reference = ?table.reference,
                rows = table.row_count(),
                cols = table.column_count(),
                %start,
                %end,
                "aligned"
            );
        }
        AlignmentOutcome::Empty(reason) => {
            tracing::warn!(entity, %mode, reason = reason.code(), "alignment produced no rows");
        }
    }

    Ok(outcome)
}

/// Facade over a loader and the two aligners.
#[derive(Debug, Clone)]
pub struct AlignmentEngine<L> {
    loader: L,
    options: AlignOptions,
}

impl<L: DatasetLoader> AlignmentEngine<L> {
    pub fn new(loader: L) -> Self {
        Self::with_options(loader, AlignOptions::default())
    }

    pub fn with_options(loader: L, options: AlignOptions) -> Self {
        Self { loader, options }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn options(&self) -> &AlignOptions {
        &self.options
    }

    /// Load all datasets for `entity` and log which ones hold data.
    pub fn load(&self, entity: &str) -> Result<Datasets, AlignError> {
        let datasets = self.loader.load_all(entity)?;
        let available: Vec<String> = datasets
            .iter_non_empty()
            .map(|d| format!("{}={}", d.category, d.len()))
            .collect();
        if available.is_empty() {
            tracing::warn!(entity, "no data available for alignment");
        } else {
            tracing::info!(entity, available = %available.join(","), "loaded datasets");
        }
        Ok(datasets)
    }

    /// Align `entity` over `[start, end]`.
    ///
    /// The range is checked before the loader is touched. Loader errors are
    /// surfaced as [`AlignError::SourceRead`], never papered over.
    pub fn align(
        &self,
        entity: &str,
        start: NaiveDate,
        end: NaiveDate,
        mode: AlignMode,
    ) -> Result<AlignmentOutcome, AlignError> {
        validate_range(start, end)?;
        let datasets = self.load(entity)?;
        align_datasets(entity, start, end, mode, &datasets, &self.options)
    }

    /// As [`align`](Self::align), with the mode given by name.
    ///
    /// An unrecognized mode fails before any data is loaded.
    pub fn align_named(
        &self,
        entity: &str,
        start: NaiveDate,
        end: NaiveDate,
        mode: &str,
    ) -> Result<AlignmentOutcome, AlignError> {
        let mode: AlignMode = mode.parse()?;
        self.align(entity, start, end, mode)
    }
}
