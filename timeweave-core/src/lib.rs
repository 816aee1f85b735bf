//! timeweave core: dataset model, column classification, timestamp alignment.
//!
//! This crate contains the alignment engine:
//! - Domain types (categories, scalar values, date-indexed series, datasets)
//! - Column classifier mapping output columns back to their source
//! - As-of forward fill that never invents values
//! - Dense aligner (calendar-day index) and sparse aligner (reference clock)
//! - Engine facade over an injected dataset loader

pub mod classify;
pub mod dense;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fill;
pub mod layout;
pub mod loader;
pub mod sparse;
pub mod table;

pub use classify::{ColumnClassifier, ColumnOrigin};
pub use dense::align_dense;
pub use domain::{Category, Dataset, DatasetCoverage, Datasets, Record, Series, Value, ValueKind};
pub use engine::{align_datasets, validate_range, AlignOptions, AlignmentEngine};
pub use error::{AlignError, SourceErrorKind, SourceReadError};
pub use layout::{CollisionPolicy, ColumnLayout};
pub use loader::{DatasetLoader, InMemoryLoader};
pub use sparse::align_sparse;
pub use table::{AlignMode, AlignedTable, AlignmentOutcome, Column, ColumnSpec, EmptyReason};
