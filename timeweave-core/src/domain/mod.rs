//! Domain types for timeweave

pub mod category;
pub mod dataset;
pub mod series;
pub mod value;

pub use category::Category;
pub use dataset::{Dataset, DatasetCoverage, Datasets};
pub use series::{Record, Series};
pub use value::{Value, ValueKind};

/// Entity identifier (ticker or organization id).
pub type EntityId = String;
