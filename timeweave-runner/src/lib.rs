//! timeweave runner: everything around the alignment engine.
//!
//! This crate builds on `timeweave-core` to provide:
//! - TOML application configuration
//! - File-backed dataset loaders over persisted pipeline outputs
//! - An in-memory TTL response cache with single-flight misses
//! - The query service (align, summary, dataset coverage, parallel batches)
//! - JSON, CSV, and Parquet export

pub mod cache;
pub mod config;
pub mod export;
pub mod loaders;
pub mod query;

pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use config::{AppConfig, ConfigError};
pub use export::{ExportError, ExportFormat};
pub use loaders::{parse_date, FileLoader, TolerantLoader};
pub use query::{
    AlignQuery, AlignedResponse, ColumnMeta, DatasetsResponse, QueryError, QueryService,
    ResponseMeta, SummaryResponse,
};
