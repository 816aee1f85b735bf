//! Query service: the request/response face of the alignment engine.
//!
//! A query names an entity, an optional date range, a mode and an optional
//! include list. Everything is validated before any data is loaded. Aligned
//! responses are cached per resolved request when caching is enabled.

use chrono::{Duration, Local, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use timeweave_core::{
    validate_range, AlignError, AlignMode, AlignedTable, AlignmentEngine, AlignmentOutcome,
    Category, ColumnClassifier, ColumnOrigin, DatasetCoverage, DatasetLoader, EmptyReason,
    ValueKind,
};

use crate::cache::{CacheKey, ResponseCache};
use crate::config::AppConfig;
use crate::loaders::{FileLoader, TolerantLoader};

const NOTE: &str = "Null values mean no data existed at or before that date. No values are fabricated.";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Align(#[from] AlignError),

    #[error("entity id must not be empty")]
    EmptyEntity,

    #[error("failed to build cache key: {0}")]
    CacheKey(#[from] serde_json::Error),
}

impl QueryError {
    /// True when the request itself was bad.
    pub fn is_validation(&self) -> bool {
        match self {
            QueryError::Align(e) => e.is_validation(),
            QueryError::EmptyEntity => true,
            QueryError::CacheKey(_) => false,
        }
    }
}

/// An alignment request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignQuery {
    pub entity: String,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    pub mode: String,
    /// Comma-separated categories to keep in the output.
    #[serde(default)]
    pub include: Option<String>,
}

impl AlignQuery {
    pub fn new(entity: impl Into<String>, mode: AlignMode) -> Self {
        Self {
            entity: entity.into(),
            start: None,
            end: None,
            mode: mode.as_str().to_string(),
            include: None,
        }
    }

    pub fn range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn include(mut self, list: impl Into<String>) -> Self {
        self.include = Some(list.into());
        self
    }
}

/// A validated query with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ResolvedQuery {
    entity: String,
    start: NaiveDate,
    end: NaiveDate,
    mode: AlignMode,
    /// `None` keeps every column.
    include: Option<Vec<Category>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub key: String,
    pub label: String,
    pub dataset: ColumnOrigin,
    pub kind: ValueKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMeta {
    pub alignment_strategy: String,
    pub note: String,
    pub requested: Vec<Category>,
    pub present: Vec<Category>,
    pub reference: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type Row = serde_json::Map<String, serde_json::Value>;

/// Aligned rows plus column metadata, ready to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedResponse {
    pub entity: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub mode: AlignMode,
    pub row_count: usize,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub value: serde_json::Value,
    pub as_of: NaiveDate,
}

/// Latest value per column over the default lookback window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub entity: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub data: BTreeMap<String, SummaryEntry>,
}

/// Which sources hold data for an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetsResponse {
    pub entity: String,
    pub datasets: Vec<DatasetCoverage>,
    /// Reference clock a sparse alignment would use.
    pub sparse_reference: Option<Category>,
}

/// `price_close` → `Price Close`.
pub fn column_label(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub struct QueryService<L> {
    engine: AlignmentEngine<L>,
    classifier: ColumnClassifier,
    cache: Option<ResponseCache<AlignedResponse>>,
    lookback: Duration,
    default_mode: AlignMode,
    today: Option<NaiveDate>,
}

impl QueryService<Box<dyn DatasetLoader>> {
    /// File-backed service. Loader errors are surfaced only when
    /// `sources.strict` is set.
    pub fn from_config(config: &AppConfig) -> Self {
        let files = FileLoader::from_config(&config.data);
        let loader: Box<dyn DatasetLoader> = if config.sources.strict {
            Box::new(files)
        } else {
            Box::new(TolerantLoader::new(files))
        };
        Self::new(loader, config)
    }
}

impl<L: DatasetLoader> QueryService<L> {
    pub fn new(loader: L, config: &AppConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::new(config.cache.ttl()));
        Self {
            engine: AlignmentEngine::with_options(loader, config.align_options()),
            classifier: ColumnClassifier::default(),
            cache,
            lookback: Duration::days(i64::from(config.query.default_lookback_days)),
            default_mode: config.query.default_mode,
            today: None,
        }
    }

    /// Pin "today" for default end dates.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_classifier(mut self, classifier: ColumnClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn engine(&self) -> &AlignmentEngine<L> {
        &self.engine
    }

    pub fn cache(&self) -> Option<&ResponseCache<AlignedResponse>> {
        self.cache.as_ref()
    }

    /// A query for `entity` in the configured default mode.
    pub fn query(&self, entity: impl Into<String>) -> AlignQuery {
        AlignQuery::new(entity, self.default_mode)
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn resolve(&self, query: &AlignQuery) -> Result<ResolvedQuery, QueryError> {
        let entity = query.entity.trim().to_uppercase();
        if entity.is_empty() {
            return Err(QueryError::EmptyEntity);
        }
        let end = query.end.unwrap_or_else(|| self.today());
        let start = query.start.unwrap_or(end - self.lookback);
        validate_range(start, end)?;
        let mode: AlignMode = query.mode.parse()?;
        let include = query
            .include
            .as_deref()
            .map(Category::parse_list)
            .transpose()?;
        Ok(ResolvedQuery {
            entity,
            start,
            end,
            mode,
            include,
        })
    }

    /// Align one query. Cached responses are shared.
    pub fn align(&self, query: &AlignQuery) -> Result<Arc<AlignedResponse>, QueryError> {
        let resolved = self.resolve(query)?;
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(
                    "align",
                    &(&resolved, self.engine.options()),
                )?;
                cache.get_or_try_insert_with(&key, || self.compute(&resolved))
            }
            None => self.compute(&resolved).map(Arc::new),
        }
    }

    /// Align several queries in parallel. Results keep input order.
    pub fn align_many(
        &self,
        queries: &[AlignQuery],
    ) -> Vec<Result<Arc<AlignedResponse>, QueryError>> {
        queries.par_iter().map(|query| self.align(query)).collect()
    }

    fn compute(&self, q: &ResolvedQuery) -> Result<AlignedResponse, QueryError> {
        let outcome = self.engine.align(&q.entity, q.start, q.end, q.mode)?;
        Ok(self.respond(q, outcome))
    }

    fn respond(&self, q: &ResolvedQuery, outcome: AlignmentOutcome) -> AlignedResponse {
        let requested = q
            .include
            .clone()
            .unwrap_or_else(|| Category::PROCESSING_ORDER.to_vec());
        let mut meta = ResponseMeta {
            alignment_strategy: q.mode.strategy().to_string(),
            note: NOTE.to_string(),
            requested,
            present: Vec::new(),
            reference: None,
            empty_reason: None,
            message: None,
        };

        let mut table = match outcome {
            AlignmentOutcome::Aligned(table) => table,
            AlignmentOutcome::Empty(reason) => {
                meta.empty_reason = Some(reason);
                meta.message = Some(reason.message().to_string());
                return AlignedResponse {
                    entity: q.entity.clone(),
                    start: q.start,
                    end: q.end,
                    mode: q.mode,
                    row_count: 0,
                    columns: Vec::new(),
                    rows: Vec::new(),
                    meta,
                };
            }
        };
        meta.present = table.contributors.clone();
        meta.reference = table.reference;

        let classifier = self.classifier_for(&table);
        if let Some(include) = &q.include {
            table.retain_columns(|spec| match classifier.classify(&spec.name) {
                ColumnOrigin::Dataset(category) => include.contains(&category),
                ColumnOrigin::Unclassified => true,
            });
        }

        let columns = table
            .columns()
            .iter()
            .map(|column| ColumnMeta {
                key: column.spec.name.clone(),
                label: column_label(&column.spec.name),
                dataset: classifier.classify(&column.spec.name),
                kind: column.spec.kind,
                nullable: column.has_nulls(),
            })
            .collect();
        let rows = rows_of(&table);

        AlignedResponse {
            entity: q.entity.clone(),
            start: q.start,
            end: q.end,
            mode: q.mode,
            row_count: rows.len(),
            columns,
            rows,
            meta,
        }
    }

    /// The configured classifier, taught about columns renamed on collision.
    fn classifier_for(&self, table: &AlignedTable) -> ColumnClassifier {
        let mut classifier = self.classifier.clone();
        for (category, _, name) in table.layout().renamed() {
            classifier.add_override(name, category);
        }
        classifier
    }

    /// Latest non-null value and its date for every column, over the default
    /// lookback window ending today, in dense mode.
    pub fn summary(&self, entity: &str) -> Result<SummaryResponse, QueryError> {
        let resolved = self.resolve(&AlignQuery::new(entity, AlignMode::Dense))?;
        let outcome = self
            .engine
            .align(&resolved.entity, resolved.start, resolved.end, resolved.mode)?;

        let data = outcome
            .table()
            .map(|table| {
                table
                    .columns()
                    .iter()
                    .filter_map(|column| {
                        let (as_of, value) = table.last_valid(&column.spec.name)?;
                        Some((
                            column.spec.name.clone(),
                            SummaryEntry {
                                value: value.to_json(),
                                as_of,
                            },
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SummaryResponse {
            entity: resolved.entity,
            start: resolved.start,
            end: resolved.end,
            data,
        })
    }

    /// Point count and span of every source for `entity`.
    pub fn datasets(&self, entity: &str) -> Result<DatasetsResponse, QueryError> {
        let entity = entity.trim().to_uppercase();
        if entity.is_empty() {
            return Err(QueryError::EmptyEntity);
        }
        let datasets = self.engine.load(&entity)?;
        Ok(DatasetsResponse {
            sparse_reference: datasets.sparsest().map(|d| d.category),
            datasets: datasets.coverage(),
            entity,
        })
    }
}

/// `{ "date": ISO, <column>: scalar | null }` per row.
fn rows_of(table: &AlignedTable) -> Vec<Row> {
    let names: Vec<&str> = table.column_names().collect();
    table
        .rows()
        .map(|(date, cells)| {
            let mut row = Row::new();
            row.insert("date".to_string(), serde_json::Value::String(date.to_string()));
            for (name, cell) in names.iter().zip(cells) {
                let value = cell.map_or(serde_json::Value::Null, |v| v.to_json());
                row.insert((*name).to_string(), value);
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use timeweave_core::{Dataset, InMemoryLoader, Series, SourceReadError, Value};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn loader() -> InMemoryLoader {
        let mut prices = Series::new();
        prices.insert(d(1, 2), [("price_close", Value::number(185.6))]);
        prices.insert(d(1, 4), [("price_close", Value::number(181.9))]);
        let mut news = Series::new();
        news.insert(d(1, 3), [("news_title", Some(Value::text("Launch")))]);
        let mut odd = Series::new();
        odd.insert(d(1, 1), [("sentiment", Value::number(0.4))]);

        InMemoryLoader::new()
            .with("AAPL", Dataset::new(Category::Prices, prices))
            .with("AAPL", Dataset::new(Category::News, news))
            .with("AAPL", Dataset::new(Category::Financials, odd))
    }

    fn service() -> QueryService<InMemoryLoader> {
        QueryService::new(loader(), &AppConfig::default()).with_today(d(1, 5))
    }

    #[test]
    fn label_title_cases_words() {
        assert_eq!(column_label("price_close"), "Price Close");
        assert_eq!(column_label("fcf_margin_pct"), "Fcf Margin Pct");
        assert_eq!(column_label("news_URL"), "News Url");
    }

    #[test]
    fn aligned_response_shape() {
        let svc = service();
        let query = svc.query("aapl").range(d(1, 1), d(1, 4));
        let response = svc.align(&query).unwrap();

        assert_eq!(response.entity, "AAPL");
        assert_eq!(response.row_count, 4);
        assert_eq!(response.rows[0]["date"], "2024-01-01");
        assert_eq!(response.rows[0]["price_close"], serde_json::Value::Null);
        assert_eq!(response.rows[1]["price_close"], 185.6);
        assert_eq!(response.rows[3]["news_title"], "Launch");

        let price = response.columns.iter().find(|c| c.key == "price_close").unwrap();
        assert_eq!(price.label, "Price Close");
        assert_eq!(price.dataset, ColumnOrigin::Dataset(Category::Prices));
        assert!(price.nullable);

        assert_eq!(
            response.meta.present,
            vec![Category::Prices, Category::Financials, Category::News]
        );
        assert_eq!(response.meta.empty_reason, None);
    }

    #[test]
    fn row_keys_follow_column_order() {
        let svc = service();
        let query = svc.query("AAPL").range(d(1, 1), d(1, 2));
        let response = svc.align(&query).unwrap();

        let keys: Vec<&str> = response.rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["date", "price_close", "sentiment", "news_title"]);
        let columns: Vec<&str> = response.columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys[1..], columns[..]);

        let json = serde_json::to_string(&response.rows[0]).unwrap();
        assert!(json.starts_with(r#"{"date":"2024-01-01","price_close":null"#));
    }

    #[test]
    fn include_keeps_unclassified_columns() {
        let svc = service();
        let query = svc.query("AAPL").range(d(1, 1), d(1, 4)).include("news");
        let response = svc.align(&query).unwrap();

        let keys: Vec<&str> = response.columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["sentiment", "news_title"]);
        assert_eq!(
            response.columns[0].dataset,
            ColumnOrigin::Unclassified
        );
        assert_eq!(response.meta.requested, vec![Category::News]);
        assert!(!response.rows[0].contains_key("price_close"));
    }

    #[test]
    fn defaults_end_today_and_look_back() {
        let svc = service();
        let response = svc.align(&svc.query("AAPL")).unwrap();
        assert_eq!(response.end, d(1, 5));
        assert_eq!(response.start, d(1, 5) - Duration::days(365));
    }

    #[test]
    fn empty_response_carries_reason() {
        let svc = service();
        let response = svc.align(&svc.query("NONE")).unwrap();
        assert_eq!(response.row_count, 0);
        assert!(response.columns.is_empty());
        assert_eq!(response.meta.empty_reason, Some(EmptyReason::NoDatasetsAvailable));
        assert_eq!(response.meta.message.as_deref(), Some("no datasets available"));
    }

    #[test]
    fn validation_errors() {
        let svc = service();
        let inverted = svc.query("AAPL").range(d(2, 1), d(1, 1));
        assert!(svc.align(&inverted).unwrap_err().is_validation());

        let mut bad_mode = svc.query("AAPL");
        bad_mode.mode = "weekly".into();
        assert!(matches!(
            svc.align(&bad_mode),
            Err(QueryError::Align(AlignError::UnsupportedMode(_)))
        ));

        let bad_include = svc.query("AAPL").include("prices,patents");
        assert!(matches!(
            svc.align(&bad_include),
            Err(QueryError::Align(AlignError::UnknownCategory(_)))
        ));

        assert!(matches!(svc.align(&svc.query("  ")), Err(QueryError::EmptyEntity)));
    }

    /// Counts prices loads; everything else empty.
    struct Counting(AtomicUsize);

    impl DatasetLoader for Counting {
        fn load_prices(&self, _: &str) -> Result<Dataset, SourceReadError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let mut series = Series::new();
            series.insert(d(1, 1), [("price_close", Value::number(1.0))]);
            Ok(Dataset::new(Category::Prices, series))
        }
        fn load_financials(&self, _: &str) -> Result<Dataset, SourceReadError> {
            Ok(Dataset::empty(Category::Financials))
        }
        fn load_filings(&self, _: &str) -> Result<Dataset, SourceReadError> {
            Ok(Dataset::empty(Category::Filings))
        }
        fn load_news(&self, _: &str) -> Result<Dataset, SourceReadError> {
            Ok(Dataset::empty(Category::News))
        }
        fn load_organization(&self, _: &str) -> Result<Dataset, SourceReadError> {
            Ok(Dataset::empty(Category::Organization))
        }
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let svc = QueryService::new(Counting(AtomicUsize::new(0)), &AppConfig::default());
        let query = svc.query("AAPL").range(d(1, 1), d(1, 3));
        let a = svc.align(&query).unwrap();
        let b = svc.align(&query).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(svc.engine().loader().0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_cache_reloads() {
        let mut config = AppConfig::default();
        config.cache.enabled = false;
        let svc = QueryService::new(Counting(AtomicUsize::new(0)), &config);
        let query = svc.query("AAPL").range(d(1, 1), d(1, 3));
        svc.align(&query).unwrap();
        svc.align(&query).unwrap();
        assert!(svc.cache().is_none());
        assert_eq!(svc.engine().loader().0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn align_many_keeps_order() {
        let svc = service();
        let queries = vec![
            svc.query("AAPL").range(d(1, 1), d(1, 2)),
            svc.query("NONE").range(d(1, 1), d(1, 2)),
            svc.query("AAPL").range(d(3, 1), d(1, 2)),
        ];
        let results = svc.align_many(&queries);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().row_count, 2);
        assert_eq!(results[1].as_ref().unwrap().row_count, 0);
        assert!(results[2].is_err());
    }

    #[test]
    fn summary_reports_latest_values() {
        let svc = service();
        let summary = svc.summary("aapl").unwrap();
        assert_eq!(summary.entity, "AAPL");
        let close = &summary.data["price_close"];
        assert_eq!(close.value, 181.9);
        assert_eq!(close.as_of, d(1, 5));
        assert_eq!(summary.data["news_title"].value, "Launch");
    }

    #[test]
    fn datasets_reports_coverage_and_reference() {
        let svc = service();
        let response = svc.datasets("AAPL").unwrap();
        assert_eq!(response.datasets.len(), 5);
        assert_eq!(response.sparse_reference, Some(Category::Financials));
        let prices = response
            .datasets
            .iter()
            .find(|c| c.category == Category::Prices)
            .unwrap();
        assert_eq!(prices.points, 2);
        assert_eq!(prices.first_date, Some(d(1, 2)));
    }
}
