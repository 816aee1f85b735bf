//! Dataset loaders over persisted pipeline outputs.
//!
//! Layout on disk, for entity `E` (always upper-cased):
//! - `{raw_dir}/E_prices_{period}.csv`: daily vendor price download
//! - `{processed_dir}/E_p1_summary.json`: derived annual financials
//! - `{processed_dir}/E_p2_filings.json`: regulatory filings
//! - `{processed_dir}/E_p3_news.json`: news articles
//! - `{processed_dir}/E_p4_exec_ownership.json`: executive snapshot
//!
//! A missing file is an empty dataset. A file that exists but cannot be read
//! or parsed is a [`SourceReadError`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use timeweave_core::{Category, Dataset, DatasetLoader, Series, SourceReadError, Value};

use crate::config::DataConfig;

/// Parse a timestamp and keep only its calendar date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339, and naive `YYYY-MM-DDTHH:MM:SS[.f]`
/// (with `T` or a space).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace the bare `NaN`, `Infinity` and `-Infinity` tokens that Python's
/// `json.dump` writes with `null`. String literals are left untouched.
fn null_non_finite(json: &str) -> Cow<'_, str> {
    if !json.contains("NaN") && !json.contains("Infinity") {
        return Cow::Borrowed(json);
    }

    let bytes = json.as_bytes();
    let mut out = String::with_capacity(json.len());
    let mut copied = 0;
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        if in_string {
            match bytes[i] {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        if bytes[i] == b'"' {
            in_string = true;
            i += 1;
            continue;
        }
        match ["-Infinity", "Infinity", "NaN"]
            .into_iter()
            .find(|token| bytes[i..].starts_with(token.as_bytes()))
        {
            Some(token) => {
                out.push_str(&json[copied..i]);
                out.push_str("null");
                i += token.len();
                copied = i;
            }
            None => i += 1,
        }
    }
    out.push_str(&json[copied..]);
    Cow::Owned(out)
}

fn opt_text(s: Option<String>) -> Option<Value> {
    s.map(Value::Text)
}

// ── On-disk documents ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryDoc {
    #[serde(default)]
    derived: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct FilingsDoc {
    #[serde(default)]
    filings: Vec<FilingEntry>,
}

#[derive(Debug, Deserialize)]
struct FilingEntry {
    filed_date: Option<String>,
    form_type: Option<String>,
    filing_url: Option<String>,
    accession_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsDoc {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    published_at: Option<String>,
    title: Option<String>,
    url: Option<String>,
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecutivesDoc {
    #[serde(default)]
    executives: Vec<Executive>,
    fetched_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Executive {
    name: Option<String>,
    title: Option<String>,
}

/// Map a financial period key to the last day of its year.
///
/// Keys are either a bare year (`"2023"`) or a period-end timestamp.
fn year_end(key: &str) -> Option<NaiveDate> {
    let year = match key.trim().parse::<i32>() {
        Ok(year) => year,
        Err(_) => parse_date(key)?.year(),
    };
    NaiveDate::from_ymd_opt(year, 12, 31)
}

/// Reads every category from the pipeline's output directories.
#[derive(Debug, Clone)]
pub struct FileLoader {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    price_period: String,
}

impl FileLoader {
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        price_period: impl Into<String>,
    ) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            price_period: price_period.into(),
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(
            &config.raw_dir,
            &config.processed_dir,
            config.price_period.clone(),
        )
    }

    pub fn prices_path(&self, entity: &str) -> PathBuf {
        self.raw_dir.join(format!(
            "{}_prices_{}.csv",
            entity.to_uppercase(),
            self.price_period
        ))
    }

    pub fn processed_path(&self, entity: &str, stem: &str) -> PathBuf {
        self.processed_dir
            .join(format!("{}_{stem}.json", entity.to_uppercase()))
    }

    /// Read and deserialize a processed JSON document, if present.
    fn read_doc<T>(
        &self,
        entity: &str,
        category: Category,
        stem: &str,
    ) -> Result<Option<T>, SourceReadError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = self.processed_path(entity, stem);
        let Some(content) =
            read_optional(&path).map_err(|e| SourceReadError::io(entity, category, e))?
        else {
            tracing::debug!(entity, %category, path = %path.display(), "no file");
            return Ok(None);
        };
        serde_json::from_str(&null_non_finite(&content))
            .map(Some)
            .map_err(|e| SourceReadError::malformed(entity, category, format!("{}: {e}", path.display())))
    }
}

impl DatasetLoader for FileLoader {
    fn load_prices(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        let category = Category::Prices;
        let path = self.prices_path(entity);
        let Some(content) =
            read_optional(&path).map_err(|e| SourceReadError::io(entity, category, e))?
        else {
            return Ok(Dataset::empty(category));
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut records = reader.records();

        let header = match records.next() {
            Some(row) => row.map_err(|e| SourceReadError::malformed(entity, category, e.to_string()))?,
            None => return Ok(Dataset::empty(category)),
        };
        let position = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let (Some(close), Some(volume)) = (position("close"), position("volume")) else {
            return Err(SourceReadError::malformed(
                entity,
                category,
                format!("{}: header lacks close/volume columns", path.display()),
            ));
        };

        let number = |row: &csv::StringRecord, i: usize| {
            row.get(i)
                .and_then(|cell| cell.trim().parse::<f64>().ok())
                .and_then(Value::number)
        };

        let mut series = Series::with_fields(["price_close", "price_volume"]);
        for row in records {
            let row = row.map_err(|e| SourceReadError::malformed(entity, category, e.to_string()))?;
            // Vendor downloads may carry extra header rows before the data.
            let Some(date) = row.get(0).and_then(parse_date) else {
                continue;
            };
            series.insert(
                date,
                [
                    ("price_close", number(&row, close)),
                    ("price_volume", number(&row, volume)),
                ],
            );
        }
        Ok(Dataset::new(category, series))
    }

    fn load_financials(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        let category = Category::Financials;
        let Some(doc) = self.read_doc::<SummaryDoc>(entity, category, "p1_summary")? else {
            return Ok(Dataset::empty(category));
        };

        let mut by_date: BTreeMap<NaiveDate, Vec<(String, Option<Value>)>> = BTreeMap::new();
        for (column, by_period) in &doc.derived {
            for (period, value) in by_period {
                let date = year_end(period).ok_or_else(|| {
                    SourceReadError::malformed(
                        entity,
                        category,
                        format!("unrecognized period '{period}' in column '{column}'"),
                    )
                })?;
                by_date
                    .entry(date)
                    .or_default()
                    .push((column.clone(), Value::from_json(value)));
            }
        }

        let mut series = Series::with_fields(doc.derived.keys());
        for (date, fields) in by_date {
            series.insert(date, fields);
        }
        Ok(Dataset::new(category, series))
    }

    fn load_filings(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        let category = Category::Filings;
        let Some(doc) = self.read_doc::<FilingsDoc>(entity, category, "p2_filings")? else {
            return Ok(Dataset::empty(category));
        };

        let mut series = Series::new();
        for filing in doc.filings {
            let Some(date) = filing.filed_date.as_deref().and_then(parse_date) else {
                continue;
            };
            series.insert(
                date,
                [
                    ("filing_type", opt_text(filing.form_type)),
                    ("filing_url", opt_text(filing.filing_url)),
                    ("accession_number", opt_text(filing.accession_number)),
                ],
            );
        }
        Ok(Dataset::new(category, series))
    }

    fn load_news(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        let category = Category::News;
        let Some(doc) = self.read_doc::<NewsDoc>(entity, category, "p3_news")? else {
            return Ok(Dataset::empty(category));
        };

        let mut series = Series::new();
        for article in doc.articles {
            let Some(date) = article.published_at.as_deref().and_then(parse_date) else {
                continue;
            };
            series.insert(
                date,
                [
                    ("news_title", opt_text(article.title)),
                    ("news_url", opt_text(article.url)),
                    ("news_publisher", opt_text(article.publisher)),
                ],
            );
        }
        Ok(Dataset::new(category, series))
    }

    fn load_organization(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        let category = Category::Organization;
        let Some(doc) =
            self.read_doc::<ExecutivesDoc>(entity, category, "p4_exec_ownership")?
        else {
            return Ok(Dataset::empty(category));
        };
        if doc.executives.is_empty() {
            return Ok(Dataset::empty(category));
        }

        let date = doc
            .fetched_at
            .as_deref()
            .and_then(parse_date)
            .ok_or_else(|| {
                SourceReadError::malformed(entity, category, "missing or invalid fetched_at")
            })?;

        let ceo = doc.executives.iter().find(|e| {
            e.title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains("ceo"))
        });
        let Some(ceo) = ceo else {
            return Ok(Dataset::empty(category));
        };

        let mut series = Series::new();
        series.insert(
            date,
            [
                ("exec_ceo_name", opt_text(ceo.name.clone())),
                ("exec_ceo_title", opt_text(ceo.title.clone())),
                ("exec_count", Some(Value::Integer(doc.executives.len() as i64))),
            ],
        );
        Ok(Dataset::new(category, series))
    }
}

/// Wraps a loader and turns read errors into empty datasets.
///
/// Each swallowed error is logged at `warn`.
#[derive(Debug, Clone)]
pub struct TolerantLoader<L> {
    inner: L,
}

impl<L: DatasetLoader> TolerantLoader<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    fn tolerate(
        &self,
        category: Category,
        result: Result<Dataset, SourceReadError>,
    ) -> Result<Dataset, SourceReadError> {
        Ok(result.unwrap_or_else(|err| {
            tracing::warn!(%category, error = %err, "loader error, treating source as empty");
            Dataset::empty(category)
        }))
    }
}

impl<L: DatasetLoader> DatasetLoader for TolerantLoader<L> {
    fn load_prices(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        self.tolerate(Category::Prices, self.inner.load_prices(entity))
    }

    fn load_financials(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        self.tolerate(Category::Financials, self.inner.load_financials(entity))
    }

    fn load_filings(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        self.tolerate(Category::Filings, self.inner.load_filings(entity))
    }

    fn load_news(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        self.tolerate(Category::News, self.inner.load_news(entity))
    }

    fn load_organization(&self, entity: &str) -> Result<Dataset, SourceReadError> {
        self.tolerate(Category::Organization, self.inner.load_organization(entity))
    }
}
