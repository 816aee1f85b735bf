//! Export aligned responses as JSON, CSV, or Parquet.
//!
//! - **JSON**: the response as served, pretty-printed
//! - **CSV**: `date` first, then one column per aligned column; null is an empty cell
//! - **Parquet**: `date` as a Date column, numeric columns Float64, text columns String

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use timeweave_core::ValueKind;

use crate::query::AlignedResponse;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet export: {0}")]
    Parquet(#[from] PolarsError),

    #[error("write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown export format '{0}' (expected json, csv or parquet)")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn to_json(response: &AlignedResponse) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(response)?)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Render a JSON cell for CSV or a text column. Null stays `None`.
fn cell_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn to_csv(response: &AlignedResponse) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date"];
    header.extend(response.columns.iter().map(|c| c.key.as_str()));
    wtr.write_record(&header)?;

    for row in &response.rows {
        let record: Vec<String> = header
            .iter()
            .map(|key| row.get(*key).and_then(cell_text).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

// ─── Parquet export ─────────────────────────────────────────────────

/// Typed columnar view of a response.
pub fn to_dataframe(response: &AlignedResponse) -> Result<DataFrame, ExportError> {
    let epoch = chrono::DateTime::UNIX_EPOCH.date_naive();
    let dates: Vec<Option<i32>> = response
        .rows
        .iter()
        .map(|row| {
            row.get("date")
                .and_then(|d| d.as_str())
                .and_then(|d| d.parse::<chrono::NaiveDate>().ok())
                .map(|d| (d - epoch).num_days() as i32)
        })
        .collect();

    let mut columns = Vec::with_capacity(response.columns.len() + 1);
    columns.push(Column::new("date".into(), dates).cast(&DataType::Date)?);

    for meta in &response.columns {
        let cells = response.rows.iter().map(|row| row.get(&meta.key));
        let column = match meta.kind {
            ValueKind::Numeric => {
                let values: Vec<Option<f64>> = cells
                    .map(|v| v.and_then(serde_json::Value::as_f64))
                    .collect();
                Column::new(meta.key.as_str().into(), values)
            }
            ValueKind::Text => {
                let values: Vec<Option<String>> =
                    cells.map(|v| v.and_then(cell_text)).collect();
                Column::new(meta.key.as_str().into(), values)
            }
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

pub fn write_parquet<W: Write>(response: &AlignedResponse, writer: W) -> Result<(), ExportError> {
    let mut df = to_dataframe(response)?;
    ParquetWriter::new(writer).finish(&mut df)?;
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

/// Serialize `response` in `format`.
pub fn render(response: &AlignedResponse, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Json => to_json(response).map(String::into_bytes),
        ExportFormat::Csv => to_csv(response).map(String::into_bytes),
        ExportFormat::Parquet => {
            let mut buf = Vec::new();
            write_parquet(response, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Write `response` to `path`, creating parent directories.
pub fn write_file(
    response: &AlignedResponse,
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = render(response, format)?;
    std::fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), %format, rows = response.row_count, "exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::query::QueryService;
    use chrono::NaiveDate;
    use std::fs;
    use timeweave_core::{Category, Dataset, InMemoryLoader, Series, Value};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn response() -> AlignedResponse {
        let mut prices = Series::new();
        prices.insert(d(2), [("price_close", Value::number(185.5))]);
        let mut news = Series::new();
        news.insert(d(1), [("news_title", Some(Value::text("Hello, world")))]);
        let loader = InMemoryLoader::new()
            .with("AAPL", Dataset::new(Category::Prices, prices))
            .with("AAPL", Dataset::new(Category::News, news));

        let svc = QueryService::new(loader, &AppConfig::default());
        let query = svc.query("AAPL").range(d(1), d(3));
        (*svc.align(&query).unwrap()).clone()
    }

    #[test]
    fn format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("pq".parse::<ExportFormat>().unwrap(), ExportFormat::Parquet);
        assert!(matches!(
            "xlsx".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(_))
        ));
    }

    #[test]
    fn csv_has_date_first_and_empty_nulls() {
        let csv = to_csv(&response()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,price_close,news_title");
        assert_eq!(lines[1], "2024-01-01,,\"Hello, world\"");
        assert_eq!(lines[2], "2024-01-02,185.5,\"Hello, world\"");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn json_is_the_response() {
        let response = response();
        let json = to_json(&response).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["row_count"], 3);
        assert_eq!(parsed["columns"][0]["key"], "price_close");
        assert_eq!(parsed["columns"][0]["dataset"], "prices");
        assert_eq!(parsed["meta"]["present"][1], "news");
    }

    #[test]
    fn dataframe_is_typed() {
        let df = to_dataframe(&response()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("price_close").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("news_title").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("price_close").unwrap().null_count(), 1);
    }

    #[test]
    fn parquet_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/aapl.parquet");
        write_file(&response(), ExportFormat::Parquet, &path).unwrap();

        let df = ParquetReader::new(fs::File::open(&path).unwrap())
            .finish()
            .unwrap();
        assert_eq!(df.shape(), (3, 3));
        let close = df.column("price_close").unwrap().f64().unwrap();
        assert_eq!(close.get(0), None);
        assert_eq!(close.get(2), Some(185.5));
    }

    #[test]
    fn empty_response_exports_header_only() {
        let svc = QueryService::new(InMemoryLoader::new(), &AppConfig::default());
        let response = svc.align(&svc.query("NONE").range(d(1), d(2))).unwrap();
        assert_eq!(to_csv(&response).unwrap().trim(), "date");
        assert_eq!(to_dataframe(&response).unwrap().height(), 0);
    }
}
