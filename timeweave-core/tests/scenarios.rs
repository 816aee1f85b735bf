//! End-to-end alignment scenarios through the engine facade.

use chrono::NaiveDate;
use timeweave_core::{
    AlignError, AlignMode, AlignOptions, AlignmentEngine, Category, CollisionPolicy, Dataset,
    EmptyReason, InMemoryLoader, Series, Value,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn numeric(category: Category, field: &str, points: &[(&str, f64)]) -> Dataset {
    let mut series = Series::new();
    for (d, x) in points {
        series.insert(date(d), [(field, Value::number(*x))]);
    }
    Dataset::new(category, series)
}

#[test]
fn dense_forward_fills_between_price_points() {
    let loader = InMemoryLoader::new().with(
        "ACME",
        numeric(
            Category::Prices,
            "price_close",
            &[("2024-01-01", 100.0), ("2024-01-03", 102.0)],
        ),
    );
    let engine = AlignmentEngine::new(loader);

    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-01-03"), AlignMode::Dense)
        .unwrap();
    let table = outcome.table().unwrap();

    assert_eq!(table.row_count(), 3);
    assert_eq!(table.value(0, "price_close"), Some(&Value::Number(100.0)));
    assert_eq!(table.value(1, "price_close"), Some(&Value::Number(100.0)));
    assert_eq!(table.value(2, "price_close"), Some(&Value::Number(102.0)));
    assert_eq!(table.contributors, vec![Category::Prices]);
}

#[test]
fn all_empty_reports_no_datasets() {
    let engine = AlignmentEngine::new(InMemoryLoader::new());
    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-12-31"), AlignMode::Dense)
        .unwrap();

    assert_eq!(outcome.row_count(), 0);
    assert_eq!(outcome.column_count(), 0);
    assert_eq!(outcome.empty_reason(), Some(EmptyReason::NoDatasetsAvailable));
    assert_eq!(EmptyReason::NoDatasetsAvailable.message(), "no datasets available");
}

#[test]
fn dense_carries_value_from_before_start() {
    let loader = InMemoryLoader::new().with(
        "ACME",
        numeric(Category::Financials, "revenue_b", &[("2023-12-31", 383.3)]),
    );
    let engine = AlignmentEngine::new(loader);

    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-01-05"), AlignMode::Dense)
        .unwrap();
    let table = outcome.table().unwrap();

    assert_eq!(table.row_count(), 5);
    assert_eq!(table.index()[0], date("2024-01-01"));
    for row in 0..5 {
        assert_eq!(table.value(row, "revenue_b"), Some(&Value::Number(383.3)));
    }
}

#[test]
fn sparse_uses_organization_snapshots_as_rows() {
    let loader = InMemoryLoader::new().with(
        "ACME",
        numeric(
            Category::Organization,
            "exec_count",
            &[("2024-02-01", 12.0), ("2024-05-01", 13.0)],
        ),
    );
    let engine = AlignmentEngine::new(loader);

    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-06-30"), AlignMode::Sparse)
        .unwrap();
    let table = outcome.table().unwrap();

    assert_eq!(table.reference, Some(Category::Organization));
    assert_eq!(table.index(), &[date("2024-02-01"), date("2024-05-01")]);
}

#[test]
fn sparse_range_miss_is_distinguished_from_no_data() {
    let loader = InMemoryLoader::new().with(
        "ACME",
        numeric(Category::Filings, "filing_count", &[("2022-03-01", 1.0)]),
    );
    let engine = AlignmentEngine::new(loader);

    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-06-30"), AlignMode::Sparse)
        .unwrap();
    assert_eq!(outcome.empty_reason(), Some(EmptyReason::RangeExcludesAllPoints));
}

#[test]
fn sparse_joins_every_other_source() {
    let mut filings = Series::new();
    filings.insert(
        date("2024-02-01"),
        [
            ("filing_type", Some(Value::text("10-Q"))),
            ("accession_number", Some(Value::text("0000320193-24-000006"))),
        ],
    );
    filings.insert(
        date("2024-05-03"),
        [
            ("filing_type", Some(Value::text("10-Q"))),
            ("accession_number", Some(Value::text("0000320193-24-000069"))),
        ],
    );
    let mut news = Series::new();
    news.insert(date("2024-03-15"), [("news_title", Some(Value::text("Launch")))]);

    let loader = InMemoryLoader::new()
        .with("ACME", Dataset::new(Category::Filings, filings))
        .with("ACME", Dataset::new(Category::News, news))
        .with(
            "ACME",
            numeric(
                Category::Prices,
                "price_close",
                &[("2024-01-31", 184.4), ("2024-05-02", 173.0)],
            ),
        );
    let engine = AlignmentEngine::new(loader);

    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-12-31"), AlignMode::Sparse)
        .unwrap();
    let table = outcome.table().unwrap();

    assert_eq!(table.row_count(), 2);
    assert_eq!(
        table.contributors,
        vec![Category::Filings, Category::Prices, Category::News]
    );
    assert_eq!(table.value(0, "news_title"), None);
    assert_eq!(table.value(1, "news_title"), Some(&Value::text("Launch")));
    assert_eq!(table.value(0, "price_close"), Some(&Value::Number(184.4)));
    assert_eq!(table.value(1, "price_close"), Some(&Value::Number(173.0)));
    for row in 0..2 {
        assert!(table.value(row, "filing_type").is_some());
    }
}

#[test]
fn qualify_all_policy_prefixes_columns() {
    let loader = InMemoryLoader::new().with(
        "ACME",
        numeric(Category::Prices, "close", &[("2024-01-01", 1.0)]),
    );
    let engine = AlignmentEngine::with_options(
        loader,
        AlignOptions {
            collision: CollisionPolicy::QualifyAll,
        },
    );
    let outcome = engine
        .align("ACME", date("2024-01-01"), date("2024-01-01"), AlignMode::Dense)
        .unwrap();
    assert_eq!(
        outcome.table().unwrap().column_names().collect::<Vec<_>>(),
        vec!["prices_close"]
    );
}

#[test]
fn inverted_range_is_rejected() {
    let engine = AlignmentEngine::new(InMemoryLoader::new());
    let err = engine
        .align("ACME", date("2024-02-01"), date("2024-01-01"), AlignMode::Sparse)
        .unwrap_err();
    assert!(matches!(err, AlignError::InvalidRange { .. }));
    assert!(err.is_validation());
}

#[test]
fn repeated_calls_are_identical() {
    let loader = InMemoryLoader::new()
        .with(
            "ACME",
            numeric(Category::Prices, "price_close", &[("2024-01-02", 1.0), ("2024-01-09", 2.0)]),
        )
        .with(
            "ACME",
            numeric(Category::News, "news_score", &[("2024-01-04", 0.3)]),
        );
    let engine = AlignmentEngine::new(loader);

    for mode in [AlignMode::Dense, AlignMode::Sparse] {
        let a = engine.align("ACME", date("2024-01-01"), date("2024-01-31"), mode).unwrap();
        let b = engine.align("ACME", date("2024-01-01"), date("2024-01-31"), mode).unwrap();
        assert_eq!(a, b);
    }
}
