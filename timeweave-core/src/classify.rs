//! Column classification: map an output column name back to its source.
//!
//! Rules are a static table of name prefixes per category, tried in the
//! declared category order; the first category with a matching prefix wins.
//! An explicit override table is consulted before any prefix.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::domain::Category;

/// Where a column was classified to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnOrigin {
    Dataset(Category),
    Unclassified,
}

impl ColumnOrigin {
    pub fn category(&self) -> Option<Category> {
        match self {
            ColumnOrigin::Dataset(c) => Some(*c),
            ColumnOrigin::Unclassified => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnOrigin::Dataset(c) => c.as_str(),
            ColumnOrigin::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ColumnOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ColumnOrigin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Prefix rules plus explicit overrides.
#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    rules: Vec<(Category, Vec<String>)>,
    overrides: HashMap<String, Category>,
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        let rules: [(Category, &[&str]); 5] = [
            (Category::Prices, &["price_"]),
            (
                Category::Financials,
                &["revenue_", "net_margin", "gross_margin", "fcf_margin", "debt_equity"],
            ),
            (Category::Filings, &["filing_", "accession_"]),
            (Category::News, &["news_"]),
            (Category::Organization, &["exec_", "org_"]),
        ];
        Self::new(
            rules
                .iter()
                .map(|(c, prefixes)| (*c, prefixes.iter().map(|p| p.to_string()).collect())),
        )
    }
}

impl ColumnClassifier {
    /// Build a classifier from `(category, prefixes)` rules in priority order.
    pub fn new<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (Category, Vec<String>)>,
    {
        Self {
            rules: rules.into_iter().collect(),
            overrides: HashMap::new(),
        }
    }

    /// Pin `column` to `category`, ahead of any prefix rule.
    pub fn with_override(mut self, column: impl Into<String>, category: Category) -> Self {
        self.overrides.insert(column.into(), category);
        self
    }

    pub fn add_override(&mut self, column: impl Into<String>, category: Category) {
        self.overrides.insert(column.into(), category);
    }

    pub fn classify(&self, column: &str) -> ColumnOrigin {
        if let Some(category) = self.overrides.get(column) {
            return ColumnOrigin::Dataset(*category);
        }
        self.rules
            .iter()
            .find(|(_, prefixes)| prefixes.iter().any(|p| column.starts_with(p.as_str())))
            .map(|(category, _)| ColumnOrigin::Dataset(*category))
            .unwrap_or(ColumnOrigin::Unclassified)
    }

    /// Longest prefix of the winning category that matches `column`.
    pub fn matched_prefix(&self, column: &str) -> Option<&str> {
        let category = self.classify(column).category()?;
        if self.overrides.contains_key(column) {
            return None;
        }
        self.rules
            .iter()
            .filter(|(c, _)| *c == category)
            .flat_map(|(_, prefixes)| prefixes.iter())
            .filter(|p| column.starts_with(p.as_str()))
            .max_by_key(|p| p.len())
            .map(String::as_str)
    }
}
