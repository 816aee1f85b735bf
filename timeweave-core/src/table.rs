//! Aligned output table and alignment outcome.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{Category, Value, ValueKind};
use crate::error::AlignError;
use crate::layout::ColumnLayout;

/// Alignment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMode {
    /// One row per calendar day, every dataset forward-filled.
    #[default]
    Dense,
    /// One row per point of the sparsest available dataset.
    Sparse,
}

impl AlignMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignMode::Dense => "dense",
            AlignMode::Sparse => "sparse",
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            AlignMode::Dense => "daily calendar index with forward-fill",
            AlignMode::Sparse => "sparse reference clock (sparsest dataset)",
        }
    }
}

impl fmt::Display for AlignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignMode {
    type Err = AlignError;

    /// Accepts `dense` (alias `daily`) and `sparse`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense" | "daily" => Ok(AlignMode::Dense),
            "sparse" => Ok(AlignMode::Sparse),
            _ => Err(AlignError::UnsupportedMode(s.to_string())),
        }
    }
}

/// Why an alignment produced no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// Every dataset for the entity was empty.
    NoDatasetsAvailable,
    /// Data exists, but the reference clock has no point inside the range.
    RangeExcludesAllPoints,
}

impl EmptyReason {
    pub fn code(&self) -> &'static str {
        match self {
            EmptyReason::NoDatasetsAvailable => "no_datasets_available",
            EmptyReason::RangeExcludesAllPoints => "range_excludes_all_points",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            EmptyReason::NoDatasetsAvailable => "no datasets available",
            EmptyReason::RangeExcludesAllPoints => "range excludes all points",
        }
    }
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of one alignment call.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentOutcome {
    Aligned(AlignedTable),
    Empty(EmptyReason),
}

impl AlignmentOutcome {
    pub fn table(&self) -> Option<&AlignedTable> {
        match self {
            AlignmentOutcome::Aligned(table) => Some(table),
            AlignmentOutcome::Empty(_) => None,
        }
    }

    pub fn into_table(self) -> Option<AlignedTable> {
        match self {
            AlignmentOutcome::Aligned(table) => Some(table),
            AlignmentOutcome::Empty(_) => None,
        }
    }

    pub fn empty_reason(&self) -> Option<EmptyReason> {
        match self {
            AlignmentOutcome::Aligned(_) => None,
            AlignmentOutcome::Empty(reason) => Some(*reason),
        }
    }

    pub fn row_count(&self) -> usize {
        self.table().map_or(0, AlignedTable::row_count)
    }

    pub fn column_count(&self) -> usize {
        self.table().map_or(0, AlignedTable::column_count)
    }
}

/// Describes one output column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    /// Output name after collision handling.
    pub name: String,
    /// Field name inside the source dataset.
    pub field: String,
    /// Dataset the values were joined from.
    pub dataset: Category,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub spec: ColumnSpec,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn has_nulls(&self) -> bool {
        self.values.iter().any(Option::is_none)
    }
}

/// Date-indexed table produced by an aligner.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    pub entity: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub mode: AlignMode,
    /// Reference clock (sparse mode only).
    pub reference: Option<Category>,
    /// Categories whose datasets were joined, in join order.
    pub contributors: Vec<Category>,
    index: Vec<NaiveDate>,
    columns: Vec<Column>,
    layout: ColumnLayout,
}

impl AlignedTable {
    pub(crate) fn new(
        entity: &str,
        start: NaiveDate,
        end: NaiveDate,
        mode: AlignMode,
        index: Vec<NaiveDate>,
    ) -> Self {
        Self {
            entity: entity.to_string(),
            start,
            end,
            mode,
            reference: None,
            contributors: Vec::new(),
            index,
            columns: Vec::new(),
            layout: ColumnLayout::default(),
        }
    }

    pub(crate) fn set_layout(&mut self, layout: ColumnLayout) {
        self.layout = layout;
    }

    pub(crate) fn push_column(&mut self, spec: ColumnSpec, values: Vec<Option<Value>>) {
        debug_assert_eq!(values.len(), self.index.len());
        self.columns.push(Column { spec, values });
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.spec.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.spec.name == name)
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name)?.values.get(row)?.as_ref()
    }

    /// Row position of `date`, if it is in the index.
    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.index.binary_search(&date).ok()
    }

    /// Iterate rows as `(date, cells)` where cells follow column order.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, Vec<Option<&Value>>)> + '_ {
        self.index.iter().enumerate().map(move |(i, date)| {
            let cells = self.columns.iter().map(|c| c.values[i].as_ref()).collect();
            (*date, cells)
        })
    }

    /// Keep only columns for which `keep` returns true.
    pub fn retain_columns<F>(&mut self, mut keep: F)
    where
        F: FnMut(&ColumnSpec) -> bool,
    {
        self.columns.retain(|c| keep(&c.spec));
    }

    /// Latest non-null value of a column and the date it appears on.
    pub fn last_valid(&self, name: &str) -> Option<(NaiveDate, &Value)> {
        let column = self.column(name)?;
        self.index
            .iter()
            .zip(&column.values)
            .rev()
            .find_map(|(date, value)| value.as_ref().map(|v| (*date, v)))
    }
}
