//! Date-indexed records for a single source.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::value::{Value, ValueKind};

/// A flat record: field name → value. A missing key is a null.
pub type Record = BTreeMap<String, Value>;

/// Ordered mapping from calendar date to record.
///
/// Dates are unique and iterate in strictly increasing order. Inserting a
/// second record for a date replaces the first (last write wins), which is
/// how sources that emit several rows per day are collapsed.
///
/// The field list keeps first-seen order and includes fields that only ever
/// carried nulls, so an all-null source field still becomes a column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    fields: Vec<String>,
    points: BTreeMap<NaiveDate, Record>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare fields up front so column order does not depend on which
    /// fields the first record happens to carry.
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut series = Self::new();
        for field in fields {
            series.register_field(field.into());
        }
        series
    }

    /// Insert the record for `date`, replacing any earlier record for it.
    pub fn insert<I, K>(&mut self, date: NaiveDate, fields: I)
    where
        I: IntoIterator<Item = (K, Option<Value>)>,
        K: Into<String>,
    {
        let mut record = Record::new();
        for (key, value) in fields {
            let key = key.into();
            self.register_field(key.clone());
            if let Some(value) = value {
                record.insert(key, value);
            }
        }
        self.points.insert(date, record);
    }

    fn register_field(&mut self, field: String) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.keys().next_back().copied()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Record> {
        self.points.get(&date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &Record)> + '_ {
        self.points.iter().map(|(d, r)| (*d, r))
    }

    /// Points with `start <= date <= end`. An inverted range yields nothing.
    pub fn range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = (NaiveDate, &Record)> + '_ {
        (start <= end)
            .then_some(start..=end)
            .into_iter()
            .flat_map(move |bounds| self.points.range(bounds))
            .map(|(d, r)| (*d, r))
    }

    /// Declared type of a field, taken from every non-null value it carries.
    ///
    /// Any text value makes the field text. A field with no values at all is
    /// reported as numeric, matching how an all-missing numeric source column
    /// is typically declared.
    pub fn field_kind(&self, field: &str) -> ValueKind {
        let has_text = self
            .points
            .values()
            .filter_map(|record| record.get(field))
            .any(|value| value.kind() == ValueKind::Text);
        if has_text {
            ValueKind::Text
        } else {
            ValueKind::Numeric
        }
    }
}
