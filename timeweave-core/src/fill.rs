//! As-of forward fill.
//!
//! Every target date takes, per field, the latest non-null value observed at
//! a source timestamp on or before it. The walk merges the source timestamps
//! with the target index, so a value dated strictly between two target dates
//! is still seen by the next target date, and anything dated before the first
//! target date carries into it. Nothing is interpolated: a field with no
//! prior value stays null.

use chrono::NaiveDate;

use crate::domain::{Series, Value};

/// Forward-fill `series` onto `index`.
///
/// Returns one column per entry of `series.fields()`, each with one cell per
/// index date. `index` must be strictly increasing.
pub fn forward_fill(series: &Series, index: &[NaiveDate]) -> Vec<Vec<Option<Value>>> {
    debug_assert!(
        index.windows(2).all(|w| w[0] < w[1]),
        "target index must be strictly increasing"
    );

    let fields = series.fields();
    let mut last: Vec<Option<&Value>> = vec![None; fields.len()];
    let mut columns: Vec<Vec<Option<Value>>> =
        (0..fields.len()).map(|_| Vec::with_capacity(index.len())).collect();

    let mut points = series.iter().peekable();
    for &target in index {
        while let Some((_, record)) = points.next_if(|(date, _)| *date <= target) {
            for (slot, field) in last.iter_mut().zip(fields) {
                if let Some(value) = record.get(field) {
                    *slot = Some(value);
                }
            }
        }
        for (column, value) in columns.iter_mut().zip(last.iter().copied()) {
            column.push(value.cloned());
        }
    }

    columns
}

/// Every calendar day from `start` to `end` inclusive. Empty if inverted.
pub fn calendar_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}
