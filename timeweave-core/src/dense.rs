//! Dense alignment: one row per calendar day.
//!
//! Every non-empty dataset is forward-filled onto the full day index of the
//! requested range and joined in processing order. A value dated before
//! `start` carries into the range; nothing before `start` becomes a row.

use chrono::NaiveDate;

use crate::domain::Datasets;
use crate::engine::AlignOptions;
use crate::fill::{calendar_days, forward_fill};
use crate::layout::ColumnLayout;
use crate::table::{AlignMode, AlignedTable, AlignmentOutcome, ColumnSpec, EmptyReason};

/// Align `datasets` onto every day of `[start, end]`.
///
/// The caller validates `start <= end`. When at least one dataset is
/// non-empty the table has exactly `(end - start).num_days() + 1` rows.
pub fn align_dense(
    entity: &str,
    start: NaiveDate,
    end: NaiveDate,
    datasets: &Datasets,
    options: &AlignOptions,
) -> AlignmentOutcome {
    if datasets.all_empty() {
        return AlignmentOutcome::Empty(EmptyReason::NoDatasetsAvailable);
    }

    let index = calendar_days(start, end);
    let mut table = AlignedTable::new(entity, start, end, AlignMode::Dense, index);

    let mut layout = ColumnLayout::new(options.collision);
    for dataset in datasets.iter_non_empty() {
        let filled = forward_fill(&dataset.series, table.index());
        for (field, values) in dataset.series.fields().iter().zip(filled) {
            let spec = ColumnSpec {
                name: layout.claim(dataset.category, field),
                field: field.clone(),
                dataset: dataset.category,
                kind: dataset.series.field_kind(field),
            };
            table.push_column(spec, values);
        }
        table.contributors.push(dataset.category);
    }
    table.set_layout(layout);

    AlignmentOutcome::Aligned(table)
}
