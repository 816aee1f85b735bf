//! Sparse alignment: rows come from a reference clock.
//!
//! The reference is the first non-empty dataset in
//! [`Category::SPARSITY_RANK`](crate::domain::Category::SPARSITY_RANK). Its
//! points inside `[start, end]` are the only rows; no calendar filling and no
//! synthesized rows. Every other dataset is forward-filled across the union
//! of its own timestamps and the reference timestamps, then projected back
//! onto the reference timestamps, so a value dated between two reference
//! points is carried into the next one.

use chrono::NaiveDate;

use crate::domain::Datasets;
use crate::engine::AlignOptions;
use crate::fill::forward_fill;
use crate::layout::ColumnLayout;
use crate::table::{AlignMode, AlignedTable, AlignmentOutcome, ColumnSpec, EmptyReason};

/// Align `datasets` onto the reference dataset's points inside `[start, end]`.
pub fn align_sparse(
    entity: &str,
    start: NaiveDate,
    end: NaiveDate,
    datasets: &Datasets,
    options: &AlignOptions,
) -> AlignmentOutcome {
    let Some(reference) = datasets.sparsest() else {
        return AlignmentOutcome::Empty(EmptyReason::NoDatasetsAvailable);
    };

    let in_range: Vec<_> = reference.series.range(start, end).collect();
    if in_range.is_empty() {
        tracing::warn!(
            entity,
            reference = %reference.category,
            %start,
            %end,
            "sparse reference has no points in range"
        );
        return AlignmentOutcome::Empty(EmptyReason::RangeExcludesAllPoints);
    }

    let index: Vec<NaiveDate> = in_range.iter().map(|(date, _)| *date).collect();
    let mut table = AlignedTable::new(entity, start, end, AlignMode::Sparse, index);
    table.reference = Some(reference.category);

    let mut layout = ColumnLayout::new(options.collision);

    // The reference contributes its own records verbatim.
    for field in reference.series.fields() {
        let values = in_range
            .iter()
            .map(|(_, record)| record.get(field).cloned())
            .collect();
        let spec = ColumnSpec {
            name: layout.claim(reference.category, field),
            field: field.clone(),
            dataset: reference.category,
            kind: reference.series.field_kind(field),
        };
        table.push_column(spec, values);
    }
    table.contributors.push(reference.category);

    for dataset in datasets
        .iter_non_empty()
        .filter(|d| d.category != reference.category)
    {
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
