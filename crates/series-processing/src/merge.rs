//! Inner join of two single-value series on period.
//!
//! Two series with no period in common produce an empty [`MergedTable`], not an
//! error; callers that need to tell the cases apart check
//! [`MergedTable::is_empty`].

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::{MergedRow, MergedTable, PeriodSeries};

/// Join `left` and `right` on period, keeping only shared periods.
pub fn merge(left: &PeriodSeries, right: &PeriodSeries) -> MergedTable {
    let right_values: HashMap<_, f64> = right
        .points()
        .iter()
        .map(|point| (point.period, point.value))
        .collect();

    // left points are period-ordered, so the output is too
    let rows: Vec<MergedRow> = left
        .points()
        .iter()
        .filter_map(|point| {
            right_values.get(&point.period).map(|&value| MergedRow {
                period: point.period,
                left: point.value,
                right: value,
            })
        })
        .collect();

    if rows.is_empty() {
        warn!(
            "Series '{}' and '{}' share no periods; merged table is empty",
            left.name(),
            right.name()
        );
    } else {
        debug!(
            "Merged '{}' ({}) with '{}' ({}) on {} shared periods",
            left.name(),
            left.len(),
            right.name(),
            right.len(),
            rows.len()
        );
    }

    MergedTable::new(left.name().to_string(), right.name().to_string(), rows)
}
