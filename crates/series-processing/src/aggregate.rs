//! Grouped aggregation by (period, category) or by period alone.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

use crate::config::Reducer;
use crate::error::{PipelineError, Result};
use crate::types::{AggregatedRow, AggregatedTable, NormalizedSeries, PeriodSeries, PeriodValue};

/// Running sum and count for one group.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn finish(self, reducer: Reducer) -> f64 {
        match reducer {
            Reducer::Sum => self.sum,
            Reducer::Mean => self.sum / self.count as f64,
        }
    }
}

/// Reduce values sharing an exact `(period, category)` pair.
///
/// Output rows are sorted ascending by period, then category label.
pub fn aggregate(series: &NormalizedSeries, reducer: Reducer) -> Result<AggregatedTable> {
    if series.is_empty() {
        return Err(PipelineError::EmptyInput {
            stage: "aggregation",
        });
    }

    let mut groups: HashMap<(NaiveDate, &str), Accumulator> = HashMap::new();
    for obs in series.iter() {
        groups
            .entry((obs.period, obs.category.as_str()))
            .or_default()
            .push(obs.value);
    }

    let mut rows: Vec<AggregatedRow> = groups
        .into_iter()
        .map(|((period, category), acc)| AggregatedRow {
            period,
            category: category.to_string(),
            value: acc.finish(reducer),
        })
        .collect();

    rows.sort_by(|a, b| {
        a.period
            .cmp(&b.period)
            .then_with(|| a.category.cmp(&b.category))
    });

    debug!(
        "Aggregated {} observations into {} groups ({})",
        series.len(),
        rows.len(),
        reducer
    );

    Ok(AggregatedTable::new(reducer, rows))
}

/// Reduce all values sharing a period, ignoring categories.
pub fn aggregate_periods(
    series: &NormalizedSeries,
    reducer: Reducer,
    name: impl Into<String>,
) -> Result<PeriodSeries> {
    if series.is_empty() {
        return Err(PipelineError::EmptyInput {
            stage: "period aggregation",
        });
    }

    let mut groups: HashMap<NaiveDate, Accumulator> = HashMap::new();
    for obs in series.iter() {
        groups.entry(obs.period).or_default().push(obs.value);
    }

    let mut points: Vec<PeriodValue> = groups
        .into_iter()
        .map(|(period, acc)| PeriodValue {
            period,
            value: acc.finish(reducer),
        })
        .collect();
    points.sort_by_key(|point| point.period);

    Ok(PeriodSeries::from_sorted(name, points))
}
