//! Data model shared by every pipeline step.
//!
//! All values are immutable once built: each step borrows its input and
//! returns a fresh value, so nothing aliases back into the caller's data.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::{Granularity, RankingKind, Reducer};
use crate::error::{PipelineError, Result};
use crate::utils::date_column;

/// One cleaned input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// First day of the period bucket.
    pub period: NaiveDate,
    pub category: String,
    pub value: f64,
}

impl Observation {
    pub fn new(period: NaiveDate, category: impl Into<String>, value: f64) -> Self {
        Self {
            period,
            category: category.into(),
            value,
        }
    }
}

/// Cleaned observations in input order.
///
/// Every value is finite, every category is non-empty and every period is a
/// bucket start for `granularity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    observations: Vec<Observation>,
    granularity: Granularity,
    rows_read: usize,
    rows_dropped: usize,
}

impl NormalizedSeries {
    pub(crate) fn new(
        observations: Vec<Observation>,
        granularity: Granularity,
        rows_read: usize,
        rows_dropped: usize,
    ) -> Self {
        Self {
            observations,
            granularity,
            rows_read,
            rows_dropped,
        }
    }

    /// Build a series from observations that are already clean.
    ///
    /// Observations with a non-finite value or an empty category are dropped,
    /// so the series invariants hold whatever the caller passes in.
    pub fn from_observations(observations: Vec<Observation>, granularity: Granularity) -> Self {
        let rows_read = observations.len();
        let observations: Vec<Observation> = observations
            .into_iter()
            .filter(|obs| obs.value.is_finite() && !obs.category.trim().is_empty())
            .collect();
        let rows_dropped = rows_read - observations.len();
        Self::new(observations, granularity, rows_read, rows_dropped)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Number of raw rows this series was built from.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Number of raw rows discarded during cleaning and filtering.
    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.observations
            .iter()
            .filter(|obs| seen.insert(obs.category.as_str()))
            .map(|obs| obs.category.as_str())
            .collect()
    }

    /// Keep the observations matching `keep`; removed rows count as dropped.
    pub fn filter<F>(&self, mut keep: F) -> NormalizedSeries
    where
        F: FnMut(&Observation) -> bool,
    {
        let observations: Vec<Observation> = self
            .observations
            .iter()
            .filter(|obs| keep(obs))
            .cloned()
            .collect();
        let removed = self.observations.len() - observations.len();
        Self::new(
            observations,
            self.granularity,
            self.rows_read,
            self.rows_dropped + removed,
        )
    }

    /// Keep only the categories chosen by a ranking.
    pub fn retain_categories(&self, selection: &SelectionResult) -> NormalizedSeries {
        let wanted: HashSet<&str> = selection.labels().iter().map(String::as_str).collect();
        self.filter(|obs| wanted.contains(obs.category.as_str()))
    }

    /// Replace every category label, keeping periods and values.
    pub(crate) fn map_categories<F>(&self, mut relabel: F) -> NormalizedSeries
    where
        F: FnMut(&str) -> String,
    {
        let observations = self
            .observations
            .iter()
            .map(|obs| Observation {
                period: obs.period,
                category: relabel(&obs.category),
                value: obs.value,
            })
            .collect();
        Self::new(
            observations,
            self.granularity,
            self.rows_read,
            self.rows_dropped,
        )
    }
}

/// Per-category summary used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub total: f64,
    /// Position of the category's first observation in the series.
    pub first_seen: usize,
}

/// Category statistics, iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    stats: Vec<CategoryStat>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CategoryStats {
    pub(crate) fn from_ordered(stats: Vec<CategoryStat>) -> Self {
        let index = stats
            .iter()
            .enumerate()
            .map(|(idx, stat)| (stat.category.clone(), idx))
            .collect();
        Self { stats, index }
    }

    pub fn get(&self, category: &str) -> Option<&CategoryStat> {
        self.index.get(category).map(|&idx| &self.stats[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CategoryStat> {
        self.stats.iter()
    }

    pub fn as_slice(&self) -> &[CategoryStat] {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// Up to k unique category labels, best ranked first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    strategy: RankingKind,
    labels: Vec<String>,
}

impl SelectionResult {
    pub(crate) fn new(strategy: RankingKind, labels: Vec<String>) -> Self {
        Self { strategy, labels }
    }

    pub fn strategy(&self) -> RankingKind {
        self.strategy
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, category: &str) -> bool {
        self.labels.iter().any(|label| label == category)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One reduced `(period, category)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub period: NaiveDate,
    pub category: String,
    pub value: f64,
}

/// Reduced groups, ordered by period then category, one row per pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedTable {
    reducer: Reducer,
    rows: Vec<AggregatedRow>,
}

impl AggregatedTable {
    pub(crate) fn new(reducer: Reducer, rows: Vec<AggregatedRow>) -> Self {
        Self { reducer, rows }
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    pub fn rows(&self) -> &[AggregatedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct categories in ascending order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.rows.iter().map(|r| r.category.as_str()).collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Extract one category as a single-value series named after it.
    ///
    /// Returns an empty series when the category is absent.
    pub fn series(&self, category: &str) -> PeriodSeries {
        let points = self
            .rows
            .iter()
            .filter(|row| row.category == category)
            .map(|row| PeriodValue {
                period: row.period,
                value: row.value,
            })
            .collect();
        // rows are unique per (period, category) and already period-ordered
        PeriodSeries {
            name: category.to_string(),
            points,
        }
    }

    /// Long-format frame with columns `period` (Date), `category`, `value`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let periods: Vec<NaiveDate> = self.rows.iter().map(|r| r.period).collect();
        let categories: Vec<&str> = self.rows.iter().map(|r| r.category.as_str()).collect();
        let values: Vec<f64> = self.rows.iter().map(|r| r.value).collect();

        DataFrame::new(vec![
            date_column(PERIOD_COLUMN, &periods)?,
            Column::new("category".into(), categories),
            Column::new("value".into(), values),
        ])
    }
}

/// Name of the date column in exported frames.
const PERIOD_COLUMN: &str = "period";

// Series names become column names next to the period column.
fn value_column_name(name: &str, suffix: &str) -> String {
    if name == PERIOD_COLUMN {
        format!("{}_{}", name, suffix)
    } else {
        name.to_string()
    }
}

/// A single value for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodValue {
    pub period: NaiveDate,
    pub value: f64,
}

/// A named series holding at most one value per period, ordered by period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSeries {
    name: String,
    points: Vec<PeriodValue>,
}

impl PeriodSeries {
    /// Build a series, sorting by period and rejecting repeated periods.
    pub fn new(name: impl Into<String>, mut points: Vec<PeriodValue>) -> Result<Self> {
        let name = name.into();
        points.sort_by_key(|point| point.period);
        if let Some(pair) = points.windows(2).find(|pair| pair[0].period == pair[1].period) {
            return Err(PipelineError::AmbiguousPeriod {
                series: name,
                period: pair[0].period.to_string(),
            });
        }
        Ok(Self { name, points })
    }

    pub(crate) fn from_sorted(name: impl Into<String>, points: Vec<PeriodValue>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[PeriodValue] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rename the series, e.g. before merging two series with the same name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Frame with columns `period` (Date) and the series name.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let periods: Vec<NaiveDate> = self.points.iter().map(|p| p.period).collect();
        let values: Vec<f64> = self.points.iter().map(|p| p.value).collect();

        let name = value_column_name(&self.name, "value");
        DataFrame::new(vec![
            date_column(PERIOD_COLUMN, &periods)?,
            Column::new(name.as_str().into(), values),
        ])
    }
}

/// One period shared by both merged series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub period: NaiveDate,
    pub left: f64,
    pub right: f64,
}

/// Inner join of two series on period, ordered by period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTable {
    left_name: String,
    right_name: String,
    rows: Vec<MergedRow>,
}

impl MergedTable {
    pub(crate) fn new(left_name: String, right_name: String, rows: Vec<MergedRow>) -> Self {
        Self {
            left_name,
            right_name,
            rows,
        }
    }

    pub fn left_name(&self) -> &str {
        &self.left_name
    }

    pub fn right_name(&self) -> &str {
        &self.right_name
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the two series had no period in common.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Frame with columns `period` (Date), left name and right name.
    ///
    /// Identical series names, or a name equal to `period`, get `_left` /
    /// `_right` suffixes.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let (left, right) = if self.left_name == self.right_name {
            (
                format!("{}_left", self.left_name),
                format!("{}_right", self.right_name),
            )
        } else {
            (
                value_column_name(&self.left_name, "left"),
                value_column_name(&self.right_name, "right"),
            )
        };

        let periods: Vec<NaiveDate> = self.rows.iter().map(|r| r.period).collect();
        let left_values: Vec<f64> = self.rows.iter().map(|r| r.left).collect();
        let right_values: Vec<f64> = self.rows.iter().map(|r| r.right).collect();

        DataFrame::new(vec![
            date_column(PERIOD_COLUMN, &periods)?,
            Column::new(left.as_str().into(), left_values),
            Column::new(right.as_str().into(), right_values),
        ])
    }
}

/// Row and group accounting for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub rows_used: usize,
    pub categories_before: usize,
    pub categories_selected: usize,
    pub groups: usize,
    pub duration_ms: u64,
}

/// Everything computed by one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub summary: RunSummary,
    /// Statistics of the categories considered for ranking.
    pub stats: CategoryStats,
    /// Categories kept by the ranking, if one was configured.
    pub selection: Option<SelectionResult>,
    /// Observations that went into the aggregation.
    #[serde(skip)]
    pub series: NormalizedSeries,
    pub table: AggregatedTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_observations_drops_invalid_rows() {
        let series = NormalizedSeries::from_observations(
            vec![
                Observation::new(day(1997, 1, 1), "A", 1.0),
                Observation::new(day(1997, 1, 1), "  ", 2.0),
                Observation::new(day(1997, 1, 1), "B", f64::NAN),
            ],
            Granularity::Quarter,
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series.rows_read(), 3);
        assert_eq!(series.rows_dropped(), 2);
    }

    #[test]
    fn test_categories_first_seen_order() {
        let series = NormalizedSeries::from_observations(
            vec![
                Observation::new(day(1997, 1, 1), "B", 1.0),
                Observation::new(day(1997, 1, 1), "A", 1.0),
                Observation::new(day(1997, 4, 1), "B", 1.0),
            ],
            Granularity::Quarter,
        );
        assert_eq!(series.categories(), vec!["B", "A"]);
    }

    #[test]
    fn test_period_series_rejects_repeated_period() {
        let result = PeriodSeries::new(
            "GDP",
            vec![
                PeriodValue { period: day(1997, 4, 1), value: 1.0 },
                PeriodValue { period: day(1997, 4, 1), value: 2.0 },
            ],
        );
        assert_eq!(result.unwrap_err().error_code(), "AMBIGUOUS_PERIOD");
    }

    #[test]
    fn test_period_series_sorts_points() {
        let series = PeriodSeries::new(
            "CPI",
            vec![
                PeriodValue { period: day(1997, 4, 1), value: 2.0 },
                PeriodValue { period: day(1997, 1, 1), value: 1.0 },
            ],
        )
        .unwrap();
        assert_eq!(series.points()[0].period, day(1997, 1, 1));
    }

    #[test]
    fn test_aggregated_table_to_dataframe() {
        let table = AggregatedTable::new(
            Reducer::Mean,
            vec![
                AggregatedRow { period: day(1997, 1, 1), category: "A".into(), value: 15.0 },
                AggregatedRow { period: day(1997, 1, 1), category: "B".into(), value: 5.0 },
            ],
        );
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("period").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("value").unwrap().f64().unwrap().get(0), Some(15.0));
    }

    #[test]
    fn test_merged_table_dataframe_suffixes_same_names() {
        let table = MergedTable::new(
            "VALUE".into(),
            "VALUE".into(),
            vec![MergedRow { period: day(2000, 1, 1), left: 1.0, right: 2.0 }],
        );
        let df = table.to_dataframe().unwrap();
        assert!(df.column("VALUE_left").is_ok());
        assert!(df.column("VALUE_right").is_ok());
    }

    #[test]
    fn test_period_series_named_period_exports() {
        let series = PeriodSeries::new(
            "period",
            vec![PeriodValue { period: day(2000, 1, 1), value: 3.0 }],
        )
        .unwrap();
        let df = series.to_dataframe().unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["period", "period_value"]);
        assert_eq!(df.column("period").unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn test_merged_table_dataframe_suffixes_period_name() {
        let table = MergedTable::new(
            "period".into(),
            "CPI".into(),
            vec![MergedRow { period: day(2000, 1, 1), left: 1.0, right: 2.0 }],
        );
        let df = table.to_dataframe().unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["period", "period_left", "CPI"]);
    }
}
