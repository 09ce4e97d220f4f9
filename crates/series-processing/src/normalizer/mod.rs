//! Normalization of raw observation tables.
//!
//! This module turns a loaded `DataFrame` into a [`NormalizedSeries`]:
//! - column labels are cleaned before lookup (whitespace, BOM artifacts)
//! - period labels are parsed and truncated to their bucket start
//! - rows with a missing value, empty category or unparseable period are dropped
//! - an optional date cut-off removes early observations
//!
//! Both long tables (period, category, value) and wide tables (period plus one
//! column per measure) are supported.

mod filters;
pub mod period;

pub use filters::apply_category_filters;
pub use period::{bucket_start, parse_period, parse_period_date};

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::types::{NormalizedSeries, Observation};
use crate::utils::{clean_label, column_strings, column_values};

/// Why a raw row was discarded.
#[derive(Debug, Default, Clone, Copy)]
struct DropCounts {
    bad_period: usize,
    empty_category: usize,
    missing_value: usize,
    before_cutoff: usize,
}

impl DropCounts {
    fn total(&self) -> usize {
        self.bad_period + self.empty_category + self.missing_value + self.before_cutoff
    }
}

/// Normalize a raw table according to `config`.
///
/// # Errors
///
/// - [`PipelineError::Schema`] when a configured column is missing
/// - [`PipelineError::Parse`] for an unparseable period when `strict_periods` is set
/// - [`PipelineError::EmptyInput`] when no row survives cleaning
pub fn normalize(df: &DataFrame, config: &PipelineConfig) -> Result<NormalizedSeries> {
    let columns = ColumnIndex::new(df);
    let periods = column_strings(columns.resolve(df, &config.period_column)?)?;

    let mut observations = Vec::new();
    let mut drops = DropCounts::default();

    let rows_read = if config.is_wide() {
        let measures = config
            .measure_columns
            .iter()
            .map(|name| {
                let series = columns.resolve(df, name)?;
                Ok((clean_label(name), column_values(series)?))
            })
            .collect::<Result<Vec<_>>>()?;

        for (row, label) in periods.iter().enumerate() {
            let Some(date) = read_period(label.as_deref(), config, &mut drops, measures.len())?
            else {
                continue;
            };
            for (category, values) in &measures {
                push_observation(
                    &mut observations,
                    &mut drops,
                    date,
                    category.clone(),
                    values[row],
                    config,
                );
            }
        }
        periods.len() * measures.len()
    } else {
        let categories = column_strings(columns.resolve(df, &config.category_column)?)?;
        let values = column_values(columns.resolve(df, &config.value_column)?)?;

        for (row, label) in periods.iter().enumerate() {
            let Some(date) = read_period(label.as_deref(), config, &mut drops, 1)? else {
                continue;
            };
            let category = categories[row].as_deref().map(clean_label).unwrap_or_default();
            push_observation(
                &mut observations,
                &mut drops,
                date,
                category,
                values[row],
                config,
            );
        }
        periods.len()
    };

    debug!(
        "Dropped rows: {} unparseable period, {} empty category, {} missing value, {} before cut-off",
        drops.bad_period, drops.empty_category, drops.missing_value, drops.before_cutoff
    );

    if observations.is_empty() {
        return Err(PipelineError::EmptyInput {
            stage: "normalization",
        });
    }

    info!(
        "Normalized {} observations from {} raw rows ({} dropped)",
        observations.len(),
        rows_read,
        drops.total()
    );

    Ok(NormalizedSeries::new(
        observations,
        config.granularity,
        rows_read,
        drops.total(),
    ))
}

/// Parse one period label, counting `weight` drops when it is unusable.
fn read_period(
    label: Option<&str>,
    config: &PipelineConfig,
    drops: &mut DropCounts,
    weight: usize,
) -> Result<Option<NaiveDate>> {
    let parsed = label.and_then(parse_period_date);
    if parsed.is_none() {
        if config.strict_periods {
            return Err(PipelineError::Parse {
                label: label.unwrap_or_default().to_string(),
                granularity: config.granularity,
            });
        }
        drops.bad_period += weight;
    }
    Ok(parsed)
}

fn push_observation(
    observations: &mut Vec<Observation>,
    drops: &mut DropCounts,
    date: NaiveDate,
    category: String,
    value: Option<f64>,
    config: &PipelineConfig,
) {
    if category.is_empty() {
        drops.empty_category += 1;
        return;
    }
    let Some(value) = value else {
        drops.missing_value += 1;
        return;
    };
    if config.drop_before.is_some_and(|cutoff| date < cutoff) {
        drops.before_cutoff += 1;
        return;
    }
    observations.push(Observation {
        period: bucket_start(date, config.granularity),
        category,
        value,
    });
}

/// Maps cleaned column labels to the names stored in the frame.
struct ColumnIndex {
    by_clean_label: HashMap<String, String>,
    available: Vec<String>,
}

impl ColumnIndex {
    fn new(df: &DataFrame) -> Self {
        let mut by_clean_label = HashMap::new();
        let mut available = Vec::new();
        for name in df.get_column_names() {
            let cleaned = clean_label(name.as_str());
            available.push(cleaned.clone());
            by_clean_label
                .entry(cleaned)
                .or_insert_with(|| name.to_string());
        }
        Self {
            by_clean_label,
            available,
        }
    }

    fn resolve<'a>(&self, df: &'a DataFrame, wanted: &str) -> Result<&'a Series> {
        let missing = || PipelineError::Schema {
            column: wanted.to_string(),
            available: self.available.clone(),
        };
        let name = self
            .by_clean_label
            .get(&clean_label(wanted))
            .ok_or_else(missing)?;
        let column = df.column(name).map_err(|_| missing())?;
        Ok(column.as_materialized_series())
    }
}
