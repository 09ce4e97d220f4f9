//! Category filters applied after normalization.

use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::types::NormalizedSeries;

/// Remove excluded categories and keep only those matching `include_matching`.
///
/// Exclusion is by exact label; inclusion is a case-insensitive substring test.
/// Returns [`PipelineError::EmptyInput`] when the filters remove everything.
pub fn apply_category_filters(
    series: &NormalizedSeries,
    config: &PipelineConfig,
) -> Result<NormalizedSeries> {
    if config.exclude_categories.is_empty() && config.include_matching.is_none() {
        return Ok(series.clone());
    }

    let needle = config
        .include_matching
        .as_deref()
        .map(|text| text.trim().to_lowercase());

    let filtered = series.filter(|obs| {
        let excluded = config
            .exclude_categories
            .iter()
            .any(|label| label.trim() == obs.category);
        let included = needle
            .as_deref()
            .is_none_or(|needle| obs.category.to_lowercase().contains(needle));
        !excluded && included
    });

    debug!(
        "Category filters kept {} of {} observations",
        filtered.len(),
        series.len()
    );

    if filtered.is_empty() {
        return Err(PipelineError::EmptyInput {
            stage: "category filtering",
        });
    }
    Ok(filtered)
}
