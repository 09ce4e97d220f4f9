//! Per-category statistics.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::types::{CategoryStat, CategoryStats, NormalizedSeries};

/// Count, min, max, range and total per category in one pass.
///
/// Categories keep the order in which they first appear in the series.
pub fn compute_stats(series: &NormalizedSeries) -> Result<CategoryStats> {
    if series.is_empty() {
        return Err(PipelineError::EmptyInput {
            stage: "category statistics",
        });
    }

    let mut stats: Vec<CategoryStat> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (position, obs) in series.iter().enumerate() {
        match index.get(obs.category.as_str()) {
            Some(&idx) => {
                let stat = &mut stats[idx];
                stat.count += 1;
                stat.min = stat.min.min(obs.value);
                stat.max = stat.max.max(obs.value);
                stat.total += obs.value;
            }
            None => {
                index.insert(obs.category.as_str(), stats.len());
                stats.push(CategoryStat {
                    category: obs.category.clone(),
                    count: 1,
                    min: obs.value,
                    max: obs.value,
                    range: 0.0,
                    total: obs.value,
                    first_seen: position,
                });
            }
        }
    }

    for stat in &mut stats {
        stat.range = stat.max - stat.min;
    }

    Ok(CategoryStats::from_ordered(stats))
}
