//! Category statistics and top-k selection.
//!
//! Ranking strategies are policy objects behind the [`RankingStrategy`] trait.
//! Each one defines a total order over [`CategoryStat`]s, so the selection is
//! deterministic for identical input and never depends on hash iteration order.

mod statistics;
mod strategies;

pub use statistics::compute_stats;
pub use strategies::{ByCumulativeValue, ByFrequency, ByVariation};

use std::cmp::Ordering;
use tracing::debug;

use crate::config::RankingKind;
use crate::types::{CategoryStat, CategoryStats, SelectionResult};

/// Trait for top-k category selection policies.
///
/// Implementors only define the ordering; selection is shared.
pub trait RankingStrategy: Send + Sync {
    /// Which built-in kind this strategy corresponds to.
    fn kind(&self) -> RankingKind;

    /// Maximum number of labels to select.
    fn k(&self) -> usize;

    /// Order two categories, best ranked first.
    ///
    /// Must be a total order that never returns `Equal` for distinct labels.
    fn compare(&self, a: &CategoryStat, b: &CategoryStat) -> Ordering;

    /// Select at most `k` labels in descending rank.
    fn select(&self, stats: &CategoryStats) -> SelectionResult {
        let mut ranked: Vec<&CategoryStat> = stats.iter().collect();
        ranked.sort_by(|a, b| self.compare(a, b));

        let labels: Vec<String> = ranked
            .into_iter()
            .take(self.k())
            .map(|stat| stat.category.clone())
            .collect();

        debug!("Selected by {}: {:?}", self.kind(), labels);
        SelectionResult::new(self.kind(), labels)
    }
}

/// Build the strategy for a configured ranking kind.
pub fn strategy_for(kind: RankingKind, k: usize) -> Box<dyn RankingStrategy> {
    match kind {
        RankingKind::Frequency => Box::new(ByFrequency::new(k)),
        RankingKind::Variation => Box::new(ByVariation::new(k)),
        RankingKind::Cumulative => Box::new(ByCumulativeValue::new(k)),
    }
}
