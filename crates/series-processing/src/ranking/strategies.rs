//! The three built-in ranking strategies.

use std::cmp::Ordering;

use super::RankingStrategy;
use crate::config::RankingKind;
use crate::types::CategoryStat;

/// Most observations first; ties keep first-seen order.
#[derive(Debug, Clone, Copy)]
pub struct ByFrequency {
    k: usize,
}

impl ByFrequency {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl RankingStrategy for ByFrequency {
    fn kind(&self) -> RankingKind {
        RankingKind::Frequency
    }

    fn k(&self) -> usize {
        self.k
    }

    fn compare(&self, a: &CategoryStat, b: &CategoryStat) -> Ordering {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    }
}

/// Widest range first; ties broken by ascending label.
#[derive(Debug, Clone, Copy)]
pub struct ByVariation {
    k: usize,
}

impl ByVariation {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl RankingStrategy for ByVariation {
    fn kind(&self) -> RankingKind {
        RankingKind::Variation
    }

    fn k(&self) -> usize {
        self.k
    }

    fn compare(&self, a: &CategoryStat, b: &CategoryStat) -> Ordering {
        b.range
            .total_cmp(&a.range)
            .then_with(|| a.category.cmp(&b.category))
    }
}

/// Largest total first; ties broken by ascending label.
#[derive(Debug, Clone, Copy)]
pub struct ByCumulativeValue {
    k: usize,
}

impl ByCumulativeValue {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl RankingStrategy for ByCumulativeValue {
    fn kind(&self) -> RankingKind {
        RankingKind::Cumulative
    }

    fn k(&self) -> usize {
        self.k
    }

    fn compare(&self, a: &CategoryStat, b: &CategoryStat) -> Ordering {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    }
}
