//! Keyword-based category reclassification.
//!
//! Classification rules are data: an ordered list of [`KeywordGroup`]s plus a
//! default label. A category takes the label of the first group with any
//! keyword occurring in it (case-insensitive substring), or the default label
//! when nothing matches. Group order therefore decides the outcome for
//! categories matching several groups.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::NormalizedSeries;

/// A target label and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new<I, S>(label: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Compiled form of an ordered keyword group list.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    // (label, lowercased non-empty keywords), in configured order
    groups: Vec<(String, Vec<String>)>,
    default_label: String,
}

impl KeywordClassifier {
    pub fn new(groups: &[KeywordGroup], default_label: impl Into<String>) -> Self {
        let groups = groups
            .iter()
            .map(|group| {
                let keywords = group
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (group.label.clone(), keywords)
            })
            .collect();

        Self {
            groups,
            default_label: default_label.into(),
        }
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Label for one category string. Always returns exactly one label.
    pub fn classify(&self, category: &str) -> &str {
        let lowered = category.to_lowercase();
        self.groups
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(label, _)| label.as_str())
            .unwrap_or(self.default_label.as_str())
    }
}

/// Replace each observation's category with its classified label.
pub fn reclassify(series: &NormalizedSeries, classifier: &KeywordClassifier) -> NormalizedSeries {
    let relabeled = series.map_categories(|category| classifier.classify(category).to_string());
    debug!(
        "Reclassified {} categories into {}",
        series.categories().len(),
        relabeled.categories().len()
    );
    relabeled
}
