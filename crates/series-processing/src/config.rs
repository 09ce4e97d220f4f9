//! Configuration types for the aggregation pipeline.
//!
//! Column names, bucketing, ranking and reduction are all configuration so that
//! one pipeline serves every report. Use [`PipelineConfig::builder()`] for a
//! validated configuration, or deserialize one from JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reclassify::KeywordGroup;

/// Calendar bucket used as the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Truncate dates to the first day of their quarter
    #[default]
    Quarter,
    /// Truncate dates to the first day of their month
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Quarter => write!(f, "quarter"),
            Granularity::Month => write!(f, "month"),
        }
    }
}

/// Reduction applied to the values sharing a group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Unweighted arithmetic mean
    #[default]
    Mean,
    /// Arithmetic total
    Sum,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Mean => write!(f, "mean"),
            Reducer::Sum => write!(f, "sum"),
        }
    }
}

/// Strategy used to pick the top-k categories before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingKind {
    /// Most observations first
    Frequency,
    /// Widest value range (max - min) first
    Variation,
    /// Largest value total first
    Cumulative,
}

impl fmt::Display for RankingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingKind::Frequency => write!(f, "frequency"),
            RankingKind::Variation => write!(f, "variation"),
            RankingKind::Cumulative => write!(f, "cumulative"),
        }
    }
}

/// Configuration for one pipeline run.
///
/// # Example
///
/// ```rust,ignore
/// use series_processing::config::{PipelineConfig, RankingKind, Reducer};
///
/// let config = PipelineConfig::builder()
///     .category_column("North American Product Classification System (NAPCS)")
///     .ranking(RankingKind::Variation)
///     .top_k(5)
///     .reducer(Reducer::Mean)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Column holding the period label (e.g. "1997Q1" or "1997-01-01").
    /// Default: "REF_DATE"
    pub period_column: String,

    /// Column holding the category label (long layout only).
    /// Default: "GEO"
    pub category_column: String,

    /// Column holding the numeric value (long layout only).
    /// Default: "VALUE"
    pub value_column: String,

    /// Value columns of a wide table. When non-empty, each column becomes a
    /// category named after it and `category_column`/`value_column` are unused.
    /// Default: empty (long layout)
    pub measure_columns: Vec<String>,

    /// Bucket size for the period axis.
    /// Default: Quarter
    pub granularity: Granularity,

    /// Ranking used to keep only the top categories.
    /// Default: None (keep every category)
    pub ranking: Option<RankingKind>,

    /// Number of categories kept by the ranking.
    /// Default: 5
    pub top_k: usize,

    /// Reduction applied per (period, category).
    /// Default: Mean
    pub reducer: Reducer,

    /// Ordered keyword groups used to relabel categories. First match wins.
    /// Default: empty (no reclassification)
    pub keyword_groups: Vec<KeywordGroup>,

    /// Label assigned when no keyword group matches.
    /// Default: "Other"
    pub default_label: String,

    /// Observations dated before this day are discarded.
    /// Default: None
    pub drop_before: Option<NaiveDate>,

    /// Categories removed by exact label (e.g. national aggregates).
    /// Default: empty
    pub exclude_categories: Vec<String>,

    /// Keep only categories containing this text (case-insensitive).
    /// Default: None
    pub include_matching: Option<String>,

    /// Fail on an unparseable period instead of dropping the row.
    /// Default: false
    pub strict_periods: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            period_column: "REF_DATE".to_string(),
            category_column: "GEO".to_string(),
            value_column: "VALUE".to_string(),
            measure_columns: Vec::new(),
            granularity: Granularity::default(),
            ranking: None,
            top_k: 5,
            reducer: Reducer::default(),
            keyword_groups: Vec::new(),
            default_label: "Other".to_string(),
            drop_before: None,
            exclude_categories: Vec::new(),
            include_matching: None,
            strict_periods: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Whether the input is a wide table of measure columns.
    pub fn is_wide(&self) -> bool {
        !self.measure_columns.is_empty()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.period_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName("period_column"));
        }

        if self.is_wide() {
            if self.measure_columns.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigValidationError::EmptyColumnName("measure_columns"));
            }
        } else {
            if self.category_column.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName("category_column"));
            }
            if self.value_column.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName("value_column"));
            }
        }

        if self.ranking.is_some() && self.top_k == 0 {
            return Err(ConfigValidationError::InvalidTopK(self.top_k));
        }

        if let Some(index) = self
            .keyword_groups
            .iter()
            .position(|group| group.label.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptyGroupLabel(index));
        }

        if !self.keyword_groups.is_empty() && self.default_label.trim().is_empty() {
            return Err(ConfigValidationError::EmptyDefaultLabel);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(&'static str),

    #[error("Invalid top_k: {0} (must be at least 1 when a ranking is set)")]
    InvalidTopK(usize),

    #[error("Keyword group #{0} has an empty label")]
    EmptyGroupLabel(usize),

    #[error("Default label must not be empty when keyword groups are set")]
    EmptyDefaultLabel,
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    period_column: Option<String>,
    category_column: Option<String>,
    value_column: Option<String>,
    measure_columns: Vec<String>,
    granularity: Option<Granularity>,
    ranking: Option<RankingKind>,
    top_k: Option<usize>,
    reducer: Option<Reducer>,
    keyword_groups: Vec<KeywordGroup>,
    default_label: Option<String>,
    drop_before: Option<NaiveDate>,
    exclude_categories: Vec<String>,
    include_matching: Option<String>,
    strict_periods: Option<bool>,
}

impl PipelineConfigBuilder {
    pub fn period_column(mut self, column: impl Into<String>) -> Self {
        self.period_column = Some(column.into());
        self
    }

    pub fn category_column(mut self, column: impl Into<String>) -> Self {
        self.category_column = Some(column.into());
        self
    }

    pub fn value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }

    /// Switch to wide layout: each column becomes its own category.
    pub fn measure_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measure_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// Keep only the top categories according to `kind`.
    pub fn ranking(mut self, kind: RankingKind) -> Self {
        self.ranking = Some(kind);
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = Some(reducer);
        self
    }

    /// Append a keyword group. Groups are evaluated in the order they are added.
    pub fn keyword_group(mut self, group: KeywordGroup) -> Self {
        self.keyword_groups.push(group);
        self
    }

    pub fn default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = Some(label.into());
        self
    }

    pub fn drop_before(mut self, date: NaiveDate) -> Self {
        self.drop_before = Some(date);
        self
    }

    pub fn exclude_categories<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_categories = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_matching(mut self, needle: impl Into<String>) -> Self {
        self.include_matching = Some(needle.into());
        self
    }

    pub fn strict_periods(mut self, strict: bool) -> Self {
        self.strict_periods = Some(strict);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            period_column: self.period_column.unwrap_or(defaults.period_column),
            category_column: self.category_column.unwrap_or(defaults.category_column),
            value_column: self.value_column.unwrap_or(defaults.value_column),
            measure_columns: self.measure_columns,
            granularity: self.granularity.unwrap_or_default(),
            ranking: self.ranking,
            top_k: self.top_k.unwrap_or(defaults.top_k),
            reducer: self.reducer.unwrap_or_default(),
            keyword_groups: self.keyword_groups,
            default_label: self.default_label.unwrap_or(defaults.default_label),
            drop_before: self.drop_before,
            exclude_categories: self.exclude_categories,
            include_matching: self.include_matching,
            strict_periods: self.strict_periods.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }
}
