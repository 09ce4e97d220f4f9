//! Time-Indexed Categorical Aggregation
//!
//! Turns long-format statistical extracts (period, category, value) into
//! aggregated time series ready for charting or export, built with Rust and Polars.
//!
//! # Overview
//!
//! A run goes through these steps, each one a pure function from one value to the next:
//!
//! - **Normalization**: Clean column labels, parse quarter or date periods, drop unusable rows
//! - **Filtering**: Exclude aggregate categories or keep only matching ones
//! - **Reclassification**: Relabel categories through ordered keyword groups
//! - **Ranking**: Keep the top k categories by frequency, variation or cumulative value
//! - **Aggregation**: Reduce values per (period, category) by mean or sum
//! - **Merging**: Inner join two single-value series on period
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use series_processing::{Pipeline, PipelineConfig, RankingKind, Reducer, io};
//!
//! let df = io::load_csv("gdp.csv")?;
//!
//! let config = PipelineConfig::builder()
//!     .category_column("North American Industry Classification System (NAICS)")
//!     .exclude_categories(["All industries"])
//!     .ranking(RankingKind::Cumulative)
//!     .top_k(5)
//!     .reducer(Reducer::Sum)
//!     .build()?;
//!
//! let output = Pipeline::builder().config(config).build()?.run(&df)?;
//!
//! for row in output.table.rows() {
//!     println!("{} {} {}", row.period, row.category, row.value);
//! }
//! ```
//!
//! # Presets and batches
//!
//! The [`presets`] module holds named configurations for the standard report
//! set. A [`BatchSpec`] runs many reports and merges at once; see
//! [`pipeline::batch`].

pub mod aggregate;
pub mod config;
pub mod error;
pub mod io;
pub mod merge;
pub mod normalizer;
pub mod pipeline;
pub mod presets;
pub mod ranking;
pub mod reclassify;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregate::{aggregate, aggregate_periods};
pub use config::{
    ConfigValidationError, Granularity, PipelineConfig, PipelineConfigBuilder, RankingKind,
    Reducer,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use merge::merge;
pub use normalizer::{apply_category_filters, normalize, parse_period};
pub use pipeline::{
    BatchReport, BatchRunner, BatchSpec, MergeSpec, Pipeline, PipelineBuilder, ReportOutcome,
    ReportSpec, SeriesRef,
};
pub use presets::{preset, preset_names};
pub use ranking::{
    ByCumulativeValue, ByFrequency, ByVariation, RankingStrategy, compute_stats, strategy_for,
};
pub use reclassify::{KeywordClassifier, KeywordGroup, reclassify};
pub use types::{
    AggregatedRow, AggregatedTable, CategoryStat, CategoryStats, MergedRow, MergedTable,
    NormalizedSeries, Observation, PeriodSeries, PeriodValue, PipelineOutput, RunSummary,
    SelectionResult,
};
