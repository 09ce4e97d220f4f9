//! Main aggregation pipeline.
//!
//! This module provides the `Pipeline` struct and its builder, which chain the
//! individual steps into one configurable run.

use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::normalizer::{apply_category_filters, normalize};
use crate::ranking::{RankingStrategy, compute_stats, strategy_for};
use crate::reclassify::{KeywordClassifier, reclassify};
use crate::types::{PipelineOutput, RunSummary};

/// The aggregation pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline from a configuration.
///
/// # Example
///
/// ```rust,ignore
/// use series_processing::{Pipeline, PipelineConfig, RankingKind, Reducer};
///
/// let config = PipelineConfig::builder()
///     .category_column("North American Product Classification System (NAPCS)")
///     .ranking(RankingKind::Frequency)
///     .top_k(6)
///     .reducer(Reducer::Mean)
///     .build()?;
///
/// let output = Pipeline::builder().config(config).build()?.run(&df)?;
/// let chart_data = output.table.to_dataframe()?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    classifier: Option<KeywordClassifier>,
    ranking: Option<Box<dyn RankingStrategy>>,
}

// Independent runs may be spread across threads.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step on a raw table.
    ///
    /// The input frame is only read; the output shares no data with it.
    pub fn run(&self, df: &DataFrame) -> Result<PipelineOutput> {
        match self.run_internal(df) {
            Ok(output) => Ok(output),
            Err(e) => {
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, df: &DataFrame) -> Result<PipelineOutput> {
        let start_time = Instant::now();
        info!("Starting aggregation pipeline on {} rows...", df.height());

        // Step 1: Normalize labels, periods and values
        info!("Step 1: Normalizing observations...");
        let series = normalize(df, &self.config)?;

        // Step 2: Category filters
        let series = apply_category_filters(&series, &self.config)?;

        // Step 3: Keyword reclassification (if configured)
        let series = match &self.classifier {
            Some(classifier) => {
                info!("Step 3: Reclassifying categories by keyword...");
                reclassify(&series, classifier)
            }
            None => {
                debug!("Step 3: Skipping reclassification (no keyword groups)");
                series
            }
        };

        // Step 4: Rank categories and keep the top k
        let stats = compute_stats(&series)?;
        let categories_before = stats.len();
        let (series, selection) = match &self.ranking {
            Some(strategy) => {
                info!(
                    "Step 4: Selecting top {} categories by {}...",
                    strategy.k(),
                    strategy.kind()
                );
                let selection = strategy.select(&stats);
                (series.retain_categories(&selection), Some(selection))
            }
            None => {
                debug!("Step 4: Skipping ranking (keeping all categories)");
                (series, None)
            }
        };

        // Step 5: Group and reduce
        info!("Step 5: Aggregating by period and category ({})...", self.config.reducer);
        let table = aggregate(&series, self.config.reducer)?;

        let summary = RunSummary {
            rows_read: series.rows_read(),
            rows_dropped: series.rows_dropped(),
            rows_used: series.len(),
            categories_before,
            categories_selected: series.categories().len(),
            groups: table.len(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Pipeline complete: {} groups from {} observations in {}ms",
            summary.groups, summary.rows_used, summary.duration_ms
        );

        Ok(PipelineOutput {
            summary,
            stats,
            selection,
            series,
            table,
        })
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    ranking: Option<Box<dyn RankingStrategy>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom ranking strategy instead of the configured `ranking`.
    pub fn ranking_strategy(mut self, strategy: Box<dyn RankingStrategy>) -> Self {
        self.ranking = Some(strategy);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let classifier = (!config.keyword_groups.is_empty())
            .then(|| KeywordClassifier::new(&config.keyword_groups, config.default_label.clone()));

        let ranking = self
            .ranking
            .or_else(|| config.ranking.map(|kind| strategy_for(kind, config.top_k)));

        Ok(Pipeline {
            config,
            classifier,
            ranking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RankingKind, Reducer};
    use crate::ranking::ByFrequency;
    use crate::reclassify::KeywordGroup;

    fn rmpi() -> DataFrame {
        df![
            "REF_DATE" => ["1997Q1", "1997Q1", "1997Q1", "1997Q2", "1997Q2", "1997Q2"],
            "Product" => ["Diesel", "Copper", "Lumber", "Diesel", "Copper", "Crude oil"],
            "VALUE" => [Some(100.0), Some(50.0), None, Some(140.0), Some(55.0), Some(80.0)],
        ]
        .unwrap()
    }

    #[test]
    fn test_pipeline_default_ranking_none() {
        let config = PipelineConfig::builder()
            .category_column("Product")
            .build()
            .unwrap();
        let output = Pipeline::builder().config(config).build().unwrap().run(&rmpi()).unwrap();

        assert!(output.selection.is_none());
        assert_eq!(output.summary.rows_read, 6);
        assert_eq!(output.summary.rows_dropped, 1);
        assert_eq!(output.summary.groups, 5);
    }

    #[test]
    fn test_pipeline_with_variation_ranking() {
        let config = PipelineConfig::builder()
            .category_column("Product")
            .ranking(RankingKind::Variation)
            .top_k(1)
            .build()
            .unwrap();
        let output = Pipeline::builder().config(config).build().unwrap().run(&rmpi()).unwrap();

        let selection = output.selection.unwrap();
        assert_eq!(selection.labels(), ["Diesel"]);
        assert_eq!(output.table.categories(), vec!["Diesel"]);
        assert_eq!(output.summary.categories_before, 3);
        assert_eq!(output.summary.categories_selected, 1);
    }

    #[test]
    fn test_pipeline_reclassifies_before_ranking() {
        let config = PipelineConfig::builder()
            .category_column("Product")
            .keyword_group(KeywordGroup::new("Fossil Fuels", ["diesel", "crude"]))
            .default_label("Other Raw Materials")
            .reducer(Reducer::Mean)
            .build()
            .unwrap();
        let output = Pipeline::builder().config(config).build().unwrap().run(&rmpi()).unwrap();

        assert_eq!(output.table.categories(), vec!["Fossil Fuels", "Other Raw Materials"]);
        let fossil_q2 = output
            .table
            .rows()
            .iter()
            .find(|r| r.category == "Fossil Fuels" && r.period.to_string() == "1997-04-01")
            .unwrap();
        assert_eq!(fossil_q2.value, 110.0);
    }

    #[test]
    fn test_builder_custom_strategy_overrides_config() {
        let config = PipelineConfig::builder()
            .category_column("Product")
            .ranking(RankingKind::Variation)
            .top_k(1)
            .build()
            .unwrap();
        let output = Pipeline::builder()
            .config(config)
            .ranking_strategy(Box::new(ByFrequency::new(2)))
            .build()
            .unwrap()
            .run(&rmpi())
            .unwrap();

        assert_eq!(output.selection.unwrap().labels(), ["Diesel", "Copper"]);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.ranking = Some(RankingKind::Frequency);
        config.top_k = 0;
        let result = Pipeline::builder().config(config).build();
        assert_eq!(result.err().unwrap().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_pipeline_twice_is_identical() {
        let config = PipelineConfig::builder()
            .category_column("Product")
            .ranking(RankingKind::Frequency)
            .top_k(2)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();
        let first = pipeline.run(&rmpi()).unwrap();
        let second = pipeline.run(&rmpi()).unwrap();
        assert_eq!(first.table, second.table);
        assert_eq!(first.selection, second.selection);
    }
}
