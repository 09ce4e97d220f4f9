//! Named configurations for the standard report set.
//!
//! Each preset targets one public extract layout: the Raw Materials and
//! Industrial Product price indexes (RMPI, IPPI) keyed by NAPCS product, GDP
//! keyed by NAICS industry, and the monthly CPI table with one column per
//! measure.

use chrono::NaiveDate;

use crate::config::{PipelineConfig, RankingKind, Reducer};
use crate::reclassify::KeywordGroup;

/// Product classification column of the RMPI and IPPI extracts.
pub const NAPCS_COLUMN: &str = "North American Product Classification System (NAPCS)";

/// Industry classification column of the GDP extract.
pub const NAICS_COLUMN: &str = "North American Industry Classification System (NAICS)";

/// Aggregate rows of the GDP extract that would otherwise dominate rankings.
pub const GDP_AGGREGATE_ROWS: [&str; 4] = [
    "All industries",
    "Goods-producing industries",
    "Service-producing industries",
    "Business sector industries",
];

/// CPI measures plotted together.
pub const CPI_MEASURES: [&str; 4] = [
    "STATIC_TOTALCPICHANGE",
    "CPI_TRIM",
    "CPI_MEDIAN",
    "CPI_COMMON",
];

/// A named configuration.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> PipelineConfig,
}

impl Preset {
    pub fn config(&self) -> PipelineConfig {
        (self.build)()
    }
}

/// All available presets, in display order.
pub const PRESETS: [Preset; 9] = [
    Preset {
        name: "rmpi-top-frequency",
        description: "RMPI: 6 most frequent products, quarterly mean",
        build: rmpi_top_frequency,
    },
    Preset {
        name: "rmpi-top-variation",
        description: "RMPI: 5 products with the widest value range, quarterly mean",
        build: napcs_top_variation,
    },
    Preset {
        name: "ippi-top-variation",
        description: "IPPI: 5 products with the widest value range, quarterly mean",
        build: napcs_top_variation,
    },
    Preset {
        name: "gdp-top5-sectors",
        description: "GDP: 5 largest industries by cumulative value, quarterly sum",
        build: gdp_top5_sectors,
    },
    Preset {
        name: "gdp-top3-sectors",
        description: "GDP: 3 largest NAICS rows by cumulative value, aggregates included, quarterly sum",
        build: gdp_top3_sectors,
    },
    Preset {
        name: "rmpi-fossil-vs-other",
        description: "RMPI: fossil fuels against other raw materials, quarterly mean",
        build: rmpi_fossil_vs_other,
    },
    Preset {
        name: "cpi-measures",
        description: "CPI: total and core measures from 1997, quarterly mean",
        build: cpi_measures,
    },
    Preset {
        name: "gdp-all-industries",
        description: "GDP: all industries total, quarterly sum",
        build: gdp_all_industries,
    },
    Preset {
        name: "cpi-total-quarterly",
        description: "CPI: total change from 1997, quarterly mean",
        build: cpi_total_quarterly,
    },
];

/// Look up a preset configuration by name.
pub fn preset(name: &str) -> Option<PipelineConfig> {
    PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(Preset::config)
}

/// Names of all presets.
pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}

fn cpi_start() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1997, 1, 1)
}

fn rmpi_top_frequency() -> PipelineConfig {
    PipelineConfig {
        category_column: NAPCS_COLUMN.to_string(),
        ranking: Some(RankingKind::Frequency),
        top_k: 6,
        reducer: Reducer::Mean,
        ..Default::default()
    }
}

fn napcs_top_variation() -> PipelineConfig {
    PipelineConfig {
        category_column: NAPCS_COLUMN.to_string(),
        ranking: Some(RankingKind::Variation),
        top_k: 5,
        reducer: Reducer::Mean,
        ..Default::default()
    }
}

fn gdp_top_sectors(k: usize) -> PipelineConfig {
    PipelineConfig {
        category_column: NAICS_COLUMN.to_string(),
        ranking: Some(RankingKind::Cumulative),
        top_k: k,
        reducer: Reducer::Sum,
        ..Default::default()
    }
}

fn gdp_top5_sectors() -> PipelineConfig {
    PipelineConfig {
        exclude_categories: GDP_AGGREGATE_ROWS.iter().map(|s| s.to_string()).collect(),
        ..gdp_top_sectors(5)
    }
}

// Ranks every NAICS row, so the aggregate rows usually take the top places.
fn gdp_top3_sectors() -> PipelineConfig {
    gdp_top_sectors(3)
}

fn rmpi_fossil_vs_other() -> PipelineConfig {
    PipelineConfig {
        category_column: NAPCS_COLUMN.to_string(),
        keyword_groups: vec![KeywordGroup::new(
            "Fossil Fuels",
            ["Diesel", "Gasoline", "Fuel oils", "Crude", "Petroleum"],
        )],
        default_label: "Other Raw Materials".to_string(),
        reducer: Reducer::Mean,
        ..Default::default()
    }
}

fn cpi_measures() -> PipelineConfig {
    PipelineConfig {
        period_column: "date".to_string(),
        measure_columns: CPI_MEASURES.iter().map(|s| s.to_string()).collect(),
        drop_before: cpi_start(),
        reducer: Reducer::Mean,
        ..Default::default()
    }
}

fn gdp_all_industries() -> PipelineConfig {
    PipelineConfig {
        category_column: NAICS_COLUMN.to_string(),
        include_matching: Some("All industries".to_string()),
        reducer: Reducer::Sum,
        ..Default::default()
    }
}

fn cpi_total_quarterly() -> PipelineConfig {
    PipelineConfig {
        period_column: "date".to_string(),
        measure_columns: vec![CPI_MEASURES[0].to_string()],
        drop_before: cpi_start(),
        reducer: Reducer::Mean,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_preset_is_valid() {
        for p in PRESETS.iter() {
            assert!(p.config().validate().is_ok(), "preset {} is invalid", p.name);
        }
    }

    #[test]
    fn test_preset_names_are_unique() {
        let names: HashSet<_> = preset_names().into_iter().collect();
        assert_eq!(names.len(), PRESETS.len());
    }

    #[test]
    fn test_preset_lookup() {
        let config = preset("GDP-TOP5-SECTORS").unwrap();
        assert_eq!(config.ranking, Some(RankingKind::Cumulative));
        assert_eq!(config.top_k, 5);
        assert_eq!(config.reducer, Reducer::Sum);
        assert!(config.exclude_categories.contains(&"All industries".to_string()));
        assert!(preset("unknown").is_none());
    }

    #[test]
    fn test_only_top5_excludes_aggregate_rows() {
        let top5 = preset("gdp-top5-sectors").unwrap();
        assert_eq!(top5.exclude_categories.len(), GDP_AGGREGATE_ROWS.len());

        let top3 = preset("gdp-top3-sectors").unwrap();
        assert!(top3.exclude_categories.is_empty());
        assert_eq!(top3.top_k, 3);
        assert_eq!(top3.ranking, Some(RankingKind::Cumulative));
    }

    #[test]
    fn test_cpi_presets_are_wide() {
        let config = preset("cpi-measures").unwrap();
        assert!(config.is_wide());
        assert_eq!(config.measure_columns.len(), 4);
        assert_eq!(config.drop_before, NaiveDate::from_ymd_opt(1997, 1, 1));
    }
}
