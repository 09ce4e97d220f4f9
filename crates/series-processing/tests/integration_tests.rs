//! Integration tests for the aggregation pipeline.
//!
//! These tests verify end-to-end behavior of the pipeline over small extracts
//! shaped like the public price index, GDP and CPI tables.

use chrono::NaiveDate;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use series_processing::{
    AggregatedRow, BatchRunner, BatchSpec, Granularity, KeywordClassifier, KeywordGroup,
    NormalizedSeries, Observation, Pipeline, PipelineConfig, PipelineOutput, RankingKind, Reducer,
    aggregate, aggregate_periods, io, merge, preset, reclassify, strategy_for, compute_stats,
};
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(filename: &str) -> DataFrame {
    io::load_csv(fixtures_path().join(filename)).expect("Failed to load fixture")
}

fn run_preset(name: &str, filename: &str) -> PipelineOutput {
    let config = preset(name).expect("Unknown preset");
    Pipeline::builder()
        .config(config)
        .build()
        .expect("Failed to build pipeline")
        .run(&load_fixture(filename))
        .expect("Pipeline failed")
}

fn quarter(year: i32, q: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, (q - 1) * 3 + 1, 1).unwrap()
}

fn row(period: NaiveDate, category: &str, value: f64) -> AggregatedRow {
    AggregatedRow {
        period,
        category: category.to_string(),
        value,
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Worked Examples
// ============================================================================

#[test]
fn test_mean_of_duplicate_period_category() {
    let df = df![
        "REF_DATE" => ["1997Q1", "1997Q1", "1997Q1"],
        "GEO" => ["A", "A", "B"],
        "VALUE" => [10.0, 20.0, 5.0],
    ]
    .unwrap();

    let output = Pipeline::builder().build().unwrap().run(&df).unwrap();
    assert_eq!(
        output.table.rows(),
        &[row(quarter(1997, 1), "A", 15.0), row(quarter(1997, 1), "B", 5.0)]
    );
}

#[test]
fn test_keyword_reclassification_example() {
    let classifier = KeywordClassifier::new(
        &[KeywordGroup::new("Fossil Fuels", ["diesel", "crude"])],
        "Other",
    );
    assert_eq!(classifier.classify("Diesel fuel oil"), "Fossil Fuels");
    assert_eq!(classifier.classify("Softwood lumber"), "Other");
}

#[test]
fn test_variation_tie_broken_by_label() {
    let period = quarter(2000, 1);
    let observations = [("A", 0.0), ("A", 5.0), ("C", 0.0), ("C", 12.0), ("B", 3.0), ("B", 15.0)]
        .into_iter()
        .map(|(c, v)| Observation::new(period, c, v))
        .collect();
    let series = NormalizedSeries::from_observations(observations, Granularity::Quarter);

    let stats = compute_stats(&series).unwrap();
    let selection = strategy_for(RankingKind::Variation, 1).select(&stats);
    assert_eq!(selection.labels(), ["B"]);
}

// ============================================================================
// Presets over fixtures
// ============================================================================

#[test]
fn test_rmpi_top_frequency() {
    let output = run_preset("rmpi-top-frequency", "rmpi_sample.csv");

    assert_eq!(output.summary.rows_read, 12);
    assert_eq!(output.summary.rows_dropped, 1);
    assert_eq!(
        output.selection.unwrap().labels(),
        ["Diesel fuel", "Copper", "Crude oil", "Lumber", "Wheat"]
    );
}

#[test]
fn test_rmpi_top_variation_with_override() {
    let mut config = preset("rmpi-top-variation").unwrap();
    config.top_k = 2;
    let output = Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .run(&load_fixture("rmpi_sample.csv"))
        .unwrap();

    assert_eq!(output.selection.unwrap().labels(), ["Diesel fuel", "Lumber"]);
    assert_eq!(output.table.categories(), vec!["Diesel fuel", "Lumber"]);
    assert_eq!(output.table.len(), 5);
}

#[test]
fn test_rmpi_fossil_vs_other() {
    let output = run_preset("rmpi-fossil-vs-other", "rmpi_sample.csv");
    let table = &output.table;

    assert_eq!(table.categories(), vec!["Fossil Fuels", "Other Raw Materials"]);

    let fossil = table.series("Fossil Fuels");
    let values: Vec<f64> = fossil.points().iter().map(|p| p.value).collect();
    assert_eq!(values, vec![90.0, 120.0, 80.0]);

    let other = table.series("Other Raw Materials");
    assert_close(other.points()[0].value, 100.0 / 3.0);
    assert_close(other.points()[2].value, 48.0);
}

#[test]
fn test_gdp_top5_sectors_excludes_aggregates() {
    let top5 = run_preset("gdp-top5-sectors", "gdp_sample.csv");
    assert_eq!(
        top5.selection.unwrap().labels(),
        ["Manufacturing", "Real estate", "Finance, insurance", "Construction", "Mining"]
    );
}

#[test]
fn test_gdp_top3_sectors_ranks_every_row() {
    let top3 = run_preset("gdp-top3-sectors", "gdp_sample.csv");
    assert_eq!(
        top3.selection.unwrap().labels(),
        ["All industries", "Goods-producing industries", "Manufacturing"]
    );
    assert_eq!(
        top3.table.categories(),
        vec!["All industries", "Goods-producing industries", "Manufacturing"]
    );
    let manufacturing = top3.table.series("Manufacturing");
    assert_eq!(manufacturing.points()[0].value, 170.0);
    assert_eq!(top3.table.series("All industries").len(), 3);
}

#[test]
fn test_cpi_measures_wide_layout() {
    let output = run_preset("cpi-measures", "cpi_monthly.csv");

    assert_eq!(output.summary.rows_read, 32);
    assert_eq!(output.summary.rows_dropped, 7);
    assert_eq!(output.summary.groups, 11);
    assert!(output.table.rows().iter().all(|r| r.period >= quarter(1997, 1)));

    let common = output.table.series("CPI_COMMON");
    assert_eq!(common.len(), 2);
    assert_eq!(common.points()[0].period, quarter(1997, 2));
}

#[test]
fn test_gdp_vs_cpi_merge() {
    let gdp = run_preset("gdp-all-industries", "gdp_sample.csv");
    let cpi = run_preset("cpi-total-quarterly", "cpi_monthly.csv");

    let gdp_series = aggregate_periods(&gdp.series, Reducer::Sum, "GDP").unwrap();
    let cpi_series = cpi.table.series("STATIC_TOTALCPICHANGE").with_name("CPI");
    let merged = merge(&gdp_series, &cpi_series);

    assert_eq!(merged.len(), 3);
    let first = merged.rows()[0];
    assert_eq!(first.period, quarter(1997, 1));
    assert_eq!(first.left, 1000.0);
    assert_close(first.right, 2.1);

    let frame = merged.to_dataframe().unwrap();
    assert_eq!(frame.shape(), (3, 3));
    assert_eq!(frame.column("period").unwrap().dtype(), &DataType::Date);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_pipeline_is_deterministic() {
    let df = load_fixture("gdp_sample.csv");
    let pipeline = Pipeline::builder()
        .config(preset("gdp-top5-sectors").unwrap())
        .build()
        .unwrap();

    let first = pipeline.run(&df).unwrap();
    let second = pipeline.run(&df).unwrap();
    assert_eq!(first.table, second.table);
    assert_eq!(first.selection, second.selection);
    assert_eq!(first.stats, second.stats);
}

#[test]
fn test_aggregated_values_are_finite() {
    let output = run_preset("rmpi-top-frequency", "rmpi_sample.csv");
    assert!(output.series.iter().all(|obs| obs.value.is_finite()));
    assert!(output.table.rows().iter().all(|r| r.value.is_finite()));
}

#[test]
fn test_reclassification_is_total() {
    let df = load_fixture("rmpi_sample.csv");
    let config = PipelineConfig::builder()
        .category_column("North American Product Classification System (NAPCS)")
        .build()
        .unwrap();
    let series = series_processing::normalize(&df, &config).unwrap();
    let groups = [
        KeywordGroup::new("Fossil Fuels", ["diesel", "crude"]),
        KeywordGroup::new("Metals", ["copper"]),
    ];
    let classifier = KeywordClassifier::new(&groups, "Other");

    let relabeled = reclassify(&series, &classifier);
    assert_eq!(relabeled.len(), series.len());
    for obs in relabeled.iter() {
        assert!(["Fossil Fuels", "Metals", "Other"].contains(&obs.category.as_str()));
    }
}

#[test]
fn test_table_to_dataframe_shape() {
    let output = run_preset("gdp-top5-sectors", "gdp_sample.csv");
    let frame = output.table.to_dataframe().unwrap();
    assert_eq!(frame.shape(), (10, 3));
    let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
    assert_eq!(names, ["period", "category", "value"]);

    let direct = aggregate(&output.series, Reducer::Sum).unwrap();
    assert_eq!(direct, output.table);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_column_is_schema_error() {
    // the CPI extract has no REF_DATE column
    let df = load_fixture("cpi_monthly.csv");
    let err = Pipeline::builder().build().unwrap().run(&df).unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_ERROR");
    assert!(err.to_string().contains("'REF_DATE'"));
    assert!(err.to_string().contains("CPI_TRIM"));
}

#[test]
fn test_strict_periods_rejects_bad_label() {
    let df = df![
        "REF_DATE" => ["1997Q1", "sometime"],
        "GEO" => ["A", "A"],
        "VALUE" => [1.0, 2.0],
    ]
    .unwrap();

    let lenient = Pipeline::builder().build().unwrap().run(&df).unwrap();
    assert_eq!(lenient.summary.rows_dropped, 1);

    let strict = PipelineConfig::builder().strict_periods(true).build().unwrap();
    let err = Pipeline::builder().config(strict).build().unwrap().run(&df).unwrap_err();
    assert_eq!(err.error_code(), "PARSE_ERROR");
}

#[test]
fn test_all_rows_dropped_is_empty_input() {
    let df = df![
        "REF_DATE" => ["1997Q1", "1997Q2"],
        "GEO" => ["A", "B"],
        "VALUE" => ["..", "x"],
    ]
    .unwrap();
    let err = Pipeline::builder().build().unwrap().run(&df).unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_INPUT");
}

// ============================================================================
// Batch
// ============================================================================

#[test]
fn test_batch_over_fixtures() {
    let fixtures = fixtures_path();
    let out = std::env::temp_dir().join(format!("series-integration-{}", std::process::id()));
    let json = serde_json::json!({
        "reports": [
            { "name": "gdp", "input": fixtures.join("gdp_sample.csv"), "preset": "gdp-all-industries" },
            { "name": "cpi", "input": fixtures.join("cpi_monthly.csv"), "preset": "cpi-total-quarterly" },
            { "name": "bad", "input": fixtures.join("gdp_sample.csv"), "preset": "rmpi-top-frequency" }
        ],
        "merges": [
            { "name": "gdp-vs-cpi",
              "left": { "report": "gdp", "label": "GDP" },
              "right": { "report": "cpi", "category": "STATIC_TOTALCPICHANGE", "label": "CPI" } }
        ]
    });
    let spec = BatchSpec::from_json(&json.to_string()).unwrap();

    let report = BatchRunner::new().output_dir(&out).run(&spec);
    let _ = std::fs::remove_dir_all(&out);

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    let bad = report.get("bad").unwrap();
    assert_eq!(bad.error.as_ref().unwrap().error_code(), "SCHEMA_ERROR");
    assert_eq!(report.get("gdp-vs-cpi").unwrap().rows, 3);
}
