//! Batch execution of several reports and merges.
//!
//! A [`BatchSpec`] is read from JSON:
//!
//! ```json
//! {
//!   "reports": [
//!     { "name": "gdp", "input": "gdp.csv", "preset": "gdp-all-industries" },
//!     { "name": "cpi", "input": "cpi.csv", "preset": "cpi-total-quarterly" }
//!   ],
//!   "merges": [
//!     { "name": "gdp-vs-cpi",
//!       "left": { "report": "gdp", "label": "GDP" },
//!       "right": { "report": "cpi", "label": "CPI" } }
//!   ]
//! }
//! ```
//!
//! Each report is an independent pipeline invocation. A failing report is
//! recorded in the [`BatchReport`] and the batch moves on; merges depending on
//! it fail the same way.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::Pipeline;
use crate::aggregate::aggregate_periods;
use crate::config::{PipelineConfig, Reducer};
use crate::error::{PipelineError, Result, ResultExt};
use crate::io::{load_csv, write_csv};
use crate::merge::merge;
use crate::presets::preset;
use crate::types::{PeriodSeries, PipelineOutput, RunSummary};

/// A set of reports and merges run together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSpec {
    #[serde(default)]
    pub reports: Vec<ReportSpec>,
    #[serde(default)]
    pub merges: Vec<MergeSpec>,
}

impl BatchSpec {
    /// Read a batch specification from a JSON file.
    ///
    /// Relative report inputs are resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(PipelineError::from)
            .context(format!("Failed to read batch file {}", path.display()))?;
        let mut spec = Self::from_json(&content)?;

        if let Some(base) = path.parent() {
            for report in &mut spec.reports {
                if report.input.is_relative() {
                    report.input = base.join(&report.input);
                }
            }
        }
        Ok(spec)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// One pipeline run over one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSpec {
    pub name: String,
    pub input: PathBuf,
    /// Named preset, used when `config` is absent.
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    /// CSV destination; defaults to `<name>.csv` in the output directory.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl ReportSpec {
    fn resolve_config(&self) -> Result<PipelineConfig> {
        match (&self.config, &self.preset) {
            (Some(config), _) => Ok(config.clone()),
            (None, Some(name)) => preset(name)
                .ok_or_else(|| PipelineError::InvalidConfig(format!("unknown preset '{}'", name))),
            (None, None) => Err(PipelineError::InvalidConfig(
                "report needs either a preset or a config".to_string(),
            )),
        }
    }
}

/// One side of a merge: a category of a report, or the whole report reduced by period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRef {
    pub report: String,
    /// Category to extract; all categories are combined when absent.
    #[serde(default)]
    pub category: Option<String>,
    /// Reducer used to combine categories; defaults to the report's reducer.
    #[serde(default)]
    pub reducer: Option<Reducer>,
    /// Column name in the merged output.
    #[serde(default)]
    pub label: Option<String>,
}

impl SeriesRef {
    fn display_name(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.category.clone())
            .unwrap_or_else(|| self.report.clone())
    }

    fn resolve(&self, outputs: &HashMap<String, PipelineOutput>) -> Result<PeriodSeries> {
        let output = outputs.get(&self.report).ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "report '{}' is unknown or did not succeed",
                self.report
            ))
        })?;

        let series = match &self.category {
            Some(category) => output.table.series(category),
            None => {
                let reducer = self.reducer.unwrap_or(output.table.reducer());
                aggregate_periods(&output.series, reducer, self.report.as_str())?
            }
        };

        if series.is_empty() {
            return Err(PipelineError::EmptyInput { stage: "merge" });
        }
        Ok(series.with_name(self.display_name()))
    }
}

/// An inner join of two report series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSpec {
    pub name: String,
    pub left: SeriesRef,
    pub right: SeriesRef,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Report,
    Merge,
}

/// Result of one report or merge in a batch.
#[derive(Debug, Serialize)]
pub struct ReportOutcome {
    pub name: String,
    pub kind: OutcomeKind,
    /// Rows in the produced table (0 on failure).
    pub rows: usize,
    pub output: Option<PathBuf>,
    pub summary: Option<RunSummary>,
    pub error: Option<PipelineError>,
}

impl ReportOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of a whole batch, in execution order.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ReportOutcome>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn get(&self, name: &str) -> Option<&ReportOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Runs a [`BatchSpec`], writing CSV outputs under an optional directory.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    output_dir: Option<PathBuf>,
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory for default and relative output paths.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Run every report, then every merge. Never fails as a whole.
    pub fn run(&self, spec: &BatchSpec) -> BatchReport {
        let start_time = Instant::now();
        info!(
            "Running batch: {} reports, {} merges",
            spec.reports.len(),
            spec.merges.len()
        );

        let mut outputs: HashMap<String, PipelineOutput> = HashMap::new();
        let mut report = BatchReport::default();

        for report_spec in &spec.reports {
            let outcome = match self.run_report(report_spec) {
                Ok((output, path)) => {
                    let outcome = ReportOutcome {
                        name: report_spec.name.clone(),
                        kind: OutcomeKind::Report,
                        rows: output.table.len(),
                        output: path,
                        summary: Some(output.summary.clone()),
                        error: None,
                    };
                    outputs.insert(report_spec.name.clone(), output);
                    outcome
                }
                Err(e) => {
                    warn!("Report '{}' failed: {}", report_spec.name, e);
                    failed(&report_spec.name, OutcomeKind::Report, e)
                }
            };
            report.outcomes.push(outcome);
        }

        for merge_spec in &spec.merges {
            let outcome = match self.run_merge(merge_spec, &outputs) {
                Ok((rows, path)) => ReportOutcome {
                    name: merge_spec.name.clone(),
                    kind: OutcomeKind::Merge,
                    rows,
                    output: path,
                    summary: None,
                    error: None,
                },
                Err(e) => {
                    warn!("Merge '{}' failed: {}", merge_spec.name, e);
                    failed(&merge_spec.name, OutcomeKind::Merge, e)
                }
            };
            report.outcomes.push(outcome);
        }

        report.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Batch complete: {} succeeded, {} failed in {}ms",
            report.succeeded(),
            report.failed(),
            report.duration_ms
        );
        report
    }

    fn run_report(&self, spec: &ReportSpec) -> Result<(PipelineOutput, Option<PathBuf>)> {
        let context = format!("report '{}'", spec.name);
        info!("Running {} from {}", context, spec.input.display());

        let config = spec.resolve_config().context(context.clone())?;
        let pipeline = Pipeline::builder().config(config).build().context(context.clone())?;
        let df = load_csv(&spec.input).context(context.clone())?;
        let output = pipeline.run(&df).context(context.clone())?;

        let path = self.destination(&spec.name, spec.output.as_deref());
        if let Some(path) = &path {
            let mut frame = output.table.to_dataframe().context(context.clone())?;
            write_csv(path, &mut frame).context(context)?;
        }
        Ok((output, path))
    }

    fn run_merge(
        &self,
        spec: &MergeSpec,
        outputs: &HashMap<String, PipelineOutput>,
    ) -> Result<(usize, Option<PathBuf>)> {
        let context = format!("merge '{}'", spec.name);
        let left = spec.left.resolve(outputs).context(context.clone())?;
        let right = spec.right.resolve(outputs).context(context.clone())?;
        let merged = merge(&left, &right);

        let path = self.destination(&spec.name, spec.output.as_deref());
        if let Some(path) = &path {
            let mut frame = merged.to_dataframe().context(context.clone())?;
            write_csv(path, &mut frame).context(context)?;
        }
        Ok((merged.len(), path))
    }

    fn destination(&self, name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
        match (explicit, &self.output_dir) {
            (Some(path), Some(dir)) => Some(dir.join(path)),
            (Some(path), None) => Some(path.to_path_buf()),
            (None, Some(dir)) => Some(dir.join(format!("{}.csv", name))),
            (None, None) => None,
        }
    }
}

fn failed(name: &str, kind: OutcomeKind, error: PipelineError) -> ReportOutcome {
    ReportOutcome {
        name: name.to_string(),
        kind,
        rows: 0,
        output: None,
        summary: None,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("series-batch-{}-{}", tag, std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.0.join(name);
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    const GDP: &str = "REF_DATE,GEO,VALUE\n\
        1997Q1,Canada,100\n\
        1997Q2,Canada,110\n\
        1997Q3,Canada,120\n";

    const CPI: &str = "date,STATIC_TOTALCPICHANGE\n\
        1997-04-01,1.0\n\
        1997-05-01,2.0\n\
        1997-06-01,3.0\n\
        1997-07-01,1.5\n\
        1997-10-01,2.5\n";

    fn spec(dir: &TempDir) -> BatchSpec {
        let gdp = dir.write("gdp.csv", GDP);
        let cpi = dir.write("cpi.csv", CPI);
        let json = serde_json::json!({
            "reports": [
                { "name": "gdp", "input": gdp, "config": { "reducer": "sum" } },
                { "name": "broken", "input": dir.0.join("missing.csv"), "config": {} },
                { "name": "cpi", "input": cpi, "preset": "cpi-total-quarterly" }
            ],
            "merges": [
                { "name": "gdp-vs-cpi",
                  "left": { "report": "gdp", "label": "GDP" },
                  "right": { "report": "cpi", "label": "CPI" } },
                { "name": "needs-broken",
                  "left": { "report": "broken" },
                  "right": { "report": "cpi" } }
            ]
        });
        BatchSpec::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_failing_report_does_not_abort_batch() {
        let dir = TempDir::new("isolation");
        let report = BatchRunner::new().run(&spec(&dir));

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 2);

        let broken = report.get("broken").unwrap();
        assert_eq!(broken.error.as_ref().unwrap().error_code(), "IO_ERROR");
        assert!(report.get("cpi").unwrap().is_success());
        assert!(!report.get("needs-broken").unwrap().is_success());
    }

    #[test]
    fn test_merge_joins_report_series() {
        let dir = TempDir::new("merge");
        let out = dir.0.join("out");
        let report = BatchRunner::new().output_dir(&out).run(&spec(&dir));

        let merged = report.get("gdp-vs-cpi").unwrap();
        assert!(merged.is_success());
        // CPI covers Q2..Q4, GDP covers Q1..Q3
        assert_eq!(merged.rows, 2);

        let path = merged.output.as_ref().unwrap();
        let frame = load_csv(path).unwrap();
        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["period", "GDP", "CPI"]);
        assert!(out.join("gdp.csv").exists());
    }

    #[test]
    fn test_merge_label_named_period_is_written() {
        let dir = TempDir::new("period-label");
        let gdp = dir.write("gdp.csv", GDP);
        let json = serde_json::json!({
            "reports": [ { "name": "gdp", "input": gdp, "config": {} } ],
            "merges": [
                { "name": "self",
                  "left": { "report": "gdp", "label": "period" },
                  "right": { "report": "gdp", "label": "GDP" } }
            ]
        });
        let spec = BatchSpec::from_json(&json.to_string()).unwrap();
        let report = BatchRunner::new().output_dir(dir.0.join("out")).run(&spec);

        let merged = report.get("self").unwrap();
        assert!(merged.is_success(), "{:?}", merged.error);
        assert_eq!(merged.rows, 3);
        let frame = load_csv(merged.output.as_ref().unwrap()).unwrap();
        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["period", "period_left", "GDP"]);
    }

    #[test]
    fn test_report_needs_config_or_preset() {
        let spec = ReportSpec {
            name: "bare".to_string(),
            input: PathBuf::from("x.csv"),
            preset: None,
            config: None,
            output: None,
        };
        assert_eq!(spec.resolve_config().unwrap_err().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_unknown_preset_is_invalid_config() {
        let spec = ReportSpec {
            name: "typo".to_string(),
            input: PathBuf::from("x.csv"),
            preset: Some("gdp-top99".to_string()),
            config: None,
            output: None,
        };
        assert_eq!(spec.resolve_config().unwrap_err().error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_from_path_resolves_relative_inputs() {
        let dir = TempDir::new("paths");
        let path = dir.write(
            "batch.json",
            r#"{ "reports": [ { "name": "a", "input": "a.csv", "preset": "gdp-all-industries" } ] }"#,
        );
        let spec = BatchSpec::from_path(&path).unwrap();
        assert_eq!(spec.reports[0].input, dir.0.join("a.csv"));
        assert!(spec.merges.is_empty());
    }
}
