//! CLI entry point for the aggregation pipeline.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use series_processing::presets::PRESETS;
use series_processing::{
    BatchRunner, BatchSpec, Granularity, KeywordGroup, Pipeline, PipelineConfig, PipelineOutput,
    RankingKind, Reducer, io, preset, preset_names,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible granularity enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliGranularity {
    /// Calendar quarters
    Quarter,
    /// Calendar months
    Month,
}

impl From<CliGranularity> for Granularity {
    fn from(cli: CliGranularity) -> Self {
        match cli {
            CliGranularity::Quarter => Granularity::Quarter,
            CliGranularity::Month => Granularity::Month,
        }
    }
}

/// CLI-compatible ranking enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRanking {
    /// Most observations first
    Frequency,
    /// Widest value range first
    Variation,
    /// Largest total first
    Cumulative,
}

impl From<CliRanking> for RankingKind {
    fn from(cli: CliRanking) -> Self {
        match cli {
            CliRanking::Frequency => RankingKind::Frequency,
            CliRanking::Variation => RankingKind::Variation,
            CliRanking::Cumulative => RankingKind::Cumulative,
        }
    }
}

/// CLI-compatible reducer enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReducer {
    /// Arithmetic mean of each group
    Mean,
    /// Sum of each group
    Sum,
}

impl From<CliReducer> for Reducer {
    fn from(cli: CliReducer) -> Self {
        match cli {
            CliReducer::Mean => Reducer::Mean,
            CliReducer::Sum => Reducer::Sum,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "series-processing",
    author,
    version,
    about = "Aggregate statistical extracts into time series by period and category",
    after_help = "EXAMPLES:\n  \
                  # Top 5 GDP sectors by cumulative value\n  \
                  series-processing aggregate -i gdp.csv --preset gdp-top5-sectors -o top5.csv\n\n  \
                  # Custom columns and ranking\n  \
                  series-processing aggregate -i rmpi.csv --category-column Product --ranking variation --top-k 3\n\n  \
                  # Run a batch of reports and merges\n  \
                  series-processing batch --spec reports.json --output-dir outputs/"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one aggregation over a CSV file
    Aggregate(AggregateArgs),
    /// Run every report and merge of a JSON batch file
    Batch(BatchArgs),
    /// List available presets
    Presets,
}

#[derive(Args, Debug)]
struct AggregateArgs {
    /// Path to the CSV file to process
    #[arg(short, long)]
    input: PathBuf,

    /// Start from a named preset (see `presets`)
    #[arg(short, long)]
    preset: Option<String>,

    /// Output CSV path for the aggregated table
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Period column name
    #[arg(long)]
    period_column: Option<String>,

    /// Category column name (long layout)
    #[arg(long)]
    category_column: Option<String>,

    /// Value column name (long layout)
    #[arg(long)]
    value_column: Option<String>,

    /// Measure column of a wide table (repeatable)
    #[arg(long = "measure")]
    measures: Vec<String>,

    /// Bucket size for periods
    #[arg(long, value_enum)]
    granularity: Option<CliGranularity>,

    /// Keep only the top categories under this ranking
    #[arg(long, value_enum)]
    ranking: Option<CliRanking>,

    /// Number of categories kept by the ranking
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Reduction applied per period and category
    #[arg(long, value_enum)]
    reducer: Option<CliReducer>,

    /// Keyword group as LABEL=KEYWORD,KEYWORD (repeatable, first match wins)
    #[arg(long = "keyword-group", value_parser = parse_keyword_group)]
    keyword_groups: Vec<KeywordGroup>,

    /// Label for categories matching no keyword group
    #[arg(long)]
    default_label: Option<String>,

    /// Drop observations dated before this day (YYYY-MM-DD)
    #[arg(long)]
    drop_before: Option<NaiveDate>,

    /// Category to exclude by exact label (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    /// Keep only categories containing this text
    #[arg(long)]
    include_matching: Option<String>,

    /// Fail on unparseable periods instead of dropping the rows
    #[arg(long)]
    strict_periods: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// JSON batch specification
    #[arg(short, long)]
    spec: PathBuf,

    /// Directory for report and merge outputs
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output the batch report as JSON to stdout
    #[arg(long)]
    json: bool,
}

fn parse_keyword_group(raw: &str) -> std::result::Result<KeywordGroup, String> {
    let (label, keywords) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=KEYWORD[,KEYWORD...], got '{}'", raw))?;
    Ok(KeywordGroup::new(
        label.trim(),
        keywords.split(',').map(str::trim).filter(|k| !k.is_empty()),
    ))
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let json_output = match &cli.command {
        Command::Aggregate(args) => args.json,
        Command::Batch(args) => args.json,
        Command::Presets => false,
    };
    init_logging(&cli.log_level, cli.quiet, json_output);

    // Load environment variables from .env file
    dotenv().ok();

    match cli.command {
        Command::Aggregate(args) => run_aggregate(&args),
        Command::Batch(args) => run_batch(&args),
        Command::Presets => {
            for p in PRESETS.iter() {
                println!("{:<24} {}", p.name, p.description);
            }
            Ok(())
        }
    }
}

/// Apply command line overrides on top of the preset (or default) configuration.
fn build_config(args: &AggregateArgs) -> Result<PipelineConfig> {
    let mut config = match &args.preset {
        Some(name) => preset(name).ok_or_else(|| {
            anyhow!(
                "Unknown preset '{}' (available: {})",
                name,
                preset_names().join(", ")
            )
        })?,
        None => PipelineConfig::default(),
    };

    if let Some(column) = &args.period_column {
        config.period_column = column.clone();
    }
    if let Some(column) = &args.category_column {
        config.category_column = column.clone();
    }
    if let Some(column) = &args.value_column {
        config.value_column = column.clone();
    }
    if !args.measures.is_empty() {
        config.measure_columns = args.measures.clone();
    }
    if let Some(granularity) = args.granularity {
        config.granularity = granularity.into();
    }
    if let Some(ranking) = args.ranking {
        config.ranking = Some(ranking.into());
    }
    if let Some(k) = args.top_k {
        config.top_k = k;
    }
    if let Some(reducer) = args.reducer {
        config.reducer = reducer.into();
    }
    if !args.keyword_groups.is_empty() {
        config.keyword_groups = args.keyword_groups.clone();
    }
    if let Some(label) = &args.default_label {
        config.default_label = label.clone();
    }
    if args.drop_before.is_some() {
        config.drop_before = args.drop_before;
    }
    if !args.exclude.is_empty() {
        config.exclude_categories.extend(args.exclude.iter().cloned());
    }
    if args.include_matching.is_some() {
        config.include_matching = args.include_matching.clone();
    }
    config.strict_periods |= args.strict_periods;

    Ok(config)
}

fn run_aggregate(args: &AggregateArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = build_config(args)?;
    let pipeline = Pipeline::builder().config(config).build()?;

    info!("Loading dataset from: {}", args.input.display());
    let df = io::load_csv(&args.input)?;

    let output = pipeline.run(&df).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    if let Some(path) = &args.output {
        let mut frame = output.table.to_dataframe()?;
        io::write_csv(path, &mut frame)?;
        info!("Aggregated table written to: {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_human_readable_summary(&output, &args.input, args.output.as_deref());
    Ok(())
}

fn run_batch(args: &BatchArgs) -> Result<()> {
    let spec = BatchSpec::from_path(&args.spec)?;

    let mut runner = BatchRunner::new();
    if let Some(dir) = &args.output_dir {
        runner = runner.output_dir(dir);
    }
    let report = runner.run(&spec);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{}", "=".repeat(80));
        println!("BATCH COMPLETE ({}ms)", report.duration_ms);
        println!("{}", "=".repeat(80));
        for outcome in &report.outcomes {
            match (&outcome.error, &outcome.output) {
                (Some(e), _) => println!("  ! {:<28} {}", outcome.name, e),
                (None, Some(path)) => {
                    println!("  - {:<28} {} rows -> {}", outcome.name, outcome.rows, path.display())
                }
                (None, None) => println!("  - {:<28} {} rows", outcome.name, outcome.rows),
            }
        }
        println!("{}", "=".repeat(80));
    }

    if report.failed() > 0 {
        return Err(anyhow!(
            "{} of {} batch items failed",
            report.failed(),
            report.outcomes.len()
        ));
    }
    Ok(())
}

/// Print a human-readable summary of one run.
///
/// Uses `println!` intentionally: this is the primary output, independent of log level.
fn print_human_readable_summary(output: &PipelineOutput, input: &Path, written: Option<&Path>) {
    let summary = &output.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("AGGREGATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Input:  {}", input.display());
    if let Some(path) = written {
        println!("Output: {} ({} rows)", path.display(), output.table.len());
    }
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} read, {} dropped, {} used",
        summary.rows_read, summary.rows_dropped, summary.rows_used
    );
    println!(
        "  Categories: {} -> {}",
        summary.categories_before, summary.categories_selected
    );
    println!("  Groups: {} ({})", summary.groups, output.table.reducer());
    println!();

    if let Some(selection) = &output.selection {
        println!("Selected by {}:", selection.strategy());
        for (rank, label) in selection.labels().iter().enumerate() {
            println!("  {}. {}", rank + 1, label);
        }
        println!();
    }

    let periods: Vec<_> = output.table.rows().iter().map(|r| r.period).collect();
    if let (Some(first), Some(last)) = (periods.first(), periods.last()) {
        println!("Periods: {} to {}", first, last);
    }

    if written.is_none() {
        println!("Use -o to write the aggregated table as CSV");
    }
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
