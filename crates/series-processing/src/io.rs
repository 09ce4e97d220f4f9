//! CSV loading and writing.
//!
//! Statistical extracts come in mixed encodings, sometimes with a byte order
//! mark. Every column is read as a
//! string so that marker values such as `..` or `x` in a numeric column never
//! fail schema inference; the normalizer parses values itself.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result, ResultExt};
use crate::utils::BOM_ARTIFACTS;

/// Load a CSV file with every column typed as string.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(PipelineError::from)
        .context(format!("Failed to read {}", path.display()))?;

    let text = decode_text(&bytes);
    let df = read_csv_str(&text).context(format!("Failed to parse {}", path.display()))?;

    info!(
        "Loaded {}: {} rows x {} columns",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Decode file bytes as UTF-8, falling back to Latin-1, and strip a leading BOM.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!("Input is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    };

    let mut start = text.as_str();
    while let Some(artifact) = BOM_ARTIFACTS.iter().find(|a| start.starts_with(**a)) {
        start = &start[artifact.len()..];
    }
    start.to_string()
}

/// Parse CSV text with a header row.
///
/// Doubled quotes inside quoted fields are RFC 4180 escapes and are kept as a
/// single literal quote.
pub fn read_csv_str(content: &str) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .into_reader_with_file_handle(Cursor::new(content.to_string()))
        .finish()
        .map_err(PipelineError::from)
}

/// Write a frame as comma separated CSV with a header, creating parent directories.
pub fn write_csv(path: impl AsRef<Path>, df: &mut DataFrame) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)
        .context(format!("Failed to write {}", path.display()))?;

    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
