//! Error types for the aggregation pipeline.
//!
//! Every step raises its error at the boundary where the problem is detected;
//! nothing is retried and nothing is partially recovered. Errors are scoped to
//! a single pipeline invocation, so a batch of reports can keep going when one
//! of them fails.
//!
//! Errors are serializable so that batch outcomes can be written as JSON.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::config::{ConfigValidationError, Granularity};

/// The main error type for the aggregation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required column is absent after label normalization.
    #[error("Column '{column}' not found in dataset (available: {})", available.join(", "))]
    Schema {
        column: String,
        available: Vec<String>,
    },

    /// No rows remain for the named stage to consume.
    #[error("No observations left for {stage}")]
    EmptyInput { stage: &'static str },

    /// A period label could not be converted under the configured granularity.
    #[error("Cannot parse period '{label}' as a {granularity} bucket")]
    Parse {
        label: String,
        granularity: Granularity,
    },

    /// A series was expected to hold one value per period but did not.
    #[error("Period {period} appears more than once in series '{series}'")]
    AmbiguousPeriod { series: String, period: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable code for the error kind, preserved through added context.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::EmptyInput { .. } => "EMPTY_INPUT",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::AmbiguousPeriod { .. } => "AMBIGUOUS_PERIOD",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error comes from the data itself rather than from setup or IO.
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::Schema { .. }
            | Self::EmptyInput { .. }
            | Self::Parse { .. }
            | Self::AmbiguousPeriod { .. } => true,
            Self::WithContext { source, .. } => source.is_data_error(),
            _ => false,
        }
    }
}

impl From<ConfigValidationError> for PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
