//! Pipeline module.
//!
//! This module provides the aggregation pipeline and the batch runner built on it.

pub mod batch;
mod builder;

pub use batch::{BatchReport, BatchRunner, BatchSpec, MergeSpec, ReportOutcome, ReportSpec, SeriesRef};
pub use builder::{Pipeline, PipelineBuilder};
