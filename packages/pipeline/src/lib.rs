#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable batch enrichment pipeline.
//!
//! Reads a CSV table, enriches each record one at a time through an
//! [`EnrichmentService`], and writes the merged table back out with a
//! status column. Progress is flushed to a checkpoint file every few
//! records so an interrupted run picks up where it left off:
//!
//! 1. [`table`] loads the input and lays out the output columns.
//! 2. [`checkpoint`] restores the processed prefix of a prior run.
//! 3. [`enrich`] calls the service with bounded retry and the inter-call
//!    delay, classifying each record into an [`EnrichmentOutcome`].
//! 4. [`stats`] and [`report`] aggregate outcomes into the summary files.
//!
//! [`run::Pipeline`] ties the steps together.

pub mod checkpoint;
pub mod enrich;
pub mod progress;
pub mod report;
pub mod run;
pub mod service;
pub mod sleeper;
pub mod stats;
pub mod table;

pub use enrich_pipeline_models::{
    DelayRange, EnrichmentOutcome, FieldValues, OutcomeCounts, OutcomeKind, PipelineConfig,
    PipelinePaths, Record, RetryPolicy, RunStatistics, RunSummary,
};
pub use run::Pipeline;
pub use service::{EnrichmentService, ServiceError};
pub use sleeper::{NoopSleeper, Sleeper, TokioSleeper};

use std::path::PathBuf;

/// Errors that abort a pipeline run.
///
/// Per-record service failures never surface here; they are recorded as
/// [`EnrichmentOutcome::Error`] instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// I/O error (directory creation, file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The input table is missing or unusable.
    #[error("Input error ({}): {message}", .path.display())]
    Input {
        /// Input file path.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The final output could not be written. The checkpoint is left in
    /// place so the next run can resume.
    #[error("Failed to write output {}: {message}", .path.display())]
    Output {
        /// Output file path.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the invalid setting.
        message: String,
    },
}
