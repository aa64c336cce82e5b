#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filters for scraped point-of-interest tables.
//!
//! Turns a raw `OpenStreetMap` export into a clean input table for the
//! enrichment pipeline: unnamed places, places outside the covered area
//! or inside carved-out coastal strips, off-topic categories, and
//! duplicates are dropped. All of it is driven by a
//! [`PoiFilterConfig`] TOML file.

pub mod area;
pub mod category;
pub mod config;
pub mod dedup;
pub mod filter;

pub use area::{AreaFilter, BoundingBox};
pub use category::CategoryFilter;
pub use config::PoiFilterConfig;
pub use dedup::DedupKey;
pub use filter::{DropReason, FilterReport, filter_file, filter_rows};

use enrich_pipeline::PipelineError;
use thiserror::Error;

/// Errors from POI filtering.
#[derive(Debug, Error)]
pub enum PoiError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing a table failed.
    #[error(transparent)]
    Table(#[from] PipelineError),

    /// The filter configuration is invalid.
    #[error("Invalid filter configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// A configured column is not in the input.
    #[error("Column '{column}' not found in input")]
    MissingColumn {
        /// Column name.
        column: String,
    },
}
