#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding for the enrichment pipeline.
//!
//! Fills missing street and city columns from a record's coordinates
//! using Nominatim / `OpenStreetMap`:
//!
//! - [`nominatim`] performs one reverse lookup and parses the response.
//! - [`address`] picks the street and city out of the structured address,
//!   falling back to the free-form display name.
//! - [`reverse::ReverseGeocoder`] plugs both into the pipeline as an
//!   [`enrich_pipeline::EnrichmentService`].
//!
//! Endpoint settings live in TOML files under `services/` and are loaded
//! through the [`service_registry`].

pub mod address;
pub mod nominatim;
pub mod reverse;
pub mod service_registry;

pub use reverse::ReverseGeocoder;

use enrich_pipeline::ServiceError;
use thiserror::Error;

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code returned by the server.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

impl GeocodeError {
    /// Returns `true` for failures that may succeed on a later attempt:
    /// timeouts, connection failures, rate limiting, and server errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            Self::Status { status } => *status >= 500,
            Self::RateLimited => true,
            Self::Parse { .. } => false,
        }
    }
}

impl From<GeocodeError> for ServiceError {
    fn from(e: GeocodeError) -> Self {
        if e.is_transient() {
            Self::transient(e.to_string())
        } else {
            Self::permanent(e.to_string())
        }
    }
}
