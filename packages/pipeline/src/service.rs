//! The external service boundary.
//!
//! An [`EnrichmentService`] turns a record's identity into a structured
//! response, and knows how to pull tracked field values out of that
//! response. The pipeline makes no assumption about transport; tests
//! replace the service entirely.

use async_trait::async_trait;
use enrich_pipeline_models::{FieldValues, Record};

/// Failure classes reported by a service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Timeout, temporary unavailability, rate limiting, or a server
    /// error. Retried up to the attempt limit.
    #[error("transient failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// Malformed request, unexpected response, or any other failure that
    /// retrying will not fix.
    #[error("permanent failure: {message}")]
    Permanent {
        /// Description of the failure.
        message: String,
    },
}

impl ServiceError {
    /// Creates a [`ServiceError::Transient`].
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a [`ServiceError::Permanent`].
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Returns `true` if the call is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// A rate-limited, unreliable source of enrichment data.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Structured response returned by a successful call.
    type Response: Send + Sync;

    /// Short name used in logs and reports (e.g. `"nominatim"`).
    fn name(&self) -> &str;

    /// Performs one call for `record`.
    ///
    /// Returns `Ok(None)` when the service answered but had no data for
    /// this record.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the call failed; the variant decides
    /// whether the pipeline retries.
    async fn fetch(&self, record: &Record) -> Result<Option<Self::Response>, ServiceError>;

    /// Extracts values for the `missing` fields from `response`.
    ///
    /// Implementations must be pure. Fields they cannot fill may be
    /// omitted or returned empty; names outside `missing` are ignored.
    fn extract(&self, response: &Self::Response, missing: &[&str]) -> FieldValues;
}
