//! Progress reporting trait for long-running runs.
//!
//! Defines a [`ProgressCallback`] trait that decouples progress reporting
//! from any specific rendering backend. The CLI provides an `indicatif`
//! implementation; library callers and tests use [`NullProgress`].

use std::sync::Arc;

/// Trait for reporting progress from a pipeline run.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A no-op [`ProgressCallback`].
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
