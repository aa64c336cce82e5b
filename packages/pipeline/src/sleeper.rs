//! Injectable blocking waits.
//!
//! The pipeline never sleeps directly. Rate-limit delays and retry
//! backoff go through a [`Sleeper`] so tests can swap in [`NoopSleeper`]
//! or a recording double.

use std::time::Duration;

use async_trait::async_trait;

/// Something that can wait for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately.
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Returns immediately but remembers every requested duration.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSleeper {
    waits: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    /// Durations requested so far, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}
