//! Per-record enrichment with bounded retry.
//!
//! [`Enricher::enrich`] classifies one record into an
//! [`EnrichmentOutcome`]:
//!
//! - every tracked field filled → `Skipped`, without touching the service
//! - service returns data with at least one missing field in it → `Success`
//! - service returns nothing, or nothing usable → `NoData` (not retried)
//! - transient failure → wait the backoff, retry up to `max_attempts`
//! - non-transient failure, or attempts exhausted → `Error`
//!
//! Every service call, including retries, first waits out the
//! inter-call delay enforced by [`Throttle`].

use std::time::Duration;

use enrich_pipeline_models::{DelayRange, EnrichmentOutcome, FieldValues, Record, RetryPolicy};
use rand::Rng as _;

use crate::service::EnrichmentService;
use crate::sleeper::Sleeper;

/// Enforces the minimum gap between consecutive service calls.
#[derive(Debug, Clone)]
pub struct Throttle {
    delay: DelayRange,
    calls: u64,
}

impl Throttle {
    /// Creates a throttle that has not seen any call yet.
    #[must_use]
    pub const fn new(delay: DelayRange) -> Self {
        Self { delay, calls: 0 }
    }

    /// Number of calls let through so far.
    #[must_use]
    pub const fn calls(&self) -> u64 {
        self.calls
    }

    /// Picks the next delay: fixed when the bounds are equal, otherwise
    /// uniform over the inclusive range.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let min = self.delay.min_ms.min(self.delay.max_ms);
        let max = self.delay.max_ms;
        if min == max {
            return Duration::from_millis(max);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Waits until the next call may be issued and counts it. The first
    /// call of a run goes through immediately.
    pub async fn acquire(&mut self, sleeper: &dyn Sleeper) {
        if self.calls > 0 && !self.delay.is_zero() {
            sleeper.sleep(self.next_delay()).await;
        }
        self.calls += 1;
    }
}

/// Merges newly extracted values into the known fields.
///
/// Only fields that are empty in `known` are taken from `extracted`, so a
/// filled value is never overwritten or cleared. Returns the merged
/// values and the number of fields that went from empty to filled.
#[must_use]
pub fn merge_fields(known: &FieldValues, extracted: &FieldValues) -> (FieldValues, usize) {
    let mut merged = known.clone();
    let mut filled = 0;
    for (name, current) in &mut merged {
        if !current.trim().is_empty() {
            continue;
        }
        if let Some(value) = extracted.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            *current = value.to_string();
            filled += 1;
        }
    }
    (merged, filled)
}

/// Enriches records one at a time against a single service.
pub struct Enricher<'a, S: EnrichmentService> {
    service: &'a S,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
    throttle: Throttle,
}

impl<'a, S: EnrichmentService> Enricher<'a, S> {
    /// Creates an enricher. The throttle starts fresh, so the first call
    /// is not delayed.
    #[must_use]
    pub const fn new(
        service: &'a S,
        sleeper: &'a dyn Sleeper,
        policy: RetryPolicy,
        delay: DelayRange,
    ) -> Self {
        Self {
            service,
            sleeper,
            policy,
            throttle: Throttle::new(delay),
        }
    }

    /// Total service calls issued so far.
    #[must_use]
    pub const fn calls(&self) -> u64 {
        self.throttle.calls()
    }

    /// Enriches one record.
    pub async fn enrich(&mut self, record: &Record) -> EnrichmentOutcome {
        if record.is_complete() {
            return EnrichmentOutcome::Skipped("all fields present".to_string());
        }

        let missing = record.missing_fields();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.throttle.acquire(self.sleeper).await;

            match self.service.fetch(record).await {
                Ok(Some(response)) => {
                    let extracted = self.service.extract(&response, &missing);
                    let (merged, filled) = merge_fields(&record.known, &extracted);
                    if filled == 0 {
                        log::debug!(
                            "{}: response for {} had none of {missing:?}",
                            self.service.name(),
                            record.identity
                        );
                        return EnrichmentOutcome::NoData;
                    }
                    for name in &missing {
                        let value = merged.get(*name).map_or("", String::as_str);
                        if !value.is_empty() {
                            log::info!("Found {name} for {}: {value}", record.identity);
                        }
                    }
                    return EnrichmentOutcome::Success(merged);
                }
                Ok(None) => {
                    log::warn!(
                        "{}: no data for {}",
                        self.service.name(),
                        record.identity
                    );
                    return EnrichmentOutcome::NoData;
                }
                Err(e) if e.is_transient() => {
                    log::warn!(
                        "Attempt {attempt}/{max_attempts} failed for {}: {e}",
                        record.identity
                    );
                    if attempt == max_attempts {
                        log::error!("All {max_attempts} attempts failed for {}", record.identity);
                        return EnrichmentOutcome::Error(format!(
                            "{e} (after {max_attempts} attempts)"
                        ));
                    }
                    self.sleeper.sleep(self.policy.backoff()).await;
                }
                Err(e) => {
                    log::error!("Unexpected error for {}: {e}", record.identity);
                    return EnrichmentOutcome::Error(e.to_string());
                }
            }
        }

        EnrichmentOutcome::Error(format!("gave up after {max_attempts} attempts"))
    }
}
