#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record, outcome, configuration, and run statistics types for the
//! enrichment pipeline.
//!
//! This crate contains only data types and simple conversions. It has no
//! I/O and no network dependencies; the pipeline crate owns all of that.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Tracked field name → value. Empty strings mean "missing".
pub type FieldValues = BTreeMap<String, String>;

/// One unit of work read from the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Zero-based position in the input table. Stable across runs as long
    /// as the input file is unchanged.
    pub index: usize,
    /// Key derived from the identity columns (e.g. `"-6.3,107.3"`).
    pub identity: String,
    /// Every cell of the row, in header order.
    pub values: Vec<String>,
    /// Current values of the tracked enrichment fields.
    pub known: FieldValues,
}

impl Record {
    /// Returns `true` when every tracked field is present and non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.known.is_empty() && self.known.values().all(|v| !v.trim().is_empty())
    }

    /// Names of tracked fields that are still empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&str> {
        self.known
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Returns the current value of a tracked field, or `""`.
    #[must_use]
    pub fn field(&self, name: &str) -> &str {
        self.known.get(name).map_or("", String::as_str)
    }
}

/// Flat tag of an [`EnrichmentOutcome`], as written to the status column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
    /// New data was found for at least one missing field.
    Success,
    /// All tracked fields were already filled; no call was made.
    Skip,
    /// The service answered but had nothing usable.
    NoData,
    /// Retries were exhausted or the failure was not retryable.
    Error,
}

impl OutcomeKind {
    /// All kinds, in report order.
    pub const ALL: [Self; 4] = [Self::Success, Self::Skip, Self::NoData, Self::Error];
}

/// Result of attempting to enrich one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Merged field values after filling at least one missing field.
    Success(FieldValues),
    /// The record already had every tracked field.
    Skipped(String),
    /// The service was reachable but returned nothing usable.
    NoData,
    /// The service failed; carries a human-readable description.
    Error(String),
}

impl EnrichmentOutcome {
    /// Returns the flat status tag for this outcome.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Skipped(_) => OutcomeKind::Skip,
            Self::NoData => OutcomeKind::NoData,
            Self::Error(_) => OutcomeKind::Error,
        }
    }
}

/// Counters per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// Records with [`OutcomeKind::Success`].
    pub success: u64,
    /// Records with [`OutcomeKind::Skip`].
    pub skip: u64,
    /// Records with [`OutcomeKind::NoData`].
    pub no_data: u64,
    /// Records with [`OutcomeKind::Error`].
    pub error: u64,
}

impl OutcomeCounts {
    /// Increments the counter for `kind`.
    pub const fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Success => self.success += 1,
            OutcomeKind::Skip => self.skip += 1,
            OutcomeKind::NoData => self.no_data += 1,
            OutcomeKind::Error => self.error += 1,
        }
    }

    /// Returns the counter for `kind`.
    #[must_use]
    pub const fn get(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Success => self.success,
            OutcomeKind::Skip => self.skip,
            OutcomeKind::NoData => self.no_data,
            OutcomeKind::Error => self.error,
        }
    }

    /// Total number of recorded outcomes.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.success + self.skip + self.no_data + self.error
    }

    /// Records that required a service call (total minus skipped).
    #[must_use]
    pub const fn attempted(&self) -> u64 {
        self.total() - self.skip
    }

    /// Successes over attempted records, as a percentage.
    ///
    /// Returns `None` when nothing was attempted (every record skipped or
    /// an empty input).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.attempted();
        if attempted == 0 {
            return None;
        }
        Some(self.success as f64 / attempted as f64 * 100.0)
    }
}

/// Aggregate statistics for one run, finalized at run end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Counts over every output row, including rows restored from a
    /// checkpoint.
    pub counts: OutcomeCounts,
    /// Counts per group, keyed by the group column's value.
    pub groups: BTreeMap<String, OutcomeCounts>,
    /// Input position the run resumed from (0 for a fresh run).
    pub resumed_from: usize,
    /// Records processed by this run (excludes restored rows).
    pub processed: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the statistics were finalized.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Before/after empty-cell counts for one tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldImpact {
    /// Column name.
    pub field: String,
    /// Empty cells in the input.
    pub empty_before: u64,
    /// Empty cells in the merged output.
    pub empty_after: u64,
}

impl FieldImpact {
    /// Number of cells that went from empty to filled.
    #[must_use]
    pub const fn filled(&self) -> u64 {
        self.empty_before.saturating_sub(self.empty_after)
    }
}

/// Everything a caller needs to know about a finished (or paused) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Name of the enrichment service used.
    pub service: String,
    /// Number of rows in the input table.
    pub input_rows: usize,
    /// `true` when every record was processed and the output written.
    /// `false` when the run stopped at the per-run cap.
    pub completed: bool,
    /// Aggregate outcome statistics.
    pub stats: RunStatistics,
    /// Per-field enrichment impact.
    pub fields: Vec<FieldImpact>,
    /// Files touched by the run.
    pub paths: PipelinePaths,
}

/// File locations used by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePaths {
    /// Input CSV.
    pub input: PathBuf,
    /// Final output CSV.
    pub output: PathBuf,
    /// Resume checkpoint CSV.
    pub checkpoint: PathBuf,
    /// Plain-text summary report. A `.json` sibling holds the counts.
    pub report: PathBuf,
    /// Event log file, if one is written.
    #[serde(default)]
    pub log: Option<PathBuf>,
}

/// Retry behaviour for a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of service calls per record.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed wait between attempts after a transient failure, in
    /// milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Backoff as a [`Duration`].
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Bounds for the delay enforced between consecutive service calls.
///
/// When `min_ms == max_ms` the delay is fixed; otherwise it is drawn
/// uniformly from the inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    /// Lower bound in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub min_ms: u64,
    /// Upper bound in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub max_ms: u64,
}

impl DelayRange {
    /// A fixed delay.
    #[must_use]
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    /// Returns `true` if no delay should be applied at all.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::fixed(default_delay_ms())
    }
}

/// Configuration for one pipeline run, constructed once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Files read and written by the run.
    pub paths: PipelinePaths,
    /// Columns whose values form the record identity, in order.
    #[serde(default = "default_identity_columns")]
    pub identity_columns: Vec<String>,
    /// Enrichment fields tracked per record.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    /// Column added to the output holding the [`OutcomeKind`].
    #[serde(default = "default_status_column")]
    pub status_column: String,
    /// Optional column partitioning the input into named groups for
    /// per-group reporting.
    #[serde(default)]
    pub group_column: Option<String>,
    /// Per-record retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Delay between consecutive service calls.
    #[serde(default)]
    pub delay: DelayRange,
    /// Flush the checkpoint after this many processed records.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    /// Stop after processing this many records in one run.
    #[serde(default)]
    pub max_records_per_run: Option<usize>,
}

impl PipelineConfig {
    /// Creates a configuration with default columns and limits for the
    /// given file locations.
    #[must_use]
    pub fn new(paths: PipelinePaths) -> Self {
        Self {
            paths,
            identity_columns: default_identity_columns(),
            fields: default_fields(),
            status_column: default_status_column(),
            group_column: None,
            retry: RetryPolicy::default(),
            delay: DelayRange::default(),
            checkpoint_every: default_checkpoint_every(),
            max_records_per_run: None,
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    2_000
}

const fn default_delay_ms() -> u64 {
    2_000
}

const fn default_checkpoint_every() -> usize {
    10
}

fn default_identity_columns() -> Vec<String> {
    vec!["Latitude".to_string(), "Longitude".to_string()]
}

fn default_fields() -> Vec<String> {
    vec!["Alamat_Jalan".to_string(), "Kota".to_string()]
}

fn default_status_column() -> String {
    "Geocoding_Status".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    fn record(street: &str, city: &str) -> Record {
        Record {
            index: 0,
            identity: "-6.3,107.3".to_string(),
            values: vec![],
            known: [
                ("Alamat_Jalan".to_string(), street.to_string()),
                ("Kota".to_string(), city.to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn complete_record_has_no_missing_fields() {
        let r = record("Jl. A", "X");
        assert!(r.is_complete());
        assert!(r.missing_fields().is_empty());
    }

    #[test]
    fn whitespace_counts_as_missing() {
        let r = record("  ", "X");
        assert!(!r.is_complete());
        assert_eq!(r.missing_fields(), vec!["Alamat_Jalan"]);
    }

    #[test]
    fn record_without_tracked_fields_is_not_complete() {
        let r = Record {
            index: 0,
            identity: String::new(),
            values: vec![],
            known: FieldValues::new(),
        };
        assert!(!r.is_complete());
    }

    #[test]
    fn outcome_kind_round_trips_through_status_strings() {
        for kind in OutcomeKind::ALL {
            assert_eq!(OutcomeKind::from_str(kind.as_ref()).unwrap(), kind);
        }
        assert_eq!(OutcomeKind::NoData.to_string(), "no_data");
        assert_eq!(OutcomeKind::Skip.to_string(), "skip");
    }

    #[test]
    fn success_rate_excludes_skipped() {
        let mut counts = OutcomeCounts::default();
        counts.record(OutcomeKind::Success);
        counts.record(OutcomeKind::Error);
        counts.record(OutcomeKind::Skip);
        counts.record(OutcomeKind::Skip);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.attempted(), 2);
        let rate = counts.success_rate().unwrap();
        assert!((rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn success_rate_is_none_when_everything_skipped() {
        let mut counts = OutcomeCounts::default();
        counts.record(OutcomeKind::Skip);
        assert!(counts.success_rate().is_none());
        assert!(OutcomeCounts::default().success_rate().is_none());
    }

    #[test]
    fn config_defaults_fill_missing_toml_keys() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [paths]
            input = "in.csv"
            output = "out.csv"
            checkpoint = "backup.csv"
            report = "report.txt"
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.checkpoint_every, 10);
        assert_eq!(config.fields, vec!["Alamat_Jalan", "Kota"]);
        assert_eq!(config.status_column, "Geocoding_Status");
        assert_eq!(config.delay, DelayRange::fixed(2_000));
        assert!(config.paths.log.is_none());
    }
}
