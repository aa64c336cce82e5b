//! Running outcome counters for one run.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use enrich_pipeline_models::{OutcomeCounts, OutcomeKind, RunStatistics};

/// Accumulates outcome counts while a run is in progress.
///
/// Mutated once per record, finalized once at run end. Nothing here is
/// persisted incrementally.
#[derive(Debug, Clone)]
pub struct RunStatsBuilder {
    counts: OutcomeCounts,
    groups: BTreeMap<String, OutcomeCounts>,
    resumed_from: usize,
    processed: usize,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RunStatsBuilder {
    /// Starts the clock.
    #[must_use]
    pub fn start() -> Self {
        Self {
            counts: OutcomeCounts::default(),
            groups: BTreeMap::new(),
            resumed_from: 0,
            processed: 0,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Counts an outcome restored from a checkpoint. Restored rows show up
    /// in the totals but not in [`RunStatistics::processed`].
    pub fn restore(&mut self, kind: OutcomeKind, group: Option<&str>) {
        self.add(kind, group);
        self.resumed_from += 1;
    }

    /// Counts an outcome produced by this run.
    pub fn record(&mut self, kind: OutcomeKind, group: Option<&str>) {
        self.add(kind, group);
        self.processed += 1;
    }

    fn add(&mut self, kind: OutcomeKind, group: Option<&str>) {
        self.counts.record(kind);
        if let Some(group) = group {
            self.groups.entry(group.to_string()).or_default().record(kind);
        }
    }

    /// Counts so far over every row.
    #[must_use]
    pub const fn counts(&self) -> &OutcomeCounts {
        &self.counts
    }

    /// Counts so far for one group.
    #[must_use]
    pub fn group(&self, group: &str) -> OutcomeCounts {
        self.groups.get(group).copied().unwrap_or_default()
    }

    /// One-line progress message, e.g. `ok 3 | skip 1 | none 0 | err 0`.
    #[must_use]
    pub fn progress_message(&self) -> String {
        format!(
            "ok {} | skip {} | none {} | err {}",
            self.counts.success, self.counts.skip, self.counts.no_data, self.counts.error
        )
    }

    /// Closes out timing.
    #[must_use]
    pub fn finalize(self) -> RunStatistics {
        RunStatistics {
            counts: self.counts,
            groups: self.groups,
            resumed_from: self.resumed_from,
            processed: self.processed,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restored_rows_count_in_totals_only() {
        let mut stats = RunStatsBuilder::start();
        stats.restore(OutcomeKind::Success, None);
        stats.restore(OutcomeKind::Skip, None);
        stats.record(OutcomeKind::Error, None);
        let stats = stats.finalize();
        assert_eq!(stats.counts.total(), 3);
        assert_eq!(stats.resumed_from, 2);
        assert_eq!(stats.processed, 1);
        assert!(stats.finished_at >= stats.started_at);
    }

    #[test]
    fn groups_are_counted_separately() {
        let mut stats = RunStatsBuilder::start();
        stats.record(OutcomeKind::Success, Some("persib"));
        stats.record(OutcomeKind::NoData, Some("persib"));
        stats.record(OutcomeKind::Success, Some("arema"));
        assert_eq!(stats.group("persib").total(), 2);
        assert_eq!(stats.group("arema").success, 1);
        assert_eq!(stats.group("unknown").total(), 0);
        assert_eq!(stats.progress_message(), "ok 2 | skip 0 | none 1 | err 0");
    }
}
