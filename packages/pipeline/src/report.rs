//! Human-readable run reports.
//!
//! The report file is append-only: a header block when the run starts,
//! one section per finished group (when a group column is configured),
//! and a results block at the end. A `.json` sibling holds the same
//! counts in machine-readable form.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use enrich_pipeline_models::{OutcomeCounts, OutcomeKind, PipelinePaths, RunStatistics, RunSummary};

const RULE: &str = "======================================================================";
const SUBRULE: &str = "--------------------------------------------------";

/// Formats a success rate, or `n/a` when nothing was attempted.
#[must_use]
pub fn format_rate(counts: &OutcomeCounts) -> String {
    counts
        .success_rate()
        .map_or_else(|| "n/a".to_string(), |rate| format!("{rate:.2}%"))
}

/// Flat counts per outcome kind plus `total` and `attempted`.
#[must_use]
pub fn counts(stats: &RunStatistics) -> BTreeMap<String, u64> {
    let mut map: BTreeMap<String, u64> = OutcomeKind::ALL
        .iter()
        .map(|kind| (kind.to_string(), stats.counts.get(*kind)))
        .collect();
    map.insert("total".to_string(), stats.counts.total());
    map.insert("attempted".to_string(), stats.counts.attempted());
    map
}

/// Machine-readable summary written next to the text report.
#[must_use]
pub fn to_json(summary: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "service": summary.service,
        "completed": summary.completed,
        "input_rows": summary.input_rows,
        "resumed_from": summary.stats.resumed_from,
        "processed": summary.stats.processed,
        "elapsed_secs": summary.stats.elapsed.as_secs_f64(),
        "counts": counts(&summary.stats),
        "success_rate": summary.stats.counts.success_rate(),
        "fields": summary.fields,
        "groups": summary.stats.groups,
    })
}

/// Header written when a run starts.
#[must_use]
pub fn render_header(
    service: &str,
    started_at: DateTime<Utc>,
    input_rows: usize,
    resumed_from: usize,
    paths: &PipelinePaths,
) -> String {
    Header {
        service,
        started_at,
        input_rows,
        resumed_from,
        paths,
    }
    .to_string()
}

/// Section written when a group finishes.
#[must_use]
pub fn render_group(name: &str, counts: &OutcomeCounts) -> String {
    GroupSection { name, counts }.to_string()
}

/// Results block written at run end (or when a run pauses at its cap).
#[must_use]
pub fn render(summary: &RunSummary) -> String {
    Results(summary).to_string()
}

struct Header<'a> {
    service: &'a str,
    started_at: DateTime<Utc>,
    input_rows: usize,
    resumed_from: usize,
    paths: &'a PipelinePaths,
}

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "ENRICHMENT RUN ({})", self.service)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Started: {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Input: {}", self.paths.input.display())?;
        writeln!(f, "Output: {}", self.paths.output.display())?;
        if let Some(log) = &self.paths.log {
            writeln!(f, "Log: {}", log.display())?;
        }
        writeln!(f, "Input rows: {}", self.input_rows)?;
        if self.resumed_from > 0 {
            writeln!(
                f,
                "Resuming from checkpoint: index {}/{}",
                self.resumed_from, self.input_rows
            )
        } else {
            writeln!(f, "Starting from the beginning")
        }
    }
}

struct GroupSection<'a> {
    name: &'a str,
    counts: &'a OutcomeCounts,
}

impl fmt::Display for GroupSection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nGROUP: {}", self.name)?;
        writeln!(f, "{SUBRULE}")?;
        write_counts(f, self.counts)
    }
}

struct Results<'a>(&'a RunSummary);

impl fmt::Display for Results<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        let stats = &summary.stats;
        let secs = stats.elapsed.as_secs();

        writeln!(f, "\nRESULTS")?;
        writeln!(f, "{SUBRULE}")?;
        writeln!(f, "Elapsed: {}m {}s", secs / 60, secs % 60)?;
        writeln!(f, "Rows in input: {}", summary.input_rows)?;
        writeln!(f, "Rows restored from checkpoint: {}", stats.resumed_from)?;
        writeln!(f, "Rows processed this run: {}", stats.processed)?;

        writeln!(f, "\nSTATUS COUNTS:")?;
        write_counts(f, &stats.counts)?;

        writeln!(f, "\nFIELD IMPACT:")?;
        writeln!(f, "{SUBRULE}")?;
        for field in &summary.fields {
            writeln!(
                f,
                "{}: empty before {}, empty after {} ({} filled)",
                field.field,
                field.empty_before,
                field.empty_after,
                field.filled()
            )?;
        }

        if !stats.groups.is_empty() {
            writeln!(f, "\nGROUPS:")?;
            writeln!(f, "{SUBRULE}")?;
            for (name, counts) in &stats.groups {
                writeln!(
                    f,
                    "{name}: success {} | skip {} | no_data {} | error {} | rate {}",
                    counts.success,
                    counts.skip,
                    counts.no_data,
                    counts.error,
                    format_rate(counts)
                )?;
            }
        }

        writeln!(f, "\nFILES:")?;
        writeln!(f, "{SUBRULE}")?;
        if summary.completed {
            writeln!(f, "Output: {}", summary.paths.output.display())?;
        } else {
            writeln!(f, "Checkpoint: {}", summary.paths.checkpoint.display())?;
        }
        if let Some(log) = &summary.paths.log {
            writeln!(f, "Log: {}", log.display())?;
        }
        writeln!(f, "Report: {}", summary.paths.report.display())?;

        writeln!(f, "\n{RULE}")?;
        if summary.completed {
            writeln!(f, "RUN COMPLETE")?;
        } else {
            writeln!(f, "RUN PAUSED (per-run cap reached, checkpoint kept)")?;
        }
        writeln!(f, "{RULE}")
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, counts: &OutcomeCounts) -> fmt::Result {
    for kind in OutcomeKind::ALL {
        writeln!(f, "  {kind}: {}", counts.get(kind))?;
    }
    writeln!(f, "  success rate: {}", format_rate(counts))
}

/// Appends to the report file and writes its `.json` sibling.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Creates a writer for `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the text report.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the JSON counts file.
    #[must_use]
    pub fn json_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }

    /// Appends `text` to the report file, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or written.
    pub fn append(&self, text: &str) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())
    }

    /// Appends `text`, logging instead of failing.
    pub fn append_or_warn(&self, text: &str) {
        if let Err(e) = self.append(text) {
            log::warn!("Failed to write report {}: {e}", self.path.display());
        }
    }

    /// Overwrites the JSON counts file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn write_json(&self, summary: &RunSummary) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(&to_json(summary))?;
        std::fs::write(self.json_path(), body)
    }
}
