//! The run loop.
//!
//! Records are enriched strictly one at a time in input order. The only
//! waits are the inter-call delay and retry backoff, both routed through
//! the injected [`Sleeper`].

use std::path::Path;
use std::sync::Arc;

use enrich_pipeline_models::{
    EnrichmentOutcome, FieldImpact, OutcomeKind, PipelineConfig, Record, RunSummary,
};

use crate::PipelineError;
use crate::checkpoint::CheckpointStore;
use crate::enrich::{Enricher, merge_fields};
use crate::progress::{ProgressCallback, null_progress};
use crate::report::{ReportWriter, render, render_group, render_header};
use crate::service::EnrichmentService;
use crate::sleeper::Sleeper;
use crate::stats::RunStatsBuilder;
use crate::table::{Layout, read_table, write_table};

/// One configured pipeline run over a single service.
pub struct Pipeline<'a, S: EnrichmentService> {
    config: &'a PipelineConfig,
    service: &'a S,
    sleeper: &'a dyn Sleeper,
    progress: Arc<dyn ProgressCallback>,
}

impl<'a, S: EnrichmentService> Pipeline<'a, S> {
    /// Creates a pipeline with no progress reporting.
    #[must_use]
    pub fn new(config: &'a PipelineConfig, service: &'a S, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            config,
            service,
            sleeper,
            progress: null_progress(),
        }
    }

    /// Reports progress through `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let config = self.config;
        let invalid = |message: &str| -> Result<(), PipelineError> {
            Err(PipelineError::Config {
                message: message.to_string(),
            })
        };
        if config.fields.is_empty() {
            return invalid("at least one tracked field is required");
        }
        if config.retry.max_attempts == 0 {
            return invalid("max_attempts must be at least 1");
        }
        if config.checkpoint_every == 0 {
            return invalid("checkpoint_every must be at least 1");
        }
        if config.delay.min_ms > config.delay.max_ms {
            return invalid("min delay must not exceed max delay");
        }
        if config.max_records_per_run == Some(0) {
            return invalid("max_records_per_run must be at least 1");
        }
        Ok(())
    }

    /// Runs the pipeline to completion or to the per-run cap.
    ///
    /// Per-record failures are recorded as outcomes and never abort the
    /// run. Checkpoint and report write failures are logged and the run
    /// continues.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the configuration is invalid, the
    /// input cannot be read, the output directories cannot be created, or
    /// the final output cannot be written. In the last case the checkpoint
    /// is left in place.
    #[allow(clippy::too_many_lines)]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.validate()?;
        let config = self.config;
        let paths = &config.paths;

        if !paths.input.exists() {
            return Err(PipelineError::Input {
                path: paths.input.clone(),
                message: "file not found".to_string(),
            });
        }

        for path in [&paths.output, &paths.checkpoint, &paths.report] {
            ensure_parent(path)?;
        }

        log::info!("Reading {}...", paths.input.display());
        let table = read_table(&paths.input)?;
        let layout = Layout::new(&table.headers, config).map_err(|message| PipelineError::Input {
            path: paths.input.clone(),
            message,
        })?;
        let records = layout.records(table.rows);
        let total = records.len();
        log::info!("Loaded {total} rows");

        let store = CheckpointStore::new(&paths.checkpoint);
        let mut done = match store.load(&layout, &records) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!(
                    "Could not read checkpoint {}, starting over: {e}",
                    paths.checkpoint.display()
                );
                Vec::new()
            }
        };

        let mut stats = RunStatsBuilder::start();
        for (row, record) in done.iter_mut().zip(&records) {
            restore_fields(&layout, row, record);
            let kind = layout.kind_of(row).unwrap_or(OutcomeKind::Error);
            stats.restore(kind, layout.group_of(row));
        }

        let start = done.len();
        if start > 0 {
            log::info!("Checkpoint found, resuming from index {start}/{total}");
        }

        let report = ReportWriter::new(&paths.report);
        let started_at = chrono::Utc::now();
        report.append_or_warn(&render_header(
            self.service.name(),
            started_at,
            total,
            start,
            paths,
        ));

        self.progress.set_total(total as u64);
        self.progress.set_position(start as u64);
        self.progress.set_message(stats.progress_message());

        let end = config
            .max_records_per_run
            .map_or(total, |cap| total.min(start.saturating_add(cap)));

        let mut enricher = Enricher::new(self.service, self.sleeper, config.retry, config.delay);
        let mut current_group: Option<String> = done
            .last()
            .and_then(|row| layout.group_of(row))
            .map(str::to_string);

        for record in &records[start..end] {
            let group = layout.group_of(&record.values);
            if let Some(previous) = current_group.as_deref()
                && group != Some(previous)
            {
                log::info!("Group '{previous}' finished");
                report.append_or_warn(&render_group(previous, &stats.group(previous)));
            }
            current_group = group.map(str::to_string);

            let outcome = enricher.enrich(record).await;
            let kind = outcome.kind();
            let fields = match outcome {
                EnrichmentOutcome::Success(fields) => fields,
                EnrichmentOutcome::Skipped(_)
                | EnrichmentOutcome::NoData
                | EnrichmentOutcome::Error(_) => record.known.clone(),
            };

            done.push(layout.output_row(record, &fields, kind));
            stats.record(kind, group);

            self.progress.inc(1);
            self.progress.set_message(stats.progress_message());

            if done.len() % config.checkpoint_every == 0 && done.len() < total {
                self.flush(&store, &layout, &done);
            }
        }

        let completed = done.len() == total;
        if completed {
            if let Some(group) = current_group.as_deref() {
                report.append_or_warn(&render_group(group, &stats.group(group)));
            }
        } else {
            self.flush(&store, &layout, &done);
            log::info!(
                "Reached per-run cap at index {}/{total}; run again to continue",
                done.len()
            );
        }

        let input_rows: Vec<Vec<String>> = records.iter().map(|r| r.values.clone()).collect();
        let mut final_rows = done.clone();
        final_rows.extend_from_slice(&input_rows[done.len()..]);
        let before = layout.empty_counts(&input_rows);
        let after = layout.empty_counts(&final_rows);
        let fields = config
            .fields
            .iter()
            .map(|name| FieldImpact {
                field: name.clone(),
                empty_before: before.get(name).copied().unwrap_or(0),
                empty_after: after.get(name).copied().unwrap_or(0),
            })
            .collect();

        if completed {
            log::info!("Writing {} rows to {}...", done.len(), paths.output.display());
            write_table(&paths.output, &layout.headers, &done).map_err(|e| {
                log::error!(
                    "Failed to write output; checkpoint {} kept for resume",
                    paths.checkpoint.display()
                );
                PipelineError::Output {
                    path: paths.output.clone(),
                    message: e.to_string(),
                }
            })?;
            if let Err(e) = store.clear() {
                log::warn!(
                    "Output written but checkpoint {} could not be removed: {e}",
                    paths.checkpoint.display()
                );
            } else {
                log::info!("Checkpoint removed (run complete)");
            }
        }

        let summary = RunSummary {
            service: self.service.name().to_string(),
            input_rows: total,
            completed,
            stats: stats.finalize(),
            fields,
            paths: paths.clone(),
        };

        report.append_or_warn(&render(&summary));
        if let Err(e) = report.write_json(&summary) {
            log::warn!(
                "Failed to write report counts {}: {e}",
                report.json_path().display()
            );
        }

        self.progress.finish(format!(
            "{} | {}",
            if completed { "done" } else { "paused" },
            summary_line(&summary)
        ));
        log::info!("{}", summary_line(&summary));

        Ok(summary)
    }

    fn flush(&self, store: &CheckpointStore, layout: &Layout, done: &[Vec<String>]) {
        match store.save(&layout.headers, done) {
            Ok(()) => log::info!("Checkpoint saved at {} rows", done.len()),
            Err(e) => log::warn!(
                "Failed to save checkpoint {} (continuing): {e}",
                store.path().display()
            ),
        }
    }
}

/// Re-applies input values to a restored checkpoint row so a field that
/// is filled in the input never comes back empty.
fn restore_fields(layout: &Layout, row: &mut Vec<String>, record: &Record) {
    let restored = layout.fields_of(row);
    let (merged, _) = merge_fields(&record.known, &restored);
    let kind = layout.kind_of(row).unwrap_or(OutcomeKind::Error);
    *row = layout.output_row(record, &merged, kind);
}

fn summary_line(summary: &RunSummary) -> String {
    let counts = &summary.stats.counts;
    format!(
        "success {} | skip {} | no_data {} | error {} | rate {}",
        counts.success,
        counts.skip,
        counts.no_data,
        counts.error,
        crate::report::format_rate(counts)
    )
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
