//! Checkpoint / resume store.
//!
//! The checkpoint is a CSV with the output schema holding the processed
//! prefix of the input. Its row count is the resume position. The file
//! is created lazily on the first flush, overwritten on every flush, and
//! removed once the final output is on disk; its presence means a prior
//! run was interrupted.

use std::path::{Path, PathBuf};

use std::str::FromStr as _;

use enrich_pipeline_models::{OutcomeCounts, OutcomeKind, Record};

use crate::PipelineError;
use crate::table::{Layout, read_table, write_table};

/// What an interrupted run left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointSummary {
    /// Rows processed so far, i.e. the resume position.
    pub rows: usize,
    /// Outcomes of those rows.
    pub counts: OutcomeCounts,
    /// Rows whose status is missing or unknown.
    pub unreadable: usize,
}

/// File-backed checkpoint for one pipeline run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store backed by `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a checkpoint from a prior run exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the processed prefix of a prior run.
    ///
    /// Returns an empty prefix when there is no checkpoint, or when the
    /// checkpoint cannot belong to an unfinished run over `records`:
    ///
    /// - its header differs from the output layout,
    /// - it has as many rows as the input or more (left behind by a run
    ///   that finished but failed to remove it),
    /// - a row has an unknown status or its identity does not match the
    ///   input row at the same position.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the file exists but cannot be read.
    pub fn load(&self, layout: &Layout, records: &[Record]) -> Result<Vec<Vec<String>>, PipelineError> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let table = read_table(&self.path)?;

        if table.rows.is_empty() {
            return Ok(Vec::new());
        }

        if table.headers != layout.headers {
            log::warn!(
                "Ignoring checkpoint {}: columns do not match the current input",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        if table.rows.len() >= records.len() {
            log::warn!(
                "Ignoring stale checkpoint {} ({} rows for {} input rows); a previous run already finished",
                self.path.display(),
                table.rows.len(),
                records.len()
            );
            return Ok(Vec::new());
        }

        for (row, record) in table.rows.iter().zip(records) {
            if layout.kind_of(row).is_none() {
                log::warn!(
                    "Ignoring checkpoint {}: row {} has no valid status",
                    self.path.display(),
                    record.index
                );
                return Ok(Vec::new());
            }
            let identity = layout.identity_of(row, record.index);
            if identity != record.identity {
                log::warn!(
                    "Ignoring checkpoint {}: row {} is '{identity}' but input has '{}'",
                    self.path.display(),
                    record.index,
                    record.identity
                );
                return Ok(Vec::new());
            }
        }

        Ok(table.rows)
    }

    /// Counts the outcomes recorded in the checkpoint without validating it
    /// against an input. Returns `None` when there is no checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the file cannot be read, or
    /// [`PipelineError::Input`] if it has no `status_column`.
    pub fn summary(&self, status_column: &str) -> Result<Option<CheckpointSummary>, PipelineError> {
        if !self.exists() {
            return Ok(None);
        }
        let table = read_table(&self.path)?;
        let status_idx = table
            .headers
            .iter()
            .position(|h| h == status_column)
            .ok_or_else(|| PipelineError::Input {
                path: self.path.clone(),
                message: format!("status column '{status_column}' not found"),
            })?;

        let mut summary = CheckpointSummary {
            rows: table.rows.len(),
            counts: OutcomeCounts::default(),
            unreadable: 0,
        };
        for row in &table.rows {
            match OutcomeKind::from_str(row[status_idx].trim()) {
                Ok(kind) => summary.counts.record(kind),
                Err(_) => summary.unreadable += 1,
            }
        }
        Ok(Some(summary))
    }

    /// Persists the full processed prefix, replacing any previous
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the file cannot be written.
    pub fn save(&self, headers: &[String], rows: &[Vec<String>]) -> Result<(), PipelineError> {
        write_table(&self.path, headers, rows)
    }

    /// Removes the checkpoint, marking the run as complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file exists but cannot be
    /// removed.
    pub fn clear(&self) -> Result<(), PipelineError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrich_pipeline_models::{PipelineConfig, PipelinePaths};

    fn setup(rows: usize) -> (Layout, Vec<Record>) {
        let config = PipelineConfig::new(PipelinePaths {
            input: "in.csv".into(),
            output: "out.csv".into(),
            checkpoint: "backup.csv".into(),
            report: "report.txt".into(),
            log: None,
        });
        let headers: Vec<String> = ["Latitude", "Longitude", "Alamat_Jalan", "Kota"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let layout = Layout::new(&headers, &config).unwrap();
        let records = layout.records(
            (0..rows)
                .map(|i| vec![format!("-6.{i}"), "107.3".to_string(), String::new(), String::new()])
                .collect(),
        );
        (layout, records)
    }

    fn done_rows(layout: &Layout, records: &[Record]) -> Vec<Vec<String>> {
        records
            .iter()
            .map(|r| layout.output_row(r, &r.known, enrich_pipeline_models::OutcomeKind::NoData))
            .collect()
    }

    #[test]
    fn missing_checkpoint_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(3);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        assert!(!store.exists());
        assert!(store.load(&layout, &records).unwrap().is_empty());
    }

    #[test]
    fn saves_and_restores_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(5);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        let rows = done_rows(&layout, &records[..2]);
        store.save(&layout.headers, &rows).unwrap();
        assert_eq!(store.load(&layout, &records).unwrap(), rows);
    }

    #[test]
    fn full_length_checkpoint_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(3);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        store.save(&layout.headers, &done_rows(&layout, &records)).unwrap();
        assert!(store.load(&layout, &records).unwrap().is_empty());
    }

    #[test]
    fn checkpoint_for_other_input_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(4);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        let mut rows = done_rows(&layout, &records[..2]);
        rows[1][0] = "0.0".to_string();
        store.save(&layout.headers, &rows).unwrap();
        assert!(store.load(&layout, &records).unwrap().is_empty());
    }

    #[test]
    fn checkpoint_with_unknown_status_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(4);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        let mut rows = done_rows(&layout, &records[..1]);
        rows[0][4] = "max_attempts".to_string();
        store.save(&layout.headers, &rows).unwrap();
        assert!(store.load(&layout, &records).unwrap().is_empty());
    }

    #[test]
    fn summarizes_recorded_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(4);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        assert_eq!(store.summary("Geocoding_Status").unwrap(), None);

        let mut rows = done_rows(&layout, &records[..3]);
        rows[0][4] = "success".to_string();
        rows[2][4] = "bogus".to_string();
        store.save(&layout.headers, &rows).unwrap();

        let summary = store.summary("Geocoding_Status").unwrap().unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.counts.success, 1);
        assert_eq!(summary.counts.no_data, 1);
        assert_eq!(summary.unreadable, 1);
        assert!(matches!(
            store.summary("Status"),
            Err(PipelineError::Input { .. })
        ));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (layout, records) = setup(2);
        let store = CheckpointStore::new(dir.path().join("backup.csv"));
        store.save(&layout.headers, &done_rows(&layout, &records[..1])).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }
}
