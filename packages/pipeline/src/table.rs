//! CSV table I/O and the mapping between input rows, [`Record`]s, and
//! output rows.
//!
//! The output schema is the input header, plus any tracked field the
//! input lacked, plus the status column (reused in place if the input
//! already has one). Checkpoints use the same schema.

use std::collections::BTreeMap;
use std::path::Path;

use enrich_pipeline_models::{FieldValues, OutcomeKind, PipelineConfig, Record};

use crate::PipelineError;

/// Cell values treated as empty on load.
const NULL_MARKERS: &[&str] = &["nan", "NaN", "None", "null", "NULL"];

/// A CSV file read fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Header row.
    pub headers: Vec<String>,
    /// Data rows. Short rows are padded to the header width.
    pub rows: Vec<Vec<String>>,
}

/// Normalizes a raw cell: null markers and whitespace-only cells become
/// empty, everything else is kept verbatim.
#[must_use]
pub fn normalize_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed) {
        String::new()
    } else {
        raw.to_string()
    }
}

/// Reads a CSV file with a header row.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if the file cannot be opened or parsed.
pub fn read_table(path: &Path) -> Result<Table, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(normalize_cell).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

/// Writes a CSV file, replacing `path` only once the full file is on disk.
///
/// Rows are written to a `.tmp` sibling first and renamed over the
/// target, so a crash mid-write never leaves a truncated file behind.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be written or renamed.
pub fn write_table(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), PipelineError> {
    let tmp = tmp_path(path);
    let result = write_csv(&tmp, headers, rows)
        .and_then(|()| std::fs::rename(&tmp, path).map_err(PipelineError::from));
    if result.is_err()
        && let Err(e) = std::fs::remove_file(&tmp)
    {
        log::debug!("Could not remove {}: {e}", tmp.display());
    }
    result
}

fn write_csv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Column positions for one run's output schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Output header row.
    pub headers: Vec<String>,
    identity_idx: Vec<usize>,
    field_idx: BTreeMap<String, usize>,
    status_idx: usize,
    group_idx: Option<usize>,
}

impl Layout {
    /// Builds the output layout for an input header.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if an identity or group
    /// column is missing from the input.
    pub fn new(input_headers: &[String], config: &PipelineConfig) -> Result<Self, String> {
        let mut headers = input_headers.to_vec();
        let position = |headers: &[String], name: &str| headers.iter().position(|h| h == name);

        let identity_idx = config
            .identity_columns
            .iter()
            .map(|name| {
                position(&headers, name).ok_or_else(|| format!("missing identity column '{name}'"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let group_idx = match &config.group_column {
            Some(name) => Some(
                position(&headers, name).ok_or_else(|| format!("missing group column '{name}'"))?,
            ),
            None => None,
        };

        let mut field_idx = BTreeMap::new();
        for field in &config.fields {
            let idx = if let Some(idx) = position(&headers, field) {
                idx
            } else {
                log::info!("Input has no '{field}' column, adding an empty one");
                headers.push(field.clone());
                headers.len() - 1
            };
            field_idx.insert(field.clone(), idx);
        }

        let status_idx = if let Some(idx) = position(&headers, &config.status_column) {
            idx
        } else {
            headers.push(config.status_column.clone());
            headers.len() - 1
        };

        if field_idx.values().any(|&idx| idx == status_idx) {
            return Err(format!(
                "status column '{}' is also a tracked field",
                config.status_column
            ));
        }

        Ok(Self {
            headers,
            identity_idx,
            field_idx,
            status_idx,
            group_idx,
        })
    }

    /// Converts input rows into records, padding each to the output
    /// width.
    #[must_use]
    pub fn records(&self, rows: Vec<Vec<String>>) -> Vec<Record> {
        rows.into_iter()
            .enumerate()
            .map(|(index, mut values)| {
                values.resize(self.headers.len(), String::new());
                let identity = self.identity_of(&values, index);
                let known = self.fields_of(&values);
                Record {
                    index,
                    identity,
                    values,
                    known,
                }
            })
            .collect()
    }

    /// Builds the output row for `record` with the merged `fields` and
    /// the outcome `kind`.
    #[must_use]
    pub fn output_row(&self, record: &Record, fields: &FieldValues, kind: OutcomeKind) -> Vec<String> {
        let mut row = record.values.clone();
        row.resize(self.headers.len(), String::new());
        for (name, &idx) in &self.field_idx {
            if let Some(value) = fields.get(name) {
                row[idx].clone_from(value);
            }
        }
        row[self.status_idx] = kind.to_string();
        row
    }

    /// Tracked field values of an input or output row. Values are trimmed.
    #[must_use]
    pub fn fields_of(&self, row: &[String]) -> FieldValues {
        self.field_idx
            .iter()
            .map(|(name, &idx)| {
                let value = row.get(idx).map_or("", |v| v.trim());
                (name.clone(), value.to_string())
            })
            .collect()
    }

    /// Identity key of a row. Falls back to the row position when no
    /// identity columns are configured.
    #[must_use]
    pub fn identity_of(&self, row: &[String], index: usize) -> String {
        if self.identity_idx.is_empty() {
            return index.to_string();
        }
        self.identity_idx
            .iter()
            .map(|&idx| row.get(idx).map_or("", |v| v.trim()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses the status column of an output row.
    #[must_use]
    pub fn kind_of(&self, row: &[String]) -> Option<OutcomeKind> {
        row.get(self.status_idx)?.parse().ok()
    }

    /// Group column value of a row, if grouping is configured.
    #[must_use]
    pub fn group_of<'a>(&self, row: &'a [String]) -> Option<&'a str> {
        self.group_idx.and_then(|idx| row.get(idx)).map(String::as_str)
    }

    /// Number of empty cells per tracked field across `rows`.
    #[must_use]
    pub fn empty_counts(&self, rows: &[Vec<String>]) -> BTreeMap<String, u64> {
        self.field_idx
            .iter()
            .map(|(name, &idx)| {
                let empty = rows
                    .iter()
                    .filter(|row| row.get(idx).is_none_or(|v| v.trim().is_empty()))
                    .count() as u64;
                (name.clone(), empty)
            })
            .collect()
    }
}
