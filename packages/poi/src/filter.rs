//! The filtering pass over a table of scraped places.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use enrich_pipeline::table::{read_table, write_table};
use strum_macros::Display;

use crate::PoiError;
use crate::area::AreaMatch;
use crate::config::PoiFilterConfig;
use crate::dedup::{DedupKey, Deduplicator, columns_key, coordinate_key};

/// Why a row was dropped. Checks run in declaration order and a row is
/// counted under the first one it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    /// Empty name.
    MissingName,
    /// Latitude or longitude missing or not a number.
    BadCoordinates,
    /// Not inside any include box.
    OutsideArea,
    /// Inside an exclude box.
    Excluded,
    /// Empty category while a category is required.
    MissingCategory,
    /// Neither the category nor the name matched.
    NotMatched,
    /// An earlier row had the same dedup key.
    Duplicate,
}

/// Counts from one filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Rows read.
    pub input_rows: usize,
    /// Rows kept.
    pub kept: usize,
    /// Rows dropped, per reason.
    pub dropped: BTreeMap<DropReason, u64>,
    /// Rows kept, per category. Rows without one count under
    /// [`UNCATEGORIZED`].
    pub kept_per_category: BTreeMap<String, u64>,
}

/// Category bucket for kept rows with an empty category.
pub const UNCATEGORIZED: &str = "(none)";

impl FilterReport {
    /// Rows dropped for `reason`.
    #[must_use]
    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    /// Rows dropped for any reason.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    fn drop_row(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    fn keep_row(&mut self, category: &str) {
        let category = if category.is_empty() { UNCATEGORIZED } else { category };
        *self.kept_per_category.entry(category.to_string()).or_insert(0) += 1;
    }

    /// Multi-line human-readable summary.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows read: {}", self.input_rows)?;
        writeln!(f, "Rows kept: {}", self.kept)?;
        for (reason, count) in &self.dropped {
            writeln!(f, "  dropped ({reason}): {count}")?;
        }
        if !self.kept_per_category.is_empty() {
            writeln!(f, "Kept per category:")?;
            let mut categories: Vec<_> = self.kept_per_category.iter().collect();
            categories.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (category, count) in categories {
                writeln!(f, "  {category}: {count}")?;
            }
        }
        Ok(())
    }
}

/// Column positions resolved against one header row.
struct Columns {
    name: usize,
    category: Option<usize>,
    latitude: usize,
    longitude: usize,
    dedup: Vec<usize>,
}

impl Columns {
    fn resolve(headers: &[String], config: &PoiFilterConfig) -> Result<Self, PoiError> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| PoiError::MissingColumn {
                    column: column.to_string(),
                })
        };

        let category = if config.require_category || !config.category.is_empty() {
            Some(find(&config.category_column)?)
        } else {
            headers.iter().position(|h| *h == config.category_column)
        };

        let dedup = match &config.dedup {
            DedupKey::Columns(columns) => columns.iter().map(|c| find(c)).collect::<Result<_, _>>()?,
            DedupKey::Coordinates | DedupKey::Name => Vec::new(),
        };

        Ok(Self {
            name: find(&config.name_column)?,
            category,
            latitude: find(&config.latitude_column)?,
            longitude: find(&config.longitude_column)?,
            dedup,
        })
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map_or("", |v| v.trim())
}

fn parse_coordinate(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Applies name, coordinate, area, category and duplicate checks to
/// `rows`, in that order. Kept rows are returned unchanged and in input
/// order.
///
/// # Errors
///
/// Returns [`PoiError::MissingColumn`] if a configured column is absent
/// from `headers`.
pub fn filter_rows(
    headers: &[String],
    rows: Vec<Vec<String>>,
    config: &PoiFilterConfig,
) -> Result<(Vec<Vec<String>>, FilterReport), PoiError> {
    let columns = Columns::resolve(headers, config)?;
    let matcher = config.category.matcher();
    let mut dedup = Deduplicator::default();
    let mut report = FilterReport {
        input_rows: rows.len(),
        ..FilterReport::default()
    };
    let mut kept = Vec::new();

    for row in rows {
        let name = cell(&row, columns.name);
        if name.is_empty() {
            report.drop_row(DropReason::MissingName);
            continue;
        }

        let (Some(lat), Some(lon)) = (
            parse_coordinate(cell(&row, columns.latitude)),
            parse_coordinate(cell(&row, columns.longitude)),
        ) else {
            report.drop_row(DropReason::BadCoordinates);
            continue;
        };

        match config.area.classify(lat, lon) {
            AreaMatch::Inside => {}
            AreaMatch::Outside => {
                report.drop_row(DropReason::OutsideArea);
                continue;
            }
            AreaMatch::Excluded => {
                report.drop_row(DropReason::Excluded);
                continue;
            }
        }

        let category = columns.category.map_or("", |i| cell(&row, i));
        if config.require_category && category.is_empty() {
            report.drop_row(DropReason::MissingCategory);
            continue;
        }
        if !matcher.matches(category, name) {
            report.drop_row(DropReason::NotMatched);
            continue;
        }

        let key = match &config.dedup {
            DedupKey::Coordinates => coordinate_key(lat, lon),
            DedupKey::Name => name.to_string(),
            DedupKey::Columns(_) => columns_key(columns.dedup.iter().map(|&i| cell(&row, i))),
        };
        if !dedup.first(key) {
            report.drop_row(DropReason::Duplicate);
            continue;
        }

        report.keep_row(category);
        kept.push(row);
    }

    report.kept = kept.len();
    log::info!(
        "Kept {} of {} rows ({} dropped)",
        report.kept,
        report.input_rows,
        report.total_dropped()
    );
    Ok((kept, report))
}

/// Reorders `rows` into `columns`. Columns absent from `headers` come out
/// empty.
#[must_use]
pub fn project(headers: &[String], rows: &[Vec<String>], columns: &[String]) -> Vec<Vec<String>> {
    let idx: Vec<Option<usize>> = columns
        .iter()
        .map(|c| headers.iter().position(|h| h == c))
        .collect();
    rows.iter()
        .map(|row| {
            idx.iter()
                .map(|i| i.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Filters the CSV at `input` and writes the kept rows to `output`,
/// projected to the configured output columns.
///
/// # Errors
///
/// Returns [`PoiError`] if the input cannot be read, a configured column
/// is missing, or the output cannot be written.
pub fn filter_file(
    input: &Path,
    output: &Path,
    config: &PoiFilterConfig,
) -> Result<FilterReport, PoiError> {
    log::info!("Reading {}...", input.display());
    let table = read_table(input)?;
    let (rows, report) = filter_rows(&table.headers, table.rows, config)?;

    let (headers, rows) = if config.output_columns.is_empty() {
        (table.headers, rows)
    } else {
        let projected = project(&table.headers, &rows, &config.output_columns);
        (config.output_columns.clone(), projected)
    };

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    write_table(output, &headers, &rows)?;
    log::info!("Wrote {} rows to {}", rows.len(), output.display());
    Ok(report)
}
