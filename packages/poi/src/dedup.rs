//! Duplicate detection. The first occurrence of a key wins.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// What makes two rows duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// Same coordinates, compared to 1e-7 degrees.
    Coordinates,
    /// Same trimmed name.
    #[default]
    Name,
    /// Same trimmed values in every listed column.
    Columns(Vec<String>),
}

/// Remembers the keys seen so far.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: BTreeSet<String>,
}

impl Deduplicator {
    /// Records `key`, returning `true` if it was not seen before.
    pub fn first(&mut self, key: String) -> bool {
        self.seen.insert(key)
    }

    /// Number of distinct keys seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if no key was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Builds the key for a point with already-parsed coordinates.
#[must_use]
pub fn coordinate_key(lat: f64, lon: f64) -> String {
    format!("{lat:.7},{lon:.7}")
}

/// Builds the key from trimmed cell values.
#[must_use]
pub fn columns_key<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\u{1f}")
}
