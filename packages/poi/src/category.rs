//! Category and name keyword matching.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Keeps rows whose category is an allowed tag value, or whose name
/// contains one of the keywords.
///
/// Tag values are grouped by OSM key (`amenity`, `shop`, ...) in
/// configuration; matching ignores the key. A filter with no tags and no
/// keywords keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    /// Allowed tag values per OSM key.
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
    /// Lower-case substrings searched for in the name.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CategoryFilter {
    /// Every allowed tag value, lower-cased.
    #[must_use]
    pub fn allowed(&self) -> BTreeSet<String> {
        self.tags
            .values()
            .flatten()
            .map(|v| v.trim().to_lowercase())
            .collect()
    }

    /// Returns `true` if nothing is filtered out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.tags.values().all(Vec::is_empty)
    }

    /// Returns a matcher with the allowed set precomputed.
    #[must_use]
    pub fn matcher(&self) -> CategoryMatcher {
        CategoryMatcher {
            allowed: self.allowed(),
            keywords: self.keywords.iter().map(|k| k.to_lowercase()).collect(),
            keep_all: self.is_empty(),
        }
    }
}

/// A [`CategoryFilter`] ready to test many rows.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    allowed: BTreeSet<String>,
    keywords: Vec<String>,
    keep_all: bool,
}

impl CategoryMatcher {
    /// Returns `true` if the row is kept.
    #[must_use]
    pub fn matches(&self, category: &str, name: &str) -> bool {
        if self.keep_all || self.allowed.contains(&category.trim().to_lowercase()) {
            return true;
        }
        let name = name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(k.as_str()))
    }
}
