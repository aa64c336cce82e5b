//! Filter configuration loaded from TOML.
//!
//! Area boxes, category tags, and name keywords are data, not code: the
//! Karawang food & beverage preset is embedded from `filters/karawang.toml`
//! and any other region is a new file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::PoiError;
use crate::area::AreaFilter;
use crate::category::CategoryFilter;
use crate::dedup::DedupKey;

const KARAWANG_TOML: &str = include_str!("../filters/karawang.toml");

/// Settings for one POI filtering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiFilterConfig {
    /// Column holding the place name. Rows with an empty name are dropped.
    #[serde(default = "default_name_column")]
    pub name_column: String,
    /// Column holding the OSM tag value (`restaurant`, `bakery`, ...).
    #[serde(default = "default_category_column")]
    pub category_column: String,
    /// Latitude column.
    #[serde(default = "default_latitude_column")]
    pub latitude_column: String,
    /// Longitude column.
    #[serde(default = "default_longitude_column")]
    pub longitude_column: String,
    /// Drop rows whose category is empty, even when the name matches a
    /// keyword.
    #[serde(default)]
    pub require_category: bool,
    /// Duplicate key.
    #[serde(default)]
    pub dedup: DedupKey,
    /// Columns written to the output, in order. Columns missing from the
    /// input come out empty. Empty means keep the input columns as is.
    #[serde(default)]
    pub output_columns: Vec<String>,
    /// Area boxes.
    #[serde(default)]
    pub area: AreaFilter,
    /// Category tags and name keywords.
    #[serde(default)]
    pub category: CategoryFilter,
}

fn default_name_column() -> String {
    "Nama_Tempat".to_string()
}

fn default_category_column() -> String {
    "Kategori".to_string()
}

fn default_latitude_column() -> String {
    "Latitude".to_string()
}

fn default_longitude_column() -> String {
    "Longitude".to_string()
}

impl PoiFilterConfig {
    /// The embedded Karawang food & beverage preset.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the file is embedded).
    #[must_use]
    pub fn karawang() -> Self {
        Self::from_toml_str(KARAWANG_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded Karawang filter: {e}"))
    }

    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError::Config`] if the TOML is malformed or a
    /// bounding box has its minimum above its maximum.
    pub fn from_toml_str(s: &str) -> Result<Self, PoiError> {
        let config: Self = toml::de::from_str(s).map_err(|e| PoiError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, PoiError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), PoiError> {
        let mut boxes = self.area.include.iter().chain(&self.area.exclude);
        if let Some(bad) = boxes.find(|b| !b.is_valid()) {
            return Err(PoiError::Config {
                message: format!("bounding box {:?} has min above max", <[f64; 4]>::from(*bad)),
            });
        }
        if let DedupKey::Columns(columns) = &self.dedup
            && columns.is_empty()
        {
            return Err(PoiError::Config {
                message: "dedup columns must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
