//! Geographic inclusion and exclusion boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 coordinates.
///
/// Serialized as `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub min_lon: f64,
    /// Southern latitude boundary.
    pub min_lat: f64,
    /// Eastern longitude boundary.
    pub max_lon: f64,
    /// Northern latitude boundary.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Returns `true` if the point lies inside the box or on its edge.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }

    /// Returns `true` if the minimums do not exceed the maximums.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_lon <= self.max_lon && self.min_lat <= self.max_lat
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Self {
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_lon, b.min_lat, b.max_lon, b.max_lat]
    }
}

/// Where an [`AreaFilter`] placed a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaMatch {
    /// Inside the covered area.
    Inside,
    /// Not inside any include box.
    Outside,
    /// Inside an exclude box.
    Excluded,
}

/// Keeps points inside any include box and inside no exclude box.
///
/// An empty include list covers the whole globe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaFilter {
    /// Boxes that make up the covered area.
    #[serde(default)]
    pub include: Vec<BoundingBox>,
    /// Boxes carved out of the covered area.
    #[serde(default)]
    pub exclude: Vec<BoundingBox>,
}

impl AreaFilter {
    /// Classifies a point.
    #[must_use]
    pub fn classify(&self, lat: f64, lon: f64) -> AreaMatch {
        if !self.include.is_empty() && !self.include.iter().any(|b| b.contains(lat, lon)) {
            AreaMatch::Outside
        } else if self.exclude.iter().any(|b| b.contains(lat, lon)) {
            AreaMatch::Excluded
        } else {
            AreaMatch::Inside
        }
    }

    /// Returns `true` if the point is kept.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.classify(lat, lon) == AreaMatch::Inside
    }
}
