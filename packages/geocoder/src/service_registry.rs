//! Compile-time registry of geocoding service configurations.
//!
//! Each service is defined in a TOML file under `services/`. The registry
//! embeds these at compile time and exposes them via [`all_services`] and
//! [`service`].

use serde::Deserialize;

use crate::address::CityHint;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service can be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `User-Agent` header sent with every request. Public Nominatim
    /// blocks generic agents.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Preferred language for returned names.
    #[serde(default = "default_language")]
    pub language: String,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
    /// Display name keywords used when the structured address has no city.
    #[serde(default)]
    pub city_hints: Vec<CityHint>,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Nominatim / `OpenStreetMap` reverse endpoint.
    Nominatim {
        /// Reverse endpoint URL (e.g.,
        /// `"https://nominatim.openstreetmap.org/reverse"`).
        base_url: String,
        /// Minimum delay between requests in milliseconds.
        rate_limit_ms: u64,
        /// Level of detail requested (18 is building level).
        #[serde(default = "default_zoom")]
        zoom: u8,
    },
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_zoom() -> u8 {
    18
}

fn default_language() -> String {
    "id".to_string()
}

impl GeocodingService {
    /// Returns the provider's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Nominatim { base_url, .. } => base_url,
        }
    }

    /// Minimum delay between requests in milliseconds.
    #[must_use]
    pub const fn rate_limit_ms(&self) -> u64 {
        match &self.provider {
            ProviderConfig::Nominatim { rate_limit_ms, .. } => *rate_limit_ms,
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[("nominatim", include_str!("../services/nominatim.toml"))];

/// Id of the service used when none is selected.
pub const DEFAULT_SERVICE: &str = "nominatim";

/// Returns all geocoding service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns the enabled service with the given id.
#[must_use]
pub fn service(id: &str) -> Option<GeocodingService> {
    all_services().into_iter().find(|s| s.enabled && s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_services() {
        assert_eq!(all_services().len(), SERVICE_TOMLS.len());
    }

    #[test]
    fn service_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for svc in &all_services() {
            assert!(seen.insert(svc.id.clone()), "Duplicate service ID: {}", svc.id);
        }
    }

    #[test]
    fn all_services_have_required_fields() {
        for svc in &all_services() {
            assert!(!svc.id.is_empty(), "Service has empty id");
            assert!(!svc.name.is_empty(), "Service {} has empty name", svc.id);
            assert!(!svc.user_agent.is_empty(), "Service {} has empty user agent", svc.id);
            assert!(!svc.base_url().is_empty(), "Service {} has empty base_url", svc.id);
        }
    }

    #[test]
    fn default_service_is_available() {
        let svc = service(DEFAULT_SERVICE).unwrap();
        assert_eq!(svc.rate_limit_ms(), 2000);
        assert_eq!(svc.language, "id");
        assert_eq!(svc.city_hints[0].name, "Karawang");
        assert!(service("census").is_none());
    }

    #[test]
    fn optional_fields_have_defaults() {
        let svc: GeocodingService = toml::de::from_str(
            r#"
            id = "local"
            name = "Local Nominatim"
            user_agent = "test"

            [provider]
            type = "nominatim"
            base_url = "http://localhost:8080/reverse"
            rate_limit_ms = 0
            "#,
        )
        .unwrap();
        assert!(svc.enabled);
        assert_eq!(svc.timeout_secs, 10);
        assert!(svc.city_hints.is_empty());
        assert!(matches!(svc.provider, ProviderConfig::Nominatim { zoom: 18, .. }));
    }
}
