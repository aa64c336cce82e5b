//! Reverse geocoding as a pipeline enrichment service.

use std::time::Duration;

use async_trait::async_trait;
use enrich_pipeline::{EnrichmentService, FieldValues, Record, ServiceError};

use crate::GeocodeError;
use crate::address::{CityHint, extract_city, extract_street};
use crate::nominatim::{self, ReverseResult};
use crate::service_registry::{GeocodingService, ProviderConfig};

/// Default column filled with the street name.
pub const STREET_FIELD: &str = "Alamat_Jalan";

/// Default column filled with the city name.
pub const CITY_FIELD: &str = "Kota";

/// Fills street and city columns from a record's coordinates.
///
/// The record identity must be `"<lat>,<lon>"`, i.e. the pipeline's
/// identity columns are latitude then longitude.
#[derive(Debug, Clone)]
pub struct ReverseGeocoder {
    client: reqwest::Client,
    base_url: String,
    language: String,
    zoom: u8,
    city_hints: Vec<CityHint>,
    street_field: String,
    city_field: String,
}

impl ReverseGeocoder {
    /// Builds a geocoder from a registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(service: &GeocodingService) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(&service.user_agent)
            .timeout(Duration::from_secs(service.timeout_secs))
            .build()?;

        let ProviderConfig::Nominatim { base_url, zoom, .. } = &service.provider;

        Ok(Self {
            client,
            base_url: base_url.clone(),
            language: service.language.clone(),
            zoom: *zoom,
            city_hints: service.city_hints.clone(),
            street_field: STREET_FIELD.to_string(),
            city_field: CITY_FIELD.to_string(),
        })
    }

    /// Sends requests to `base_url` instead of the configured endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the language names are returned in.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Writes street and city into the given columns.
    #[must_use]
    pub fn with_fields(mut self, street: impl Into<String>, city: impl Into<String>) -> Self {
        self.street_field = street.into();
        self.city_field = city.into();
        self
    }

    /// Endpoint requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Parses a `"<lat>,<lon>"` identity into WGS84 coordinates.
///
/// # Errors
///
/// Returns [`ServiceError::Permanent`] if the identity is not two numbers
/// in coordinate range.
pub fn parse_coordinates(identity: &str) -> Result<(f64, f64), ServiceError> {
    let invalid = || ServiceError::permanent(format!("invalid coordinates '{identity}'"));

    let (lat, lon) = identity.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid());
    }
    Ok((lat, lon))
}

#[async_trait]
impl EnrichmentService for ReverseGeocoder {
    type Response = ReverseResult;

    fn name(&self) -> &str {
        "nominatim"
    }

    async fn fetch(&self, record: &Record) -> Result<Option<ReverseResult>, ServiceError> {
        let (lat, lon) = parse_coordinates(&record.identity)?;
        log::debug!("Reverse geocoding ({lat}, {lon})");
        nominatim::reverse(&self.client, &self.base_url, lat, lon, &self.language, self.zoom)
            .await
            .map_err(ServiceError::from)
    }

    fn extract(&self, response: &ReverseResult, missing: &[&str]) -> FieldValues {
        let mut fields = FieldValues::new();
        for &name in missing {
            let value = if name == self.street_field {
                extract_street(response)
            } else if name == self.city_field {
                extract_city(response, &self.city_hints)
            } else {
                None
            };
            if let Some(value) = value {
                fields.insert(name.to_string(), value);
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_registry::{DEFAULT_SERVICE, service};

    fn geocoder() -> ReverseGeocoder {
        ReverseGeocoder::new(&service(DEFAULT_SERVICE).unwrap()).unwrap()
    }

    fn response() -> ReverseResult {
        ReverseResult {
            display_name: Some("Jalan Tuparev, Karawang Barat, Jawa Barat".to_string()),
            address: [
                ("road".to_string(), "Jalan Tuparev".to_string()),
                ("county".to_string(), "Kabupaten Karawang".to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn parses_identity_coordinates() {
        assert_eq!(parse_coordinates("-6.305,107.301").unwrap(), (-6.305, 107.301));
        assert_eq!(parse_coordinates(" -6.3 , 107.3 ").unwrap(), (-6.3, 107.3));
    }

    #[test]
    fn rejects_bad_coordinates() {
        for identity in ["", "-6.3", "abc,107.3", "-6.3,", "95.0,107.3", "-6.3,200"] {
            let err = parse_coordinates(identity).unwrap_err();
            assert!(!err.is_transient(), "{identity}");
        }
    }

    #[test]
    fn extracts_only_missing_fields() {
        let geo = geocoder();
        let fields = geo.extract(&response(), &["Kota"]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["Kota"], "Karawang");

        let fields = geo.extract(&response(), &["Alamat_Jalan", "Kota"]);
        assert_eq!(fields["Alamat_Jalan"], "Jalan Tuparev");
    }

    #[test]
    fn custom_columns_are_honored() {
        let geo = geocoder().with_fields("street", "city");
        let fields = geo.extract(&response(), &["street", "city", "Kota"]);
        assert_eq!(fields["street"], "Jalan Tuparev");
        assert_eq!(fields["city"], "Karawang");
        assert!(!fields.contains_key("Kota"));
    }

    #[test]
    fn base_url_can_be_overridden() {
        let geo = geocoder().with_base_url("http://localhost:8080/reverse");
        assert_eq!(geo.base_url(), "http://localhost:8080/reverse");
    }

    #[tokio::test]
    async fn invalid_identity_fails_without_a_request() {
        let geo = geocoder().with_base_url("http://127.0.0.1:9/reverse");
        let record = Record {
            index: 0,
            identity: "not,coords".to_string(),
            values: Vec::new(),
            known: FieldValues::new(),
        };
        let err = geo.fetch(&record).await.unwrap_err();
        assert_eq!(err, ServiceError::permanent("invalid coordinates 'not,coords'"));
    }
}
