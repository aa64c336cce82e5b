//! Nominatim / `OpenStreetMap` reverse geocoder client.
//!
//! The public instance allows at most one request per second; the
//! pipeline's inter-call delay (see `rate_limit_ms` in the service TOML)
//! keeps runs under that.
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use std::collections::BTreeMap;

use crate::GeocodeError;

/// A parsed reverse geocoding answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseResult {
    /// Comma-separated full address, most specific part first.
    pub display_name: Option<String>,
    /// Structured address parts keyed by OSM tag (`road`, `city`, ...).
    pub address: BTreeMap<String, String>,
}

impl ReverseResult {
    /// Returns the non-blank address part stored under `key`.
    #[must_use]
    pub fn part(&self, key: &str) -> Option<&str> {
        self.address
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated segments of the display name, trimmed.
    pub fn display_segments(&self) -> impl Iterator<Item = &str> {
        self.display_name
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Looks up the address at `lat`/`lon`.
///
/// Returns `Ok(None)` when Nominatim has nothing at that location. The
/// caller is responsible for rate limiting.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the request fails, the server answers
/// with a non-success status, or the body is not valid JSON.
pub async fn reverse(
    client: &reqwest::Client,
    base_url: &str,
    lat: f64,
    lon: f64,
    language: &str,
    zoom: u8,
) -> Result<Option<ReverseResult>, GeocodeError> {
    let resp = client
        .get(base_url)
        .query(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
            ("zoom", zoom.to_string()),
            ("accept-language", language.to_string()),
        ])
        .send()
        .await?;

    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }
    if !status.is_success() {
        return Err(GeocodeError::Status {
            status: status.as_u16(),
        });
    }

    let text = resp.text().await?;
    let body: serde_json::Value = serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
        message: format!("Nominatim response is not JSON: {e}"),
    })?;
    parse_response(&body)
}

/// Parses a Nominatim reverse response.
///
/// An `{"error": ...}` body ("Unable to geocode") or a body without an
/// `address` object means there is no data for the location.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body is not a JSON object.
pub fn parse_response(body: &serde_json::Value) -> Result<Option<ReverseResult>, GeocodeError> {
    let object = body.as_object().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an object".to_string(),
    })?;

    if let Some(error) = object.get("error") {
        log::debug!("Nominatim returned no result: {error}");
        return Ok(None);
    }

    let Some(address) = object.get("address").and_then(serde_json::Value::as_object) else {
        return Ok(None);
    };

    let address = address
        .iter()
        .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
        .collect();

    Ok(Some(ReverseResult {
        display_name: object
            .get("display_name")
            .and_then(serde_json::Value::as_str)
            .map(String::from),
        address,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reverse_result() {
        let body = serde_json::json!({
            "place_id": 123,
            "lat": "-6.3050",
            "lon": "107.3010",
            "display_name": "Jalan Tuparev, Nagasari, Karawang Barat, Jawa Barat, Indonesia",
            "address": {
                "road": "Jalan Tuparev",
                "village": "Nagasari",
                "county": "Kabupaten Karawang",
                "state": "Jawa Barat",
                "country_code": "id"
            }
        });
        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result.part("road"), Some("Jalan Tuparev"));
        assert_eq!(result.part("county"), Some("Kabupaten Karawang"));
        assert_eq!(result.part("city"), None);
        assert_eq!(result.display_segments().count(), 5);
    }

    #[test]
    fn error_body_is_no_data() {
        let body = serde_json::json!({ "error": "Unable to geocode" });
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn missing_address_is_no_data() {
        let body = serde_json::json!({ "display_name": "Somewhere" });
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn non_object_body_is_a_parse_error() {
        let body = serde_json::json!([]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn blank_parts_are_ignored() {
        let body = serde_json::json!({
            "address": { "road": "  ", "house_number": 12 }
        });
        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result.part("road"), None);
        assert!(!result.address.contains_key("house_number"));
        assert_eq!(result.display_segments().count(), 0);
    }
}
