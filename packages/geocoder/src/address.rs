//! Street and city extraction from reverse geocoding results.
//!
//! OSM tags Indonesian addresses inconsistently: the street may sit under
//! `road` or `pedestrian`, and the regency under `city`, `county` or
//! `state_district`. Each extractor walks a priority list of tags and
//! falls back to the free-form display name.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::nominatim::ReverseResult;

/// Address tags holding a street name, most specific first.
pub static STREET_KEYS: &[&str] = &["road", "street", "pedestrian", "highway"];

/// Address tags holding the city or regency, most specific first.
pub static CITY_KEYS: &[&str] = &["city", "town", "county", "state_district", "village"];

/// Lower-case substrings that mark a display name segment as a street.
pub static STREET_HINTS: &[&str] = &["jalan", "jln", "jl", "street", "road"];

/// Administrative prefixes stripped from city names.
static ADMIN_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:kabupaten|kota)\s+").expect("valid regex"));

/// A display name keyword that identifies a city when the structured
/// address has none.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CityHint {
    /// Lower-case substring searched for in each display name segment.
    pub keyword: String,
    /// Canonical city name used when the keyword matches.
    pub name: String,
}

/// Extracts the street name.
///
/// Returns the first non-blank tag from [`STREET_KEYS`], otherwise the
/// first display name segment if it looks like a street.
#[must_use]
pub fn extract_street(result: &ReverseResult) -> Option<String> {
    if let Some(street) = STREET_KEYS.iter().find_map(|key| result.part(key)) {
        return Some(street.to_string());
    }

    let first = result.display_segments().next()?;
    let lower = first.to_lowercase();
    if STREET_HINTS.iter().any(|hint| lower.contains(hint)) {
        log::debug!("Street taken from display name: {first}");
        return Some(first.to_string());
    }
    None
}

/// Extracts the city name without its `Kabupaten`/`Kota` prefix.
///
/// Returns the first non-blank tag from [`CITY_KEYS`], otherwise the
/// canonical name of the first hint whose keyword appears in a display
/// name segment.
#[must_use]
pub fn extract_city(result: &ReverseResult, hints: &[CityHint]) -> Option<String> {
    if let Some(city) = CITY_KEYS.iter().find_map(|key| result.part(key)) {
        let city = ADMIN_PREFIX_RE.replace(city, "");
        let city = city.trim();
        if !city.is_empty() {
            return Some(city.to_string());
        }
    }

    for segment in result.display_segments() {
        let lower = segment.to_lowercase();
        if let Some(hint) = hints.iter().find(|h| lower.contains(&h.keyword)) {
            log::debug!("City taken from display name segment '{segment}'");
            return Some(hint.name.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(display_name: Option<&str>, parts: &[(&str, &str)]) -> ReverseResult {
        ReverseResult {
            display_name: display_name.map(String::from),
            address: parts
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn karawang() -> Vec<CityHint> {
        vec![CityHint {
            keyword: "karawang".to_string(),
            name: "Karawang".to_string(),
        }]
    }

    #[test]
    fn street_follows_tag_priority() {
        let r = result(None, &[("pedestrian", "Gang Mawar"), ("road", "Jalan Tuparev")]);
        assert_eq!(extract_street(&r).as_deref(), Some("Jalan Tuparev"));

        let r = result(None, &[("highway", "Tol Cikampek"), ("pedestrian", "Gang Mawar")]);
        assert_eq!(extract_street(&r).as_deref(), Some("Gang Mawar"));
    }

    #[test]
    fn street_falls_back_to_display_name() {
        let r = result(Some("Jl. Interchange, Telukjambe, Karawang"), &[("village", "X")]);
        assert_eq!(extract_street(&r).as_deref(), Some("Jl. Interchange"));
    }

    #[test]
    fn display_name_without_street_hint_is_ignored() {
        let r = result(Some("Galuh Mas, Telukjambe, Karawang"), &[]);
        assert_eq!(extract_street(&r), None);
        // Only the first segment is considered.
        let r = result(Some("Ruko Galuh Mas, Jalan Arteri"), &[]);
        assert_eq!(extract_street(&r), None);
    }

    #[test]
    fn street_hint_matches_inside_words() {
        let r = result(Some("Jalanan Kampung Baru, Karawang"), &[]);
        assert_eq!(extract_street(&r).as_deref(), Some("Jalanan Kampung Baru"));

        let r = result(Some("Jl.Raya Klari, Karawang"), &[]);
        assert_eq!(extract_street(&r).as_deref(), Some("Jl.Raya Klari"));

        let r = result(Some("Broadway Plaza, Karawang"), &[]);
        assert_eq!(extract_street(&r).as_deref(), Some("Broadway Plaza"));
    }

    #[test]
    fn city_strips_administrative_prefix() {
        let r = result(None, &[("county", "Kabupaten Karawang")]);
        assert_eq!(extract_city(&r, &[]).as_deref(), Some("Karawang"));

        let r = result(None, &[("city", "Kota Bekasi"), ("county", "Kabupaten Bekasi")]);
        assert_eq!(extract_city(&r, &[]).as_deref(), Some("Bekasi"));
    }

    #[test]
    fn city_follows_tag_priority() {
        let r = result(None, &[("village", "Nagasari"), ("town", "Cikampek")]);
        assert_eq!(extract_city(&r, &[]).as_deref(), Some("Cikampek"));
    }

    #[test]
    fn city_falls_back_to_keyword_in_display_name() {
        let r = result(
            Some("Jalan Tuparev, Karawang Barat, Jawa Barat, Indonesia"),
            &[("road", "Jalan Tuparev")],
        );
        assert_eq!(extract_city(&r, &karawang()).as_deref(), Some("Karawang"));
        assert_eq!(extract_city(&r, &[]), None);
    }

    #[test]
    fn nothing_usable_yields_none() {
        let r = result(Some("Indonesia"), &[("country", "Indonesia")]);
        assert_eq!(extract_street(&r), None);
        assert_eq!(extract_city(&r, &karawang()), None);
    }
}
