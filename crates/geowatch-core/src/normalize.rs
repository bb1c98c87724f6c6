//! Result normalizer
//!
//! Maps heterogeneous provider payloads onto [`GeoRecord`]. Each canonical
//! field is resolved first-match-wins over a list of alias keys. A key only
//! matches when its value is non-null and non-empty, and for text fields only
//! when it also yields text, so an `as` object without an `asn` inside falls
//! through to the next alias. A missing key is never an error; an unparsable
//! coordinate is.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::GeoRecord;
use crate::traits::RawPayload;

const QUERY_KEYS: &[&str] = &["query", "ip", "ipAddress"];
const COUNTRY_KEYS: &[&str] = &["country", "countryName"];
const REGION_KEYS: &[&str] = &["regionName", "region", "stateProv"];
const CITY_KEYS: &[&str] = &["city"];
const ISP_KEYS: &[&str] = &["isp", "org"];
const AS_KEYS: &[&str] = &["as", "asn"];
const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LON_KEYS: &[&str] = &["lon", "longitude"];

/// Combined "lat,lon" key used by ipinfo
const LOC_KEY: &str = "loc";

/// Normalize a raw provider payload
pub fn normalize(payload: &RawPayload) -> Result<GeoRecord> {
    let (loc_lat, loc_lon) = split_loc(payload);

    Ok(GeoRecord {
        query: text_field(payload, QUERY_KEYS).unwrap_or_default(),
        country: text_field(payload, COUNTRY_KEYS),
        region: text_field(payload, REGION_KEYS),
        city: text_field(payload, CITY_KEYS),
        isp: text_field(payload, ISP_KEYS),
        as_number: text_field(payload, AS_KEYS),
        latitude: coordinate(payload, LAT_KEYS, "latitude", loc_lat)?,
        longitude: coordinate(payload, LON_KEYS, "longitude", loc_lon)?,
    })
}

/// First alias whose value is present and non-empty
fn first_present<'a>(payload: &'a RawPayload, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| payload.get(*k))
        .find(|v| !is_empty(v))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// First alias that yields non-empty text
fn text_field(payload: &RawPayload, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| payload.get(*k))
        .filter(|v| !is_empty(v))
        .find_map(value_to_text)
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // ipinfo paid plans nest ASN details: {"asn": "AS7303", "name": ...}
        Value::Object(map) => map.get("asn").and_then(value_to_text),
        _ => None,
    }
}

fn coordinate(
    payload: &RawPayload,
    keys: &[&str],
    field: &str,
    fallback: Option<&str>,
) -> Result<Option<f64>> {
    match first_present(payload, keys) {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::normalize(field, format!("{} is not representable as f64", n))),
        Some(Value::String(s)) => parse_coordinate(field, s).map(Some),
        Some(other) => Err(Error::normalize(
            field,
            format!("expected a number, got {}", other),
        )),
        None => fallback.map(|s| parse_coordinate(field, s)).transpose(),
    }
}

fn parse_coordinate(field: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::normalize(field, format!("invalid number: {:?}", raw)))?;
    if !value.is_finite() {
        return Err(Error::normalize(field, format!("non-finite value: {:?}", raw)));
    }
    Ok(value)
}

fn split_loc(payload: &RawPayload) -> (Option<&str>, Option<&str>) {
    match payload.get(LOC_KEY).and_then(Value::as_str) {
        Some(loc) if !loc.trim().is_empty() => {
            let mut parts = loc.splitn(2, ',');
            (parts.next(), parts.next())
        }
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> RawPayload {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_ip_api_shape() {
        let record = normalize(&payload(json!({
            "status": "success",
            "country": "Argentina",
            "regionName": "Buenos Aires F.D.",
            "city": "Buenos Aires",
            "lat": -34.6037,
            "lon": -58.3816,
            "isp": "Telecom Argentina S.A.",
            "as": "AS7303 Telecom Argentina S.A.",
            "query": "190.130.109.115"
        })))
        .unwrap();

        assert_eq!(record.query, "190.130.109.115");
        assert_eq!(record.country.as_deref(), Some("Argentina"));
        assert_eq!(record.region.as_deref(), Some("Buenos Aires F.D."));
        assert_eq!(record.latitude, Some(-34.6037));
        assert_eq!(record.longitude, Some(-58.3816));
        assert_eq!(record.as_number.as_deref(), Some("AS7303 Telecom Argentina S.A."));
    }

    #[test]
    fn test_ipinfo_shape_uses_aliases_and_loc() {
        let record = normalize(&payload(json!({
            "ip": "190.130.109.115",
            "city": "Córdoba",
            "region": "Cordoba",
            "country": "AR",
            "loc": "-31.4135,-64.1811",
            "org": "AS7303 Telecom Argentina S.A."
        })))
        .unwrap();

        assert_eq!(record.query, "190.130.109.115");
        assert_eq!(record.region.as_deref(), Some("Cordoba"));
        assert_eq!(record.isp.as_deref(), Some("AS7303 Telecom Argentina S.A."));
        assert_eq!(record.latitude, Some(-31.4135));
        assert_eq!(record.longitude, Some(-64.1811));
        assert_eq!(record.as_number, None);
    }

    #[test]
    fn test_dbip_shape() {
        let record = normalize(&payload(json!({
            "ipAddress": "190.130.109.115",
            "continentCode": "SA",
            "countryCode": "AR",
            "countryName": "Argentina",
            "stateProv": "Buenos Aires",
            "city": "La Plata"
        })))
        .unwrap();

        assert_eq!(record.query, "190.130.109.115");
        assert_eq!(record.country.as_deref(), Some("Argentina"));
        assert_eq!(record.region.as_deref(), Some("Buenos Aires"));
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
    }

    #[test]
    fn test_missing_keys_are_absent_not_errors() {
        let record = normalize(&RawPayload::new()).unwrap();
        assert_eq!(record, GeoRecord::default());
    }

    #[test]
    fn test_empty_values_fall_through_to_next_alias() {
        let record = normalize(&payload(json!({
            "country": "",
            "countryName": "Uruguay",
            "isp": null,
            "org": "Antel",
            "lat": "",
            "lon": null
        })))
        .unwrap();

        assert_eq!(record.country.as_deref(), Some("Uruguay"));
        assert_eq!(record.isp.as_deref(), Some("Antel"));
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
    }

    #[test]
    fn test_first_alias_wins() {
        let record = normalize(&payload(json!({
            "country": "AR",
            "countryName": "Argentina",
            "as": "AS1",
            "asn": "AS2"
        })))
        .unwrap();

        assert_eq!(record.country.as_deref(), Some("AR"));
        assert_eq!(record.as_number.as_deref(), Some("AS1"));
    }

    #[test]
    fn test_alias_without_text_falls_through() {
        let record = normalize(&payload(json!({
            "as": {"name": "Telecom Argentina", "domain": "telecom.com.ar"},
            "asn": "AS7303",
            "isp": {"asn": ""},
            "org": "Telecom Argentina S.A."
        })))
        .unwrap();

        assert_eq!(record.as_number.as_deref(), Some("AS7303"));
        assert_eq!(record.isp.as_deref(), Some("Telecom Argentina S.A."));
    }

    #[test]
    fn test_numeric_strings_and_non_string_text() {
        let record = normalize(&payload(json!({
            "lat": "-34.60",
            "lon": " -58.38 ",
            "asn": {"asn": "AS7303", "name": "Telecom Argentina"},
            "city": 1234
        })))
        .unwrap();

        assert_eq!(record.latitude, Some(-34.60));
        assert_eq!(record.longitude, Some(-58.38));
        assert_eq!(record.as_number.as_deref(), Some("AS7303"));
        assert_eq!(record.city.as_deref(), Some("1234"));
    }

    #[test]
    fn test_unparsable_coordinate_is_an_error() {
        let err = normalize(&payload(json!({"lat": "north", "lon": 1.0}))).unwrap_err();
        assert!(matches!(err, Error::Normalize { ref field, .. } if field == "latitude"));

        let err = normalize(&payload(json!({"loc": "1.0,east"}))).unwrap_err();
        assert!(matches!(err, Error::Normalize { ref field, .. } if field == "longitude"));

        assert!(normalize(&payload(json!({"lon": [1.0]}))).is_err());
    }
}
