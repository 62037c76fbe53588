//! Geocoding enrichment.
//!
//! Appends `raw_address`, `address`, `altitude`, `latitude` and `longitude`
//! to every record. A failed lookup never stops the run: the record keeps its
//! raw address, the other four fields stay empty and the miss is counted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::GeocodingConfig;
use crate::error::{Error, Result};
use crate::model::{Record, Recordset};

/// Columns appended by [`enrich_records`], in order.
pub const ENRICHMENT_COLUMNS: [&str; 5] = ["raw_address", "address", "altitude", "latitude", "longitude"];

const GOOGLE_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    /// Canonical address returned by the provider
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Address lookup service.
pub trait Geocoder {
    /// Resolve an address; `Ok(None)` when the provider knows no match.
    fn geocode(&self, address: &str) -> Result<Option<GeoLocation>>;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn geocode(&self, address: &str) -> Result<Option<GeoLocation>> {
        (**self).geocode(address)
    }
}

/// Google Geocoding API client.
pub struct GoogleGeocoder {
    client: reqwest::blocking::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    /// Create a client for the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&self, address: &str) -> Result<Option<GeoLocation>> {
        let failure = |message: String| Error::Enrichment {
            address: address.to_string(),
            message,
        };

        let response = self
            .client
            .get(GOOGLE_GEOCODE_ENDPOINT)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("HTTP {}", status)));
        }

        let body: GeocodeResponse = response.json().map_err(|e| failure(e.to_string()))?;
        match body.status.as_str() {
            "OK" => Ok(body.results.into_iter().next().map(|r| GeoLocation {
                address: r.formatted_address,
                latitude: r.geometry.location.lat,
                longitude: r.geometry.location.lng,
                // not provided by this service
                altitude: 0.0,
            })),
            "ZERO_RESULTS" => Ok(None),
            other => Err(failure(
                body.error_message.unwrap_or_else(|| other.to_string()),
            )),
        }
    }
}

/// `"{street} {house}"` trimmed, followed by the city suffix.
pub fn build_raw_address(record: &Record, config: &GeocodingConfig) -> String {
    let street = record.get(&config.street_column).unwrap_or_default();
    let house = record.get(&config.house_column).unwrap_or_default();
    let mut address = format!("{} {}", street, house).trim().to_string();
    address.push_str(&config.city_suffix);
    address
}

/// Result of an enrichment pass.
#[derive(Debug, Clone)]
pub struct Enriched {
    /// Records with the enrichment columns appended
    pub recordset: Recordset,
    /// Lookups that failed or found nothing
    pub failures: usize,
}

/// Geocode every record.
pub fn enrich_records<G: Geocoder + ?Sized>(
    recordset: Recordset,
    geocoder: &G,
    config: &GeocodingConfig,
) -> Result<Enriched> {
    enrich_records_with_progress(recordset, geocoder, config, |_, _| {})
}

/// Geocode every record, calling `progress(done, total)` after each one.
///
/// Identical addresses are looked up once.
pub fn enrich_records_with_progress<G, F>(
    recordset: Recordset,
    geocoder: &G,
    config: &GeocodingConfig,
    mut progress: F,
) -> Result<Enriched>
where
    G: Geocoder + ?Sized,
    F: FnMut(usize, usize),
{
    let schema = recordset.schema();
    for column in [&config.street_column, &config.house_column] {
        if !recordset.is_empty() && !schema.contains(column) {
            return Err(Error::Config(format!(
                "address column '{}' not found in document header",
                column
            )));
        }
    }
    if let Some(clash) = ENRICHMENT_COLUMNS.iter().find(|c| schema.contains(c)) {
        return Err(Error::Config(format!(
            "document already has a '{}' column",
            clash
        )));
    }

    let wide = Arc::new(schema.extended(ENRICHMENT_COLUMNS));
    let total = recordset.len();
    let mut cache: HashMap<String, Option<GeoLocation>> = HashMap::new();
    let mut failures = 0;
    let mut records = Vec::with_capacity(total);

    for (i, record) in recordset.into_records().into_iter().enumerate() {
        let raw_address = build_raw_address(&record, config);

        let location = match cache.get(&raw_address) {
            Some(cached) => cached.clone(),
            None => {
                let looked_up = match geocoder.geocode(&raw_address) {
                    Ok(found) => found,
                    Err(e) => {
                        log::warn!("{}", e);
                        None
                    }
                };
                cache.insert(raw_address.clone(), looked_up.clone());
                looked_up
            }
        };

        let extra = match location {
            Some(geo) => vec![
                raw_address,
                geo.address,
                geo.altitude.to_string(),
                geo.latitude.to_string(),
                geo.longitude.to_string(),
            ],
            None => {
                log::debug!("No location for '{}'", raw_address);
                failures += 1;
                vec![raw_address, String::new(), String::new(), String::new(), String::new()]
            }
        };

        let extended = record
            .extend(Arc::clone(&wide), extra)
            .ok_or_else(|| Error::Config("enrichment produced a misaligned record".to_string()))?;
        records.push(extended);
        progress(i + 1, total);
    }

    log::info!("Geocoded {} records, {} without location", total, failures);
    Ok(Enriched {
        recordset: Recordset::from_built(wide, records),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;
    use std::cell::RefCell;

    struct FakeGeocoder {
        known: HashMap<String, GeoLocation>,
        calls: RefCell<Vec<String>>,
    }

    impl Geocoder for FakeGeocoder {
        fn geocode(&self, address: &str) -> Result<Option<GeoLocation>> {
            self.calls.borrow_mut().push(address.to_string());
            if address.starts_with("boom") {
                return Err(Error::Enrichment {
                    address: address.to_string(),
                    message: "quota".into(),
                });
            }
            Ok(self.known.get(address).cloned())
        }
    }

    fn recordset(rows: &[[&str; 3]]) -> Recordset {
        let schema = Arc::new(Schema::new(vec!["רח".into(), "בית".into(), "עץ".into()]));
        let records = rows
            .iter()
            .map(|r| Record::new(Arc::clone(&schema), r.iter().map(|s| s.to_string()).collect()).unwrap())
            .collect();
        Recordset::from_records(schema, records).unwrap()
    }

    fn geocoder() -> FakeGeocoder {
        let mut known = HashMap::new();
        known.insert(
            "הרצל 12, חיפה, ישראל".to_string(),
            GeoLocation {
                address: "HaRtsl St 12, Haifa, Israel".into(),
                latitude: 32.8,
                longitude: 35.0,
                altitude: 0.0,
            },
        );
        FakeGeocoder {
            known,
            calls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_build_raw_address() {
        let set = recordset(&[["הרצל", "12", "אלון"], ["הנמל", "", "ברוש"]]);
        let config = GeocodingConfig::default();
        assert_eq!(build_raw_address(&set.records()[0], &config), "הרצל 12, חיפה, ישראל");
        assert_eq!(build_raw_address(&set.records()[1], &config), "הנמל, חיפה, ישראל");
    }

    #[test]
    fn test_enrich_appends_columns_and_counts_failures() {
        let set = recordset(&[["הרצל", "12", "אלון"], ["boom", "1", "ברוש"], ["לא", "0", "x"]]);
        let enriched = enrich_records(set, &geocoder(), &GeocodingConfig::default()).unwrap();

        assert_eq!(enriched.failures, 2);
        let columns = enriched.recordset.schema().columns();
        assert_eq!(&columns[3..], &ENRICHMENT_COLUMNS.map(String::from)[..]);

        let first = &enriched.recordset.records()[0];
        assert_eq!(first.get("latitude"), Some("32.8"));
        assert_eq!(first.get("altitude"), Some("0"));

        let failed = &enriched.recordset.records()[1];
        assert_eq!(failed.get("raw_address"), Some("boom 1, חיפה, ישראל"));
        assert_eq!(failed.get("address"), Some(""));
    }

    #[test]
    fn test_duplicate_addresses_looked_up_once() {
        let set = recordset(&[["הרצל", "12", "אלון"], ["הרצל", "12", "ברוש"]]);
        let geocoder = geocoder();
        let enriched = enrich_records(set, &geocoder, &GeocodingConfig::default()).unwrap();
        assert_eq!(geocoder.calls.borrow().len(), 1);
        assert_eq!(enriched.failures, 0);
    }

    #[test]
    fn test_missing_address_column() {
        let set = recordset(&[["a", "b", "c"]]);
        let config = GeocodingConfig {
            street_column: "street".into(),
            ..Default::default()
        };
        assert!(matches!(
            enrich_records(set, &geocoder(), &config),
            Err(Error::Config(_))
        ));
    }
}
