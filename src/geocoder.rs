//! Address geocoding for listings exported without coordinates.
//!
//! [`NominatimGeocoder`] talks to an OpenStreetMap Nominatim instance with
//! one request per second and bounded retry. [`GeocodingService`] puts the
//! database cache and the service-area sanity check in front of any
//! [`Geocoder`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{GeocoderConfig, MapConfig};
use crate::db::Database;
use crate::error::{AnalyzerError, Result};
use crate::geo::{within_radius, Coordinates};
use crate::retry::RetryPolicy;

/// Address parts sent to a geocoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    /// Street address, possibly with house number
    pub street: String,
    /// City name
    pub city: String,
    /// State or province
    pub state: Option<String>,
    /// ZIP code
    pub zip: Option<String>,
}

impl AddressQuery {
    /// One-line address, e.g. `12 Oak St, Asheville, NC 28801`
    #[must_use]
    pub fn freeform(&self) -> String {
        let mut line = format!("{}, {}", self.street.trim(), self.city.trim());
        if let Some(state) = self.state.as_deref().filter(|s| !s.trim().is_empty()) {
            line.push_str(", ");
            line.push_str(state.trim());
        }
        if let Some(zip) = self.zip.as_deref().filter(|z| !z.trim().is_empty()) {
            line.push(' ');
            line.push_str(zip.trim());
        }
        line
    }

    /// Case- and whitespace-insensitive cache key
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.freeform()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Something that can turn an address into coordinates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Provider name stored alongside cached results
    fn provider(&self) -> &'static str;

    /// `Ok(None)` when the provider has no match
    async fn geocode(&self, query: &AddressQuery) -> Result<Option<Coordinates>>;
}

/// Nominatim free-form search client
pub struct NominatimGeocoder {
    client: reqwest::Client,
    search_url: String,
    retry: RetryPolicy,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    /// Client configured from the geocoder section
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
            retry: RetryPolicy::new(config.max_attempts, Duration::from_secs(config.backoff_secs)),
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Wait until the usage-policy interval since the previous request has passed
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn search_once(&self, query: &str) -> Result<Option<Coordinates>> {
        self.throttle().await;
        let resp = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("countrycodes", "us"),
                ("format", "jsonv2"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AnalyzerError::external("nominatim", format!("HTTP {status}")));
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn provider(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, query: &AddressQuery) -> Result<Option<Coordinates>> {
        let line = query.freeform();
        self.retry
            .run("nominatim search", |_| self.search_once(&line))
            .await
    }
}

/// Parse a Nominatim `jsonv2` search response; `lat`/`lon` arrive as strings.
fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinates>> {
    let results = body
        .as_array()
        .ok_or_else(|| AnalyzerError::external("nominatim", "response is not an array"))?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coord = |field: &str| {
        first[field]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| AnalyzerError::external("nominatim", format!("missing {field} in response")))
    };

    Ok(Some(Coordinates::new(coord("lat")?, coord("lon")?)))
}

/// Cached, service-area-checked geocoding.
#[derive(Clone)]
pub struct GeocodingService {
    geocoder: Arc<dyn Geocoder>,
    db: Database,
    center: Coordinates,
    radius_miles: f64,
}

impl GeocodingService {
    /// Wrap `geocoder` with the database cache and the map's service area
    pub fn new(geocoder: Arc<dyn Geocoder>, db: Database, map: &MapConfig) -> Self {
        Self {
            geocoder,
            db,
            center: Coordinates::new(map.center_lat, map.center_lon),
            radius_miles: map.service_radius_miles,
        }
    }

    /// Coordinates for an address, or `None` when unresolvable.
    ///
    /// Matches outside the service radius are treated as misses. Hits and
    /// misses are cached; provider errors are not, so the next import retries.
    pub async fn locate(&self, query: &AddressQuery) -> Result<Option<Coordinates>> {
        let key = query.cache_key();
        let lookup = key.clone();
        let cached = self
            .db
            .run_blocking(move |db| db.cached_geocode(&lookup))
            .await?;
        if let Some(cached) = cached {
            debug!(address = key, "Geocode cache hit");
            return Ok(cached);
        }

        let found = self.geocoder.geocode(query).await?;
        let accepted = found.filter(|c| c.is_valid() && within_radius(self.center, *c, self.radius_miles));
        if let (Some(c), None) = (found, accepted) {
            warn!(
                address = key,
                lat = c.lat,
                lon = c.lon,
                radius_miles = self.radius_miles,
                "Geocoded location outside service area, ignoring"
            );
        }

        let provider = self.geocoder.provider();
        self.db
            .run_blocking(move |db| db.store_geocode(&key, accepted, provider, Utc::now()))
            .await?;
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn query() -> AddressQuery {
        AddressQuery {
            street: "12  Oak St".into(),
            city: "Asheville".into(),
            state: Some("NC".into()),
            zip: Some("28801".into()),
        }
    }

    fn service(mock: MockGeocoder, dir: &tempfile::TempDir) -> GeocodingService {
        let db = Database::new(dir.path().join("geo.db").to_str().unwrap()).unwrap();
        GeocodingService::new(Arc::new(mock), db, &AppConfig::default().map)
    }

    #[test]
    fn test_query_formatting() {
        assert_eq!(query().freeform(), "12  Oak St, Asheville, NC 28801");
        assert_eq!(query().cache_key(), "12 oak st, asheville, nc 28801");
    }

    #[test]
    fn test_parse_response() {
        let body = serde_json::json!([{ "lat": "35.5951", "lon": "-82.5515", "display_name": "x" }]);
        let c = parse_response(&body).unwrap().unwrap();
        assert!((c.lat - 35.5951).abs() < 1e-9);
        assert!(parse_response(&serde_json::json!([])).unwrap().is_none());
        assert!(parse_response(&serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn test_results_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockGeocoder::new();
        mock.expect_provider().return_const("mock");
        mock.expect_geocode()
            .times(1)
            .returning(|_| Ok(Some(Coordinates::new(35.60, -82.55))));

        let svc = service(mock, &dir);
        let first = svc.locate(&query()).await.unwrap();
        let second = svc.locate(&query()).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn test_out_of_area_match_is_a_cached_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockGeocoder::new();
        mock.expect_provider().return_const("mock");
        // Asheville, Kansas
        mock.expect_geocode()
            .times(1)
            .returning(|_| Ok(Some(Coordinates::new(39.36, -97.70))));

        let svc = service(mock, &dir);
        assert_eq!(svc.locate(&query()).await.unwrap(), None);
        assert_eq!(svc.locate(&query()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_errors_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockGeocoder::new();
        mock.expect_provider().return_const("mock");
        mock.expect_geocode()
            .times(2)
            .returning(|_| Err(AnalyzerError::external("mock", "timeout")));

        let svc = service(mock, &dir);
        assert!(svc.locate(&query()).await.is_err());
        assert!(svc.locate(&query()).await.is_err());
    }
}
