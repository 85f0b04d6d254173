//! Geocoding providers: the [`Geocoder`] seam and the Nominatim client.

use super::address::Address;
use super::types::{LocationError, PlaceOrigin, ResolvedPlace};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "LocusPicker/0.3 (location-picker)";
pub const DEFAULT_LANGUAGE: &str = "fr";

/// Turns coordinates or free text into a named place.
///
/// Implementations block; async callers run them on the blocking pool.
pub trait Geocoder: Send + Sync {
    /// Reverse geocode a coordinate pair.
    fn reverse(&self, lat: f64, lon: f64) -> Result<ResolvedPlace, LocationError>;

    /// Forward geocode a free-text query, keeping only the best candidate.
    fn search(&self, query: &str) -> Result<ResolvedPlace, LocationError>;
}

/// Run [`Geocoder::reverse`] on the blocking pool.
pub async fn reverse_blocking<G>(geocoder: Arc<G>, lat: f64, lon: f64) -> Result<ResolvedPlace, LocationError>
where
    G: Geocoder + ?Sized + 'static,
{
    tokio::task::spawn_blocking(move || geocoder.reverse(lat, lon))
        .await
        .map_err(|e| LocationError::GeocodeUnavailable(format!("lookup task failed: {}", e)))?
}

/// Run [`Geocoder::search`] on the blocking pool.
pub async fn search_blocking<G>(geocoder: Arc<G>, query: String) -> Result<ResolvedPlace, LocationError>
where
    G: Geocoder + ?Sized + 'static,
{
    tokio::task::spawn_blocking(move || geocoder.search(&query))
        .await
        .map_err(|e| LocationError::GeocodeUnavailable(format!("lookup task failed: {}", e)))?
}

// ─── Nominatim wire types ───────────────────────────────────────

#[derive(Deserialize, Debug)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    /// Set instead of an address when nothing is found at the coordinates.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    address: Option<Address>,
}

/// Rough uncertainty for a search hit, from the service's importance score.
/// A zero score carries no information and yields `None`.
pub fn accuracy_from_importance(importance: Option<f64>) -> Option<f64> {
    importance
        .filter(|i| *i != 0.0 && !i.is_nan())
        .map(|i| (100.0 - i * 100.0).max(10.0))
}

fn parse_coord(raw: &str, what: &str) -> Result<f64, LocationError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| LocationError::GeocodeUnavailable(format!("invalid {} '{}'", what, raw)))
}

// ─── Nominatim client ───────────────────────────────────────────

/// OpenStreetMap Nominatim over HTTP.
pub struct NominatimClient {
    agent: ureq::Agent,
    base_url: String,
    language: String,
}

impl NominatimClient {
    pub fn new(base_url: &str, language: &str, user_agent: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(user_agent).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, LocationError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self
            .agent
            .get(&url)
            .query("format", "jsonv2")
            .query("addressdetails", "1")
            .query("accept-language", &self.language);
        for (k, v) in params {
            request = request.query(k, v);
        }
        debug!(%url, ?params, "nominatim request");

        let response = request
            .call()
            .map_err(|e| LocationError::GeocodeUnavailable(e.to_string()))?;

        response
            .into_json()
            .map_err(|e| LocationError::GeocodeUnavailable(format!("invalid response: {}", e)))
    }
}

impl Default for NominatimClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_LANGUAGE, DEFAULT_USER_AGENT)
    }
}

impl Geocoder for NominatimClient {
    fn reverse(&self, lat: f64, lon: f64) -> Result<ResolvedPlace, LocationError> {
        let lat_s = lat.to_string();
        let lon_s = lon.to_string();
        let data: ReverseResponse =
            self.get_json("reverse", &[("lat", lat_s.as_str()), ("lon", lon_s.as_str()), ("zoom", "18")])?;

        if let Some(err) = data.error {
            return Err(LocationError::GeocodeUnavailable(err));
        }

        let address = data.address.unwrap_or_default();
        let city = address.city_label(&[data.name.as_deref(), data.display_name.as_deref()]);
        let district = address.district_label();
        info!(lat, lon, %city, %district, "reverse geocoded");

        Ok(ResolvedPlace {
            city: Some(city),
            district: Some(district),
            lat,
            lon,
            accuracy_m: None,
            origin: PlaceOrigin::Gps,
        })
    }

    fn search(&self, query: &str) -> Result<ResolvedPlace, LocationError> {
        let hits: Vec<SearchHit> = self.get_json("search", &[("q", query), ("limit", "1")])?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| LocationError::PlaceNotFound(query.to_string()))?;

        let lat = parse_coord(&hit.lat, "latitude")?;
        let lon = parse_coord(&hit.lon, "longitude")?;
        let address = hit.address.unwrap_or_default();
        let city = address.city_label(&[hit.display_name.as_deref(), Some(query)]);
        let district = address.district_label();
        info!(query, %city, %district, lat, lon, "search resolved");

        Ok(ResolvedPlace {
            city: Some(city),
            district: Some(district),
            lat,
            lon,
            accuracy_m: accuracy_from_importance(hit.importance),
            origin: PlaceOrigin::Search,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> NominatimClient {
        NominatimClient::new(&server.base_url(), "fr", "locus-test")
    }

    #[test]
    fn test_search_paris_without_suburb() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search")
                .query_param("q", "Paris")
                .query_param("format", "jsonv2")
                .query_param("limit", "1")
                .query_param("addressdetails", "1")
                .query_param("accept-language", "fr");
            then.status(200).json_body(json!([{
                "lat": "48.8588897",
                "lon": "2.3200410",
                "display_name": "Paris, Île-de-France, France métropolitaine, France",
                "importance": 0.88,
                "address": { "city": "Paris", "state": "Île-de-France", "country": "France" }
            }]));
        });

        let place = client(&server).search("Paris").unwrap();
        mock.assert();
        assert_eq!(place.city.as_deref(), Some("Paris"));
        assert_eq!(place.district.as_deref(), Some(""));
        assert_eq!(place.origin, PlaceOrigin::Search);
        assert_relative_eq!(place.lat, 48.8588897);
        assert_relative_eq!(place.lon, 2.3200410);
        assert_relative_eq!(place.accuracy_m.unwrap(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_search_empty_result_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([]));
        });

        let err = client(&server).search("xyznonexistentplace123").unwrap_err();
        assert_eq!(err, LocationError::PlaceNotFound("xyznonexistentplace123".into()));
    }

    #[test]
    fn test_search_falls_back_to_display_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([{
                "lat": "0.5", "lon": "-0.5",
                "display_name": "Somewhere At Sea",
                "address": {}
            }]));
        });

        let place = client(&server).search("sea").unwrap();
        assert_eq!(place.city.as_deref(), Some("Somewhere At Sea"));
        assert_eq!(place.accuracy_m, None);
    }

    #[test]
    fn test_search_zero_importance_has_no_accuracy() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([{
                "lat": "9.3", "lon": "2.6",
                "importance": 0,
                "address": { "town": "Parakou" }
            }]));
        });

        let place = client(&server).search("Parakou").unwrap();
        assert_eq!(place.city.as_deref(), Some("Parakou"));
        assert_eq!(place.accuracy_m, None);
    }

    #[test]
    fn test_search_bad_coordinates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!([{ "lat": "north", "lon": "2.0" }]));
        });

        let err = client(&server).search("Paris").unwrap_err();
        assert!(matches!(err, LocationError::GeocodeUnavailable(_)));
    }

    #[test]
    fn test_reverse_with_district() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/reverse")
                .query_param("lat", "6.3654")
                .query_param("lon", "2.4183")
                .query_param("zoom", "18")
                .query_param("format", "jsonv2");
            then.status(200).json_body(json!({
                "name": "Rue 108",
                "display_name": "Rue 108, Ganhi, Cotonou, Littoral, Bénin",
                "address": { "suburb": "Ganhi", "city": "Cotonou", "state": "Littoral", "country": "Bénin" }
            }));
        });

        let place = client(&server).reverse(6.3654, 2.4183).unwrap();
        mock.assert();
        assert_eq!(place.city.as_deref(), Some("Cotonou"));
        assert_eq!(place.district.as_deref(), Some("Ganhi"));
        assert_eq!(place.origin, PlaceOrigin::Gps);
    }

    #[test]
    fn test_reverse_uses_name_before_display_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(200).json_body(json!({
                "name": "Pointe des Almadies",
                "display_name": "Pointe des Almadies, Dakar, Sénégal",
                "address": {}
            }));
        });

        let place = client(&server).reverse(14.74, -17.53).unwrap();
        assert_eq!(place.city.as_deref(), Some("Pointe des Almadies"));
    }

    #[test]
    fn test_reverse_service_error_field() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(200).json_body(json!({ "error": "Unable to geocode" }));
        });

        let err = client(&server).reverse(0.0, 0.0).unwrap_err();
        assert_eq!(err, LocationError::GeocodeUnavailable("Unable to geocode".into()));
    }

    #[test]
    fn test_reverse_http_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(503);
        });

        let err = client(&server).reverse(1.0, 1.0).unwrap_err();
        assert!(matches!(err, LocationError::GeocodeUnavailable(_)));
    }

    #[test]
    fn test_reverse_garbage_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(200).body("<html>rate limited</html>");
        });

        let err = client(&server).reverse(1.0, 1.0).unwrap_err();
        assert!(matches!(err, LocationError::GeocodeUnavailable(_)));
    }

    #[test]
    fn test_accuracy_from_importance() {
        assert_eq!(accuracy_from_importance(None), None);
        assert_eq!(accuracy_from_importance(Some(0.0)), None);
        assert_relative_eq!(accuracy_from_importance(Some(0.25)).unwrap(), 75.0);
        assert_relative_eq!(accuracy_from_importance(Some(0.97)).unwrap(), 10.0);
    }
}
