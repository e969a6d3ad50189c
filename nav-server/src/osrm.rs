//! OSRM route provider.
//!
//! Requests `route/v1/{profile}/{lon,lat};{lon,lat}` with GeoJSON geometry,
//! full overview, and steps. The first route is used; its steps come from
//! the first leg. Saved responses load through the same parser.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use nav_core::{LonLat, NavError, Result, Route, RouteStep};

use crate::provider::RouteProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Response model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: Option<OsrmGeometry>,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    maneuver: Option<OsrmManeuver>,
    geometry: Option<OsrmGeometry>,
    #[serde(default)]
    distance: f64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    location: Option<Vec<f64>>,
    #[serde(rename = "type")]
    kind: Option<String>,
    modifier: Option<String>,
    instruction: Option<String>,
}

fn to_lonlat(pair: &[f64]) -> Option<LonLat> {
    match pair {
        [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some(LonLat::new(*lon, *lat)),
        _ => None,
    }
}

fn to_path(geometry: Option<OsrmGeometry>) -> Vec<LonLat> {
    geometry
        .map(|g| g.coordinates.iter().filter_map(|c| to_lonlat(c)).collect())
        .unwrap_or_default()
}

impl OsrmStep {
    fn into_step(self) -> RouteStep {
        let maneuver = self.maneuver;
        let (location, kind, modifier, instruction) = match maneuver {
            Some(m) => (
                m.location.as_deref().and_then(to_lonlat),
                m.kind,
                m.modifier,
                m.instruction,
            ),
            None => (None, None, None, None),
        };
        RouteStep {
            maneuver_location: location,
            geometry: to_path(self.geometry),
            instruction,
            maneuver_type: kind,
            modifier,
            distance_m: self.distance,
            name: self.name.filter(|n| !n.is_empty()),
        }
    }
}

impl OsrmResponse {
    fn into_route(self) -> Result<Route> {
        if self.code.as_deref() == Some("NoRoute") {
            return Err(NavError::NoRoute);
        }
        let Some(first) = self.routes.into_iter().next() else {
            return match self.code.as_deref() {
                Some("Ok") | None => Err(NavError::NoRoute),
                Some(code) => Err(NavError::Provider(format!(
                    "{code}: {}",
                    self.message.unwrap_or_default()
                ))),
            };
        };

        let steps = first
            .legs
            .into_iter()
            .next()
            .map(|leg| leg.steps.into_iter().map(OsrmStep::into_step).collect())
            .unwrap_or_default();

        let mut route = Route::new(to_path(first.geometry), steps);
        if first.distance > 0.0 {
            route.distance_m = first.distance;
        }
        route.duration_s = first.duration;
        Ok(route)
    }
}

/// Parse an OSRM route response body.
pub fn parse_response(body: &str) -> Result<Route> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| NavError::InvalidRoute(format!("bad OSRM response: {e}")))?;
    response.into_route()
}

/// Load a route from disk: a saved OSRM response, or a route written by
/// `nav route --json`.
pub fn load_route_file(path: &Path) -> Result<Route> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| NavError::InvalidRoute(format!("{}: {e}", path.display())))?;

    if value.get("routes").is_some() {
        parse_response(&text)
    } else {
        serde_json::from_value(value)
            .map_err(|e| NavError::InvalidRoute(format!("{}: {e}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct OsrmProvider {
    base_url: String,
    profile: String,
    client: reqwest::Client,
}

impl OsrmProvider {
    pub fn new(base_url: &str, profile: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NavError::Provider(e.to_string()))?;
        Ok(OsrmProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
            client,
        })
    }

    pub fn route_url(&self, origin: LonLat, destination: LonLat) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?geometries=geojson&overview=full&steps=true",
            self.base_url,
            self.profile,
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmProvider {
    fn name(&self) -> &str {
        "osrm"
    }

    async fn request_route(&self, origin: LonLat, destination: LonLat) -> Result<Route> {
        let url = self.route_url(origin, destination);
        debug!(%url, "requesting route");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NavError::Provider(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NavError::Provider(e.to_string()))?;

        // OSRM answers "no route" with a 400 and a JSON body
        match parse_response(&body) {
            Ok(route) => {
                info!(summary = %route.summary(), steps = route.steps.len(), "route received");
                Ok(route)
            }
            Err(NavError::InvalidRoute(_)) if !status.is_success() => {
                Err(NavError::Provider(format!("HTTP {status}")))
            }
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
      "code": "Ok",
      "routes": [{
        "distance": 1234.5,
        "duration": 300.0,
        "geometry": {"type": "LineString", "coordinates": [[126.978, 37.5600], [126.978, 37.5665], [126.970, 37.5665]]},
        "legs": [{
          "steps": [
            {"distance": 723.0, "name": "Sejong-daero",
             "geometry": {"coordinates": [[126.978, 37.5600], [126.978, 37.5665]]},
             "maneuver": {"type": "depart", "location": [126.978, 37.5600]}},
            {"distance": 706.0, "name": "",
             "geometry": {"coordinates": [[126.978, 37.5665], [126.970, 37.5665]]},
             "maneuver": {"type": "turn", "modifier": "left", "location": [126.978, 37.5665]}},
            {"distance": 0.0,
             "maneuver": {"type": "arrive", "location": [126.970, 37.5665], "instruction": "You have arrived"}}
          ]
        }]
      }]
    }"#;

    #[test]
    fn test_parse_response() {
        let route = parse_response(SAMPLE).unwrap();
        assert_eq!(route.geometry.len(), 3);
        assert_eq!(route.steps.len(), 3);
        assert_eq!(route.distance_m, 1234.5);
        assert_eq!(route.duration_s, 300.0);
        assert_eq!(route.summary(), "1.23 km, 5 min");

        let turn = &route.steps[1];
        assert_eq!(turn.maneuver_type.as_deref(), Some("turn"));
        assert_eq!(turn.modifier.as_deref(), Some("left"));
        assert_eq!(turn.maneuver_location, Some(LonLat::new(126.978, 37.5665)));
        assert_eq!(turn.distance_m, 706.0);
        assert!(turn.name.is_none());

        assert_eq!(route.steps[0].name.as_deref(), Some("Sejong-daero"));
        assert_eq!(route.steps[2].instruction.as_deref(), Some("You have arrived"));
        assert!(route.steps[2].geometry.is_empty());
    }

    #[test]
    fn test_no_route() {
        let body = r#"{"code": "NoRoute", "message": "Impossible route between points", "routes": []}"#;
        assert!(matches!(parse_response(body), Err(NavError::NoRoute)));
        assert!(matches!(parse_response(r#"{"code": "Ok"}"#), Err(NavError::NoRoute)));
    }

    #[test]
    fn test_error_code() {
        let body = r#"{"code": "InvalidQuery", "message": "Query string malformed"}"#;
        match parse_response(body) {
            Err(NavError::Provider(msg)) => assert!(msg.contains("InvalidQuery")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_garbage_body() {
        assert!(matches!(parse_response("<html>"), Err(NavError::InvalidRoute(_))));
    }

    #[test]
    fn test_missing_step_parts() {
        let body = r#"{"routes": [{"geometry": {"coordinates": [[1.0, 2.0], [3.0]]},
            "legs": [{"steps": [{}]}]}]}"#;
        let route = parse_response(body).unwrap();
        assert_eq!(route.geometry.len(), 1);
        assert!(!route.has_path());
        assert_eq!(route.steps.len(), 1);
        assert!(route.steps[0].maneuver_point().is_none());
    }

    #[test]
    fn test_route_url() {
        let provider = OsrmProvider::new("https://router.example.org/", "foot").unwrap();
        let url = provider.route_url(LonLat::new(126.978, 37.5665), LonLat::new(127.0, 37.5));
        assert_eq!(
            url,
            "https://router.example.org/route/v1/foot/126.978,37.5665;127,37.5\
             ?geometries=geojson&overview=full&steps=true"
        );
    }

    #[test]
    fn test_load_route_file_both_formats() {
        let mut osrm = tempfile::NamedTempFile::new().unwrap();
        write!(osrm, "{SAMPLE}").unwrap();
        let route = load_route_file(osrm.path()).unwrap();
        assert_eq!(route.steps.len(), 3);

        let mut saved = tempfile::NamedTempFile::new().unwrap();
        write!(saved, "{}", serde_json::to_string(&route).unwrap()).unwrap();
        assert_eq!(load_route_file(saved.path()).unwrap(), route);
    }
}
