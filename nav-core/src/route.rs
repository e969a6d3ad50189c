//! Route model — geometry polyline plus the ordered maneuver steps of a leg.
//!
//! Routes arrive already computed from a route provider; nothing here plans
//! paths. A route is replaced wholesale on reroute, never patched.

use serde::{Deserialize, Serialize};

use crate::geo;
use crate::types::LonLat;

/// One maneuver step of a route leg.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteStep {
    /// Where the maneuver happens.
    pub maneuver_location: Option<LonLat>,
    /// Path of the step itself.
    pub geometry: Vec<LonLat>,
    /// Free-text instruction supplied by the provider.
    pub instruction: Option<String>,
    /// Maneuver type (`turn`, `continue`, `arrive`, `depart`, ...).
    pub maneuver_type: Option<String>,
    /// Maneuver modifier (`left`, `sharp right`, ...).
    pub modifier: Option<String>,
    /// Declared length of the step in meters.
    pub distance_m: f64,
    /// Road name, when the provider supplies one.
    pub name: Option<String>,
}

impl RouteStep {
    /// Coordinate of the maneuver point: explicit location first, then the
    /// last vertex of the step geometry, then the first one.
    pub fn maneuver_point(&self) -> Option<LonLat> {
        self.maneuver_location
            .or_else(|| self.geometry.last().copied())
            .or_else(|| self.geometry.first().copied())
    }
}

/// A complete route as delivered by a provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Route {
    /// Vertices in traversal order.
    pub geometry: Vec<LonLat>,
    pub steps: Vec<RouteStep>,
    /// Total length in meters.
    pub distance_m: f64,
    /// Expected travel time in seconds.
    pub duration_s: f64,
}

impl Route {
    pub fn new(geometry: Vec<LonLat>, steps: Vec<RouteStep>) -> Self {
        let distance_m = geo::path_length(&geometry);
        Route {
            geometry,
            steps,
            distance_m,
            duration_s: 0.0,
        }
    }

    /// Whether deviation checks can run against this route.
    pub fn has_path(&self) -> bool {
        self.geometry.len() >= 2
    }

    pub fn start(&self) -> Option<LonLat> {
        self.geometry.first().copied()
    }

    pub fn end(&self) -> Option<LonLat> {
        self.geometry.last().copied()
    }

    /// Human summary, e.g. `"3.42 km, 11 min"`.
    pub fn summary(&self) -> String {
        format!(
            "{:.2} km, {:.0} min",
            self.distance_m / 1000.0,
            self.duration_s / 60.0
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maneuver_point_priority() {
        let mut step = RouteStep {
            maneuver_location: Some(LonLat::new(1.0, 1.0)),
            geometry: vec![LonLat::new(2.0, 2.0), LonLat::new(3.0, 3.0)],
            ..Default::default()
        };
        assert_eq!(step.maneuver_point(), Some(LonLat::new(1.0, 1.0)));

        step.maneuver_location = None;
        assert_eq!(step.maneuver_point(), Some(LonLat::new(3.0, 3.0)));

        step.geometry.truncate(1);
        assert_eq!(step.maneuver_point(), Some(LonLat::new(2.0, 2.0)));

        step.geometry.clear();
        assert_eq!(step.maneuver_point(), None);
    }

    #[test]
    fn test_route_new_measures_geometry() {
        let route = Route::new(vec![LonLat::new(0.0, 0.0), LonLat::new(0.0, 0.01)], vec![]);
        assert!(route.has_path());
        assert!((route.distance_m - 1111.95).abs() < 1.0, "got {}", route.distance_m);
    }

    #[test]
    fn test_route_without_path() {
        let route = Route::new(vec![LonLat::new(0.0, 0.0)], vec![]);
        assert!(!route.has_path());
        assert_eq!(route.distance_m, 0.0);
    }

    #[test]
    fn test_summary() {
        let route = Route {
            distance_m: 3420.0,
            duration_s: 660.0,
            ..Default::default()
        };
        assert_eq!(route.summary(), "3.42 km, 11 min");
    }
}
