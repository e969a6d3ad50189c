//! Geodesic helpers — haversine distance, initial bearing, point-to-segment.
//!
//! Spherical Earth, radius 6,371,000 m. Segment projection is done in
//! planar lon/lat space and the final distance is measured geodesically,
//! which is accurate for the short segments of a road route.

use crate::types::LonLat;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters (haversine).
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Distance in meters between two lon/lat coordinates.
pub fn distance_between(a: LonLat, b: LonLat) -> f64 {
    distance(a.lat, a.lon, b.lat, b.lon)
}

/// Initial compass bearing from A to B in degrees, `[0, 360)`.
///
/// Identical points yield 0; callers that care must guard against it.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Point reached by travelling `distance_m` from a start point along an
/// initial bearing.
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon2 = (lambda2.to_degrees() + 540.0) % 360.0 - 180.0;
    (phi2.to_degrees(), lon2)
}

/// Closest point of segment `start..end` to `point`, computed in planar
/// lon/lat space with the projection parameter clamped to `[0, 1]`.
pub fn project_on_segment(point: LonLat, start: LonLat, end: LonLat) -> LonLat {
    let dx = end.lon - start.lon;
    let dy = end.lat - start.lat;
    let len_sq = dx * dx + dy * dy;

    // Zero-length segment: both endpoints coincide
    if len_sq == 0.0 {
        return start;
    }

    let t = (((point.lon - start.lon) * dx + (point.lat - start.lat) * dy) / len_sq).clamp(0.0, 1.0);
    LonLat::new(start.lon + t * dx, start.lat + t * dy)
}

/// Geodesic distance in meters from `point` to the nearest point of the
/// segment `start..end`.
pub fn point_to_segment_distance(point: LonLat, start: LonLat, end: LonLat) -> f64 {
    let nearest = project_on_segment(point, start, end);
    distance_between(point, nearest)
}

/// Total length of a polyline in meters.
pub fn path_length(path: &[LonLat]) -> f64 {
    path.windows(2).map(|w| distance_between(w[0], w[1])).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
