//! Shared types, error enums, and position primitives for nav-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by nav-core and the crates built on it.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("no route found")]
    NoRoute,
    #[error("route provider error: {0}")]
    Provider(String),
    #[error("position source error: {0}")]
    Position(#[from] PositionError),
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NavError>;

// ---------------------------------------------------------------------------
// Position source errors
// ---------------------------------------------------------------------------

/// Terminal error delivered by a position source, classified by cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("position request timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

impl PositionError {
    /// Parse a source error class as written in fix files
    /// (`permission-denied`, `unavailable`, `timeout`, anything else).
    pub fn from_class(class: &str) -> Self {
        match class.trim().to_ascii_lowercase().as_str() {
            "permission-denied" | "permission_denied" | "denied" => PositionError::PermissionDenied,
            "position-unavailable" | "unavailable" => PositionError::PositionUnavailable,
            "timeout" => PositionError::Timeout,
            other => PositionError::Other(other.to_string()),
        }
    }

    /// Short machine-readable class name.
    pub fn class(&self) -> &'static str {
        match self {
            PositionError::PermissionDenied => "permission-denied",
            PositionError::PositionUnavailable => "position-unavailable",
            PositionError::Timeout => "timeout",
            PositionError::Other(_) => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A WGS84 coordinate in degrees. Route data is ordered lon/lat, so this
/// type is too.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        LonLat { lon, lat }
    }

    /// Parse `"lon,lat"`.
    pub fn parse(text: &str) -> Option<Self> {
        let (lon, lat) = text.split_once(',')?;
        let lon: f64 = lon.trim().parse().ok()?;
        let lat: f64 = lat.trim().parse().ok()?;
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        Some(LonLat { lon, lat })
    }
}

impl std::fmt::Display for LonLat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.lon, self.lat)
    }
}

/// Parse a polyline written as `"lon,lat;lon,lat;..."`.
pub fn parse_path(text: &str) -> Option<Vec<LonLat>> {
    text.split(';')
        .filter(|part| !part.trim().is_empty())
        .map(LonLat::parse)
        .collect()
}

// ---------------------------------------------------------------------------
// Position fixes
// ---------------------------------------------------------------------------

/// One reported position sample. Immutable once produced by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub lat: f64,
    pub lon: f64,
    /// Horizontal accuracy in meters.
    pub accuracy_m: Option<f64>,
    /// Course over ground in degrees, 0-360.
    pub heading_deg: Option<f64>,
    pub speed_mps: Option<f64>,
    /// Seconds on the source's clock. Replayed fixes keep their recorded
    /// stamps, so this may jump or run backwards.
    pub timestamp: f64,
}

impl PositionFix {
    pub fn new(lat: f64, lon: f64, timestamp: f64) -> Self {
        PositionFix {
            lat,
            lon,
            accuracy_m: None,
            heading_deg: None,
            speed_mps: None,
            timestamp,
        }
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    pub fn position(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }

    /// Reported heading, if it is a usable compass value.
    pub fn valid_heading(&self) -> Option<f64> {
        self.heading_deg
            .filter(|h| h.is_finite() && (0.0..=360.0).contains(h))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lonlat_parse() {
        let p = LonLat::parse("126.978, 37.5665").unwrap();
        assert_eq!(p.lon, 126.978);
        assert_eq!(p.lat, 37.5665);
        assert!(LonLat::parse("126.978").is_none());
        assert!(LonLat::parse("abc,1").is_none());
        assert!(LonLat::parse("NaN,1").is_none());
    }

    #[test]
    fn test_parse_path() {
        let path = parse_path("0,0;0,0.01;").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1], LonLat::new(0.0, 0.01));
        assert!(parse_path("0,0;oops").is_none());
    }

    #[test]
    fn test_valid_heading() {
        let fix = PositionFix::new(37.0, 127.0, 0.0);
        assert_eq!(fix.valid_heading(), None);
        assert_eq!(fix.clone().with_heading(90.0).valid_heading(), Some(90.0));
        assert_eq!(fix.clone().with_heading(360.0).valid_heading(), Some(360.0));
        assert_eq!(fix.clone().with_heading(-1.0).valid_heading(), None);
        assert_eq!(fix.with_heading(f64::NAN).valid_heading(), None);
    }

    #[test]
    fn test_position_error_classes() {
        assert_eq!(
            PositionError::from_class("permission-denied"),
            PositionError::PermissionDenied
        );
        assert_eq!(
            PositionError::from_class("Unavailable"),
            PositionError::PositionUnavailable
        );
        assert_eq!(PositionError::from_class("timeout"), PositionError::Timeout);
        assert_eq!(PositionError::from_class("boom").class(), "other");
    }

    #[test]
    fn test_nav_error_from_position_error() {
        let err: NavError = PositionError::Timeout.into();
        assert_eq!(err.to_string(), "position source error: position request timed out");
    }
}
