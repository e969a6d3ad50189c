//! Synthetic drives — fixes generated along a polyline at a fixed speed.
//!
//! Used to exercise the navigation loop without a receiver. With a drift
//! configured, every fix past `drift_after_m` is pushed sideways (to the
//! right of travel) by `drift_m`, which is enough to provoke a deviation.

use nav_core::geo;
use nav_core::{LonLat, NavError, PositionFix, Result};

#[derive(Debug, Clone)]
pub struct SynthDrive {
    pub path: Vec<LonLat>,
    pub speed_mps: f64,
    pub rate_hz: f64,
    pub start_ts: f64,
    pub accuracy_m: Option<f64>,
    pub drift_after_m: Option<f64>,
    pub drift_m: f64,
}

impl SynthDrive {
    pub fn new(path: Vec<LonLat>, speed_mps: f64, rate_hz: f64) -> Self {
        SynthDrive {
            path,
            speed_mps,
            rate_hz,
            start_ts: 0.0,
            accuracy_m: Some(5.0),
            drift_after_m: None,
            drift_m: 0.0,
        }
    }

    pub fn with_drift(mut self, after_m: f64, drift_m: f64) -> Self {
        self.drift_after_m = Some(after_m);
        self.drift_m = drift_m;
        self
    }

    /// Generate the whole drive, ending exactly on the last vertex.
    pub fn generate(&self) -> Result<Vec<PositionFix>> {
        if self.path.len() < 2 {
            return Err(NavError::InvalidRoute(
                "synthetic drive needs at least 2 vertices".into(),
            ));
        }
        if !(self.speed_mps > 0.0) || !(self.rate_hz > 0.0) {
            return Err(NavError::Config("speed and rate must be positive".into()));
        }

        let total = geo::path_length(&self.path);
        let step_m = self.speed_mps / self.rate_hz;
        let count = (total / step_m).ceil() as usize;

        let mut fixes = Vec::with_capacity(count + 1);
        for n in 0..=count {
            let along = (n as f64 * step_m).min(total);
            let (mut lat, mut lon, heading) = self.point_at(along);

            if let Some(after) = self.drift_after_m {
                if along >= after && self.drift_m != 0.0 {
                    let side = (heading + 90.0) % 360.0;
                    (lat, lon) = geo::destination(lat, lon, side, self.drift_m);
                }
            }

            let mut fix = PositionFix::new(lat, lon, self.start_ts + n as f64 / self.rate_hz)
                .with_heading(heading);
            fix.accuracy_m = self.accuracy_m;
            fix.speed_mps = Some(self.speed_mps);
            fixes.push(fix);
        }
        Ok(fixes)
    }

    /// Position and heading `along` meters from the start of the path.
    fn point_at(&self, along: f64) -> (f64, f64, f64) {
        let mut remaining = along;
        let mut last_heading = 0.0;

        for seg in self.path.windows(2) {
            let (a, b) = (seg[0], seg[1]);
            let len = geo::distance(a.lat, a.lon, b.lat, b.lon);
            if len == 0.0 {
                continue;
            }
            let heading = geo::bearing(a.lat, a.lon, b.lat, b.lon);
            last_heading = heading;
            if remaining <= len {
                let (lat, lon) = geo::destination(a.lat, a.lon, heading, remaining);
                return (lat, lon, heading);
            }
            remaining -= len;
        }

        // Past the end from rounding
        let end = self.path[self.path.len() - 1];
        (end.lat, end.lon, last_heading)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nav_core::DeviationDetector;

    fn north_path() -> Vec<LonLat> {
        vec![LonLat::new(0.0, 0.0), LonLat::new(0.0, 0.01)]
    }

    #[test]
    fn test_fix_count_and_spacing() {
        let fixes = SynthDrive::new(north_path(), 10.0, 1.0).generate().unwrap();
        // ~1112 m at 10 m per fix
        assert_eq!(fixes.len(), 113);
        assert_eq!(fixes[0].timestamp, 0.0);
        assert_eq!(fixes[1].timestamp, 1.0);

        let gap = geo::distance(fixes[0].lat, fixes[0].lon, fixes[1].lat, fixes[1].lon);
        assert!((gap - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_ends_on_last_vertex() {
        let fixes = SynthDrive::new(north_path(), 13.0, 2.0).generate().unwrap();
        let last = fixes.last().unwrap();
        assert!(geo::distance(last.lat, last.lon, 0.01, 0.0) < 0.01);
        assert!(last.valid_heading().unwrap() < 1e-6);
    }

    #[test]
    fn test_heading_follows_segments() {
        let path = vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(0.0, 0.001),
            LonLat::new(0.001, 0.001),
        ];
        let fixes = SynthDrive::new(path, 10.0, 1.0).generate().unwrap();
        assert!(fixes[1].heading_deg.unwrap() < 1.0);
        assert!((fixes.last().unwrap().heading_deg.unwrap() - 90.0).abs() < 1.0);
    }

    #[test]
    fn test_drift_leaves_route() {
        let path = north_path();
        let fixes = SynthDrive::new(path.clone(), 10.0, 1.0)
            .with_drift(500.0, 50.0)
            .generate()
            .unwrap();

        let detector = DeviationDetector::new();
        assert!(!detector.check(&fixes[10], &path).deviated);
        let check = detector.check(&fixes[60], &path);
        assert!(check.deviated);
        assert!((check.min_distance_m - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(SynthDrive::new(vec![LonLat::new(0.0, 0.0)], 10.0, 1.0)
            .generate()
            .is_err());
        assert!(SynthDrive::new(north_path(), 0.0, 1.0).generate().is_err());
        assert!(SynthDrive::new(north_path(), 10.0, f64::NAN).generate().is_err());
    }
}
