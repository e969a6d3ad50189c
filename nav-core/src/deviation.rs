//! Off-route detection.
//!
//! Measures the distance from a fix to every segment of the route polyline
//! and flags a deviation when the nearest one is further than the threshold.
//! Stateless; cheap enough to run on every fix, but the navigation loop
//! samples it on its own timer.

use serde::Serialize;

use crate::geo;
use crate::types::{LonLat, PositionFix};

/// Distance from the route beyond which the user is considered off-route.
pub const DEVIATION_THRESHOLD_M: f64 = 30.0;

/// Outcome of one deviation check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviationCheck {
    pub deviated: bool,
    /// Distance to the nearest segment; infinite when the route has no
    /// segments to measure against.
    pub min_distance_m: f64,
    /// Index of the nearest segment's first vertex.
    pub nearest_segment: Option<usize>,
}

impl DeviationCheck {
    fn skipped() -> Self {
        DeviationCheck {
            deviated: false,
            min_distance_m: f64::INFINITY,
            nearest_segment: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviationDetector {
    pub threshold_m: f64,
}

impl DeviationDetector {
    pub fn new() -> Self {
        DeviationDetector {
            threshold_m: DEVIATION_THRESHOLD_M,
        }
    }

    pub fn with_threshold(threshold_m: f64) -> Self {
        DeviationDetector { threshold_m }
    }

    /// Check a fix against a route polyline.
    ///
    /// Routes with fewer than two vertices are never reported as deviated.
    pub fn check(&self, fix: &PositionFix, geometry: &[LonLat]) -> DeviationCheck {
        if geometry.len() < 2 {
            return DeviationCheck::skipped();
        }

        let point = fix.position();
        let mut best = DeviationCheck::skipped();

        for (i, segment) in geometry.windows(2).enumerate() {
            let d = geo::point_to_segment_distance(point, segment[0], segment[1]);
            if d < best.min_distance_m {
                best.min_distance_m = d;
                best.nearest_segment = Some(i);
            }
        }

        best.deviated = best.min_distance_m > self.threshold_m;
        best
    }
}

impl Default for DeviationDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
