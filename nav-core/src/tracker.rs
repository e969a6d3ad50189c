//! Position tracker — throttles raw fixes and fans them out.
//!
//! Pure logic, no I/O and no clocks of its own: the caller passes the
//! time each fix was received on its monotonic clock. Produces `TrackEvent`
//! outputs that the caller (the navigation loop) dispatches to render,
//! display, and announcement sinks.
//!
//! Per accepted fix: resolve a bearing, emit a render event, run the turn
//! instruction engine, and remember the fix as the previous one. Deviation
//! checks are not run here per fix; the caller samples them on its own
//! timer through `check_deviation`.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::deviation::{DeviationCheck, DeviationDetector};
use crate::geo;
use crate::guidance::{DisplayDirective, TurnInstructionEngine};
use crate::reroute::{RerouteCoordinator, RerouteRequest};
use crate::route::Route;
use crate::session::NavigationSession;
use crate::types::{LonLat, NavError, PositionFix, Result};

/// Minimum seconds between the receipt of two accepted fixes.
pub const MIN_FIX_INTERVAL: f64 = 0.050;

/// Movement below this many meters is not worth a log line.
const MOVEMENT_LOG_THRESHOLD_M: f64 = 0.5;

// ---------------------------------------------------------------------------
// Track events (output)
// ---------------------------------------------------------------------------

/// Events emitted by the tracker for the caller to dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TrackEvent {
    /// Position marker update, deferred to the next frame by the caller.
    Render {
        position: LonLat,
        bearing_deg: f64,
        accuracy_m: Option<f64>,
        first: bool,
    },
    /// New content for the instruction display.
    Directive(DisplayDirective),
    /// Hide the instruction display.
    HideDisplay,
    /// Text to speak; supersedes any pending announcement.
    Announce(String),
    StepAdvanced { from: usize, to: usize },
    StepSkipped { step: usize },
    /// The latest fix is off the route.
    Deviation(DeviationCheck),
    /// A new route must be requested from the route provider.
    RerouteRequested(RerouteRequest),
    RouteInstalled { summary: String, steps: usize },
    RerouteFailed { reason: String },
}

/// Bearing for an accepted fix: the fix's own heading when usable,
/// otherwise the bearing from the previous fix, otherwise north.
pub fn resolve_bearing(fix: &PositionFix, previous: Option<&PositionFix>) -> f64 {
    if let Some(heading) = fix.valid_heading() {
        return heading;
    }
    match previous {
        Some(prev) => geo::bearing(prev.lat, prev.lon, fix.lat, fix.lon),
        None => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Owns the navigation session and funnels every fix through guidance.
pub struct PositionTracker {
    session: NavigationSession,
    pub engine: TurnInstructionEngine,
    pub detector: DeviationDetector,
    pub min_interval: f64,
    tracking: bool,
    /// Receive time of the last accepted fix.
    last_accepted_at: Option<f64>,

    // Counters
    pub total_fixes: u64,
    pub accepted_fixes: u64,
    pub throttled_fixes: u64,
    pub deviation_checks: u64,
}

impl PositionTracker {
    pub fn new(
        session: NavigationSession,
        engine: TurnInstructionEngine,
        detector: DeviationDetector,
        min_interval: f64,
    ) -> Self {
        PositionTracker {
            session,
            engine,
            detector,
            min_interval,
            tracking: false,
            last_accepted_at: None,
            total_fixes: 0,
            accepted_fixes: 0,
            throttled_fixes: 0,
            deviation_checks: 0,
        }
    }

    /// Tracker with thresholds, language, and throttle taken from `config`.
    pub fn from_config(session: NavigationSession, config: &Config) -> Self {
        let engine = TurnInstructionEngine {
            near_m: config.guidance.near_m,
            announce_m: config.guidance.announce_m,
            advance_m: config.guidance.advance_m,
            language: config.guidance.language,
        };
        let detector = DeviationDetector::with_threshold(config.deviation.threshold_m);
        let min_interval = config.tracking.min_interval_ms as f64 / 1000.0;
        Self::new(session, engine, detector, min_interval)
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Most recent accepted fix.
    pub fn latest_fix(&self) -> Option<&PositionFix> {
        self.session.previous_fix()
    }

    /// Enter navigation mode on the installed route, starting from its
    /// first step.
    pub fn start_navigation(&mut self) -> Result<Vec<TrackEvent>> {
        let has_steps = self
            .session
            .route()
            .is_some_and(|active| !active.steps().is_empty());
        if !has_steps {
            return Err(NavError::NoRoute);
        }

        self.session.restart_progress();
        self.session.set_previous_fix(None);
        self.session.set_active(true);
        self.tracking = true;
        self.last_accepted_at = None;

        info!(
            origin = ?self.session.origin(),
            destination = ?self.session.destination(),
            "navigation started"
        );
        Ok(vec![TrackEvent::Announce(
            self.engine.language.tracking_started().to_string(),
        )])
    }

    /// Stop tracking. No fix is dispatched after this returns.
    pub fn stop(&mut self) -> Vec<TrackEvent> {
        if !self.tracking {
            return Vec::new();
        }
        self.tracking = false;
        self.session.set_active(false);
        self.session.set_previous_fix(None);
        self.last_accepted_at = None;
        info!(
            accepted = self.accepted_fixes,
            throttled = self.throttled_fixes,
            "tracking stopped"
        );
        vec![TrackEvent::HideDisplay]
    }

    /// Process one raw fix received at `received_at` seconds on the
    /// caller's monotonic clock. Returns the events to dispatch, empty when
    /// the fix was throttled or tracking is stopped.
    ///
    /// The fix's own timestamp plays no part in throttling.
    pub fn update(&mut self, fix: &PositionFix, received_at: f64) -> Vec<TrackEvent> {
        if !self.tracking {
            return Vec::new();
        }
        self.total_fixes += 1;

        // Throttle: the first fix always passes, and a clock that went
        // backwards counts as elapsed
        if let Some(last) = self.last_accepted_at {
            let elapsed = received_at - last;
            if (0.0..self.min_interval).contains(&elapsed) {
                self.throttled_fixes += 1;
                return Vec::new();
            }
        }
        self.accepted_fixes += 1;
        self.last_accepted_at = Some(received_at);

        let previous = self.session.previous_fix().cloned();

        match &previous {
            Some(prev) => {
                let moved = geo::distance(prev.lat, prev.lon, fix.lat, fix.lon);
                if moved > MOVEMENT_LOG_THRESHOLD_M {
                    debug!(
                        lat = fix.lat,
                        lon = fix.lon,
                        accuracy_m = ?fix.accuracy_m,
                        speed_kmh = ?fix.speed_mps.map(|s| s * 3.6),
                        "fix"
                    );
                }
            }
            None => debug!(lat = fix.lat, lon = fix.lon, "initial fix"),
        }

        let bearing_deg = resolve_bearing(fix, previous.as_ref());
        let mut events = vec![TrackEvent::Render {
            position: fix.position(),
            bearing_deg,
            accuracy_m: fix.accuracy_m,
            first: previous.is_none(),
        }];

        if self.session.is_active() {
            if let Some(active) = self.session.route_mut() {
                let from = active.progress.current_step();
                let update = self.engine.advance(active, fix);

                if let Some(step) = update.skipped_step {
                    events.push(TrackEvent::StepSkipped { step });
                }
                if let Some(directive) = update.directive {
                    events.push(TrackEvent::Directive(directive));
                }
                if let Some(text) = update.announcement {
                    events.push(TrackEvent::Announce(text));
                }
                if let Some(to) = update.advanced_to {
                    events.push(TrackEvent::StepAdvanced { from, to });
                }
            }
        }

        self.session.set_previous_fix(Some(fix.clone()));
        events
    }

    /// Sample the most recent fix against the route and start a reroute
    /// when it is off-route.
    pub fn check_deviation(&mut self, coordinator: &mut RerouteCoordinator) -> Vec<TrackEvent> {
        if !self.tracking || !self.session.is_active() {
            return Vec::new();
        }
        let fix = match self.session.previous_fix() {
            Some(f) => f.clone(),
            None => return Vec::new(),
        };

        let check = match self.session.route() {
            Some(active) if active.route.has_path() => {
                self.detector.check(&fix, &active.route.geometry)
            }
            _ => return Vec::new(),
        };
        self.deviation_checks += 1;

        if !check.deviated {
            return Vec::new();
        }

        info!(distance_m = check.min_distance_m.round(), "off route");
        let mut events = vec![TrackEvent::Deviation(check)];
        events.extend(coordinator.begin(&mut self.session, &fix));
        events
    }

    /// Hand a finished route request back to the coordinator.
    pub fn complete_reroute(
        &mut self,
        coordinator: &mut RerouteCoordinator,
        result: Result<Route>,
    ) -> Vec<TrackEvent> {
        coordinator.complete(&mut self.session, result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
