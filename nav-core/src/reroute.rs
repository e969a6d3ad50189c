//! Reroute coordination.
//!
//! On deviation the current route is discarded, the origin moves to the
//! off-route fix, and a new route to the same destination is requested.
//! At most one request is outstanding; deviations that arrive while one
//! is pending are ignored. A failed request leaves the session without a
//! route, so tracking continues with position display only.

use serde::Serialize;
use tracing::{info, warn};

use crate::phrases::Language;
use crate::route::Route;
use crate::session::NavigationSession;
use crate::tracker::TrackEvent;
use crate::types::{LonLat, PositionFix, Result};

/// Route request issued for a reroute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RerouteRequest {
    pub origin: LonLat,
    pub destination: LonLat,
}

#[derive(Debug, Clone)]
pub struct RerouteCoordinator {
    pub language: Language,
    pending: Option<RerouteRequest>,
    pub requested: u64,
    pub failed: u64,
}

impl RerouteCoordinator {
    pub fn new(language: Language) -> Self {
        RerouteCoordinator {
            language,
            pending: None,
            requested: 0,
            failed: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&RerouteRequest> {
        self.pending.as_ref()
    }

    /// Start a reroute from `fix`. Returns no events when a request is
    /// already in flight or the session has no destination.
    pub fn begin(&mut self, session: &mut NavigationSession, fix: &PositionFix) -> Vec<TrackEvent> {
        if self.pending.is_some() {
            return Vec::new();
        }
        let Some(destination) = session.destination() else {
            warn!("deviation without a destination, not rerouting");
            return Vec::new();
        };

        let origin = fix.position();
        session.set_origin(origin);
        session.clear_route();

        let request = RerouteRequest {
            origin,
            destination,
        };
        self.pending = Some(request);
        self.requested += 1;
        info!(%origin, %destination, "rerouting");

        vec![
            TrackEvent::HideDisplay,
            TrackEvent::Announce(self.language.rerouting().to_string()),
            TrackEvent::RerouteRequested(request),
        ]
    }

    /// Apply the provider's answer to the pending request. Answers with no
    /// request pending (for instance after a stop) are dropped.
    pub fn complete(
        &mut self,
        session: &mut NavigationSession,
        result: Result<Route>,
    ) -> Vec<TrackEvent> {
        if self.pending.take().is_none() {
            return Vec::new();
        }

        match result {
            Ok(route) => {
                let summary = route.summary();
                let steps = route.steps.len();
                info!(%summary, steps, "new route installed");
                session.install_route(route);
                vec![TrackEvent::RouteInstalled { summary, steps }]
            }
            Err(e) => {
                self.failed += 1;
                warn!(error = %e, "reroute failed, continuing without guidance");
                vec![TrackEvent::RerouteFailed {
                    reason: e.to_string(),
                }]
            }
        }
    }

    /// Forget any pending request.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
