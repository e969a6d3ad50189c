//! Navigation session — the single mutable state of a guidance run.
//!
//! Only `PositionTracker` and `RerouteCoordinator` mutate a session; every
//! mutator is crate-private and everything else gets shared references.

use std::collections::HashSet;

use crate::route::{Route, RouteStep};
use crate::types::{LonLat, PositionFix};

/// Progress through the steps of the active route.
#[derive(Debug, Clone, Default)]
pub struct StepProgress {
    current_step: usize,
    /// Step indices whose announcement has already been made.
    announced: HashSet<usize>,
    arrival_reported: bool,
}

impl StepProgress {
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_announced(&self, step: usize) -> bool {
        self.announced.contains(&step)
    }

    pub fn announced_count(&self) -> usize {
        self.announced.len()
    }

    pub fn arrival_reported(&self) -> bool {
        self.arrival_reported
    }

    pub(crate) fn advance(&mut self) -> usize {
        self.current_step += 1;
        self.current_step
    }

    /// Returns `true` only the first time a step is marked.
    pub(crate) fn mark_announced(&mut self, step: usize) -> bool {
        self.announced.insert(step)
    }

    /// Returns `true` only the first time arrival is reported.
    pub(crate) fn mark_arrived(&mut self) -> bool {
        !std::mem::replace(&mut self.arrival_reported, true)
    }
}

/// The route currently being followed, with its progress.
#[derive(Debug, Clone)]
pub struct ActiveRoute {
    pub route: Route,
    pub progress: StepProgress,
}

impl ActiveRoute {
    fn new(route: Route) -> Self {
        ActiveRoute {
            route,
            progress: StepProgress::default(),
        }
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.route.steps
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavigationSession {
    origin: Option<LonLat>,
    destination: Option<LonLat>,
    route: Option<ActiveRoute>,
    is_active: bool,
    previous_fix: Option<PositionFix>,
}

impl NavigationSession {
    /// Session for a route between two endpoints. Origin and destination
    /// default to the ends of the route geometry.
    pub fn new(origin: Option<LonLat>, destination: Option<LonLat>, route: Option<Route>) -> Self {
        let origin = origin.or_else(|| route.as_ref().and_then(Route::start));
        let destination = destination.or_else(|| route.as_ref().and_then(Route::end));
        NavigationSession {
            origin,
            destination,
            route: route.map(ActiveRoute::new),
            is_active: false,
            previous_fix: None,
        }
    }

    pub fn origin(&self) -> Option<LonLat> {
        self.origin
    }

    pub fn destination(&self) -> Option<LonLat> {
        self.destination
    }

    pub fn route(&self) -> Option<&ActiveRoute> {
        self.route.as_ref()
    }

    pub fn has_route(&self) -> bool {
        self.route.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn previous_fix(&self) -> Option<&PositionFix> {
        self.previous_fix.as_ref()
    }

    /// Current step index, or `None` without a route.
    pub fn current_step(&self) -> Option<usize> {
        self.route.as_ref().map(|r| r.progress.current_step())
    }

    pub(crate) fn route_mut(&mut self) -> Option<&mut ActiveRoute> {
        self.route.as_mut()
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub(crate) fn set_origin(&mut self, origin: LonLat) {
        self.origin = Some(origin);
    }

    pub(crate) fn set_previous_fix(&mut self, fix: Option<PositionFix>) {
        self.previous_fix = fix;
    }

    /// Replace the route and all of its progress.
    pub(crate) fn install_route(&mut self, route: Route) {
        self.route = Some(ActiveRoute::new(route));
    }

    /// Drop the route and all of its progress.
    pub(crate) fn clear_route(&mut self) -> Option<Route> {
        self.route.take().map(|r| r.route)
    }

    /// Restart progress on the current route from its first step.
    pub(crate) fn restart_progress(&mut self) {
        if let Some(active) = self.route.as_mut() {
            active.progress = StepProgress::default();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
