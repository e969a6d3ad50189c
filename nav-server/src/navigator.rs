//! Navigation loop — one cooperative task that owns the tracker.
//!
//! Five event sources interleave in a single `select!`, checked in this
//! order on every turn:
//!
//! 1. control commands (stop)
//! 2. finished route requests from a reroute
//! 3. the deviation timer (1 Hz by default) sampling the latest fix
//! 4. position fixes, in arrival order, throttled on the loop's own clock
//! 5. the frame timer, flushing the latest deferred render
//!
//! Renders are coalesced: only the newest pending marker update is drawn
//! on each frame tick. Guidance and announcements are dispatched as soon
//! as a fix is processed. Once the loop leaves, the subscription is
//! dropped, any route request is aborted, and nothing else reaches a sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use nav_core::config::Config;
use nav_core::{
    DisplayDirective, LonLat, NavigationSession, PositionError, PositionTracker,
    RerouteCoordinator, RerouteRequest, Result, Route, TrackEvent,
};
use nav_feeder::{SourceEvent, Subscription};

use crate::provider::RouteProvider;
use crate::sinks::Sinks;

/// Commands accepted while a navigation run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Stop,
}

/// Timer periods of the loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub deviation_interval: Duration,
    pub frame_interval: Duration,
}

impl From<&Config> for LoopTiming {
    fn from(config: &Config) -> Self {
        LoopTiming {
            deviation_interval: Duration::from_millis(config.deviation.check_interval_ms.max(1)),
            frame_interval: Duration::from_millis(config.tracking.frame_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Stopped,
    SourceEnded,
    SourceError(PositionError),
}

/// A step the user completed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedStep {
    /// Index within the route that was active at the time.
    pub step: usize,
    pub label: String,
    pub announced: bool,
    /// Timestamp of the fix that completed it.
    pub timestamp: f64,
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationSummary {
    pub reason: StopReason,
    pub total_fixes: u64,
    pub accepted_fixes: u64,
    pub throttled_fixes: u64,
    pub deviation_checks: u64,
    pub deviations: u64,
    pub reroutes_requested: u64,
    pub reroutes_failed: u64,
    pub renders: u64,
    pub frames_coalesced: u64,
    pub announcements: Vec<String>,
    pub completed: Vec<CompletedStep>,
    pub steps_skipped: u64,
    pub arrived: bool,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    position: LonLat,
    bearing_deg: f64,
}

/// Counters and logs accumulated while dispatching events.
#[derive(Default)]
struct RunLog {
    renders: u64,
    frames_coalesced: u64,
    deviations: u64,
    announcements: Vec<String>,
    completed: Vec<CompletedStep>,
    steps_skipped: u64,
    arrived: bool,
    shown: Option<String>,
    last_fix_ts: f64,
}

pub struct Navigator {
    tracker: PositionTracker,
    coordinator: RerouteCoordinator,
    provider: Arc<dyn RouteProvider>,
    sinks: Sinks,
    timing: LoopTiming,
}

impl Navigator {
    pub fn new(
        tracker: PositionTracker,
        provider: Arc<dyn RouteProvider>,
        sinks: Sinks,
        timing: LoopTiming,
    ) -> Self {
        let coordinator = RerouteCoordinator::new(tracker.engine.language);
        Navigator {
            tracker,
            coordinator,
            provider,
            sinks,
            timing,
        }
    }

    /// Navigator for `route`, with every threshold taken from `config`.
    pub fn from_config(
        route: Route,
        destination: Option<LonLat>,
        config: &Config,
        provider: Arc<dyn RouteProvider>,
        sinks: Sinks,
    ) -> Self {
        let session = NavigationSession::new(None, destination, Some(route));
        let tracker = PositionTracker::from_config(session, config);
        Self::new(tracker, provider, sinks, LoopTiming::from(config))
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    /// Run a navigation session until stopped or the source finishes.
    ///
    /// Fails only when navigation cannot start (no route steps).
    pub async fn run(
        mut self,
        mut subscription: Subscription,
        mut control: mpsc::Receiver<Control>,
    ) -> Result<NavigationSummary> {
        let mut log = RunLog::default();
        let started = self.tracker.start_navigation()?;
        self.dispatch(started, &mut log, &mut None);

        let (reroute_tx, mut reroute_rx) = mpsc::channel::<Result<Route>>(1);
        let mut reroute_task: Option<JoinHandle<()>> = None;
        let mut pending_frame: Option<Frame> = None;
        let mut control_open = true;

        let mut deviation_timer = time::interval(self.timing.deviation_interval);
        deviation_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        deviation_timer.tick().await;
        let mut frame_timer = time::interval(self.timing.frame_interval);
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        frame_timer.tick().await;

        let clock = time::Instant::now();
        info!(provider = self.provider.name(), "navigation loop started");

        let reason = loop {
            let mut request: Option<RerouteRequest> = None;

            tokio::select! {
                biased;

                cmd = control.recv(), if control_open => match cmd {
                    Some(Control::Stop) => break StopReason::Stopped,
                    None => control_open = false,
                },

                Some(result) = reroute_rx.recv() => {
                    reroute_task = None;
                    let events = self.tracker.complete_reroute(&mut self.coordinator, result);
                    request = self.dispatch(events, &mut log, &mut pending_frame);
                }

                _ = deviation_timer.tick() => {
                    let events = self.tracker.check_deviation(&mut self.coordinator);
                    request = self.dispatch(events, &mut log, &mut pending_frame);
                }

                event = subscription.recv() => match event {
                    Some(SourceEvent::Fix(fix)) => {
                        log.last_fix_ts = fix.timestamp;
                        let received_at = clock.elapsed().as_secs_f64();
                        let events = self.tracker.update(&fix, received_at);
                        request = self.dispatch(events, &mut log, &mut pending_frame);
                    }
                    Some(SourceEvent::Error(err)) => {
                        warn!(class = err.class(), error = %err, "position source failed");
                        let message = self.tracker.engine.language.position_alert(&err);
                        self.sinks.display.alert(&message);
                        break StopReason::SourceError(err);
                    }
                    None => break StopReason::SourceEnded,
                },

                _ = frame_timer.tick(), if pending_frame.is_some() => {
                    if let Some(frame) = pending_frame.take() {
                        self.render(frame, &mut log);
                    }
                }
            }

            if let Some(req) = request {
                let provider = Arc::clone(&self.provider);
                let tx = reroute_tx.clone();
                reroute_task = Some(tokio::spawn(async move {
                    let result = provider.request_route(req.origin, req.destination).await;
                    let _ = tx.send(result).await;
                }));
            }
        };

        // Tear down before anything else can be dispatched
        subscription.unsubscribe();
        if let Some(task) = reroute_task.take() {
            task.abort();
        }
        self.coordinator.cancel();

        if reason != StopReason::Stopped {
            if let Some(frame) = pending_frame.take() {
                self.render(frame, &mut log);
            }
        }
        let stopped = self.tracker.stop();
        self.dispatch(stopped, &mut log, &mut None);

        info!(?reason, "navigation loop finished");
        Ok(NavigationSummary {
            reason,
            total_fixes: self.tracker.total_fixes,
            accepted_fixes: self.tracker.accepted_fixes,
            throttled_fixes: self.tracker.throttled_fixes,
            deviation_checks: self.tracker.deviation_checks,
            deviations: log.deviations,
            reroutes_requested: self.coordinator.requested,
            reroutes_failed: self.coordinator.failed,
            renders: log.renders,
            frames_coalesced: log.frames_coalesced,
            announcements: log.announcements,
            completed: log.completed,
            steps_skipped: log.steps_skipped,
            arrived: log.arrived,
        })
    }

    fn render(&self, frame: Frame, log: &mut RunLog) {
        log.renders += 1;
        self.sinks
            .render
            .on_fix_rendered(frame.position, frame.bearing_deg);
    }

    /// Send tracker events to the sinks. Returns a route request to issue.
    fn dispatch(
        &self,
        events: Vec<TrackEvent>,
        log: &mut RunLog,
        pending_frame: &mut Option<Frame>,
    ) -> Option<RerouteRequest> {
        let mut request = None;

        for event in events {
            match event {
                TrackEvent::Render {
                    position,
                    bearing_deg,
                    ..
                } => {
                    let frame = Frame {
                        position,
                        bearing_deg,
                    };
                    if pending_frame.replace(frame).is_some() {
                        log.frames_coalesced += 1;
                    }
                }
                TrackEvent::Directive(DisplayDirective::Show(instruction)) => {
                    self.sinks
                        .display
                        .show_directive(&instruction.text, &instruction.distance_text);
                    log.shown = Some(instruction.text);
                }
                TrackEvent::Directive(DisplayDirective::NoGuidance) => {
                    self.sinks.display.hide();
                }
                TrackEvent::Directive(DisplayDirective::Arrived) => {
                    log.arrived = true;
                    self.sinks.display.hide();
                }
                TrackEvent::HideDisplay => {
                    log.shown = None;
                    self.sinks.display.hide();
                }
                TrackEvent::Announce(text) => {
                    self.sinks.announcer.announce(&text);
                    log.announcements.push(text);
                }
                TrackEvent::StepAdvanced { from, to } => {
                    debug!(from, to, "step advanced");
                    let announced = self
                        .tracker
                        .session()
                        .route()
                        .is_some_and(|active| active.progress.is_announced(from));
                    log.completed.push(CompletedStep {
                        step: from,
                        label: log.shown.clone().unwrap_or_default(),
                        announced,
                        timestamp: log.last_fix_ts,
                    });
                }
                TrackEvent::StepSkipped { .. } => log.steps_skipped += 1,
                TrackEvent::Deviation(_) => log.deviations += 1,
                TrackEvent::RerouteRequested(req) => request = Some(req),
                TrackEvent::RouteInstalled { summary, steps } => {
                    debug!(%summary, steps, "route installed");
                }
                TrackEvent::RerouteFailed { .. } => {
                    self.sinks
                        .display
                        .alert(self.tracker.engine.language.route_failed());
                }
            }
        }

        request
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use nav_core::geo;
    use nav_core::{Language, NavError, PositionFix, RouteStep};
    use nav_feeder::{PositionSource, ReplaySource};

    use crate::sinks::testing::Recorder;

    const M_PER_DEG: f64 = geo::EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

    /// Records requests; answers with a straight route or a failure.
    struct FakeProvider {
        succeed: bool,
        requests: Mutex<Vec<(LonLat, LonLat)>>,
    }

    impl FakeProvider {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(FakeProvider {
                succeed,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(LonLat, LonLat)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RouteProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn request_route(&self, origin: LonLat, destination: LonLat) -> Result<Route> {
            self.requests.lock().unwrap().push((origin, destination));
            if !self.succeed {
                return Err(NavError::NoRoute);
            }
            Ok(Route::new(vec![origin, destination], vec![arrive_at(destination)]))
        }
    }

    fn arrive_at(at: LonLat) -> RouteStep {
        RouteStep {
            maneuver_location: Some(at),
            maneuver_type: Some("arrive".into()),
            ..Default::default()
        }
    }

    /// Route due north from (0,0) to (0,0.01) ending in one arrive step.
    fn north_route() -> Route {
        let end = LonLat::new(0.0, 0.01);
        Route::new(vec![LonLat::new(0.0, 0.0), end], vec![arrive_at(end)])
    }

    fn navigator(provider: Arc<dyn RouteProvider>, recorder: &Recorder, language: Language) -> Navigator {
        let mut config = Config::default();
        config.guidance.language = language;
        Navigator::from_config(north_route(), None, &config, provider, recorder.sinks())
    }

    /// Subscription over events already queued, closed afterwards.
    fn queued(events: Vec<SourceEvent>) -> Subscription {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.try_send(event).unwrap();
        }
        Subscription::from_receiver(rx)
    }

    fn no_control() -> mpsc::Receiver<Control> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }

    fn fix(lat: f64, east_m: f64, ts: f64) -> PositionFix {
        PositionFix::new(lat, east_m / M_PER_DEG, ts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_to_arrival() {
        let recorder = Recorder::default();
        let nav = navigator(FakeProvider::new(true), &recorder, Language::English);

        let fixes = vec![
            fix(0.0, 0.0, 0.0),
            fix(0.005, 0.0, 1.0),
            fix(0.0097, 0.0, 2.0),
            fix(0.00995, 0.0, 3.0),
            fix(0.01, 0.0, 4.0),
        ];
        let sub = ReplaySource::from_fixes(fixes, 1.0).subscribe();
        let summary = nav.run(sub, no_control()).await.unwrap();

        assert_eq!(summary.reason, StopReason::SourceEnded);
        assert_eq!(summary.accepted_fixes, 5);
        assert!(summary.arrived);
        assert_eq!(
            summary.announcements,
            vec![
                "Starting location tracking".to_string(),
                "Arrive".to_string(),
                "You have arrived at your destination".to_string(),
            ]
        );
        assert_eq!(summary.completed.len(), 1);
        assert_eq!(summary.completed[0].label, "Arrive");
        assert!(summary.completed[0].announced);
        assert_eq!(summary.completed[0].timestamp, 3.0);
        assert_eq!(summary.reroutes_requested, 0);

        let shows = recorder.with_prefix("show");
        assert!(shows[0].starts_with("show Continue straight 1.1km"));
        assert_eq!(recorder.lines().last().map(String::as_str), Some("hide"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_fixes_not_dispatched() {
        let recorder = Recorder::default();
        let nav = navigator(FakeProvider::new(true), &recorder, Language::English);

        // Received at 0, 10 and 60 ms
        let fixes = vec![
            fix(0.001, 0.0, 1.000),
            fix(0.0011, 0.0, 1.010),
            fix(0.0012, 0.0, 1.060),
        ];
        let sub = ReplaySource::from_fixes(fixes, 1.0).subscribe();
        let summary = nav.run(sub, no_control()).await.unwrap();

        assert_eq!(summary.total_fixes, 3);
        assert_eq!(summary.accepted_fixes, 2);
        assert_eq!(summary.throttled_fixes, 1);
        assert_eq!(recorder.with_prefix("show").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_throttled_despite_spread_timestamps() {
        let recorder = Recorder::default();
        let nav = navigator(FakeProvider::new(true), &recorder, Language::English);

        let sub = queued(vec![
            SourceEvent::Fix(fix(0.001, 0.0, 0.0)),
            SourceEvent::Fix(fix(0.002, 0.0, 1.0)),
            SourceEvent::Fix(fix(0.003, 0.0, 2.0)),
        ]);
        let summary = nav.run(sub, no_control()).await.unwrap();

        assert_eq!(summary.accepted_fixes, 1);
        assert_eq!(summary.throttled_fixes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guidance_survives_fix_clock_stepping_back() {
        let recorder = Recorder::default();
        let nav = navigator(FakeProvider::new(true), &recorder, Language::English);

        // One fix an hour ahead, then a corrected clock, delivered 1 s apart
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            let mut fixes = vec![fix(0.001, 0.0, 3600.0)];
            fixes.extend((0..5).map(|i| fix(0.002 + 0.001 * i as f64, 0.0, i as f64)));
            for f in fixes {
                if tx.send(SourceEvent::Fix(f)).await.is_err() {
                    return;
                }
                time::sleep(Duration::from_secs(1)).await;
            }
        });
        let summary = nav.run(Subscription::new(rx, task), no_control()).await.unwrap();

        assert_eq!(summary.total_fixes, 6);
        assert_eq!(summary.accepted_fixes, 6);
        assert_eq!(summary.throttled_fixes, 0);
        assert_eq!(recorder.with_prefix("show").len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_coalesced_to_latest() {
        let recorder = Recorder::default();
        let mut config = Config::default();
        config.tracking.frame_interval_ms = 500;
        let nav = Navigator::from_config(
            north_route(),
            None,
            &config,
            FakeProvider::new(true),
            recorder.sinks(),
        );

        // Five fixes 100 ms apart, all inside one frame
        let fixes = (0..5)
            .map(|i| fix(0.001 * (i + 1) as f64, 0.0, i as f64 * 0.1))
            .collect();
        let sub = ReplaySource::from_fixes(fixes, 1.0).subscribe();
        let summary = nav.run(sub, no_control()).await.unwrap();

        assert_eq!(summary.accepted_fixes, 5);
        assert_eq!(summary.renders, 1);
        assert_eq!(summary.frames_coalesced, 4);
        let renders = recorder.with_prefix("render");
        assert_eq!(renders, vec![format!("render {} 0", LonLat::new(0.0, 0.005))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deviation_triggers_single_reroute() {
        let recorder = Recorder::default();
        let provider = FakeProvider::new(true);
        let nav = navigator(provider.clone(), &recorder, Language::English);

        let off = fix(0.003, 50.0, 2.0);
        let mut fixes = vec![fix(0.001, 0.0, 0.0), fix(0.002, 0.0, 1.0)];
        for ts in 2..8 {
            fixes.push(PositionFix {
                timestamp: ts as f64,
                ..off.clone()
            });
        }
        let sub = ReplaySource::from_fixes(fixes, 1.0).subscribe();
        let summary = nav.run(sub, no_control()).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, off.position());
        assert_eq!(requests[0].1, LonLat::new(0.0, 0.01));
        assert_eq!(summary.reroutes_requested, 1);
        assert_eq!(summary.reroutes_failed, 0);
        assert_eq!(summary.deviations, 1);
        assert!(summary
            .announcements
            .contains(&"Recalculating route".to_string()));

        // Guidance resumed on the new route
        let shows = recorder.lines();
        let reroute_at = shows
            .iter()
            .position(|l| l == "say Recalculating route")
            .unwrap();
        assert!(shows[reroute_at..].iter().any(|l| l.starts_with("show ")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reroute_degrades_to_position_display() {
        let recorder = Recorder::default();
        let provider = FakeProvider::new(false);
        let nav = navigator(provider.clone(), &recorder, Language::Korean);

        let mut fixes = vec![fix(0.001, 0.0, 0.0)];
        for ts in 1..6 {
            fixes.push(fix(0.003, 50.0, ts as f64));
        }
        let sub = ReplaySource::from_fixes(fixes, 1.0).subscribe();
        let summary = nav.run(sub, no_control()).await.unwrap();

        assert_eq!(provider.requests().len(), 1);
        assert_eq!(summary.reroutes_failed, 1);
        assert_eq!(summary.accepted_fixes, 6);

        let lines = recorder.lines();
        let failed_at = lines
            .iter()
            .position(|l| l == "alert 경로를 가져오는 데 실패했습니다.")
            .unwrap();
        assert!(!lines[failed_at..].iter().any(|l| l.starts_with("show ")));
        assert!(lines[failed_at..].iter().any(|l| l.starts_with("render ")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_dispatch() {
        let recorder = Recorder::default();
        let nav = navigator(FakeProvider::new(true), &recorder, Language::English);

        let sub = queued(vec![
            SourceEvent::Fix(fix(0.001, 0.0, 0.0)),
            SourceEvent::Fix(fix(0.002, 0.0, 1.0)),
        ]);
        let (control_tx, control_rx) = mpsc::channel(1);
        control_tx.send(Control::Stop).await.unwrap();

        let summary = nav.run(sub, control_rx).await.unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(summary.total_fixes, 0);
        assert_eq!(
            recorder.lines(),
            vec!["say Starting location tracking".to_string(), "hide".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_raises_alert() {
        let recorder = Recorder::default();
        let nav = navigator(FakeProvider::new(true), &recorder, Language::Korean);

        let sub = queued(vec![
            SourceEvent::Fix(fix(0.001, 0.0, 0.0)),
            SourceEvent::Error(PositionError::PermissionDenied),
        ]);
        let summary = nav.run(sub, no_control()).await.unwrap();

        assert_eq!(
            summary.reason,
            StopReason::SourceError(PositionError::PermissionDenied)
        );
        assert!(recorder
            .with_prefix("alert")
            .iter()
            .any(|l| l.contains("위치 권한이 거부되었습니다")));
    }

    #[tokio::test]
    async fn test_run_without_steps_fails() {
        let recorder = Recorder::default();
        let route = Route::new(vec![LonLat::new(0.0, 0.0), LonLat::new(0.0, 0.01)], vec![]);
        let nav = Navigator::from_config(
            route,
            None,
            &Config::default(),
            FakeProvider::new(true),
            recorder.sinks(),
        );
        let result = nav.run(queued(vec![]), no_control()).await;
        assert!(matches!(result, Err(NavError::NoRoute)));
        assert!(recorder.lines().is_empty());
    }

    #[test]
    fn test_timing_from_config() {
        let mut config = Config::default();
        config.deviation.check_interval_ms = 250;
        config.tracking.frame_interval_ms = 0;
        let timing = LoopTiming::from(&config);
        assert_eq!(timing.deviation_interval, Duration::from_millis(250));
        assert_eq!(timing.frame_interval, Duration::from_millis(1));
    }
}
