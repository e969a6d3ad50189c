//! Position sources — push-based fix streams behind a subscribe/unsubscribe
//! contract.
//!
//! A source delivers `SourceEvent`s over a bounded channel from its own
//! task. An error event is terminal: the source stops after sending it.
//! Dropping or unsubscribing a `Subscription` aborts the producing task and
//! closes the channel, so nothing queued is delivered afterwards.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nav_core::{PositionError, PositionFix};

/// Default channel depth between a source task and its subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Fix(PositionFix),
    /// Terminal source failure.
    Error(PositionError),
}

pub trait PositionSource {
    /// Start delivering events. Must be called inside a tokio runtime.
    fn subscribe(&self) -> Subscription;
}

/// Handle to a live subscription.
pub struct Subscription {
    rx: mpsc::Receiver<SourceEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<SourceEvent>, task: JoinHandle<()>) -> Self {
        Subscription {
            rx,
            task: Some(task),
        }
    }

    /// Subscription fed directly by a channel the caller controls.
    pub fn from_receiver(rx: mpsc::Receiver<SourceEvent>) -> Self {
        Subscription { rx, task: None }
    }

    /// Next event, or `None` once the source has finished.
    pub async fn recv(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }

    /// Stop the source. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Replay source
// ---------------------------------------------------------------------------

/// Replays recorded events, paced by the gaps between fix timestamps.
///
/// Fixes keep their recorded timestamps. `speed` divides the pacing gaps;
/// `0` delivers everything as fast as the subscriber reads.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    events: Vec<SourceEvent>,
    pub speed: f64,
    pub capacity: usize,
}

impl ReplaySource {
    pub fn new(events: Vec<SourceEvent>, speed: f64) -> Self {
        ReplaySource {
            events,
            speed,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn from_fixes(fixes: Vec<PositionFix>, speed: f64) -> Self {
        Self::new(fixes.into_iter().map(SourceEvent::Fix).collect(), speed)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl PositionSource for ReplaySource {
    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity.max(1));
        let events = self.events.clone();
        let speed = self.speed;

        let task = tokio::spawn(async move {
            let mut last_ts: Option<f64> = None;
            for event in events {
                if let SourceEvent::Fix(fix) = &event {
                    if let (Some(prev), true) = (last_ts, speed > 0.0) {
                        let gap = (fix.timestamp - prev) / speed;
                        if gap > 0.0 {
                            match Duration::try_from_secs_f64(gap) {
                                Ok(pause) => tokio::time::sleep(pause).await,
                                Err(e) => {
                                    warn!(gap_s = gap, error = %e, "replay gap out of range");
                                    let failure = SourceEvent::Error(PositionError::Other(
                                        format!("replay gap of {gap:e}s out of range"),
                                    ));
                                    let _ = tx.send(failure).await;
                                    return;
                                }
                            }
                        }
                    }
                    last_ts = Some(fix.timestamp);
                }

                let terminal = matches!(event, SourceEvent::Error(_));
                if tx.send(event).await.is_err() {
                    debug!("replay subscriber gone");
                    return;
                }
                if terminal {
                    return;
                }
            }
        });

        Subscription::new(rx, task)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
