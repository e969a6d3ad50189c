//! Output sinks for the navigation loop: map marker, instruction display,
//! and spoken announcements. All advisory; nothing they return is used.

use std::sync::{Arc, Mutex};

use nav_core::LonLat;

pub trait RenderSink: Send + Sync {
    fn on_fix_rendered(&self, position: LonLat, bearing_deg: f64);
}

pub trait DisplaySink: Send + Sync {
    fn show_directive(&self, instruction_text: &str, distance_text: &str);
    fn hide(&self);

    /// User-facing alert, e.g. a position source failure.
    fn alert(&self, message: &str);
}

/// Speech output. A new announcement supersedes any pending one.
pub trait AnnouncementSink: Send + Sync {
    fn announce(&self, text: &str);
}

/// The three sinks a navigation run dispatches to.
#[derive(Clone)]
pub struct Sinks {
    pub render: Arc<dyn RenderSink>,
    pub display: Arc<dyn DisplaySink>,
    pub announcer: Arc<dyn AnnouncementSink>,
}

impl Sinks {
    /// Print directives and announcements to stdout.
    pub fn console(show_positions: bool) -> Self {
        Sinks {
            render: Arc::new(ConsoleRender { show_positions }),
            display: Arc::new(ConsoleDisplay::default()),
            announcer: Arc::new(ConsoleAnnouncer),
        }
    }

    pub fn with_announcer(mut self, announcer: Arc<dyn AnnouncementSink>) -> Self {
        self.announcer = announcer;
        self
    }
}

// ---------------------------------------------------------------------------
// Console sinks
// ---------------------------------------------------------------------------

pub struct ConsoleRender {
    show_positions: bool,
}

impl RenderSink for ConsoleRender {
    fn on_fix_rendered(&self, position: LonLat, bearing_deg: f64) {
        if self.show_positions {
            println!("  @ {position}  hdg {bearing_deg:5.1}");
        }
    }
}

/// Prints a directive only when it differs from the one on screen.
#[derive(Default)]
pub struct ConsoleDisplay {
    shown: Mutex<Option<String>>,
}

impl DisplaySink for ConsoleDisplay {
    fn show_directive(&self, instruction_text: &str, distance_text: &str) {
        let line = format!("{instruction_text} ({distance_text})");
        let mut shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        if shown.as_deref() != Some(line.as_str()) {
            println!("> {line}");
            *shown = Some(line);
        }
    }

    fn hide(&self) {
        let mut shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        if shown.take().is_some() {
            println!("> (display hidden)");
        }
    }

    fn alert(&self, message: &str) {
        println!("! {message}");
    }
}

pub struct ConsoleAnnouncer;

impl AnnouncementSink for ConsoleAnnouncer {
    fn announce(&self, text: &str) {
        println!("[say] {text}");
    }
}

/// Forwards each announcement to several sinks.
pub struct FanoutAnnouncer(pub Vec<Arc<dyn AnnouncementSink>>);

impl AnnouncementSink for FanoutAnnouncer {
    fn announce(&self, text: &str) {
        for sink in &self.0 {
            sink.announce(text);
        }
    }
}

// ---------------------------------------------------------------------------
// Recording sink for tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;

    #[test]
    fn test_fanout_announcer() {
        let a = Recorder::default();
        let b = Recorder::default();
        let fanout = FanoutAnnouncer(vec![Arc::new(a.clone()), Arc::new(b.clone())]);
        fanout.announce("좌회전");
        assert_eq!(a.lines(), vec!["say 좌회전"]);
        assert_eq!(b.lines(), vec!["say 좌회전"]);
    }

    #[test]
    fn test_alert_reaches_display() {
        let recorder = Recorder::default();
        let sinks = recorder.sinks();
        sinks.display.alert("Position unavailable");
        assert_eq!(recorder.lines(), vec!["alert Position unavailable"]);
    }

    #[test]
    fn test_console_display_dedupes() {
        let display = ConsoleDisplay::default();
        display.show_directive("Turn left", "120m");
        display.show_directive("Turn left", "120m");
        assert_eq!(
            display.shown.lock().unwrap().as_deref(),
            Some("Turn left (120m)")
        );
        display.hide();
        assert!(display.shown.lock().unwrap().is_none());
    }
}
