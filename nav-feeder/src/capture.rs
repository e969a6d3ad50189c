//! Fix files — recorded position streams, one event per line.
//!
//! Line formats:
//! - `timestamp,lat,lon[,accuracy_m[,heading_deg[,speed_mps]]]` — a fix;
//!   optional fields may be left empty
//! - `timestamp,error,class` — a terminal source error
//!   (`permission-denied`, `unavailable`, `timeout`, anything else)
//! - `# ...` — comment; blank lines are skipped

use std::fs;
use std::path::{Path, PathBuf};

use nav_core::{NavError, PositionError, PositionFix, Result};

use crate::source::SourceEvent;

/// Header written at the top of generated fix files.
pub const FIX_FILE_HEADER: &str = "# timestamp,lat,lon,accuracy_m,heading_deg,speed_mps";

// ---------------------------------------------------------------------------
// Fix file reader
// ---------------------------------------------------------------------------

pub struct FixReader {
    path: PathBuf,
}

impl FixReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FixReader {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read every event; the first malformed line is an error.
    pub fn read_all(&self) -> Result<Vec<SourceEvent>> {
        let content = fs::read_to_string(&self.path)?;
        let mut events = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if let Some(event) = parse_fix_line(line, i + 1)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Read every event, collecting malformed lines instead of failing.
    pub fn read_lenient(&self) -> Result<(Vec<SourceEvent>, Vec<NavError>)> {
        let content = fs::read_to_string(&self.path)?;
        let mut events = Vec::new();
        let mut errors = Vec::new();
        for (i, line) in content.lines().enumerate() {
            match parse_fix_line(line, i + 1) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        Ok((events, errors))
    }
}

/// Parse one line of a fix file. `Ok(None)` for comments and blank lines.
pub fn parse_fix_line(line: &str, line_no: usize) -> Result<Option<SourceEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let bad = |reason: String| NavError::Parse {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return Err(bad(format!("expected at least 3 fields, got {}", fields.len())));
    }

    let timestamp = parse_required(fields[0], "timestamp").map_err(bad)?;

    if fields[1].eq_ignore_ascii_case("error") {
        return Ok(Some(SourceEvent::Error(PositionError::from_class(fields[2]))));
    }
    if fields.len() > 6 {
        return Err(bad(format!("expected at most 6 fields, got {}", fields.len())));
    }

    let lat = parse_required(fields[1], "lat").map_err(bad)?;
    let lon = parse_required(fields[2], "lon").map_err(bad)?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(bad(format!("coordinate out of range: {lat},{lon}")));
    }

    let optional = |idx: usize, name: &str| -> std::result::Result<Option<f64>, String> {
        match fields.get(idx) {
            None | Some(&"") => Ok(None),
            Some(text) => parse_required(text, name).map(Some),
        }
    };

    let mut fix = PositionFix::new(lat, lon, timestamp);
    fix.accuracy_m = optional(3, "accuracy").map_err(bad)?;
    fix.heading_deg = optional(4, "heading").map_err(bad)?;
    fix.speed_mps = optional(5, "speed").map_err(bad)?;
    Ok(Some(SourceEvent::Fix(fix)))
}

fn parse_required(text: &str, name: &str) -> std::result::Result<f64, String> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("invalid {name}: {text:?}")),
    }
}

/// Format a fix as a fix-file line.
pub fn format_fix_line(fix: &PositionFix) -> String {
    let opt = |v: Option<f64>, precision: usize| match v {
        Some(v) => format!("{v:.precision$}"),
        None => String::new(),
    };
    format!(
        "{:.3},{:.7},{:.7},{},{},{}",
        fix.timestamp,
        fix.lat,
        fix.lon,
        opt(fix.accuracy_m, 1),
        opt(fix.heading_deg, 1),
        opt(fix.speed_mps, 2),
    )
}

/// Format a terminal source error as a fix-file line.
pub fn format_error_line(timestamp: f64, error: &PositionError) -> String {
    format!("{timestamp:.3},error,{}", error.class())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
