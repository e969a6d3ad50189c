//! nav-core: Pure guidance library for turn-by-turn route navigation.
//!
//! No async, no I/O — just algorithms. This crate is the shared core used by
//! both `nav-feeder` (position sources) and `nav-server` (navigation loop + CLI).

pub mod config;
pub mod deviation;
pub mod geo;
pub mod guidance;
pub mod phrases;
pub mod reroute;
pub mod route;
pub mod session;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use deviation::{DeviationCheck, DeviationDetector};
pub use guidance::{DisplayDirective, Instruction, TurnInstructionEngine};
pub use phrases::Language;
pub use reroute::{RerouteCoordinator, RerouteRequest};
pub use route::{Route, RouteStep};
pub use session::NavigationSession;
pub use tracker::{PositionTracker, TrackEvent};
pub use types::*;
