//! nav-feeder: Position sources for nav-guide.
//!
//! Fix-file capture, paced replay, and synthetic drives, all delivered
//! through the `PositionSource` subscribe/unsubscribe contract.

pub mod capture;
pub mod source;
pub mod synth;

pub use capture::FixReader;
pub use source::{PositionSource, ReplaySource, SourceEvent, Subscription};
pub use synth::SynthDrive;
