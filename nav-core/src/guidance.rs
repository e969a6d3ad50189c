//! Turn-by-turn instruction engine.
//!
//! Walks the steps of the active route as fixes approach each maneuver
//! point. Per step there are three zones, measured as geodesic distance from
//! the current fix to the maneuver point:
//!
//! - far (`>= near_m`): "continue straight" with the live distance
//! - near (`< near_m`): the step's instruction; a single announcement once
//!   inside `announce_m`
//! - arrival (`< advance_m`): the step is done and the index moves on
//!
//! Proximity is the only thing that advances a step. Elapsed time and
//! distance travelled never do.

use serde::Serialize;
use tracing::{debug, warn};

use crate::geo;
use crate::phrases::Language;
use crate::route::RouteStep;
use crate::session::ActiveRoute;
use crate::types::PositionFix;

/// Inside this distance the step's own instruction is shown.
pub const NEAR_DISTANCE_M: f64 = 100.0;

/// Inside this distance the instruction is announced (once per step).
pub const ANNOUNCE_DISTANCE_M: f64 = 50.0;

/// Inside this distance the step counts as completed.
pub const ADVANCE_DISTANCE_M: f64 = 20.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Far,
    Near,
    Arrival,
}

/// Instruction to put on the display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub step: usize,
    pub text: String,
    pub distance_text: String,
    pub distance_to_turn_m: f64,
    pub zone: Zone,
}

/// What the display should show after a fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayDirective {
    /// The route has no steps; hide the display.
    NoGuidance,
    /// Every step is done; hide the display.
    Arrived,
    Show(Instruction),
}

/// Result of evaluating one fix against the current step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuidanceUpdate {
    pub directive: Option<DisplayDirective>,
    pub announcement: Option<String>,
    /// New step index when the fix completed the current step.
    pub advanced_to: Option<usize>,
    /// Index of a step skipped because it has no usable coordinate.
    pub skipped_step: Option<usize>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TurnInstructionEngine {
    pub near_m: f64,
    pub announce_m: f64,
    pub advance_m: f64,
    pub language: Language,
}

impl TurnInstructionEngine {
    pub fn new(language: Language) -> Self {
        TurnInstructionEngine {
            near_m: NEAR_DISTANCE_M,
            announce_m: ANNOUNCE_DISTANCE_M,
            advance_m: ADVANCE_DISTANCE_M,
            language,
        }
    }

    /// Evaluate a fix against the current step of `active`, advancing its
    /// progress when the maneuver point is reached.
    pub fn advance(&self, active: &mut ActiveRoute, fix: &PositionFix) -> GuidanceUpdate {
        let mut update = GuidanceUpdate::default();
        let total = active.route.steps.len();

        if total == 0 {
            update.directive = Some(DisplayDirective::NoGuidance);
            return update;
        }

        let index = active.progress.current_step();
        if index >= total {
            if active.progress.mark_arrived() {
                update.directive = Some(DisplayDirective::Arrived);
                update.announcement = Some(self.language.arrived().to_string());
            }
            return update;
        }

        let step = &active.route.steps[index];
        let turn_point = match step.maneuver_point() {
            Some(p) => p,
            None => {
                warn!(step = index, "route step has no coordinates, skipping");
                update.skipped_step = Some(index);
                active.progress.advance();
                return update;
            }
        };

        let distance_to_turn = geo::distance(fix.lat, fix.lon, turn_point.lat, turn_point.lon);
        let text = self.instruction_label(step);

        debug!(
            step = index,
            total,
            instruction = %text,
            distance_m = distance_to_turn.round(),
            step_distance_m = step.distance_m.round(),
            "guidance"
        );

        if distance_to_turn >= self.near_m {
            update.directive = Some(DisplayDirective::Show(Instruction {
                step: index,
                text: self.language.straight().to_string(),
                distance_text: format_far_distance(distance_to_turn),
                distance_to_turn_m: distance_to_turn,
                zone: Zone::Far,
            }));
            return update;
        }

        let shown_distance = if step.distance_m > 0.0 {
            step.distance_m
        } else {
            distance_to_turn
        };
        let zone = if distance_to_turn < self.advance_m {
            Zone::Arrival
        } else {
            Zone::Near
        };

        if distance_to_turn < self.announce_m && active.progress.mark_announced(index) {
            update.announcement = Some(text.clone());
        }

        update.directive = Some(DisplayDirective::Show(Instruction {
            step: index,
            text,
            distance_text: format!("{shown_distance:.0}m"),
            distance_to_turn_m: distance_to_turn,
            zone,
        }));

        if zone == Zone::Arrival {
            let next = active.progress.advance();
            debug!(completed = index, next, "step completed");
            update.advanced_to = Some(next);
        }

        update
    }

    /// Display label for a step: the provider's text when present,
    /// otherwise one synthesized from the maneuver type and modifier.
    pub fn instruction_label(&self, step: &RouteStep) -> String {
        if let Some(text) = step.instruction.as_deref().filter(|t| !t.trim().is_empty()) {
            return text.to_string();
        }
        match step.maneuver_type.as_deref() {
            Some(kind) => self.language.maneuver_label(kind, step.modifier.as_deref()),
            None => self.language.proceed().to_string(),
        }
    }
}

impl Default for TurnInstructionEngine {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

/// Far-zone distance text: kilometres above 1000 m, else whole meters.
pub fn format_far_distance(meters: f64) -> String {
    if meters > 1000.0 {
        format!("{:.1}km", meters / 1000.0)
    } else {
        format!("{meters:.0}m")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
