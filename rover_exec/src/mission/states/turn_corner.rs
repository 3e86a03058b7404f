//! # [`Action::TurnCorner`] implementation
//!
//! Carries the rover around the end of the wall it was following: a fixed-radius arc toward the
//! followed side, completed when the heading has swung 90 degrees from the heading at entry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use serde::{Deserialize, Serialize};

use crate::mission::{Action, MissionParams, Transition};
use crate::rover_state::walls::WallSide;
use crate::rover_state::RoverState;
use comms_if::eqpt::wheel::DriveCmd;
use util::maths::{ang_diff_deg, norm_ang_deg};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the corner turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TurnParams {
    /// Radius of the turn arc.
    ///
    /// Units: millimetres
    pub radius_mm: i32,

    /// Speed during the turn.
    pub speed: f64,

    /// Heading error below which the turn is complete.
    ///
    /// Units: degrees
    pub heading_tol_deg: f64,
}

/// Corner turning action.
#[derive(Debug)]
pub struct TurnCorner {
    /// The side whose wall ended, the turn arcs toward it.
    side: WallSide,

    params: TurnParams,

    /// Heading to finish the turn at, fixed from the heading at the first tick.
    target_heading_deg: Option<f64>,

    /// The action to resume once the turn is complete.
    resume: Option<Box<Action>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TurnParams {
    fn default() -> Self {
        Self {
            radius_mm: 450,
            speed: 30.0,
            heading_tol_deg: 5.0,
        }
    }
}

impl TurnCorner {
    pub fn new(side: WallSide, mission_params: &MissionParams, resume: Box<Action>) -> Self {
        Self {
            side,
            params: mission_params.turn,
            target_heading_deg: None,
            resume: Some(resume),
        }
    }

    pub fn next(&mut self, state: &RoverState) -> Transition {
        if !state.has_complete_state() {
            return Transition::Continue;
        }

        let heading_deg = state.heading.value.yaw_deg;

        // Fix the target on the first tick with a usable heading. Turning around the left wall
        // end swings the heading anticlockwise, around the right wall end clockwise.
        let delta_deg = match self.side {
            WallSide::Left => 90.0,
            WallSide::Right => -90.0,
        };
        let target_deg =
            *self.target_heading_deg.get_or_insert(norm_ang_deg(heading_deg + delta_deg));

        if ang_diff_deg(target_deg, heading_deg).abs() <= self.params.heading_tol_deg {
            info!("Corner turn complete at heading {:.1}", heading_deg);

            return match self.resume.take() {
                Some(next) => Transition::To(*next),
                None => Transition::Continue,
            };
        }

        Transition::Continue
    }

    pub fn execute(&mut self, _state: &RoverState) -> Option<DriveCmd> {
        // Arc toward the followed side, positive radii turn left
        let radius_mm = match self.side {
            WallSide::Left => self.params.radius_mm,
            WallSide::Right => -self.params.radius_mm,
        };

        Some(DriveCmd::new(self.params.speed, 0.0, radius_mm))
    }
}
