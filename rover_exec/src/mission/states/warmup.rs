//! # [`Action::Warmup`] implementation
//!
//! Exercises the steering through a small alternating sweep at zero drive speed before the
//! mission proper starts, so the wheels are proven to move and the steering PIDs are primed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::mission::{Action, Transition};
use crate::rover_state::RoverState;
use comms_if::eqpt::wheel::{DriveCmd, RADIUS_STRAIGHT_MM};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Ticks per sweep half-cycle.
const SWEEP_HALF_PERIOD_TICKS: u32 = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Steering warmup sweep.
#[derive(Debug)]
pub struct Warmup {
    ticks_remaining: u32,

    /// Sweep amplitude, degrees.
    sweep_deg: f64,

    pending: Option<Box<Action>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Warmup {
    pub fn new(ticks: u32, sweep_deg: f64, pending: Box<Action>) -> Self {
        Self {
            ticks_remaining: ticks,
            sweep_deg,
            pending: Some(pending),
        }
    }

    pub fn next(&mut self, _state: &RoverState) -> Transition {
        if self.ticks_remaining > 0 {
            return Transition::Continue;
        }

        match self.pending.take() {
            Some(next) => Transition::To(*next),
            None => Transition::Continue,
        }
    }

    pub fn execute(&mut self, _state: &RoverState) -> Option<DriveCmd> {
        if self.ticks_remaining == 0 {
            return None;
        }

        self.ticks_remaining -= 1;

        // Alternate the sweep direction every half period
        let ang_deg = if (self.ticks_remaining / SWEEP_HALF_PERIOD_TICKS) % 2 == 0 {
            self.sweep_deg
        } else {
            -self.sweep_deg
        };

        Some(DriveCmd::new(0.0, ang_deg, RADIUS_STRAIGHT_MM))
    }
}
