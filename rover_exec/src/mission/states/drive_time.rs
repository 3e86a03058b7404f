//! # [`Action::DriveTime`] implementation
//!
//! Drives at a fixed speed and steering angle for a fixed number of ticks, then stops.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::mission::{Action, Transition};
use crate::rover_state::RoverState;
use comms_if::eqpt::wheel::{DriveCmd, RADIUS_STRAIGHT_MM};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Timed straight drive.
#[derive(Debug)]
pub struct DriveTime {
    ticks_remaining: u32,

    speed: f64,

    ang_deg: f64,

    /// Ticks the terminal stop is given to confirm the rover stationary.
    stop_ticks: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveTime {
    pub fn new(ticks: u32, speed: f64, ang_deg: f64, stop_ticks: u32) -> Self {
        Self {
            ticks_remaining: ticks,
            speed,
            ang_deg,
            stop_ticks,
        }
    }

    pub fn next(&mut self, _state: &RoverState) -> Transition {
        if self.ticks_remaining > 0 {
            return Transition::Continue;
        }

        Transition::To(Action::Stop(super::Stop::new(self.stop_ticks)))
    }

    pub fn execute(&mut self, _state: &RoverState) -> Option<DriveCmd> {
        if self.ticks_remaining == 0 {
            return None;
        }

        self.ticks_remaining -= 1;

        Some(DriveCmd::new(self.speed, self.ang_deg, RADIUS_STRAIGHT_MM))
    }
}
