//! # [`Action::Stop`] implementation
//!
//! The terminal action of every mission. Zero commands are issued every tick until the rover is
//! confirmed stationary, then the scheduler returns to idle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use crate::mission::{Action, Transition};
use crate::rover_state::RoverState;
use comms_if::eqpt::wheel::DriveCmd;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Speed magnitude below which the rover counts as stationary.
///
/// Units: millimetres/second
const STATIONARY_SPEED_MMS: f64 = 1.0;

/// Multiple of the minimum stop ticks after which the stop is declared complete even without a
/// stationary confirmation, covering a dead odometry stream.
const FORCE_IDLE_FACTOR: u32 = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Terminal stop action.
#[derive(Debug)]
pub struct Stop {
    /// Minimum ticks of zero command before the stationary check may pass.
    min_ticks: u32,

    /// Ticks spent in this state so far.
    ticks_elapsed: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Stop {
    pub fn new(min_ticks: u32) -> Self {
        Self {
            min_ticks,
            ticks_elapsed: 0,
        }
    }

    pub fn next(&mut self, state: &RoverState) -> Transition {
        // The zero command must go out at least once before idle is considered, even if the
        // rover already reads stationary
        let first_tick = self.ticks_elapsed == 0;
        self.ticks_elapsed += 1;

        if first_tick || self.ticks_elapsed < self.min_ticks {
            return Transition::Continue;
        }

        if state.speed_mms.abs() < STATIONARY_SPEED_MMS || !state.odom.received() {
            info!("Rover stationary, stop complete");
            return Transition::To(Action::Idle(super::Idle));
        }

        // Without a stationary confirmation we still cannot stay here forever, the wheels have
        // been commanded to zero the whole time
        if self.ticks_elapsed > self.min_ticks.saturating_mul(FORCE_IDLE_FACTOR).max(1) {
            warn!(
                "No stationary confirmation after {} ticks, assuming stopped",
                self.ticks_elapsed
            );
            return Transition::To(Action::Idle(super::Idle));
        }

        Transition::Continue
    }

    pub fn execute(&mut self, _state: &RoverState) -> Option<DriveCmd> {
        Some(DriveCmd::stop())
    }
}
