//! # [`Action::WaitSensorData`] implementation
//!
//! Every mission starts here. The state resubscribes the sensor streams on entry and holds the
//! mission until all four snapshot kinds have arrived at least once, then counts down a fixed
//! number of ticks so the heading has settled before any action trusts it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};

use crate::mission::{Action, MissionIo, Transition};
use crate::rover_state::RoverState;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Holds the mission until sensing is complete and the heading has settled.
#[derive(Debug)]
pub struct WaitSensorData {
    /// Ticks still to wait once the state is complete.
    countdown: u32,

    /// True once the complete-state condition was first seen.
    counting: bool,

    /// The action to hand over to once sensing is ready.
    pending: Option<Box<Action>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WaitSensorData {
    pub fn new(settle_ticks: u32, pending: Box<Action>) -> Self {
        Self {
            countdown: settle_ticks,
            counting: false,
            pending: Some(pending),
        }
    }

    pub fn on_start(&mut self, io: &mut dyn MissionIo) {
        // The sensor bridges pause publication between missions, wake them back up
        io.resume_sensors();
    }

    pub fn next(&mut self, state: &RoverState) -> Transition {
        if !state.has_complete_state() {
            return Transition::Continue;
        }

        if !self.counting {
            self.counting = true;
            debug!("All sensor kinds received, settling for {} ticks", self.countdown);
        }

        if self.countdown > 0 {
            self.countdown -= 1;
            return Transition::Continue;
        }

        info!("Sensor data complete and settled");

        match self.pending.take() {
            Some(next) => Transition::To(*next),
            None => Transition::Continue,
        }
    }
}
