//! # [`Action::Idle`] implementation
//!
//! The initial state of the scheduler. Nothing is commanded, the scheduler waits for a start
//! telecommand.

use crate::mission::Transition;
use crate::rover_state::RoverState;

/// Idle state, the scheduler's no-op resting point.
#[derive(Debug, Default)]
pub struct Idle;

impl Idle {
    pub fn next(&mut self, _state: &RoverState) -> Transition {
        Transition::Continue
    }
}
