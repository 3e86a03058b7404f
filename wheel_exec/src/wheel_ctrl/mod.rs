//! # Wheel control module
//!
//! This module closes the loop around the four wheel units. Each drive cycle it turns the
//! unified drive command into per-wheel steering angles and speeds, runs each wheel's steering
//! PID against its absolute angle sensor, enforces thermal protection, and exchanges demand and
//! acknowledgement frames with the wheel drive modules over the radio.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;
pub mod calib;
pub mod protection;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during WheelCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum WheelCtrlError {
    #[error("Failed to load calibration: {0}")]
    CalibError(#[from] calib::CalibError),
}
