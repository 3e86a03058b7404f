//! # Equipment Payloads
//!
//! This module provides the payload types and wire codecs for the rover's equipment: the four
//! wheel units, the heading and distance sensors, and the calibration store.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Sensor topic wire formats (odometry, steering angle, heading, radar)
pub mod sensor;

/// Wheel identifiers, the unified drive command, and radio frames
pub mod wheel;

/// Calibration key/value store client
pub mod store;
