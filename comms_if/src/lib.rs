//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommand definitions for the mission executive
pub mod tc;

/// Payload and wire format definitions for equipment (wheels, sensors, the calibration store)
pub mod eqpt;

/// Network module
pub mod net;

/// Binary telemetry record codec
pub mod tm;
