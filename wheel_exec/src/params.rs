//! Parameters for the wheel actuation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;
use util::pid::PidGains;

use crate::wheel_ctrl::protection::ProtectionParams;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters for the wheel actuation executable.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- TIMING ----
    /// Target period of one drive cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Time without a fresh drive command after which the wheels are zeroed.
    ///
    /// Units: seconds
    pub cmd_timeout_s: f64,

    /// Maximum time to wait for a radio acknowledgement from a wheel.
    ///
    /// Units: milliseconds
    pub radio_ack_timeout_ms: u64,

    // ---- GEOMETRY ----
    /// Distance between the front and rear axles.
    ///
    /// Units: millimetres
    pub wheelbase_mm: f64,

    /// Distance between the left and right wheel centres.
    ///
    /// Units: millimetres
    pub track_mm: f64,

    // ---- HARDWARE ----
    /// GPIO pin number driving the radio's CE line.
    pub radio_ce_pin: u8,

    /// I2C address of the angle sensor multiplexer.
    pub ang_mux_addr: u8,

    // ---- CONTROL ----
    /// Default steering PID gains, used when the calibration store holds no override.
    pub pid: PidGains,

    /// Thermal protection settings for the steering motors.
    pub steer_protection: ProtectionParams,

    /// Thermal protection settings for the drive motors.
    pub drive_protection: ProtectionParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Errors in the loaded parameter values.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("cycle_period_s must be positive, got {0}")]
    InvalidCyclePeriod(f64),

    #[error("Wheel geometry must be positive (wheelbase {0}, track {1})")]
    InvalidGeometry(f64, f64),

    #[error("cmd_timeout_s must be at least one cycle period")]
    InvalidCmdTimeout,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Params {
    /// Check the loaded parameters are usable.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.cycle_period_s <= 0.0 {
            return Err(ParamsError::InvalidCyclePeriod(self.cycle_period_s));
        }

        if self.wheelbase_mm <= 0.0 || self.track_mm <= 0.0 {
            return Err(ParamsError::InvalidGeometry(self.wheelbase_mm, self.track_mm));
        }

        if self.cmd_timeout_s < self.cycle_period_s {
            return Err(ParamsError::InvalidCmdTimeout);
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.02,
            cmd_timeout_s: 0.5,
            radio_ack_timeout_ms: 5,
            wheelbase_mm: 260.0,
            track_mm: 220.0,
            radio_ce_pin: 25,
            ang_mux_addr: 0x70,
            pid: PidGains {
                k_p: 1.2,
                k_i: 0.05,
                k_d: 0.02,
                output_gain: 1.0,
                dead_band: 1.0,
            },
            steer_protection: ProtectionParams::default(),
            drive_protection: ProtectionParams::default(),
        }
    }
}
