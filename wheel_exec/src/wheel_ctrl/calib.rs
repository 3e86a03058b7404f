//! Per-wheel calibration values.
//!
//! Calibration lives in the external key/value store and is loaded once at startup, with every
//! key explicitly defaulted when missing. The store is written by the steering calibration UI,
//! this executable only reads it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Serialize;
use thiserror::Error;

use comms_if::eqpt::store::{StoreClient, StoreError};
use comms_if::eqpt::wheel::WheelId;
use util::pid::PidGains;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Store key suffixes holding a wheel's calibration, under `wheel/<name>/`.
const WHEEL_KEYS: [&str; 4] = ["deg_offset", "deg_dir", "speed_dir", "radio_addr"];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Calibration values for one wheel.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WheelCalibration {
    /// Steering angle sensor reading when the wheel points straight ahead.
    ///
    /// Units: degrees
    pub ang_zero_off_deg: f64,

    /// Steering angle sensor direction, +1 or -1.
    pub ang_sign: f64,

    /// Drive motor direction, +1 or -1.
    pub drv_sign: f64,

    /// The wheel drive module's radio address.
    pub radio_addr: [u8; 5],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible calibration loading errors.
#[derive(Debug, Error)]
pub enum CalibError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid value for calibration key {key:?}: {value:?}")]
    InvalidValue { key: String, value: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WheelCalibration {
    /// The default calibration for a wheel: zero offset, positive directions, and a radio
    /// address derived from the wheel index.
    pub fn defaults(wheel: WheelId) -> Self {
        let mut radio_addr = *b"WHL0A";
        radio_addr[3] = b'0' + wheel.index() as u8;

        Self {
            ang_zero_off_deg: 0.0,
            ang_sign: 1.0,
            drv_sign: 1.0,
            radio_addr,
        }
    }

    /// Load a wheel's calibration from the store.
    ///
    /// Missing keys keep their default value (with a warning), present keys which do not parse
    /// are an error.
    pub fn from_store(store: &mut StoreClient, wheel: WheelId) -> Result<Self, CalibError> {
        let mut calib = Self::defaults(wheel);

        for suffix in WHEEL_KEYS.iter() {
            let key = format!("wheel/{}/{}", wheel.name(), suffix);

            match store.get(&key)? {
                Some(value) => calib.apply(&key, suffix, &value)?,
                None => warn!("Calibration key {:?} not in store, using default", key),
            }
        }

        Ok(calib)
    }

    /// Apply one store entry to the calibration.
    pub fn apply(&mut self, key: &str, suffix: &str, value: &str) -> Result<(), CalibError> {
        let invalid = || CalibError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match suffix {
            "deg_offset" => {
                self.ang_zero_off_deg = value.parse::<f64>().map_err(|_| invalid())?;
            }
            "deg_dir" => {
                self.ang_sign = parse_sign(value).ok_or_else(invalid)?;
            }
            "speed_dir" => {
                self.drv_sign = parse_sign(value).ok_or_else(invalid)?;
            }
            "radio_addr" => {
                let bytes = value.as_bytes();
                if bytes.len() != 5 || !value.is_ascii() {
                    return Err(invalid());
                }
                self.radio_addr.copy_from_slice(bytes);
            }
            _ => return Err(invalid()),
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load the shared steering PID gains from the store, starting from the given defaults.
///
/// The store holds one shared PID entry for all wheels: `pid/p`, `pid/i`, `pid/d`, `pid/g` and
/// `pid/deadband`.
pub fn pid_from_store(store: &mut StoreClient, defaults: PidGains) -> Result<PidGains, CalibError> {
    let mut gains = defaults;

    if let Some(v) = store.get_parsed("pid/p")? {
        gains.k_p = v;
    }
    if let Some(v) = store.get_parsed("pid/i")? {
        gains.k_i = v;
    }
    if let Some(v) = store.get_parsed("pid/d")? {
        gains.k_d = v;
    }
    if let Some(v) = store.get_parsed("pid/g")? {
        gains.output_gain = v;
    }
    if let Some(v) = store.get_parsed("pid/deadband")? {
        gains.dead_band = v;
    }

    Ok(gains)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a direction value, which must be exactly +1 or -1.
fn parse_sign(value: &str) -> Option<f64> {
    match value.trim() {
        "1" | "+1" => Some(1.0),
        "-1" => Some(-1.0),
        _ => None,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_give_unique_addresses() {
        let addrs: Vec<[u8; 5]> = WheelId::ALL
            .iter()
            .map(|w| WheelCalibration::defaults(*w).radio_addr)
            .collect();

        for i in 0..addrs.len() {
            for j in 0..i {
                assert_ne!(addrs[i], addrs[j]);
            }
        }
    }

    #[test]
    fn apply_parses_entries() {
        let mut calib = WheelCalibration::defaults(WheelId::FrontLeft);

        calib.apply("wheel/fl/deg_offset", "deg_offset", "123.5").unwrap();
        calib.apply("wheel/fl/deg_dir", "deg_dir", "-1").unwrap();
        calib.apply("wheel/fl/speed_dir", "speed_dir", "+1").unwrap();
        calib.apply("wheel/fl/radio_addr", "radio_addr", "WFL01").unwrap();

        assert_eq!(calib.ang_zero_off_deg, 123.5);
        assert_eq!(calib.ang_sign, -1.0);
        assert_eq!(calib.drv_sign, 1.0);
        assert_eq!(&calib.radio_addr, b"WFL01");
    }

    #[test]
    fn apply_rejects_bad_entries() {
        let mut calib = WheelCalibration::defaults(WheelId::FrontLeft);

        assert!(calib.apply("k", "deg_offset", "spam").is_err());
        assert!(calib.apply("k", "deg_dir", "2").is_err());
        assert!(calib.apply("k", "radio_addr", "TOOLONG").is_err());
    }
}
