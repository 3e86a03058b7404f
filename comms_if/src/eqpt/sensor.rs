//! # Sensor Topic Wire Formats
//!
//! Parsers and encoders for the sensor topics. Each format is explicit about its field layout and
//! returns a typed error on malformed input rather than letting a parse panic propagate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::wheel::NUM_WHEELS;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of fixed bearings sampled by the distance scanner.
pub const NUM_RADAR_BEARINGS: usize = 8;

/// Angular pitch between radar bearings.
///
/// Bearings are measured anticlockwise from the rover's forward axis, so bearing 90 is directly
/// left of the rover.
pub const RADAR_BEARING_STEP_DEG: u32 = 45;

/// Length in bytes of a heading message.
pub const HEADING_MSG_LEN: usize = 17;

/// Topic carrying wheel odometry tick counts.
pub const TOPIC_WHEEL_SPEED: &str = "wheel/speed/status";

/// Topic carrying wheel steering angles.
pub const TOPIC_WHEEL_DEG: &str = "wheel/deg/status";

/// Topic carrying the heading sensor data.
pub const TOPIC_HEADING: &str = "sensor/heading/data";

/// Topic carrying the distance scanner data.
pub const TOPIC_RADAR: &str = "sensor/distance";

/// Topic on which sensor streams are asked to resume publication.
pub const TOPIC_SENSOR_RESUME: &str = "sensor/control/resume";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A per-wheel sample message, as carried on the [`TOPIC_WHEEL_SPEED`] and [`TOPIC_WHEEL_DEG`]
/// topics.
///
/// Wire format is CSV: `time_ms,v0,s0,v1,s1,v2,s2,v3,s3`, where `v` is the wheel's value (encoder
/// ticks or steering degrees) and `s` its hardware status byte (0 = nominal).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelArrayMsg {
    /// Capture time on the sender in milliseconds.
    pub time_ms: u64,

    /// Per-wheel values.
    pub values: [f64; NUM_WHEELS],

    /// Per-wheel hardware status, 0 = nominal.
    pub status: [u8; NUM_WHEELS],
}

/// Heading sensor message.
///
/// Wire format is binary little-endian: three `f32` angles (yaw, pitch, roll), one status byte
/// (0 = nominal), and one `f32` sensor temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingMsg {
    /// Absolute yaw angle in degrees, [0, 360).
    pub yaw_deg: f32,

    /// Pitch angle in degrees.
    pub pitch_deg: f32,

    /// Roll angle in degrees.
    pub roll_deg: f32,

    /// Hardware status, 0 = nominal.
    pub status: u8,

    /// Sensor die temperature in celsius.
    pub temp_c: f32,
}

/// Distance scanner message.
///
/// Wire format is text: one `bearing:distance` pair per bearing plus a `status:<hex16>` entry
/// encoding one status byte per bearing, for example:
/// `0:600 45:500 90:400 135:600 180:2000 225:800 270:850 315:900 status:0000000000000000`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarMsg {
    /// Distances in millimetres, indexed by bearing / 45.
    pub dist_mm: [f64; NUM_RADAR_BEARINGS],

    /// Per-bearing status, 0 = nominal.
    pub status: [u8; NUM_RADAR_BEARINGS],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible errors when parsing a sensor payload.
#[derive(Debug, Error)]
pub enum SensorParseError {
    #[error("Expected {expected} CSV fields, found {found}")]
    WrongFieldCount { expected: usize, found: usize },

    #[error("Invalid numeric field: {0:?}")]
    InvalidNumber(String),

    #[error("Expected a payload of {expected} bytes, found {found}")]
    WrongPayloadLength { expected: usize, found: usize },

    #[error("Radar payload is missing bearing {0}")]
    MissingBearing(u32),

    #[error("Invalid radar bearing: {0:?}")]
    InvalidBearing(String),

    #[error("Invalid radar status entry: {0:?}")]
    InvalidStatus(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WheelArrayMsg {
    /// Parse a message from its CSV wire format.
    pub fn from_csv(payload: &str) -> Result<Self, SensorParseError> {
        let fields: Vec<&str> = payload.trim().split(',').collect();

        let expected = 1 + 2 * NUM_WHEELS;
        if fields.len() != expected {
            return Err(SensorParseError::WrongFieldCount {
                expected,
                found: fields.len(),
            });
        }

        let time_ms = fields[0]
            .parse::<u64>()
            .map_err(|_| SensorParseError::InvalidNumber(fields[0].into()))?;

        let mut values = [0.0; NUM_WHEELS];
        let mut status = [0u8; NUM_WHEELS];

        for i in 0..NUM_WHEELS {
            let v = fields[1 + 2 * i];
            let s = fields[2 + 2 * i];

            values[i] = v
                .parse::<f64>()
                .map_err(|_| SensorParseError::InvalidNumber(v.into()))?;
            status[i] = s
                .parse::<u8>()
                .map_err(|_| SensorParseError::InvalidNumber(s.into()))?;
        }

        Ok(Self {
            time_ms,
            values,
            status,
        })
    }

    /// Encode the message into its CSV wire format.
    pub fn to_csv(&self) -> String {
        let mut out = format!("{}", self.time_ms);

        for i in 0..NUM_WHEELS {
            out.push_str(&format!(",{},{}", self.values[i], self.status[i]));
        }

        out
    }
}

impl HeadingMsg {
    /// Decode a message from its binary wire format.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, SensorParseError> {
        if payload.len() != HEADING_MSG_LEN {
            return Err(SensorParseError::WrongPayloadLength {
                expected: HEADING_MSG_LEN,
                found: payload.len(),
            });
        }

        Ok(Self {
            yaw_deg: LittleEndian::read_f32(&payload[0..4]),
            pitch_deg: LittleEndian::read_f32(&payload[4..8]),
            roll_deg: LittleEndian::read_f32(&payload[8..12]),
            status: payload[12],
            temp_c: LittleEndian::read_f32(&payload[13..17]),
        })
    }

    /// Encode the message into its binary wire format.
    pub fn to_bytes(&self) -> [u8; HEADING_MSG_LEN] {
        let mut buf = [0u8; HEADING_MSG_LEN];

        LittleEndian::write_f32(&mut buf[0..4], self.yaw_deg);
        LittleEndian::write_f32(&mut buf[4..8], self.pitch_deg);
        LittleEndian::write_f32(&mut buf[8..12], self.roll_deg);
        buf[12] = self.status;
        LittleEndian::write_f32(&mut buf[13..17], self.temp_c);

        buf
    }
}

impl RadarMsg {
    /// Get the array index for a bearing in degrees, or `None` if the bearing is not one of the
    /// fixed scan bearings.
    pub fn bearing_index(bearing_deg: u32) -> Option<usize> {
        if bearing_deg % RADAR_BEARING_STEP_DEG != 0 {
            return None;
        }

        let idx = (bearing_deg / RADAR_BEARING_STEP_DEG) as usize;

        if idx < NUM_RADAR_BEARINGS {
            Some(idx)
        }
        else {
            None
        }
    }

    /// Get the distance at a bearing in degrees.
    ///
    /// # Panics
    /// - If the bearing is not one of the fixed scan bearings.
    pub fn dist_at(&self, bearing_deg: u32) -> f64 {
        self.dist_mm[Self::bearing_index(bearing_deg).expect("invalid radar bearing")]
    }

    /// Parse a message from its text wire format.
    pub fn from_text(payload: &str) -> Result<Self, SensorParseError> {
        let mut dist_mm = [None; NUM_RADAR_BEARINGS];
        let mut status = [0u8; NUM_RADAR_BEARINGS];
        let mut status_seen = false;

        for entry in payload.split_whitespace() {
            let mut parts = entry.splitn(2, ':');
            let key = parts.next().unwrap_or("");
            let value = parts
                .next()
                .ok_or_else(|| SensorParseError::InvalidBearing(entry.into()))?;

            if key == "status" {
                if value.len() != 2 * NUM_RADAR_BEARINGS || !value.is_ascii() {
                    return Err(SensorParseError::InvalidStatus(value.into()));
                }

                for i in 0..NUM_RADAR_BEARINGS {
                    status[i] = u8::from_str_radix(&value[2 * i..2 * i + 2], 16)
                        .map_err(|_| SensorParseError::InvalidStatus(value.into()))?;
                }

                status_seen = true;
            }
            else {
                let bearing = key
                    .parse::<u32>()
                    .map_err(|_| SensorParseError::InvalidBearing(key.into()))?;
                let idx = Self::bearing_index(bearing)
                    .ok_or_else(|| SensorParseError::InvalidBearing(key.into()))?;

                dist_mm[idx] = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| SensorParseError::InvalidNumber(value.into()))?,
                );
            }
        }

        if !status_seen {
            return Err(SensorParseError::InvalidStatus("missing".into()));
        }

        let mut dists = [0.0; NUM_RADAR_BEARINGS];
        for i in 0..NUM_RADAR_BEARINGS {
            dists[i] = dist_mm[i].ok_or(SensorParseError::MissingBearing(
                i as u32 * RADAR_BEARING_STEP_DEG,
            ))?;
        }

        Ok(Self {
            dist_mm: dists,
            status,
        })
    }

    /// Encode the message into its text wire format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for i in 0..NUM_RADAR_BEARINGS {
            out.push_str(&format!(
                "{}:{} ",
                i as u32 * RADAR_BEARING_STEP_DEG,
                self.dist_mm[i]
            ));
        }

        out.push_str("status:");
        for s in self.status.iter() {
            out.push_str(&format!("{:02x}", s));
        }

        out
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wheel_array_csv_round_trip() {
        let msg = WheelArrayMsg {
            time_ms: 123456,
            values: [100.0, 101.5, 99.0, 100.0],
            status: [0, 0, 2, 0],
        };

        let parsed = WheelArrayMsg::from_csv(&msg.to_csv()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn wheel_array_rejects_malformed() {
        assert!(matches!(
            WheelArrayMsg::from_csv("123,1,0,2,0"),
            Err(SensorParseError::WrongFieldCount { .. })
        ));
        assert!(matches!(
            WheelArrayMsg::from_csv("123,1,0,2,0,spam,0,4,0"),
            Err(SensorParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn heading_bytes_round_trip() {
        let msg = HeadingMsg {
            yaw_deg: 182.25,
            pitch_deg: -1.5,
            roll_deg: 0.75,
            status: 1,
            temp_c: 36.5,
        };

        let parsed = HeadingMsg::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(parsed, msg);

        assert!(matches!(
            HeadingMsg::from_bytes(&[0u8; 12]),
            Err(SensorParseError::WrongPayloadLength { .. })
        ));
    }

    #[test]
    fn radar_text_round_trip() {
        let msg = RadarMsg {
            dist_mm: [600.0, 500.0, 400.0, 600.0, 2000.0, 800.0, 850.0, 900.0],
            status: [0, 0, 0, 0, 1, 0, 0, 0],
        };

        let parsed = RadarMsg::from_text(&msg.to_text()).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.dist_at(90), 400.0);
    }

    #[test]
    fn radar_rejects_malformed() {
        // Missing a bearing
        assert!(matches!(
            RadarMsg::from_text("0:600 45:500 status:0000000000000000"),
            Err(SensorParseError::MissingBearing(_))
        ));

        // Bad status hex
        assert!(matches!(
            RadarMsg::from_text(
                "0:1 45:1 90:1 135:1 180:1 225:1 270:1 315:1 status:zz00000000000000"
            ),
            Err(SensorParseError::InvalidStatus(_))
        ));

        // Bearing not on the scan grid
        assert!(matches!(
            RadarMsg::from_text("30:600 status:0000000000000000"),
            Err(SensorParseError::InvalidBearing(_))
        ));
    }
}
