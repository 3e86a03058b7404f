//! # Wheel Equipment Payloads
//!
//! Definitions for the four wheel units: identifiers, the unified drive command issued by the
//! mission executive, and the packed radio frames exchanged with each wheel's drive module.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The number of wheels on the rover.
pub const NUM_WHEELS: usize = 4;

/// Sentinel turn radius meaning "drive straight, no turn".
///
/// Radius demands are clamped to this magnitude before encoding.
pub const RADIUS_STRAIGHT_MM: i32 = 32767;

/// Topic on which the unified drive command is published.
pub const TOPIC_DRIVE_CMD: &str = "drive/command";

/// Length in bytes of a radio demand frame.
pub const RADIO_DEMAND_LEN: usize = 4;

/// Length in bytes of a radio acknowledgement frame.
pub const RADIO_ACK_LEN: usize = 7;

/// First byte of every radio frame, used to reject corrupt packets.
const RADIO_MAGIC: u8 = 0xA5;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Identifiers of the four wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WheelId {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

/// Possible errors when encoding or decoding wheel payloads.
#[derive(Debug, Error)]
pub enum WheelMsgError {
    #[error("Expected a frame of {expected} bytes, found {found}")]
    WrongFrameLength { expected: usize, found: usize },

    #[error("Frame does not start with the expected magic byte (found {0:#04x})")]
    BadMagic(u8),

    #[error("Invalid drive command JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The unified drive command issued by the mission executive.
///
/// A command describes the motion of the rover body, the wheel controller derives per-wheel
/// steering angles and speeds from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveCmd {
    /// Normalised speed demand, -100 to +100. Positive speeds are "forwards".
    pub speed: f64,

    /// Steering angle demand in degrees.
    ///
    /// Follows the right hand rule about the rover's Z+ (upwards) axis, so positive angles steer
    /// to the left.
    pub ang_deg: f64,

    /// Turn radius in millimetres, or [`RADIUS_STRAIGHT_MM`] to drive straight.
    ///
    /// Positive radii turn to the left. Clamped to the sentinel magnitude on construction.
    pub radius_mm: i32,
}

/// Demand frame sent over the radio to a wheel's drive module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioDemand {
    /// Normalised speed demand, -100 to +100.
    pub speed: i8,

    /// Drive direction modifier, +1 or -1.
    ///
    /// Flipped by the steering controller when a wheel is pointed the "short way round" rather
    /// than rotated through more than 90 degrees.
    pub drv_mod: i8,
}

/// Acknowledgement frame returned by a wheel's drive module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioAck {
    /// The wheel's current odometer tick count.
    ///
    /// Wraps at the odometer modulus, unwrap deltas before use.
    pub odo_ticks: i32,

    /// Drive module status, 0 = nominal.
    pub status: u8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WheelId {
    /// All wheels, in index order.
    pub const ALL: [WheelId; NUM_WHEELS] = [
        WheelId::FrontLeft,
        WheelId::FrontRight,
        WheelId::RearLeft,
        WheelId::RearRight,
    ];

    /// The wheel's index into per-wheel arrays.
    pub fn index(self) -> usize {
        match self {
            WheelId::FrontLeft => 0,
            WheelId::FrontRight => 1,
            WheelId::RearLeft => 2,
            WheelId::RearRight => 3,
        }
    }

    /// The wheel's short name, as used in topic strings and store keys.
    pub fn name(self) -> &'static str {
        match self {
            WheelId::FrontLeft => "fl",
            WheelId::FrontRight => "fr",
            WheelId::RearLeft => "rl",
            WheelId::RearRight => "rr",
        }
    }

    /// True for the wheels on the left side of the rover.
    pub fn is_left(self) -> bool {
        matches!(self, WheelId::FrontLeft | WheelId::RearLeft)
    }

    /// True for the wheels on the front axle.
    pub fn is_front(self) -> bool {
        matches!(self, WheelId::FrontLeft | WheelId::FrontRight)
    }

    /// Topic on which this wheel's target steering angle is published.
    pub fn deg_topic(self) -> String {
        format!("wheel/{}/deg", self.name())
    }

    /// Topic on which this wheel's target speed is published.
    pub fn speed_topic(self) -> String {
        format!("wheel/{}/speed", self.name())
    }
}

impl DriveCmd {
    /// Create a new drive command, clamping the radius to the sentinel magnitude range.
    pub fn new(speed: f64, ang_deg: f64, radius_mm: i32) -> Self {
        Self {
            speed,
            ang_deg,
            radius_mm: radius_mm.max(-RADIUS_STRAIGHT_MM).min(RADIUS_STRAIGHT_MM),
        }
    }

    /// A command bringing the rover to a full stop.
    pub fn stop() -> Self {
        Self::new(0.0, 0.0, RADIUS_STRAIGHT_MM)
    }

    /// True if the command demands straight driving rather than a turn.
    pub fn is_straight(&self) -> bool {
        self.radius_mm.abs() == RADIUS_STRAIGHT_MM
    }

    /// Encode the command for the drive command topic.
    pub fn to_json(&self) -> Result<String, WheelMsgError> {
        serde_json::to_string(self).map_err(WheelMsgError::InvalidJson)
    }

    /// Decode a command from the drive command topic.
    pub fn from_json(payload: &str) -> Result<Self, WheelMsgError> {
        let cmd: Self = serde_json::from_str(payload).map_err(WheelMsgError::InvalidJson)?;

        // Re-clamp so that hand-written payloads can't smuggle an out-of-range radius in
        Ok(Self::new(cmd.speed, cmd.ang_deg, cmd.radius_mm))
    }
}

impl Default for DriveCmd {
    fn default() -> Self {
        Self::stop()
    }
}

impl RadioDemand {
    /// Encode the demand into its radio frame.
    pub fn to_bytes(&self) -> [u8; RADIO_DEMAND_LEN] {
        let mut buf = [0u8; RADIO_DEMAND_LEN];

        buf[0] = RADIO_MAGIC;
        buf[1] = self.speed as u8;
        buf[2] = self.drv_mod as u8;
        buf[3] = buf[1] ^ buf[2];

        buf
    }

    /// Decode a demand from its radio frame.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, WheelMsgError> {
        if frame.len() != RADIO_DEMAND_LEN {
            return Err(WheelMsgError::WrongFrameLength {
                expected: RADIO_DEMAND_LEN,
                found: frame.len(),
            });
        }
        if frame[0] != RADIO_MAGIC {
            return Err(WheelMsgError::BadMagic(frame[0]));
        }

        Ok(Self {
            speed: frame[1] as i8,
            drv_mod: frame[2] as i8,
        })
    }
}

impl RadioAck {
    /// Encode the acknowledgement into its radio frame.
    pub fn to_bytes(&self) -> [u8; RADIO_ACK_LEN] {
        let mut buf = [0u8; RADIO_ACK_LEN];

        buf[0] = RADIO_MAGIC;
        LittleEndian::write_i32(&mut buf[1..5], self.odo_ticks);
        buf[5] = self.status;
        buf[6] = buf[1] ^ buf[2] ^ buf[3] ^ buf[4] ^ buf[5];

        buf
    }

    /// Decode an acknowledgement from its radio frame.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, WheelMsgError> {
        if frame.len() != RADIO_ACK_LEN {
            return Err(WheelMsgError::WrongFrameLength {
                expected: RADIO_ACK_LEN,
                found: frame.len(),
            });
        }
        if frame[0] != RADIO_MAGIC {
            return Err(WheelMsgError::BadMagic(frame[0]));
        }

        Ok(Self {
            odo_ticks: LittleEndian::read_i32(&frame[1..5]),
            status: frame[5],
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn drive_cmd_radius_clamped() {
        let cmd = DriveCmd::new(50.0, 0.0, 100_000);
        assert_eq!(cmd.radius_mm, RADIUS_STRAIGHT_MM);
        assert!(cmd.is_straight());

        let cmd = DriveCmd::new(50.0, 0.0, -100_000);
        assert_eq!(cmd.radius_mm, -RADIUS_STRAIGHT_MM);

        let cmd = DriveCmd::new(50.0, 0.0, 450);
        assert!(!cmd.is_straight());
    }

    #[test]
    fn drive_cmd_json_round_trip() {
        let cmd = DriveCmd::new(-35.0, 12.5, 900);
        let parsed = DriveCmd::from_json(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(parsed, cmd);

        assert!(DriveCmd::from_json("not json").is_err());
    }

    #[test]
    fn radio_frames_round_trip() {
        let dem = RadioDemand {
            speed: -80,
            drv_mod: -1,
        };
        assert_eq!(RadioDemand::from_bytes(&dem.to_bytes()).unwrap(), dem);

        let ack = RadioAck {
            odo_ticks: 32760,
            status: 3,
        };
        assert_eq!(RadioAck::from_bytes(&ack.to_bytes()).unwrap(), ack);

        assert!(matches!(
            RadioAck::from_bytes(&[0u8; RADIO_ACK_LEN]),
            Err(WheelMsgError::BadMagic(_))
        ));
        assert!(matches!(
            RadioDemand::from_bytes(&[RADIO_MAGIC]),
            Err(WheelMsgError::WrongFrameLength { .. })
        ));
    }
}
