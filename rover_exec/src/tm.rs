//! # Telemetry output
//!
//! One binary record per scheduler tick, against the fixed tick schema, appended to the session
//! telemetry file and published on the bus for live operators.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fs::{File, OpenOptions};
use std::io::Write;

use crate::mission::StepOutput;
use crate::rover_state::RoverState;
use comms_if::tm::{TmError, TmSchema, TmType, TmValue};
use util::session::Session;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Width of the action name field. Longer names are a programming error caught by the codec.
const ACTION_NAME_WIDTH: usize = 16;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Writer for the per-tick telemetry records.
pub struct TmWriter {
    schema: TmSchema,

    file: File,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmWriteError {
    #[error("Could not create the telemetry file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Could not encode the record: {0}")]
    EncodeError(#[from] TmError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmWriter {
    /// Create the writer and its session telemetry file.
    pub fn new(session: &Session) -> Result<Self, TmWriteError> {
        let mut path = session.session_root.clone();
        path.push("telemetry.bin");

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            schema: Self::tick_schema(),
            file,
        })
    }

    /// The fixed schema of one tick record.
    pub fn tick_schema() -> TmSchema {
        TmSchema::new()
            .field("cycle", TmType::Long)
            .field("action", TmType::Str(ACTION_NAME_WIDTH))
            .field("running", TmType::Byte)
            .field("speed_mms", TmType::Float)
            .field("heading_deg", TmType::Float)
            .field("heading_temp_c", TmType::Float)
            .field("l_wall_dist_mm", TmType::Float)
            .field("l_wall_ang_deg", TmType::Float)
            .field("r_wall_dist_mm", TmType::Float)
            .field("r_wall_ang_deg", TmType::Float)
            .field("l_gap", TmType::Byte)
            .field("r_gap", TmType::Byte)
            .field("cmd_speed", TmType::Float)
            .field("cmd_ang_deg", TmType::Float)
            .field("cmd_radius_mm", TmType::Int)
    }

    /// Encode and persist one tick record, returning the bytes for bus publication.
    pub fn write(
        &mut self,
        cycle: u128,
        state: &RoverState,
        step: &StepOutput,
    ) -> Result<Vec<u8>, TmWriteError> {
        let cmd = step.cmd.unwrap_or(state.last_cmd);

        let values = vec![
            TmValue::Long(cycle as i64),
            TmValue::Str(step.action_name.to_string()),
            TmValue::Byte(step.running as u8),
            TmValue::Float(state.speed_mms as f32),
            TmValue::Float(state.heading.value.yaw_deg as f32),
            TmValue::Float(state.heading.value.temp_c as f32),
            TmValue::Float(state.left_wall.dist_mm as f32),
            TmValue::Float(state.left_wall.ang_deg as f32),
            TmValue::Float(state.right_wall.dist_mm as f32),
            TmValue::Float(state.right_wall.ang_deg as f32),
            TmValue::Byte(state.left_gap.as_u8()),
            TmValue::Byte(state.right_gap.as_u8()),
            TmValue::Float(cmd.speed as f32),
            TmValue::Float(cmd.ang_deg as f32),
            TmValue::Int(cmd.radius_mm),
        ];

        let record = self.schema.encode(state.time_s, &values)?;

        self.file.write_all(&record)?;

        Ok(record)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tick_schema_round_trips() {
        let schema = TmWriter::tick_schema();

        let values = vec![
            TmValue::Long(42),
            TmValue::Str("wall_follow".into()),
            TmValue::Byte(1),
            TmValue::Float(102.5),
            TmValue::Float(271.0),
            TmValue::Float(24.5),
            TmValue::Float(396.5),
            TmValue::Float(7.5),
            TmValue::Float(4000.0),
            TmValue::Float(-0.5),
            TmValue::Byte(0),
            TmValue::Byte(1),
            TmValue::Float(40.0),
            TmValue::Float(-3.25),
            TmValue::Int(32767),
        ];

        let record = schema.encode(12.25, &values).unwrap();
        assert_eq!(record.len(), schema.record_len());

        let (ts, decoded) = schema.decode(&record).unwrap();
        assert_eq!(ts, 12.25);
        assert_eq!(decoded, values);
    }

    #[test]
    fn every_action_name_fits_the_schema() {
        for name in [
            "idle",
            "wait_sensor_data",
            "warmup",
            "wall_follow",
            "turn_corner",
            "drive_time",
            "stop",
        ]
        .iter()
        {
            assert!(name.len() <= ACTION_NAME_WIDTH, "{} too long", name);
        }
    }
}
