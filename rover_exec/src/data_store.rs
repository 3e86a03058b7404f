//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::mission::MissionMgr;
use crate::rover_state::{self, RoverState, SensorFusion};
use comms_if::eqpt::wheel::DriveCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Sensor fusion
    pub fusion: SensorFusion,
    pub fusion_report: rover_state::StatusReport,

    /// The state produced by fusion this cycle. Read-only once produced, handed to the active
    /// action by reference.
    pub rover_state: RoverState,

    // Mission
    pub mission_mgr: MissionMgr,

    /// The last drive command issued to the wheels.
    pub last_cmd: DriveCmd,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need wiping at the start of a cycle, and sets the 1Hz cycle
    /// flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;

        self.fusion_report = rover_state::StatusReport::default();
    }
}
