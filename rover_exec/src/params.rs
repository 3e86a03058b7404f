//! Parameters for the rover executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::mission::MissionParams;
use crate::rover_state::FusionParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the rover executable.
#[derive(Debug, Clone, Deserialize)]
pub struct RoverExecParams {
    /// Name of this executive, used in the command and feedback topic strings.
    pub exec_name: String,

    /// Target period of one mission cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Sensor fusion parameters.
    pub fusion: FusionParams,

    /// Mission scheduler parameters.
    pub mission: MissionParams,
}
