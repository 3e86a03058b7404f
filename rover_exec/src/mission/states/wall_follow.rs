//! # [`Action::WallFollow`] implementation
//!
//! Follows the wall on one side of the rover at a target perpendicular distance. Two PID loops
//! feed the steering demand: one aligning the rover with the wall's angle, one holding the
//! distance, the latter converted into a steering angle through a fixed lookahead. When the
//! wall ends at a corner the action hands over to a corner turn which resumes a fresh follow.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::error;
use serde::{Deserialize, Serialize};

use crate::mission::{Action, MissionParams, Transition};
use crate::rover_state::walls::{GapClass, WallSide};
use crate::rover_state::RoverState;
use comms_if::eqpt::wheel::{DriveCmd, RADIUS_STRAIGHT_MM};
use util::maths::{asin_checked, MathsError};
use util::pid::{ErrorMetric, PidController, PidGains};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for wall following.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WallFollowParams {
    /// Gains for the wall distance loop. The dead band is in millimetres of distance error.
    pub dist_gains: PidGains,

    /// Gains for the wall angle alignment loop.
    pub ang_gains: PidGains,

    /// Lookahead distance used to convert a lateral correction into a steering angle.
    ///
    /// Units: millimetres
    pub lookahead_mm: f64,

    /// Speed used when the start telecommand does not give one.
    pub default_speed: f64,
}

/// Static configuration of one wall follow, kept separate from the controller state so a fresh
/// follow can be rebuilt after a corner turn.
#[derive(Debug, Clone, Copy)]
pub struct WallFollowCfg {
    pub side: WallSide,
    pub target_dist_mm: f64,
    pub speed: f64,
}

/// Wall following action.
#[derive(Debug)]
pub struct WallFollow {
    cfg: WallFollowCfg,

    params: WallFollowParams,

    /// Mission parameters, needed to rebuild the follow chain after a corner.
    mission_params: MissionParams,

    dist_pid: PidController,

    ang_pid: PidController,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for WallFollowParams {
    fn default() -> Self {
        Self {
            dist_gains: PidGains {
                k_p: 0.5,
                k_i: 0.0,
                k_d: 0.1,
                output_gain: 1.0,
                dead_band: 10.0,
            },
            ang_gains: PidGains {
                k_p: 0.4,
                k_i: 0.0,
                k_d: 0.05,
                output_gain: 1.0,
                dead_band: 0.5,
            },
            lookahead_mm: 300.0,
            default_speed: 40.0,
        }
    }
}

impl WallFollow {
    pub fn new(cfg: WallFollowCfg, mission_params: &MissionParams) -> Self {
        let params = mission_params.wall_follow;

        Self {
            cfg,
            params,
            mission_params: mission_params.clone(),
            dist_pid: PidController::new(params.dist_gains, ErrorMetric::Linear),
            ang_pid: PidController::new(params.ang_gains, ErrorMetric::AngularDeg),
        }
    }

    pub fn next(&mut self, state: &RoverState) -> Transition {
        // Without full sensing there is nothing safe to decide on
        if !state.has_complete_state() {
            return Transition::Continue;
        }

        // At a corner, turn around the wall end and resume a fresh follow afterwards. The
        // fresh instance re-primes the PIDs, their history is meaningless across the turn.
        if state.gap(self.cfg.side) == GapClass::Corner {
            let resume = Action::WallFollow(WallFollow::new(self.cfg, &self.mission_params));

            return Transition::To(Action::TurnCorner(super::TurnCorner::new(
                self.cfg.side,
                &self.mission_params,
                Box::new(resume),
            )));
        }

        Transition::Continue
    }

    pub fn execute(&mut self, state: &RoverState) -> Option<DriveCmd> {
        let wall = state.wall(self.cfg.side);

        // Wall angle alignment: drive the wall-relative angle to zero
        let align_deg = self.ang_pid.process(0.0, wall.ang_deg);

        // Wall distance: a lateral correction converted to a steering angle. A sensor spike can
        // push the ratio outside the asin domain, that tick steers on alignment alone.
        let away_deg = match self.steer_for_distance(wall.dist_mm) {
            Ok(d) => d,
            Err(e) => {
                error!("Wall follow distance correction unusable: {}", e);
                0.0
            }
        };

        // Steering away from the followed wall is rightward for the left wall and leftward for
        // the right wall
        let side_sign = match self.cfg.side {
            WallSide::Left => -1.0,
            WallSide::Right => 1.0,
        };

        Some(DriveCmd::new(
            self.cfg.speed,
            align_deg + side_sign * away_deg,
            RADIUS_STRAIGHT_MM,
        ))
    }

    /// The steering correction holding the target wall distance.
    ///
    /// Positive output steers away from the followed wall. Inside the distance dead band the
    /// output is exactly zero.
    fn steer_for_distance(&mut self, dist_mm: f64) -> Result<f64, MathsError> {
        let corr_mm = self.dist_pid.process(self.cfg.target_dist_mm, dist_mm);

        Ok(asin_checked(corr_mm / self.params.lookahead_mm)?.to_degrees())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn follow(target_mm: f64) -> WallFollow {
        WallFollow::new(
            WallFollowCfg {
                side: WallSide::Left,
                target_dist_mm: target_mm,
                speed: 40.0,
            },
            &MissionParams::default(),
        )
    }

    #[test]
    fn within_dead_band_no_correction() {
        let mut wf = follow(250.0);

        // First call primes the PID, second call is the real output
        wf.steer_for_distance(248.0).unwrap();
        let out = wf.steer_for_distance(248.0).unwrap();

        assert_eq!(out, 0.0);
    }

    #[test]
    fn too_close_steers_away() {
        let mut wf = follow(250.0);

        wf.steer_for_distance(150.0).unwrap();
        let out = wf.steer_for_distance(150.0).unwrap();

        assert!(out > 0.0);
    }

    #[test]
    fn too_far_steers_toward() {
        let mut wf = follow(250.0);

        wf.steer_for_distance(400.0).unwrap();
        let out = wf.steer_for_distance(400.0).unwrap();

        assert!(out < 0.0);
    }

    #[test]
    fn spike_reports_domain_error() {
        let mut wf = follow(250.0);

        // A correction beyond the lookahead has no valid steering angle
        wf.steer_for_distance(250.0).unwrap();
        assert!(wf.steer_for_distance(-5000.0).is_err());
    }
}
