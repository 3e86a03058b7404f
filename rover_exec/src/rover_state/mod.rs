//! # Sensor fusion module
//!
//! This module owns the four dual-buffered sensor snapshots and composes them, together with
//! the last issued drive command, into one immutable-per-tick [`RoverState`]. Derived wall
//! geometry is recomputed exactly once per tick, actions only ever read the finished state.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod samples;
pub mod walls;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use comms_if::eqpt::sensor::{HeadingMsg, RadarMsg, WheelArrayMsg, NUM_RADAR_BEARINGS};
use comms_if::eqpt::wheel::{DriveCmd, NUM_WHEELS};
use samples::{Heading, Radar, TimedSample, WheelAng, WheelOdom};
use util::maths::{norm_ang_deg, unwrap_ticks};
use util::module::State;
use util::session::Session;
use walls::{GapClass, WallEstimate, WallParams, WallSide};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for sensor fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionParams {
    /// Odometer ticks per millimetre of wheel travel.
    pub ticks_per_mm: f64,

    /// Largest change versus the previous reading accepted from a radar bearing whose status
    /// is stale. Larger jumps are treated as spurious and read far instead.
    ///
    /// Units: millimetres
    pub radar_max_jump_mm: f64,

    /// Distance substituted for rejected radar readings.
    ///
    /// Units: millimetres
    pub radar_far_mm: f64,

    /// Wall estimator thresholds.
    pub walls: WallParams,
}

/// Sensor fusion module state.
#[derive(Default)]
pub struct SensorFusion {
    params: FusionParams,

    report: StatusReport,

    odom: TimedSample<WheelOdom>,
    wheel_ang: TimedSample<WheelAng>,
    heading: TimedSample<Heading>,
    radar: TimedSample<Radar>,

    /// First raw heading of the session, all headings are reported relative to it.
    heading_zero_deg: Option<f64>,
}

/// Input data to sensor fusion: the raw payloads drained from the bus this tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputData {
    pub odom: Option<WheelArrayMsg>,
    pub wheel_ang: Option<WheelArrayMsg>,
    pub heading: Option<HeadingMsg>,
    pub radar: Option<RadarMsg>,

    /// The drive command issued on the previous tick.
    pub last_cmd: DriveCmd,

    /// Current session time.
    pub time_s: f64,
}

/// The fused rover state for one tick.
///
/// A value snapshot: once produced it is read-only for the remainder of the tick. The scheduler
/// owns it exclusively and hands it to the active action by reference.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RoverState {
    /// Session time this state was produced at.
    pub time_s: f64,

    pub odom: TimedSample<WheelOdom>,
    pub wheel_ang: TimedSample<WheelAng>,
    pub heading: TimedSample<Heading>,
    pub radar: TimedSample<Radar>,

    /// The drive command in effect when the snapshots were taken.
    pub last_cmd: DriveCmd,

    /// Average rover speed estimated from the odometer deltas.
    ///
    /// Units: millimetres/second
    pub speed_mms: f64,

    pub left_wall: WallEstimate,
    pub right_wall: WallEstimate,

    pub left_gap: GapClass,
    pub right_gap: GapClass,
}

/// Status report for sensor fusion processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Per-wheel: true if the odometer fell back to the previous known-good count.
    pub odom_fallback: [bool; NUM_WHEELS],

    /// Per-wheel: true if the steering angle fell back to the previous known-good value.
    pub wheel_ang_fallback: [bool; NUM_WHEELS],

    /// Per-bearing: true if the radar reading was rejected as spurious.
    pub radar_rejected: [bool; NUM_RADAR_BEARINGS],

    /// True if a heading message arrived flagged invalid and was discarded.
    pub heading_invalid: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors during sensor fusion.
///
/// Fusion substitutes known-good values rather than failing, so there are currently no cyclic
/// errors, the type exists to satisfy the module contract and for future use.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            ticks_per_mm: 10.87,
            radar_max_jump_mm: 300.0,
            radar_far_mm: walls::RADAR_DIST_FAR_MM,
            walls: WallParams::default(),
        }
    }
}

impl RoverState {
    /// True only once all four snapshot kinds have been received at least once.
    ///
    /// Actions that require full sensing must gate on this rather than assuming the zeroed
    /// defaults are meaningful.
    pub fn has_complete_state(&self) -> bool {
        self.odom.received()
            && self.wheel_ang.received()
            && self.heading.received()
            && self.radar.received()
    }

    /// The wall estimate for one side.
    pub fn wall(&self, side: WallSide) -> &WallEstimate {
        match side {
            WallSide::Left => &self.left_wall,
            WallSide::Right => &self.right_wall,
        }
    }

    /// The gap classification for one side.
    pub fn gap(&self, side: WallSide) -> GapClass {
        match side {
            WallSide::Left => self.left_gap,
            WallSide::Right => self.right_gap,
        }
    }
}

impl State for SensorFusion {
    type InitData = FusionParams;
    type InitError = FusionError;

    type InputData = InputData;
    type OutputData = RoverState;
    type StatusReport = StatusReport;
    type ProcError = FusionError;

    /// Initialise the fusion module.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        self.params = init_data;

        Ok(())
    }

    /// Fold this tick's raw payloads into the snapshots and produce the new rover state.
    fn proc(&mut self, input_data: &Self::InputData) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();

        if let Some(msg) = input_data.odom {
            self.apply_odom(&msg);
        }
        if let Some(msg) = input_data.wheel_ang {
            self.apply_wheel_ang(&msg);
        }
        if let Some(msg) = input_data.heading {
            self.apply_heading(&msg, input_data.time_s);
        }
        if let Some(msg) = input_data.radar {
            self.apply_radar(&msg, input_data.time_s);
        }

        // Derived fields are recomputed exactly once per tick from the snapshots present now
        let state = RoverState {
            time_s: input_data.time_s,
            odom: self.odom,
            wheel_ang: self.wheel_ang,
            heading: self.heading,
            radar: self.radar,
            last_cmd: input_data.last_cmd,
            speed_mms: self.estimate_speed_mms(),
            left_wall: walls::estimate_wall(&self.radar.value, WallSide::Left),
            right_wall: walls::estimate_wall(&self.radar.value, WallSide::Right),
            left_gap: walls::classify_gap(&self.radar.value, WallSide::Left, &self.params.walls),
            right_gap: walls::classify_gap(&self.radar.value, WallSide::Right, &self.params.walls),
        };

        trace!(
            "RoverState: speed {:.1} mm/s, walls L {:.0}/{:.1} R {:.0}/{:.1}",
            state.speed_mms,
            state.left_wall.dist_mm,
            state.left_wall.ang_deg,
            state.right_wall.dist_mm,
            state.right_wall.ang_deg
        );

        Ok((state, self.report))
    }
}

impl SensorFusion {
    /// Fold in an odometry message.
    ///
    /// Wheels whose hardware status is non-zero keep their previous known-good tick count
    /// rather than accepting a garbage value.
    fn apply_odom(&mut self, msg: &WheelArrayMsg) {
        let mut odom = self.odom.value;

        for i in 0..NUM_WHEELS {
            if msg.status[i] == 0 {
                odom.ticks[i] = msg.values[i] as i32;
            } else {
                self.report.odom_fallback[i] = true;
            }

            odom.status[i] = msg.status[i];
        }

        self.odom.update(odom, msg.time_ms as f64 / 1000.0);
    }

    /// Fold in a steering angle message, with the same per-wheel fallback as odometry.
    fn apply_wheel_ang(&mut self, msg: &WheelArrayMsg) {
        let mut angs = self.wheel_ang.value;

        for i in 0..NUM_WHEELS {
            if msg.status[i] == 0 {
                angs.ang_deg[i] = norm_ang_deg(msg.values[i]);
            } else {
                self.report.wheel_ang_fallback[i] = true;
            }

            angs.status[i] = msg.status[i];
        }

        self.wheel_ang.update(angs, msg.time_ms as f64 / 1000.0);
    }

    /// Fold in a heading message.
    ///
    /// The first valid heading of the session becomes the zero reference, so headings are
    /// comparable run-to-run regardless of which way the rover was placed.
    fn apply_heading(&mut self, msg: &HeadingMsg, time_s: f64) {
        if msg.status != 0 {
            self.report.heading_invalid = true;
            return;
        }

        let raw_deg = f64::from(msg.yaw_deg);
        let zero = *self.heading_zero_deg.get_or_insert(raw_deg);

        self.heading.update(
            Heading {
                yaw_deg: norm_ang_deg(raw_deg - zero),
                temp_c: f64::from(msg.temp_c),
            },
            time_s,
        );
    }

    /// Fold in a radar message.
    ///
    /// A bearing is accepted if its status is nominal, or if stale but within a bounded jump of
    /// the previous reading. Anything else reads as "too far to trust".
    fn apply_radar(&mut self, msg: &RadarMsg, time_s: f64) {
        let mut radar = self.radar.value;

        for i in 0..NUM_RADAR_BEARINGS {
            let accepted = msg.status[i] == 0
                || (self.radar.received()
                    && (msg.dist_mm[i] - radar.dist_mm[i]).abs() <= self.params.radar_max_jump_mm);

            if accepted {
                radar.dist_mm[i] = msg.dist_mm[i];
            } else {
                radar.dist_mm[i] = self.params.radar_far_mm;
                self.report.radar_rejected[i] = true;
            }

            radar.status[i] = msg.status[i];
        }

        self.radar.update(radar, time_s);
    }

    /// Average rover speed from the mean of the four unwrapped odometer deltas.
    fn estimate_speed_mms(&self) -> f64 {
        if !self.odom.has_pair() {
            return 0.0;
        }

        let dt_s = self.odom.dt_s();
        if dt_s <= 0.0 {
            return 0.0;
        }

        let mut total_ticks = 0.0;
        for i in 0..NUM_WHEELS {
            total_ticks +=
                f64::from(unwrap_ticks(self.odom.value.ticks[i], self.odom.prev_value.ticks[i]));
        }

        let mean_ticks = total_ticks / NUM_WHEELS as f64;

        mean_ticks / self.params.ticks_per_mm / dt_s
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn fusion() -> SensorFusion {
        let mut f = SensorFusion::default();
        f.params = FusionParams::default();
        f
    }

    fn odom_msg(time_ms: u64, ticks: [f64; 4], status: [u8; 4]) -> WheelArrayMsg {
        WheelArrayMsg {
            time_ms,
            values: ticks,
            status,
        }
    }

    fn radar_msg(dist_mm: [f64; 8], status: [u8; 8]) -> RadarMsg {
        RadarMsg { dist_mm, status }
    }

    fn heading_msg(yaw: f32) -> HeadingMsg {
        HeadingMsg {
            yaw_deg: yaw,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            status: 0,
            temp_c: 25.0,
        }
    }

    #[test]
    fn complete_state_needs_all_four_kinds() {
        let mut f = fusion();

        let input = InputData {
            odom: Some(odom_msg(0, [0.0; 4], [0; 4])),
            wheel_ang: Some(WheelArrayMsg {
                time_ms: 0,
                values: [0.0; 4],
                status: [0; 4],
            }),
            heading: None,
            radar: Some(radar_msg([1000.0; 8], [0; 8])),
            last_cmd: DriveCmd::stop(),
            time_s: 0.0,
        };

        let (state, _) = f.proc(&input).unwrap();
        assert!(!state.has_complete_state());

        let input = InputData {
            heading: Some(heading_msg(90.0)),
            time_s: 0.1,
            ..input
        };
        let (state, _) = f.proc(&input).unwrap();
        assert!(state.has_complete_state());
    }

    #[test]
    fn bad_odometry_falls_back_to_known_good() {
        let mut f = fusion();

        let input = InputData {
            odom: Some(odom_msg(1000, [100.0, 200.0, 300.0, 400.0], [0; 4])),
            time_s: 1.0,
            ..InputData::default()
        };
        f.proc(&input).unwrap();

        // Wheel 2 reports a fault with a garbage count
        let input = InputData {
            odom: Some(odom_msg(1100, [110.0, 210.0, 9999.0, 410.0], [0, 0, 3, 0])),
            time_s: 1.1,
            ..InputData::default()
        };
        let (state, report) = f.proc(&input).unwrap();

        assert_eq!(state.odom.value.ticks, [110, 210, 300, 410]);
        assert!(report.odom_fallback[2]);
        assert!(!report.odom_fallback[0]);
    }

    #[test]
    fn speed_is_mean_of_unwrapped_deltas() {
        let mut f = fusion();

        // One second apart, each wheel advances 1087 ticks = 100 mm at 10.87 ticks/mm,
        // wheel 0 crossing the wrap boundary
        let input = InputData {
            odom: Some(odom_msg(1000, [32000.0, 0.0, 100.0, 200.0], [0; 4])),
            time_s: 1.0,
            ..InputData::default()
        };
        f.proc(&input).unwrap();

        let input = InputData {
            odom: Some(odom_msg(
                2000,
                [(32000 + 1087 - 32768) as f64, 1087.0, 1187.0, 1287.0],
                [0; 4],
            )),
            time_s: 2.0,
            ..InputData::default()
        };
        let (state, _) = f.proc(&input).unwrap();

        assert!((state.speed_mms - 100.0).abs() < 0.1);
    }

    #[test]
    fn heading_is_rebased_to_session_zero() {
        let mut f = fusion();

        let input = InputData {
            heading: Some(heading_msg(237.0)),
            time_s: 1.0,
            ..InputData::default()
        };
        let (state, _) = f.proc(&input).unwrap();
        assert!((state.heading.value.yaw_deg - 0.0).abs() < 1e-6);

        let input = InputData {
            heading: Some(heading_msg(247.5)),
            time_s: 2.0,
            ..InputData::default()
        };
        let (state, _) = f.proc(&input).unwrap();
        assert!((state.heading.value.yaw_deg - 10.5).abs() < 1e-6);

        // Wrap under the zero
        let input = InputData {
            heading: Some(heading_msg(227.0)),
            time_s: 3.0,
            ..InputData::default()
        };
        let (state, _) = f.proc(&input).unwrap();
        assert!((state.heading.value.yaw_deg - 350.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_heading_is_discarded() {
        let mut f = fusion();

        let mut msg = heading_msg(100.0);
        msg.status = 2;

        let input = InputData {
            heading: Some(msg),
            time_s: 1.0,
            ..InputData::default()
        };
        let (state, report) = f.proc(&input).unwrap();

        assert!(report.heading_invalid);
        assert!(!state.heading.received());
    }

    #[test]
    fn stale_radar_accepted_only_within_jump_bound() {
        let mut f = fusion();

        let input = InputData {
            radar: Some(radar_msg([1000.0; 8], [0; 8])),
            time_s: 1.0,
            ..InputData::default()
        };
        f.proc(&input).unwrap();

        // Bearing 0 stale but close to previous: accepted. Bearing 1 stale with a wild
        // jump: rejected and read far.
        let mut dist = [1000.0; 8];
        dist[0] = 1100.0;
        dist[1] = 50.0;
        let mut status = [0u8; 8];
        status[0] = 1;
        status[1] = 1;

        let input = InputData {
            radar: Some(radar_msg(dist, status)),
            time_s: 1.1,
            ..InputData::default()
        };
        let (state, report) = f.proc(&input).unwrap();

        assert_eq!(state.radar.value.dist_mm[0], 1100.0);
        assert!(!report.radar_rejected[0]);

        assert_eq!(state.radar.value.dist_mm[1], f.params.radar_far_mm);
        assert!(report.radar_rejected[1]);
    }

    #[test]
    fn wall_follow_scenario_geometry() {
        // The end-to-end wall scenario: left quadrant sees a converging wall
        let mut f = fusion();

        let mut dist = [walls::RADAR_DIST_FAR_MM; 8];
        dist[0] = 600.0; // bearing 0
        dist[1] = 500.0; // bearing 45
        dist[2] = 400.0; // bearing 90
        dist[3] = 600.0; // bearing 135

        let input = InputData {
            radar: Some(radar_msg(dist, [0; 8])),
            time_s: 1.0,
            ..InputData::default()
        };
        let (state, _) = f.proc(&input).unwrap();

        // The rover is closing on the left wall at just under 400 mm
        assert!(state.left_wall.ang_deg > 0.0);
        assert!(state.left_wall.dist_mm > 390.0 && state.left_wall.dist_mm < 400.0);
        assert_eq!(state.left_gap, GapClass::None);
    }
}
