//! # Mission scheduler module
//!
//! This module implements the cooperative mission state machine. States are concrete actions:
//!
//! - `Idle` - no mission, nothing commanded
//! - `WaitSensorData` - hold the mission until sensing is complete and settled
//! - `Warmup` - steering sweep before the mission proper
//! - `WallFollow` - follow the wall on one side at a target distance
//! - `TurnCorner` - arc around the end of a followed wall
//! - `DriveTime` - timed straight drive
//! - `Stop` - terminal state, zero all wheels and confirm stationary
//!
//! Every tick the scheduler asks the current action for its successor, swaps (running the old
//! action's `on_end` and the new one's `on_start` in that order), then executes the current
//! action, which issues at most one drive command. Stop telecommands are always accepted and
//! force the terminal state whatever the previous action was doing.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod states;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt::Display;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::rover_state::walls::WallSide;
use crate::rover_state::RoverState;
use comms_if::eqpt::wheel::DriveCmd;
use comms_if::tc::Tc;
use states::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the mission scheduler and all its actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionParams {
    /// Scheduler tick rate, used to convert telecommand durations into ticks.
    ///
    /// Units: hertz
    pub tick_hz: f64,

    /// Ticks to wait after the heading becomes available before trusting it.
    pub heading_settle_ticks: u32,

    /// Length of the steering warmup sweep.
    pub warmup_ticks: u32,

    /// Amplitude of the warmup sweep.
    ///
    /// Units: degrees
    pub warmup_sweep_deg: f64,

    /// Minimum ticks the terminal stop holds zero commands before confirming stationary.
    pub stop_ticks: u32,

    /// Wall following tuning.
    pub wall_follow: WallFollowParams,

    /// Corner turn tuning.
    pub turn: TurnParams,
}

/// Mission scheduler.
///
/// Owns the current action and the running flag. All feedback goes through the [`MissionIo`]
/// seam so the scheduler can be driven without sockets in tests.
pub struct MissionMgr {
    params: MissionParams,

    current: Action,

    running: bool,
}

/// The result of one scheduler tick.
pub struct StepOutput {
    /// The drive command issued this tick, if any.
    pub cmd: Option<DriveCmd>,

    /// Name of the action current at the end of the tick.
    pub action_name: &'static str,

    /// The running flag at the end of the tick.
    pub running: bool,

    /// The transition taken this tick, if one occurred.
    pub transition: Option<(&'static str, &'static str)>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The concrete mission actions.
#[derive(Debug)]
pub enum Action {
    Idle(Idle),
    WaitSensorData(WaitSensorData),
    Warmup(Warmup),
    WallFollow(WallFollow),
    TurnCorner(TurnCorner),
    DriveTime(DriveTime),
    Stop(Stop),
}

/// An action's decision about its successor.
#[derive(Debug)]
pub enum Transition {
    /// Stay in the current action.
    Continue,

    /// Hand over to the given action.
    To(Action),
}

/// Errors raised when building a mission from a start telecommand.
#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("{0:?} is not a recognised mission")]
    UnknownMission(String),

    #[error("Invalid argument for mission {mission}: {arg:?}")]
    InvalidArg { mission: String, arg: String },
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Feedback and control surface of the scheduler.
///
/// The bus implements this for real operation, tests use a recording mock.
pub trait MissionIo {
    /// Publish the name of the now-current action.
    fn publish_action(&mut self, name: &str);

    /// Publish the mission running flag.
    fn publish_running(&mut self, running: bool);

    /// Ask the sensor bridges to resume publication.
    fn resume_sensors(&mut self);
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MissionParams {
    fn default() -> Self {
        Self {
            tick_hz: 20.0,
            heading_settle_ticks: 20,
            warmup_ticks: 40,
            warmup_sweep_deg: 15.0,
            stop_ticks: 5,
            wall_follow: WallFollowParams::default(),
            turn: TurnParams::default(),
        }
    }
}

impl Default for MissionMgr {
    fn default() -> Self {
        Self {
            params: MissionParams::default(),
            current: Action::Idle(Idle),
            running: false,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action::{}", self.name())
    }
}

impl Action {
    /// The action's name as published on the feedback topic.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Idle(_) => "idle",
            Action::WaitSensorData(_) => "wait_sensor_data",
            Action::Warmup(_) => "warmup",
            Action::WallFollow(_) => "wall_follow",
            Action::TurnCorner(_) => "turn_corner",
            Action::DriveTime(_) => "drive_time",
            Action::Stop(_) => "stop",
        }
    }

    /// Decide this action's successor for this tick.
    fn next(&mut self, state: &RoverState) -> Transition {
        match self {
            Action::Idle(a) => a.next(state),
            Action::WaitSensorData(a) => a.next(state),
            Action::Warmup(a) => a.next(state),
            Action::WallFollow(a) => a.next(state),
            Action::TurnCorner(a) => a.next(state),
            Action::DriveTime(a) => a.next(state),
            Action::Stop(a) => a.next(state),
        }
    }

    /// Execute the action, issuing at most one drive command.
    fn execute(&mut self, state: &RoverState) -> Option<DriveCmd> {
        match self {
            Action::Idle(_) => None,
            Action::WaitSensorData(_) => None,
            Action::Warmup(a) => a.execute(state),
            Action::WallFollow(a) => a.execute(state),
            Action::TurnCorner(a) => a.execute(state),
            Action::DriveTime(a) => a.execute(state),
            Action::Stop(a) => a.execute(state),
        }
    }

    /// Called once when the action becomes current.
    fn on_start(&mut self, io: &mut dyn MissionIo) {
        if let Action::WaitSensorData(a) = self {
            a.on_start(io)
        }
    }

    /// Called once when the action is replaced.
    fn on_end(&mut self) {
        debug!("Action::{} ended", self.name());
    }
}

impl MissionMgr {
    pub fn new(params: MissionParams) -> Self {
        Self {
            params,
            current: Action::Idle(Idle),
            running: false,
        }
    }

    /// Replace the scheduler parameters, used once at startup.
    pub fn init(&mut self, params: MissionParams) {
        self.params = params;
    }

    /// True while a mission is in progress.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Run one scheduler tick.
    ///
    /// Ordering within the tick is fixed: telecommand handling, then transition evaluation,
    /// then execution. An action therefore never executes against a state it already
    /// transitioned away from.
    pub fn step(
        &mut self,
        tc: Option<Tc>,
        state: &RoverState,
        io: &mut dyn MissionIo,
    ) -> StepOutput {
        let mut transition = None;

        // ---- TELECOMMAND HANDLING ----

        match tc {
            Some(Tc::Start { mission, args }) => {
                if self.running {
                    warn!("Cannot start {:?}, a mission is already running", mission);
                } else {
                    match build_mission(&self.params, &mission, &args) {
                        Ok(action) => {
                            info!("Starting mission {:?}", mission);
                            self.running = true;
                            io.publish_running(true);
                            self.switch_to(action, io, &mut transition);
                        }
                        Err(e) => warn!("Rejecting start telecommand: {}", e),
                    }
                }
            }
            Some(Tc::Stop) => {
                // Always accepted and idempotent. The previous action gets no chance to finish.
                if self.running && !matches!(self.current, Action::Stop(_)) {
                    info!("Stop commanded");
                    self.switch_to(
                        Action::Stop(Stop::new(self.params.stop_ticks)),
                        io,
                        &mut transition,
                    );
                } else if !self.running {
                    debug!("Stop commanded while idle");
                    io.publish_running(false);
                }
            }
            None => (),
        }

        // ---- TRANSITION EVALUATION ----

        match self.current.next(state) {
            Transition::Continue => (),
            Transition::To(next) => self.switch_to(next, io, &mut transition),
        }

        // A mission is over once the scheduler comes back to rest
        if self.running && matches!(self.current, Action::Idle(_)) {
            self.running = false;
            io.publish_running(false);
            info!("Mission complete");
        }

        // ---- EXECUTION ----

        let cmd = if self.running {
            self.current.execute(state)
        } else {
            None
        };

        StepOutput {
            cmd,
            action_name: self.current.name(),
            running: self.running,
            transition,
        }
    }

    /// Swap to a new action: end the old one, start the new one, publish the new name.
    fn switch_to(
        &mut self,
        next: Action,
        io: &mut dyn MissionIo,
        transition: &mut Option<(&'static str, &'static str)>,
    ) {
        let from = self.current.name();

        self.current.on_end();
        self.current = next;
        self.current.on_start(io);

        io.publish_action(self.current.name());
        info!("Mission action change: {} -> {}", from, self.current.name());

        *transition = Some((from, self.current.name()));
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the action chain for a start telecommand.
///
/// Every mission boots through the sensor wait and the steering warmup before its own first
/// action.
pub fn build_mission(
    params: &MissionParams,
    mission: &str,
    args: &[String],
) -> Result<Action, MissionError> {
    let first = match mission {
        "wall_follow" => {
            let side = match args.get(0).map(String::as_str) {
                Some("left") | None => WallSide::Left,
                Some("right") => WallSide::Right,
                Some(other) => {
                    return Err(MissionError::InvalidArg {
                        mission: mission.into(),
                        arg: other.into(),
                    })
                }
            };

            let target_dist_mm = parse_arg(mission, args.get(1), 250.0)?;
            let speed = parse_arg(mission, args.get(2), params.wall_follow.default_speed)?;

            Action::WallFollow(WallFollow::new(
                WallFollowCfg {
                    side,
                    target_dist_mm,
                    speed,
                },
                params,
            ))
        }

        "drive" => {
            let speed = parse_arg(mission, args.get(0), params.wall_follow.default_speed)?;
            let ang_deg = parse_arg(mission, args.get(1), 0.0)?;
            let secs: f64 = parse_arg(mission, args.get(2), 2.0)?;

            let ticks = (secs * params.tick_hz).round().max(1.0) as u32;

            Action::DriveTime(DriveTime::new(ticks, speed, ang_deg, params.stop_ticks))
        }

        _ => return Err(MissionError::UnknownMission(mission.into())),
    };

    Ok(Action::WaitSensorData(WaitSensorData::new(
        params.heading_settle_ticks,
        Box::new(Action::Warmup(Warmup::new(
            params.warmup_ticks,
            params.warmup_sweep_deg,
            Box::new(first),
        ))),
    )))
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse an optional telecommand argument, defaulting when absent.
fn parse_arg<T: FromStr>(
    mission: &str,
    arg: Option<&String>,
    default: T,
) -> Result<T, MissionError> {
    match arg {
        Some(s) => s.parse().map_err(|_| MissionError::InvalidArg {
            mission: mission.into(),
            arg: s.clone(),
        }),
        None => Ok(default),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::rover_state::samples::{Heading, Radar, WheelAng, WheelOdom};

    /// Recorded feedback events, in order.
    #[derive(Debug, PartialEq)]
    enum Event {
        Action(String),
        Running(bool),
        Resume,
    }

    #[derive(Default)]
    struct MockIo {
        events: Vec<Event>,
    }

    impl MissionIo for MockIo {
        fn publish_action(&mut self, name: &str) {
            self.events.push(Event::Action(name.to_string()));
        }

        fn publish_running(&mut self, running: bool) {
            self.events.push(Event::Running(running));
        }

        fn resume_sensors(&mut self) {
            self.events.push(Event::Resume);
        }
    }

    /// A state with every snapshot kind received.
    fn complete_state() -> RoverState {
        let mut st = RoverState::default();

        st.odom.update(WheelOdom::default(), 1.0);
        st.wheel_ang.update(WheelAng::default(), 1.0);
        st.heading.update(Heading::default(), 1.0);
        st.radar.update(
            Radar {
                dist_mm: [1000.0; 8],
                status: [0; 8],
            },
            1.0,
        );

        st
    }

    fn quick_params() -> MissionParams {
        MissionParams {
            tick_hz: 10.0,
            heading_settle_ticks: 1,
            warmup_ticks: 1,
            stop_ticks: 1,
            ..MissionParams::default()
        }
    }

    fn start_tc(mission: &str, args: &[&str]) -> Option<Tc> {
        Some(Tc::Start {
            mission: mission.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn start_publishes_in_order() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = RoverState::default();

        let out = mgr.step(start_tc("drive", &["40", "0", "1"]), &state, &mut io);

        assert!(out.running);
        assert_eq!(out.action_name, "wait_sensor_data");
        assert_eq!(out.transition, Some(("idle", "wait_sensor_data")));

        // Running flag first, then the new action's start hook (sensor resume), then the
        // action name publication
        assert_eq!(
            io.events,
            vec![
                Event::Running(true),
                Event::Resume,
                Event::Action("wait_sensor_data".into()),
            ]
        );

        // Waiting issues no drive commands
        assert!(out.cmd.is_none());
    }

    #[test]
    fn mission_runs_to_completion() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = complete_state();

        // 0.2 s at 10 Hz: two drive ticks
        mgr.step(start_tc("drive", &["40", "0", "0.2"]), &state, &mut io);

        let mut names = Vec::new();
        let mut drive_cmds = 0;

        for _ in 0..20 {
            let out = mgr.step(None, &state, &mut io);
            names.push(out.action_name);

            if out.action_name == "drive_time" {
                if let Some(cmd) = out.cmd {
                    assert_eq!(cmd.speed, 40.0);
                    drive_cmds += 1;
                }
            }

            if !out.running {
                break;
            }
        }

        assert_eq!(drive_cmds, 2);

        // The mission passed through every stage in order and came to rest
        assert!(names.contains(&"warmup"));
        assert!(names.contains(&"drive_time"));
        assert!(names.contains(&"stop"));
        assert_eq!(*names.last().unwrap(), "idle");
        assert!(!mgr.running());

        // The final events are the stop completing and the running flag dropping
        assert_eq!(io.events.last(), Some(&Event::Running(false)));
    }

    #[test]
    fn stop_from_any_state_yields_zero_command() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = complete_state();

        mgr.step(start_tc("wall_follow", &["left", "250", "40"]), &state, &mut io);

        // Stop mid-wait: the very next tick must be in the terminal stop action issuing a
        // zero command
        let out = mgr.step(Some(Tc::Stop), &state, &mut io);

        assert_eq!(out.action_name, "stop");
        assert_eq!(out.cmd, Some(DriveCmd::stop()));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = complete_state();

        // Stop while idle is accepted and does nothing
        let out = mgr.step(Some(Tc::Stop), &state, &mut io);
        assert_eq!(out.action_name, "idle");
        assert!(!out.running);

        // Stop while already stopping stays in stop
        mgr.step(start_tc("drive", &["40"]), &state, &mut io);
        mgr.step(Some(Tc::Stop), &state, &mut io);
        let out = mgr.step(Some(Tc::Stop), &state, &mut io);
        assert!(out.action_name == "stop" || out.action_name == "idle");
    }

    #[test]
    fn start_rejected_while_running() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = complete_state();

        mgr.step(start_tc("drive", &["40"]), &state, &mut io);
        assert_eq!(mgr.current.name(), "wait_sensor_data");

        // A second start must be rejected without disturbing the running mission
        let events_before = io.events.len();
        let out = mgr.step(start_tc("drive", &["40"]), &state, &mut io);

        assert!(out.running);
        assert!(out.transition.is_none());
        assert_eq!(io.events.len(), events_before);
    }

    #[test]
    fn unknown_mission_rejected() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = RoverState::default();

        let out = mgr.step(start_tc("teleport", &[]), &state, &mut io);

        assert!(!out.running);
        assert_eq!(out.action_name, "idle");
        assert!(io.events.is_empty());
    }

    #[test]
    fn incomplete_state_holds_in_wait() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let state = RoverState::default();

        mgr.step(start_tc("drive", &["40"]), &state, &mut io);

        for _ in 0..50 {
            let out = mgr.step(None, &state, &mut io);
            assert_eq!(out.action_name, "wait_sensor_data");
            assert!(out.cmd.is_none());
        }
    }

    #[test]
    fn wall_follow_corner_hands_over_to_turn() {
        let mut mgr = MissionMgr::new(quick_params());
        let mut io = MockIo::default();
        let mut state = complete_state();

        mgr.step(start_tc("wall_follow", &["left"]), &state, &mut io);

        // Run through wait and warmup
        for _ in 0..10 {
            let out = mgr.step(None, &state, &mut io);
            if out.action_name == "wall_follow" {
                break;
            }
        }
        assert_eq!(mgr.current.name(), "wall_follow");

        // Open up the left front diagonal into a corner
        state.radar.update(
            Radar {
                dist_mm: [1000.0, 1500.0, 400.0, 600.0, 1000.0, 1000.0, 1000.0, 1000.0],
                status: [0; 8],
            },
            2.0,
        );
        let mut derived = state;
        derived.left_gap = crate::rover_state::walls::classify_gap(
            &state.radar.value,
            WallSide::Left,
            &Default::default(),
        );

        let out = mgr.step(None, &derived, &mut io);
        assert_eq!(out.action_name, "turn_corner");
    }
}
