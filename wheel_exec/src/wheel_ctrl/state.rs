//! Implementations for the WheelCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;
use std::time::Duration;

// Internal
use super::calib::WheelCalibration;
use super::protection::MotorProtection;
use super::WheelCtrlError;
use crate::angle_sensor::{self, AngleBank};
use crate::params::Params;
use crate::radio::{self, RadioError, RadioLink};
use comms_if::eqpt::wheel::{DriveCmd, RadioDemand, WheelId, NUM_WHEELS};
use util::maths::{ang_diff_deg, clamp, norm_ang_deg};
use util::module::State;
use util::pid::{ErrorMetric, PidController, PidGains};
use util::session::Session;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A steering change greater than this is taken the short way round by flipping the wheel's
/// drive direction instead.
///
/// Units: degrees
pub const MAX_STEER_CHANGE_DEG: f64 = 90.0;

/// Status bits reported per wheel.
pub mod status {
    /// The radio demand could not be transmitted.
    pub const TX_FAILED: u16 = 0x0001;

    /// No acknowledgement was received before the timeout.
    pub const RX_FAILED: u16 = 0x0002;

    /// The steering motor is held off after an overheat.
    pub const STEER_OVERHEAT: u16 = 0x0004;

    /// The drive motor is held off after an overheat.
    pub const DRIVE_OVERHEAT: u16 = 0x0008;

    /// The wheel drive module reported a fault in its acknowledgement.
    pub const DRIVE_FAULT: u16 = 0x0010;

    /// Angle sensor status bits occupy the high byte, see [`crate::angle_sensor::status`].
    pub const ANG_SHIFT: u16 = 8;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Wheel control module state
pub struct WheelCtrl<R, A> {
    params: Params,

    report: StatusReport,

    wheels: Vec<WheelState>,

    radio: R,

    sensors: A,

    current_cmd: DriveCmd,
}

/// Per-wheel control state.
struct WheelState {
    id: WheelId,

    calib: WheelCalibration,

    steer_pid: PidController,

    /// Drive direction modifier, flipped when the wheel points the short way round.
    drv_mod: f64,

    /// Last known-good measured steering angle, degrees.
    meas_ang_deg: f64,

    /// Last odometer tick count received from the drive module.
    odo_ticks: i32,

    steer_prot: MotorProtection,

    drive_prot: MotorProtection,
}

/// Data used to initialise WheelCtrl.
pub struct InitConfig {
    pub params: Params,
    pub calibs: [WheelCalibration; NUM_WHEELS],
    pub pid: PidGains,
}

/// Input data to wheel control.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputData {
    /// The drive command to be executed, or `None` if there is no new command on this cycle.
    pub cmd: Option<DriveCmd>,

    /// True if the command stream has been lost and the wheels must be zeroed.
    pub safe_mode: bool,

    /// Current session time.
    pub time_s: f64,

    /// Time since the previous cycle.
    pub dt_s: f64,
}

/// Output demands and measurements from one wheel control cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputData {
    /// Per-wheel target steering angle, degrees in [0, 360).
    pub target_ang_deg: [f64; NUM_WHEELS],

    /// Per-wheel target speed, normalised -100 to +100, calibration signs applied.
    pub target_speed: [f64; NUM_WHEELS],

    /// Per-wheel measured steering angle, degrees in [0, 360).
    pub meas_ang_deg: [f64; NUM_WHEELS],

    /// Per-wheel odometer tick count.
    pub odo_ticks: [i32; NUM_WHEELS],

    /// Per-wheel signed steering motor duty, -100 to +100. The sign drives the direction pin.
    pub steer_duty: [f64; NUM_WHEELS],
}

/// Status report for wheel control processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Per-wheel status bits, see [`status`].
    pub wheel_status: [u16; NUM_WHEELS],

    /// True if this cycle ran without a usable drive command.
    pub cmd_stale: bool,

    /// Per-wheel cumulative steering motor charge, mAh.
    pub steer_mah: [f64; NUM_WHEELS],

    /// Per-wheel cumulative drive motor charge, mAh.
    pub drive_mah: [f64; NUM_WHEELS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for OutputData {
    fn default() -> Self {
        Self {
            target_ang_deg: [0.0; NUM_WHEELS],
            target_speed: [0.0; NUM_WHEELS],
            meas_ang_deg: [0.0; NUM_WHEELS],
            odo_ticks: [0; NUM_WHEELS],
            steer_duty: [0.0; NUM_WHEELS],
        }
    }
}

impl<R, A> WheelCtrl<R, A>
where
    R: RadioLink,
    A: AngleBank,
{
    /// Create a new uninitialised wheel controller over the given hardware.
    pub fn new(radio: R, sensors: A) -> Self {
        Self {
            params: Params::default(),
            report: StatusReport::default(),
            wheels: Vec::new(),
            radio,
            sensors,
            current_cmd: DriveCmd::stop(),
        }
    }

    /// Set the controller's parameters, calibration and gains, resetting all per-wheel state.
    pub fn configure(&mut self, config: InitConfig) {
        self.wheels = WheelId::ALL
            .iter()
            .enumerate()
            .map(|(i, id)| WheelState {
                id: *id,
                calib: config.calibs[i],
                steer_pid: PidController::new(config.pid, ErrorMetric::AngularDeg),
                drv_mod: 1.0,
                meas_ang_deg: 0.0,
                odo_ticks: 0,
                steer_prot: MotorProtection::default(),
                drive_prot: MotorProtection::default(),
            })
            .collect();

        self.params = config.params;
    }

    /// Calculate per-wheel steering angles and speeds for the given command.
    ///
    /// For a straight command every wheel points at the command angle with equal speed. For a
    /// turn the wheels are steered so that their axes intersect at the centre of rotation, with
    /// speeds scaled by each wheel's distance from it.
    fn calc_wheel_targets(&self, cmd: &DriveCmd) -> ([f64; NUM_WHEELS], [f64; NUM_WHEELS]) {
        let mut ang = [0.0; NUM_WHEELS];
        let mut speed = [0.0; NUM_WHEELS];

        if cmd.is_straight() {
            for i in 0..NUM_WHEELS {
                ang[i] = norm_ang_deg(cmd.ang_deg);
                speed[i] = clamp(&cmd.speed, &-100.0, &100.0);
            }

            return (ang, speed);
        }

        let radius_mm = f64::from(cmd.radius_mm);

        for (i, wheel) in WheelId::ALL.iter().enumerate() {
            // Wheel position in the body frame: x forward, y to the left
            let x = if wheel.is_front() {
                self.params.wheelbase_mm / 2.0
            } else {
                -self.params.wheelbase_mm / 2.0
            };
            let y = if wheel.is_left() {
                self.params.track_mm / 2.0
            } else {
                -self.params.track_mm / 2.0
            };

            // Steer each wheel perpendicular to its line to the centre of rotation at (0, R)
            ang[i] = norm_ang_deg(x.atan2(radius_mm - y).to_degrees());

            // Wheels further from the centre of rotation must run faster
            let dist_mm = (x.powi(2) + (radius_mm - y).powi(2)).sqrt();
            speed[i] = cmd.speed * dist_mm / radius_mm.abs();
        }

        // Rescale so no wheel exceeds the normalised speed range
        let max_speed = speed.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        if max_speed > 100.0 {
            for s in speed.iter_mut() {
                *s *= 100.0 / max_speed;
            }
        }

        (ang, speed)
    }
}

impl<R, A> State for WheelCtrl<R, A>
where
    R: RadioLink,
    A: AngleBank,
{
    type InitData = InitConfig;
    type InitError = WheelCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = WheelCtrlError;

    /// Initialise the wheel controller from its parameters and calibration.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        self.configure(init_data);

        Ok(())
    }

    /// Perform one wheel control cycle.
    ///
    /// The four wheel updates are independent and order-insensitive, no wheel's control depends
    /// on another's result from this cycle.
    fn proc(&mut self, input_data: &Self::InputData) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();

        // Latch a new command if one arrived
        if let Some(cmd) = input_data.cmd {
            self.current_cmd = cmd;
        }

        // With the command stream lost the drive demand is zeroed while steering holds its
        // last target, a transient dropout must not swing the wheels.
        let cmd = if input_data.safe_mode {
            self.report.cmd_stale = true;
            DriveCmd {
                speed: 0.0,
                ..self.current_cmd
            }
        } else {
            self.current_cmd
        };

        let (target_ang, target_speed) = self.calc_wheel_targets(&cmd);

        let mut output = OutputData::default();

        let params = &self.params;
        let report = &mut self.report;
        let radio = &mut self.radio;
        let sensors = &mut self.sensors;

        for (i, wheel) in self.wheels.iter_mut().enumerate() {
            let mut wheel_status: u16 = 0;

            // ---- STEERING SENSE ----

            let reading = sensors.read(wheel.id);
            wheel_status |= u16::from(reading.status) << status::ANG_SHIFT;

            if reading.status & angle_sensor::status::READING_INVALID == 0 {
                wheel.meas_ang_deg = norm_ang_deg(
                    wheel.calib.ang_sign * (reading.ang_deg - wheel.calib.ang_zero_off_deg),
                );
            }
            // An invalid reading keeps the last known-good angle

            // ---- STEERING CONTROL ----

            let (steer_target_deg, drv_mod) =
                smallest_angle_change(wheel.meas_ang_deg, wheel.drv_mod, target_ang[i]);
            wheel.drv_mod = drv_mod;

            let pid_out = wheel.steer_pid.process(steer_target_deg, wheel.meas_ang_deg);

            let mut steer_duty = clamp(&pid_out.abs(), &0.0, &100.0);
            steer_duty = wheel.steer_prot.apply(
                steer_duty,
                input_data.time_s,
                input_data.dt_s,
                &params.steer_protection,
            );
            if wheel.steer_prot.overheated() {
                wheel_status |= status::STEER_OVERHEAT;
            }

            // ---- DRIVE CONTROL ----

            let mut speed = target_speed[i] * wheel.calib.drv_sign;

            let permitted = wheel.drive_prot.apply(
                speed.abs(),
                input_data.time_s,
                input_data.dt_s,
                &params.drive_protection,
            );
            if wheel.drive_prot.overheated() {
                wheel_status |= status::DRIVE_OVERHEAT;
            }
            speed = permitted * speed.signum();

            // ---- RADIO EXCHANGE ----

            let demand = RadioDemand {
                speed: clamp(&speed, &-100.0, &100.0) as i8,
                drv_mod: wheel.drv_mod as i8,
            };

            match radio::exchange(
                radio,
                &wheel.calib.radio_addr,
                &demand,
                Duration::from_millis(params.radio_ack_timeout_ms),
            ) {
                Ok(ack) => {
                    wheel.odo_ticks = ack.odo_ticks;
                    if ack.status != 0 {
                        wheel_status |= status::DRIVE_FAULT;
                    }
                }
                Err(RadioError::AckTimeout) => wheel_status |= status::RX_FAILED,
                Err(e) => {
                    trace!("Wheel {} radio error: {}", wheel.id.name(), e);
                    wheel_status |= status::TX_FAILED;
                }
            }

            // ---- OUTPUT ----

            output.target_ang_deg[i] = target_ang[i];
            output.target_speed[i] = f64::from(demand.speed);
            output.meas_ang_deg[i] = wheel.meas_ang_deg;
            output.odo_ticks[i] = wheel.odo_ticks;
            output.steer_duty[i] = steer_duty * pid_out.signum();

            report.wheel_status[i] = wheel_status;
            report.steer_mah[i] = wheel.steer_prot.mah_total();
            report.drive_mah[i] = wheel.drive_prot.mah_total();
        }

        if report.wheel_status.iter().any(|s| *s != 0) {
            warn!("Wheel status: {:?}", report.wheel_status);
        }

        trace!(
            "WheelCtrl output:\n    ang: {:?}\n    speed: {:?}",
            output.target_ang_deg,
            output.target_speed
        );

        Ok((output, self.report))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the smallest steering change which brings the wheel to the target direction.
///
/// Returns the angle to steer to and the drive direction modifier to use. If pointing at the
/// target directly would require rotating more than [`MAX_STEER_CHANGE_DEG`], the complementary
/// angle is targeted instead and the modifier is flipped, so a wheel never has to rotate more
/// than 90 degrees to face any direction.
pub fn smallest_angle_change(
    cur_ang_deg: f64,
    cur_mod: f64,
    target_ang_deg: f64,
) -> (f64, f64) {
    let diff = ang_diff_deg(target_ang_deg, cur_ang_deg);

    if diff.abs() > MAX_STEER_CHANGE_DEG {
        (norm_ang_deg(target_ang_deg + 180.0), -cur_mod)
    } else {
        (norm_ang_deg(target_ang_deg), cur_mod)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::angle_sensor::BenchAngleBank;
    use crate::radio::LoopbackRadio;

    fn make_ctrl() -> WheelCtrl<LoopbackRadio, BenchAngleBank> {
        let mut ctrl = WheelCtrl::new(LoopbackRadio::new(), BenchAngleBank::default());

        let calibs = [
            WheelCalibration::defaults(WheelId::FrontLeft),
            WheelCalibration::defaults(WheelId::FrontRight),
            WheelCalibration::defaults(WheelId::RearLeft),
            WheelCalibration::defaults(WheelId::RearRight),
        ];

        ctrl.configure(InitConfig {
            params: Params::default(),
            calibs,
            pid: PidGains::default(),
        });

        ctrl
    }

    #[test]
    fn smallest_change_never_exceeds_90() {
        let mut ang = 0.0;
        while ang < 360.0 {
            let mut target = 0.0;
            while target < 360.0 {
                let (out_ang, out_mod) = smallest_angle_change(ang, 1.0, target);

                assert!(
                    ang_diff_deg(out_ang, ang).abs() <= MAX_STEER_CHANGE_DEG + 1e-9,
                    "change from {} to {} (target {}) exceeds 90",
                    ang,
                    out_ang,
                    target
                );
                assert!(out_mod == 1.0 || out_mod == -1.0);

                target += 13.7;
            }
            ang += 17.3;
        }
    }

    #[test]
    fn smallest_change_is_idempotent() {
        let cases = [(0.0, 1.0, 170.0), (45.0, -1.0, 300.0), (350.0, 1.0, 10.0)];

        for &(ang, m, target) in cases.iter() {
            let first = smallest_angle_change(ang, m, target);
            let second = smallest_angle_change(ang, m, target);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn flip_targets_complementary_angle() {
        // Target directly behind: don't rotate, flip the drive direction
        let (ang, m) = smallest_angle_change(0.0, 1.0, 180.0);
        assert_eq!(ang, 0.0);
        assert_eq!(m, -1.0);

        // Target in reach: point at it
        let (ang, m) = smallest_angle_change(0.0, 1.0, 45.0);
        assert_eq!(ang, 45.0);
        assert_eq!(m, 1.0);
    }

    #[test]
    fn straight_cmd_gives_equal_targets() {
        let ctrl = make_ctrl();

        let (ang, speed) = ctrl.calc_wheel_targets(&DriveCmd::new(40.0, -10.0, 32767));

        for i in 0..NUM_WHEELS {
            assert!((ang[i] - 350.0).abs() < 1e-9);
            assert!((speed[i] - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn turn_cmd_steers_toward_centre_of_rotation() {
        let ctrl = make_ctrl();

        // Left turn of 1 m radius
        let (ang, speed) = ctrl.calc_wheel_targets(&DriveCmd::new(40.0, 0.0, 1000));

        let fl = WheelId::FrontLeft.index();
        let fr = WheelId::FrontRight.index();
        let rl = WheelId::RearLeft.index();

        // Front wheels steer left (positive angles), rear wheels steer right
        assert!(ang[fl] > 0.0 && ang[fl] < 90.0);
        assert!(ang[rl] > 270.0);

        // The inner front wheel steers harder than the outer
        assert!(ang[fl] > ang[fr]);

        // Outer wheels run faster than inner wheels
        assert!(speed[fr] > speed[fl]);
    }

    #[test]
    fn safe_mode_zeroes_drive_but_not_steering() {
        let mut ctrl = make_ctrl();

        // Issue a moving command first
        let input = InputData {
            cmd: Some(DriveCmd::new(50.0, 20.0, 32767)),
            safe_mode: false,
            time_s: 0.0,
            dt_s: 0.02,
        };
        ctrl.proc(&input).unwrap();

        // Then lose the command stream
        let input = InputData {
            cmd: None,
            safe_mode: true,
            time_s: 0.5,
            dt_s: 0.02,
        };
        let (output, report) = ctrl.proc(&input).unwrap();

        assert!(report.cmd_stale);
        for i in 0..NUM_WHEELS {
            assert_eq!(output.target_speed[i], 0.0);
            assert!((output.target_ang_deg[i] - 20.0).abs() < 1e-9);
        }
    }

    #[test]
    fn radio_faults_set_status_bits() {
        let mut ctrl = make_ctrl();

        let input = InputData {
            cmd: Some(DriveCmd::new(10.0, 0.0, 32767)),
            safe_mode: false,
            time_s: 0.0,
            dt_s: 0.02,
        };

        ctrl.radio.fail_rx = true;
        let (_, report) = ctrl.proc(&input).unwrap();
        for s in report.wheel_status.iter() {
            assert_ne!(s & status::RX_FAILED, 0);
        }

        ctrl.radio.fail_rx = false;
        ctrl.radio.fail_tx = true;
        let (_, report) = ctrl.proc(&input).unwrap();
        for s in report.wheel_status.iter() {
            assert_ne!(s & status::TX_FAILED, 0);
        }

        // Faults clear once the link recovers
        ctrl.radio.fail_tx = false;
        let (_, report) = ctrl.proc(&input).unwrap();
        for s in report.wheel_status.iter() {
            assert_eq!(*s, 0);
        }
    }

    #[test]
    fn invalid_angle_reading_keeps_last_good() {
        let mut ctrl = make_ctrl();

        let input = InputData {
            cmd: Some(DriveCmd::new(0.0, 0.0, 32767)),
            safe_mode: false,
            time_s: 0.0,
            dt_s: 0.02,
        };

        // First cycle with good readings at 30 degrees
        ctrl.sensors.ang_deg = [30.0; NUM_WHEELS];
        let (output, _) = ctrl.proc(&input).unwrap();
        assert!((output.meas_ang_deg[0] - 30.0).abs() < 1e-9);

        // Sensor dies, the measured angle must hold
        ctrl.sensors.ang_deg = [200.0; NUM_WHEELS];
        ctrl.sensors.status = [angle_sensor::status::MAGNET_NOT_DETECTED; NUM_WHEELS];
        let (output, report) = ctrl.proc(&input).unwrap();

        assert!((output.meas_ang_deg[0] - 30.0).abs() < 1e-9);
        for s in report.wheel_status.iter() {
            assert_ne!(
                s >> status::ANG_SHIFT & u16::from(angle_sensor::status::MAGNET_NOT_DETECTED),
                0
            );
        }
    }
}
