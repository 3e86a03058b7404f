//! # Wheel Actuation Executable
//!
//! This executable closes the per-wheel control loops of the rover:
//! - Steering position control against the absolute angle sensors
//! - Drive demands to the wheel modules over the radio link
//! - Thermal protection of the steer and drive motors
//!
//! It subscribes to the unified drive command published by `rover_exec` and runs at its own
//! fixed drive tick, so actuation stays live even while the mission executive is doing slow
//! work. Each tick it publishes the per-wheel targets and the aggregated odometry and steering
//! angle messages that feed sensor fusion.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Absolute steering angle sensor drivers.
mod angle_sensor;

/// Parameters for the wheel actuation executable.
mod params;

/// Radio link to the wheel drive modules.
mod radio;

/// Per-wheel closed-loop control.
mod wheel_ctrl;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Result};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use angle_sensor::AngleBank;
use comms_if::eqpt::sensor::{WheelArrayMsg, TOPIC_WHEEL_DEG, TOPIC_WHEEL_SPEED};
use comms_if::eqpt::store::StoreClient;
use comms_if::eqpt::wheel::{DriveCmd, WheelId, NUM_WHEELS, TOPIC_DRIVE_CMD};
use comms_if::net::{self, zmq, BusParams, MonitoredSocket};
use params::Params;
use radio::RadioLink;
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session},
};
use wheel_ctrl::{calib::{self, WheelCalibration}, InitConfig, InputData, WheelCtrl};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("wheel_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Kestrel Wheel Actuation Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: Params = util::params::load("wheel_exec.toml")?;
    params.are_valid().wrap_err("Invalid wheel_exec parameters")?;

    let bus_params: BusParams = util::params::load("net.toml")?;

    info!("Parameters loaded");

    // ---- NETWORK INITIALISATION ----

    let zmq_ctx = zmq::Context::new();

    // The calibration store is part of the bus infrastructure, not being able to reach it at
    // startup is fatal.
    let mut store = StoreClient::new(&zmq_ctx, &bus_params)
        .wrap_err("Failed to connect to the calibration store")?;

    let mut calibs = [WheelCalibration::defaults(WheelId::FrontLeft); NUM_WHEELS];
    for wheel in WheelId::ALL.iter() {
        calibs[wheel.index()] = WheelCalibration::from_store(&mut store, *wheel)
            .wrap_err("Failed to load wheel calibration")?;
    }

    let pid = calib::pid_from_store(&mut store, params.pid)
        .wrap_err("Failed to load PID calibration")?;

    info!("Calibration loaded");

    let drive_sub = net::sub_socket(&zmq_ctx, &bus_params.drive_cmd_endpoint, &[TOPIC_DRIVE_CMD])
        .wrap_err("Failed to open the drive command subscription")?;

    let sensor_pub = net::pub_socket(&zmq_ctx, &bus_params.sensor_endpoint)
        .wrap_err("Failed to open the sensor publisher")?;

    info!("Network initialisation complete");

    // ---- HARDWARE INITIALISATION ----

    let (radio, sensors) = open_backends(&params)?;

    run(params, calibs, pid, radio, sensors, drive_sub, sensor_pub, session)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Main drive loop, generic over the hardware backends.
#[allow(clippy::too_many_arguments)]
fn run<R: RadioLink, A: AngleBank>(
    params: Params,
    calibs: [WheelCalibration; NUM_WHEELS],
    pid: util::pid::PidGains,
    radio: R,
    sensors: A,
    drive_sub: MonitoredSocket,
    sensor_pub: MonitoredSocket,
    session: Session,
) -> Result<()> {
    // ---- CONTROLLER INITIALISATION ----

    let mut wheel_ctrl = WheelCtrl::new(radio, sensors);
    wheel_ctrl
        .init(
            InitConfig {
                params: params.clone(),
                calibs,
                pid,
            },
            &session,
        )
        .wrap_err("Failed to initialise WheelCtrl")?;

    let mut arch_report = Archiver::from_path(&session, "wheel_ctrl/status_report.csv")
        .map_err(|e| eyre!("Failed to create the status report archive: {}", e))?;

    info!("Initialisation complete, entering drive loop in safe mode\n");

    // ---- MAIN LOOP ----

    let mut last_cmd_time_s = f64::NEG_INFINITY;
    let mut last_time_s = session::get_elapsed_seconds();
    let mut safe_mode = true;
    let mut num_consec_overruns: u64 = 0;

    loop {
        let cycle_start = Instant::now();
        let time_s = session::get_elapsed_seconds();
        let dt_s = (time_s - last_time_s).max(0.0);
        last_time_s = time_s;

        // ---- COMMAND INPUT ----

        // Drain the subscription, keeping only the latest command
        let mut new_cmd: Option<DriveCmd> = None;
        while let Ok(msg) = drive_sub.recv_msg(zmq::DONTWAIT) {
            let line = msg.as_str().unwrap_or("");
            let (_, payload) = net::split_topic(line);

            match DriveCmd::from_json(payload) {
                Ok(cmd) => new_cmd = Some(cmd),
                Err(e) => warn!("Ignoring malformed drive command: {}", e),
            }
        }

        if new_cmd.is_some() {
            last_cmd_time_s = time_s;
        }

        // Safe mode latches while the command stream is quiet for too long
        let stream_lost = time_s - last_cmd_time_s > params.cmd_timeout_s;
        if stream_lost && !safe_mode {
            warn!("Drive command stream lost, entering safe mode");
            safe_mode = true;
        }
        if !stream_lost && safe_mode {
            info!("Recieved valid drive command, exiting safe mode");
            safe_mode = false;
        }

        // ---- WHEEL CONTROL ----

        let input = InputData {
            cmd: new_cmd,
            safe_mode,
            time_s,
            dt_s,
        };

        let (output, report) = match wheel_ctrl.proc(&input) {
            Ok(or) => or,
            Err(e) => {
                warn!("Error during WheelCtrl processing: {}", e);
                continue;
            }
        };

        // ---- PUBLICATION ----

        // Per-wheel targets for the calibration and monitoring UIs
        for wheel in WheelId::ALL.iter() {
            let i = wheel.index();
            sensor_pub
                .send(
                    &format!("{} {}", wheel.deg_topic(), output.target_ang_deg[i]),
                    0,
                )
                .ok();
            sensor_pub
                .send(
                    &format!("{} {}", wheel.speed_topic(), output.target_speed[i]),
                    0,
                )
                .ok();
        }

        // Aggregated odometry and steering angle messages for sensor fusion
        let time_ms = (time_s * 1000.0) as u64;

        let mut odo_msg = WheelArrayMsg {
            time_ms,
            values: [0.0; NUM_WHEELS],
            status: [0; NUM_WHEELS],
        };
        let mut ang_msg = odo_msg;

        for i in 0..NUM_WHEELS {
            odo_msg.values[i] = f64::from(output.odo_ticks[i]);
            odo_msg.status[i] = (report.wheel_status[i] & 0xFF) as u8;

            ang_msg.values[i] = output.meas_ang_deg[i];
            ang_msg.status[i] = (report.wheel_status[i] >> wheel_ctrl::status::ANG_SHIFT) as u8;
        }

        sensor_pub
            .send(&format!("{} {}", TOPIC_WHEEL_SPEED, odo_msg.to_csv()), 0)
            .ok();
        sensor_pub
            .send(&format!("{} {}", TOPIC_WHEEL_DEG, ang_msg.to_csv()), 0)
            .ok();

        // ---- ARCHIVING ----

        if let Err(e) = arch_report.serialise(&report) {
            warn!("Could not archive the status report: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start;

        match Duration::from_secs_f64(params.cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Drive cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - params.cycle_period_s
                );
                num_consec_overruns += 1;

                if num_consec_overruns > 50 {
                    warn!("More than 50 consecutive drive cycle overruns");
                }
            }
        }
    }
}

/// Open the wheel hardware backends.
#[cfg(target_arch = "arm")]
fn open_backends(
    params: &Params,
) -> Result<(
    radio::nrf24::Nrf24<rppal::spi::Spi, rppal::gpio::OutputPin>,
    angle_sensor::As5600Bank<rppal::i2c::I2c>,
)> {
    use rppal::{
        gpio::Gpio,
        i2c::I2c,
        spi::{Bus, Mode, SlaveSelect, Spi},
    };

    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 8_000_000, Mode::Mode0)
        .wrap_err("Failed to open the radio SPI bus")?;
    let ce = Gpio::new()
        .wrap_err("Failed to open GPIO")?
        .get(params.radio_ce_pin)
        .wrap_err("Failed to claim the radio CE pin")?
        .into_output();

    let radio = radio::nrf24::Nrf24::new(spi, ce)
        .map_err(|e| eyre!("Failed to configure the radio: {}", e))?;

    let i2c = I2c::new().wrap_err("Failed to open the angle sensor I2C bus")?;

    Ok((radio, angle_sensor::As5600Bank::new(i2c, params.ang_mux_addr)))
}

/// Open the bench backends used off the rover.
#[cfg(not(target_arch = "arm"))]
fn open_backends(
    _params: &Params,
) -> Result<(radio::LoopbackRadio, angle_sensor::BenchAngleBank)> {
    info!("Not running on rover hardware, using loopback wheel backends");

    Ok((
        radio::LoopbackRadio::new(),
        angle_sensor::BenchAngleBank::default(),
    ))
}
