//! Main rover-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Sensor input acquisition from the bus
//!         - Telecommand processing
//!         - Sensor fusion, producing this tick's rover state
//!         - Mission scheduler step, issuing at most one drive command
//!         - Telemetry output
//!
//! Within one tick the state refresh always precedes the action transition evaluation, which
//! always precedes execution, so an action never sees a state it already transitioned away
//! from. The wheel control loop lives in its own executable (`wheel_exec`) at its own rate.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use rover_lib::{
    bus::RoverBus,
    data_store::DataStore,
    params::RoverExecParams,
    rover_state,
    tm::TmWriter,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("rover_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Kestrel Rover Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: RoverExecParams = util::params::load("rover_exec.toml")
        .wrap_err("Could not load rover_exec params")?;

    let bus_params: comms_if::net::BusParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    let cycle_frequency_hz = 1.0 / params.cycle_period_s;

    info!("Exec parameters loaded");

    // ---- INITIALISE DATASTORE AND MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    ds.fusion
        .init(params.fusion.clone(), &session)
        .wrap_err("Failed to initialise SensorFusion")?;
    info!("SensorFusion init complete");

    ds.mission_mgr.init(params.mission.clone());
    info!("MissionMgr init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    // No recovery path exists for a rover that cannot communicate, bail out
    let mut bus = RoverBus::new(&zmq_ctx, &bus_params, &params.exec_name)
        .wrap_err("Failed to initialise the bus")?;

    info!("Network initialisation complete");

    // ---- INITIALISE TELEMETRY ----

    let mut tm_writer = TmWriter::new(&session)
        .wrap_err("Failed to initialise the telemetry writer")?;

    let mut arch_fusion_report = Archiver::from_path(&session, "fusion/status_report.csv")
        .map_err(|e| eyre!("Failed to create the fusion report archive: {}", e))?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz);

        // ---- DATA INPUT ----

        let polled = bus.poll_sensors();
        let tc = bus.poll_tc();

        // ---- SENSOR FUSION ----

        let fusion_input = rover_state::InputData {
            odom: polled.odom,
            wheel_ang: polled.wheel_ang,
            heading: polled.heading,
            radar: polled.radar,
            last_cmd: ds.last_cmd,
            time_s: session::get_elapsed_seconds(),
        };

        match ds.fusion.proc(&fusion_input) {
            Ok((state, report)) => {
                ds.rover_state = state;
                ds.fusion_report = report;
            }
            Err(e) => {
                // Fusion substitutes known-good values internally, an error here means the
                // previous state stays in effect for this tick
                warn!("Error during SensorFusion processing: {}", e);
            }
        }

        // ---- MISSION PROCESSING ----

        let step = ds.mission_mgr.step(tc, &ds.rover_state, &mut bus);

        if let Some(cmd) = step.cmd {
            bus.publish_drive(&cmd);
            ds.last_cmd = cmd;
        }

        // ---- TELEMETRY ----

        match tm_writer.write(ds.num_cycles, &ds.rover_state, &step) {
            Ok(record) => bus.publish_tm(&record),
            Err(e) => warn!("Could not write the telemetry record: {}", e),
        }

        if let Err(e) = arch_fusion_report.serialise(&ds.fusion_report) {
            warn!("Could not archive the fusion report: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(params.cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - params.cycle_period_s
                );
                ds.num_consec_cycle_overruns += 1;

                if ds.num_consec_cycle_overruns > 50 {
                    warn!("More than 50 consecutive cycle overruns");
                }
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }
}
