//! # Rover Bus Clients
//!
//! This module holds the executable's sockets: the sensor subscriptions feeding fusion, the
//! telecommand subscription, and the publishers for the drive command, mission feedback and
//! telemetry. All receives are non-blocking drains, a quiet or flooding topic can never stall
//! the mission tick.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use crate::mission::MissionIo;
use comms_if::eqpt::sensor::{
    HeadingMsg, RadarMsg, WheelArrayMsg, TOPIC_HEADING, TOPIC_RADAR, TOPIC_SENSOR_RESUME,
    TOPIC_WHEEL_DEG, TOPIC_WHEEL_SPEED,
};
use comms_if::eqpt::wheel::{DriveCmd, TOPIC_DRIVE_CMD};
use comms_if::net::{
    self, zmq, BusParams, MonitoredSocket, MonitoredSocketError, SocketOptions,
};
use comms_if::tc::{self, Tc};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The rover executable's bus connections.
pub struct RoverBus {
    exec_name: String,

    sensor_sub: MonitoredSocket,

    tc_sub: MonitoredSocket,

    drive_pub: MonitoredSocket,

    telem_pub: MonitoredSocket,
}

/// Sensor payloads drained from the bus this tick, last message per topic wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolledSensors {
    pub odom: Option<WheelArrayMsg>,
    pub wheel_ang: Option<WheelArrayMsg>,
    pub heading: Option<HeadingMsg>,
    pub radar: Option<RadarMsg>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RoverBus {
    /// Open all of the executable's sockets.
    ///
    /// Failure here is fatal to the process, a rover with no bus has no way to communicate.
    pub fn new(
        ctx: &zmq::Context,
        params: &BusParams,
        exec_name: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let sensor_sub = net::sub_socket(
            ctx,
            &params.sensor_endpoint,
            &[TOPIC_WHEEL_SPEED, TOPIC_WHEEL_DEG, TOPIC_HEADING, TOPIC_RADAR],
        )?;

        // The executive is the stable end of the command topic, operators connect to it
        let tc_sub_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            ..Default::default()
        };
        let tc_sub = MonitoredSocket::new(ctx, zmq::SUB, tc_sub_options, &params.tc_endpoint)?;
        tc_sub
            .set_subscribe(tc::command_topic(exec_name).as_bytes())
            .map_err(|e| MonitoredSocketError::SocketOptionError("set_subscribe".into(), e))?;

        let drive_pub = net::pub_socket(ctx, &params.drive_cmd_endpoint)?;
        let telem_pub = net::pub_socket(ctx, &params.telem_endpoint)?;

        Ok(Self {
            exec_name: exec_name.to_string(),
            sensor_sub,
            tc_sub,
            drive_pub,
            telem_pub,
        })
    }

    /// Drain the sensor subscriptions, keeping the latest message of each kind.
    ///
    /// Malformed payloads are logged and skipped, a broken sensor bridge must not take the
    /// executive down.
    pub fn poll_sensors(&mut self) -> PolledSensors {
        let mut polled = PolledSensors::default();

        while let Ok(msg) = self.sensor_sub.recv_msg(zmq::DONTWAIT) {
            let (topic, payload) = net::split_topic_bytes(&msg);

            match topic {
                t if t == TOPIC_WHEEL_SPEED.as_bytes() => {
                    match parse_text(payload)
                        .and_then(|s| WheelArrayMsg::from_csv(s).map_err(|e| e.to_string()))
                    {
                        Ok(m) => polled.odom = Some(m),
                        Err(e) => warn!("Malformed odometry payload: {}", e),
                    }
                }
                t if t == TOPIC_WHEEL_DEG.as_bytes() => {
                    match parse_text(payload)
                        .and_then(|s| WheelArrayMsg::from_csv(s).map_err(|e| e.to_string()))
                    {
                        Ok(m) => polled.wheel_ang = Some(m),
                        Err(e) => warn!("Malformed steering angle payload: {}", e),
                    }
                }
                t if t == TOPIC_HEADING.as_bytes() => match HeadingMsg::from_bytes(payload) {
                    Ok(m) => polled.heading = Some(m),
                    Err(e) => warn!("Malformed heading payload: {}", e),
                },
                t if t == TOPIC_RADAR.as_bytes() => {
                    match parse_text(payload)
                        .and_then(|s| RadarMsg::from_text(s).map_err(|e| e.to_string()))
                    {
                        Ok(m) => polled.radar = Some(m),
                        Err(e) => warn!("Malformed radar payload: {}", e),
                    }
                }
                _ => (),
            }
        }

        polled
    }

    /// Drain the telecommand subscription, returning the latest parseable command.
    pub fn poll_tc(&mut self) -> Option<Tc> {
        let mut latest = None;

        while let Ok(msg) = self.tc_sub.recv_msg(zmq::DONTWAIT) {
            let line = match msg.as_str() {
                Some(l) => l,
                None => {
                    warn!("Telecommand payload is not valid UTF-8");
                    continue;
                }
            };

            let (_, payload) = net::split_topic(line);

            match Tc::from_line(payload) {
                Ok(tc) => latest = Some(tc),
                Err(e) => warn!("Could not parse recieved TC: {}", e),
            }
        }

        latest
    }

    /// Publish the unified drive command.
    pub fn publish_drive(&mut self, cmd: &DriveCmd) {
        match cmd.to_json() {
            Ok(json) => {
                self.drive_pub
                    .send(&format!("{} {}", TOPIC_DRIVE_CMD, json), 0)
                    .ok();
            }
            Err(e) => warn!("Could not encode the drive command: {}", e),
        }
    }

    /// Publish a binary telemetry record.
    pub fn publish_tm(&mut self, record: &[u8]) {
        let mut frame = tc::telemetry_topic(&self.exec_name).into_bytes();
        frame.push(b' ');
        frame.extend_from_slice(record);

        self.telem_pub.send(&frame, 0).ok();
    }
}

impl MissionIo for RoverBus {
    fn publish_action(&mut self, name: &str) {
        self.telem_pub
            .send(
                &format!("{} {}", tc::feedback_action_topic(&self.exec_name), name),
                0,
            )
            .ok();
    }

    fn publish_running(&mut self, running: bool) {
        self.telem_pub
            .send(
                &format!(
                    "{} {}",
                    tc::feedback_running_topic(&self.exec_name),
                    running
                ),
                0,
            )
            .ok();
    }

    fn resume_sensors(&mut self) {
        self.drive_pub
            .send(&format!("{} 1", TOPIC_SENSOR_RESUME), 0)
            .ok();
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Interpret a payload as UTF-8 text, with a printable error for the log.
fn parse_text(payload: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(payload).map_err(|e| e.to_string())
}
