//! # Calibration Store Client
//!
//! This module provides a client for the external key/value store holding the wheel calibration
//! values. The protocol is a simple REQ/REP exchange: the client sends `get <key>` and the server
//! replies with the value text, or `nil` if the key is not present.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;

use crate::net::{zmq, BusParams, MonitoredSocket, MonitoredSocketError, SocketOptions};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Client for the calibration key/value store.
pub struct StoreClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the store")]
    NotConnected,

    #[error("Could not send the request: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a response: {0}")]
    RecvError(zmq::Error),

    #[error("The response to {0:?} was not valid UTF-8")]
    InvalidResponse(String),

    #[error("Could not parse the value of {key:?}: {value:?}")]
    ParseError { key: String, value: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StoreClient {
    /// Create a new instance of the store client.
    pub fn new(ctx: &zmq::Context, params: &BusParams) -> Result<Self, StoreError> {
        // Create the socket options.
        //
        // All timeouts are bounded so that a missing store cannot stall the caller's control
        // loop, the REQ options allow retries after a dropped reply.
        let socket_options = SocketOptions {
            connect_timeout: 1000,
            linger: 1,
            recv_timeout: 500,
            send_timeout: 100,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        // Create the socket
        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, &params.store_endpoint)
            .map_err(StoreError::SocketError)?;

        Ok(Self { socket })
    }

    /// Get the value of a key from the store.
    ///
    /// Returns `Ok(None)` if the store does not hold the key.
    pub fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.socket.connected() {
            return Err(StoreError::NotConnected);
        }

        self.socket
            .send(&format!("get {}", key), 0)
            .map_err(StoreError::SendError)?;

        let msg = self.socket.recv_msg(0).map_err(StoreError::RecvError)?;

        let value = msg
            .as_str()
            .ok_or_else(|| StoreError::InvalidResponse(key.into()))?;

        if value == "nil" {
            Ok(None)
        }
        else {
            Ok(Some(value.to_string()))
        }
    }

    /// Get a key's value parsed into the requested type.
    ///
    /// Returns `Ok(None)` if the store does not hold the key, and a
    /// [`StoreError::ParseError`] if the held value does not parse.
    pub fn get_parsed<T: FromStr>(&mut self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(value) => match value.parse::<T>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(StoreError::ParseError {
                    key: key.into(),
                    value,
                }),
            },
            None => Ok(None),
        }
    }
}
