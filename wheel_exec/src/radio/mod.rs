//! # Wheel Radio Link
//!
//! Each wheel's drive module is reached over a packet radio on its own 5 byte address. The
//! exchange per drive cycle is: send the demand frame, switch to receive, and wait a bounded
//! time for the acknowledgement frame carrying the wheel's odometer position.
//!
//! The [`RadioLink`] trait abstracts the transceiver so the controller can be driven against the
//! [`LoopbackRadio`] on the bench and in tests.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`RadioLink`] implementation for the nRF24L01+ transceiver.
pub mod nrf24;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::time::Duration;

use comms_if::eqpt::wheel::{RadioAck, RadioDemand, WheelMsgError};
use util::maths::ODO_TICK_MODULUS;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A half-duplex packet radio addressed by 5 byte node addresses.
pub trait RadioLink {
    /// Send a payload to the given address.
    fn send(&mut self, addr: &[u8; 5], payload: &[u8]) -> Result<(), RadioError>;

    /// Switch to receive on the given address and wait up to `timeout` for a payload.
    ///
    /// Returns `Ok(None)` if nothing arrived before the timeout.
    fn recv(&mut self, addr: &[u8; 5], timeout: Duration) -> Result<Option<Vec<u8>>, RadioError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible radio link errors.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("SPI transaction with the transceiver failed")]
    Spi,

    #[error("Could not drive the transceiver's CE line")]
    Gpio,

    #[error("Transmission not acknowledged after the configured retries")]
    TxFailed,

    #[error("No acknowledgement payload before the timeout")]
    AckTimeout,

    #[error("Acknowledgement payload invalid: {0}")]
    BadAck(WheelMsgError),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of one simulated wheel inside the [`LoopbackRadio`].
#[derive(Debug, Clone, Copy, Default)]
struct SimWheel {
    ticks: i32,
    speed: i8,
    drv_mod: i8,
}

/// A [`RadioLink`] test double which simulates the wheel drive modules.
///
/// Each address accumulates odometer ticks according to the last demanded speed, and replies to
/// every demand with a well-formed acknowledgement. Failures can be injected for tests.
#[derive(Debug, Default)]
pub struct LoopbackRadio {
    wheels: HashMap<[u8; 5], SimWheel>,

    /// When set, all sends fail.
    pub fail_tx: bool,

    /// When set, all receives time out.
    pub fail_rx: bool,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Perform one demand/acknowledge exchange with a wheel.
pub fn exchange<R: RadioLink>(
    radio: &mut R,
    addr: &[u8; 5],
    demand: &RadioDemand,
    timeout: Duration,
) -> Result<RadioAck, RadioError> {
    radio.send(addr, &demand.to_bytes())?;

    match radio.recv(addr, timeout)? {
        Some(frame) => RadioAck::from_bytes(&frame).map_err(RadioError::BadAck),
        None => Err(RadioError::AckTimeout),
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LoopbackRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the simulated odometer tick count at an address.
    pub fn ticks_at(&self, addr: &[u8; 5]) -> i32 {
        self.wheels.get(addr).map(|w| w.ticks).unwrap_or(0)
    }
}

impl RadioLink for LoopbackRadio {
    fn send(&mut self, addr: &[u8; 5], payload: &[u8]) -> Result<(), RadioError> {
        if self.fail_tx {
            return Err(RadioError::TxFailed);
        }

        let demand = RadioDemand::from_bytes(payload).map_err(RadioError::BadAck)?;

        let wheel = self.wheels.entry(*addr).or_default();
        wheel.speed = demand.speed;
        wheel.drv_mod = demand.drv_mod;

        Ok(())
    }

    fn recv(&mut self, addr: &[u8; 5], _timeout: Duration) -> Result<Option<Vec<u8>>, RadioError> {
        if self.fail_rx {
            return Ok(None);
        }

        let wheel = self.wheels.entry(*addr).or_default();

        // Advance the odometer as though the wheel span at the demanded speed for one cycle,
        // wrapping the way the real counter does
        let delta = i32::from(wheel.speed) * i32::from(wheel.drv_mod);
        wheel.ticks = (wheel.ticks + delta).rem_euclid(ODO_TICK_MODULUS);

        let ack = RadioAck {
            odo_ticks: wheel.ticks,
            status: 0,
        };

        Ok(Some(ack.to_bytes().to_vec()))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const ADDR: [u8; 5] = *b"WHL00";

    #[test]
    fn exchange_returns_ack() {
        let mut radio = LoopbackRadio::new();

        let ack = exchange(
            &mut radio,
            &ADDR,
            &RadioDemand {
                speed: 10,
                drv_mod: 1,
            },
            Duration::from_millis(5),
        )
        .unwrap();

        assert_eq!(ack.status, 0);
        assert_eq!(ack.odo_ticks, 10);
    }

    #[test]
    fn exchange_reports_tx_and_rx_failures() {
        let mut radio = LoopbackRadio::new();
        radio.fail_tx = true;

        let demand = RadioDemand {
            speed: 10,
            drv_mod: 1,
        };

        assert!(matches!(
            exchange(&mut radio, &ADDR, &demand, Duration::from_millis(5)),
            Err(RadioError::TxFailed)
        ));

        radio.fail_tx = false;
        radio.fail_rx = true;

        assert!(matches!(
            exchange(&mut radio, &ADDR, &demand, Duration::from_millis(5)),
            Err(RadioError::AckTimeout)
        ));
    }

    #[test]
    fn odometer_wraps_at_modulus() {
        let mut radio = LoopbackRadio::new();

        let demand = RadioDemand {
            speed: 100,
            drv_mod: 1,
        };

        // Drive enough cycles to cross the wrap boundary
        let mut last = 0;
        for _ in 0..(ODO_TICK_MODULUS / 100 + 5) {
            let ack = exchange(&mut radio, &ADDR, &demand, Duration::from_millis(5)).unwrap();
            assert!(ack.odo_ticks >= 0 && ack.odo_ticks < ODO_TICK_MODULUS);
            last = ack.odo_ticks;
        }

        assert!(last < ODO_TICK_MODULUS);
    }
}
