//! [`RadioLink`] implementation for the nRF24L01+ transceiver.
//!
//! The transceiver is driven over SPI plus one GPIO for the CE line. Link-level retries are
//! handled by the chip's auto-retransmit feature, the driver only polls the status flags with a
//! bounded deadline so a dead wheel can never stall the drive cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};

use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;

use super::{RadioError, RadioLink};
use comms_if::eqpt::wheel::RADIO_ACK_LEN;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

// Register addresses
const REG_CONFIG: u8 = 0x00;
const REG_EN_AA: u8 = 0x01;
const REG_SETUP_RETR: u8 = 0x04;
const REG_RF_CH: u8 = 0x05;
const REG_STATUS: u8 = 0x07;
const REG_RX_ADDR_P0: u8 = 0x0A;
const REG_TX_ADDR: u8 = 0x10;
const REG_RX_PW_P0: u8 = 0x11;

// Commands
const CMD_W_REGISTER: u8 = 0x20;
const CMD_R_RX_PAYLOAD: u8 = 0x61;
const CMD_W_TX_PAYLOAD: u8 = 0xA0;
const CMD_FLUSH_TX: u8 = 0xE1;
const CMD_FLUSH_RX: u8 = 0xE2;

// Status bits
const STATUS_RX_DR: u8 = 0x40;
const STATUS_TX_DS: u8 = 0x20;
const STATUS_MAX_RT: u8 = 0x10;

// CONFIG bits
const CONFIG_EN_CRC: u8 = 0x08;
const CONFIG_CRCO: u8 = 0x04;
const CONFIG_PWR_UP: u8 = 0x02;
const CONFIG_PRIM_RX: u8 = 0x01;

/// RF channel used by all wheels.
const RF_CHANNEL: u8 = 76;

/// Auto retransmit: 500 us delay, 5 retries.
const SETUP_RETR_VALUE: u8 = 0x15;

/// Deadline for the transmit flags to settle. Covers the full auto-retransmit sequence.
const TX_SETTLE: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// nRF24L01+ driver.
pub struct Nrf24<SPI, CE> {
    spi: SPI,
    ce: CE,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<SPI, CE, SpiE, CeE> Nrf24<SPI, CE>
where
    SPI: Transfer<u8, Error = SpiE> + Write<u8, Error = SpiE>,
    CE: OutputPin<Error = CeE>,
{
    /// Create and configure a new transceiver.
    pub fn new(spi: SPI, ce: CE) -> Result<Self, RadioError> {
        let mut radio = Self { spi, ce };

        radio.ce_low()?;

        // Power up with 2 byte CRC, auto-ack on pipe 0, bounded retransmits
        radio.write_reg(REG_CONFIG, CONFIG_EN_CRC | CONFIG_CRCO | CONFIG_PWR_UP)?;
        radio.write_reg(REG_EN_AA, 0x01)?;
        radio.write_reg(REG_SETUP_RETR, SETUP_RETR_VALUE)?;
        radio.write_reg(REG_RF_CH, RF_CHANNEL)?;
        radio.write_reg(REG_RX_PW_P0, RADIO_ACK_LEN as u8)?;

        radio.command(CMD_FLUSH_TX)?;
        radio.command(CMD_FLUSH_RX)?;
        radio.clear_flags()?;

        Ok(radio)
    }

    fn ce_high(&mut self) -> Result<(), RadioError> {
        self.ce.set_high().map_err(|_| RadioError::Gpio)
    }

    fn ce_low(&mut self) -> Result<(), RadioError> {
        self.ce.set_low().map_err(|_| RadioError::Gpio)
    }

    fn command(&mut self, cmd: u8) -> Result<(), RadioError> {
        self.spi.write(&[cmd]).map_err(|_| RadioError::Spi)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.spi
            .write(&[CMD_W_REGISTER | reg, value])
            .map_err(|_| RadioError::Spi)
    }

    fn write_addr(&mut self, reg: u8, addr: &[u8; 5]) -> Result<(), RadioError> {
        let mut frame = [0u8; 6];
        frame[0] = CMD_W_REGISTER | reg;
        frame[1..].copy_from_slice(addr);

        self.spi.write(&frame).map_err(|_| RadioError::Spi)
    }

    fn read_status(&mut self) -> Result<u8, RadioError> {
        let mut frame = [REG_STATUS, 0];
        self.spi.transfer(&mut frame).map_err(|_| RadioError::Spi)?;

        Ok(frame[1])
    }

    fn clear_flags(&mut self) -> Result<(), RadioError> {
        self.write_reg(REG_STATUS, STATUS_RX_DR | STATUS_TX_DS | STATUS_MAX_RT)
    }

    fn set_prim_rx(&mut self, rx: bool) -> Result<(), RadioError> {
        let mut config = CONFIG_EN_CRC | CONFIG_CRCO | CONFIG_PWR_UP;
        if rx {
            config |= CONFIG_PRIM_RX;
        }

        self.write_reg(REG_CONFIG, config)
    }
}

impl<SPI, CE, SpiE, CeE> RadioLink for Nrf24<SPI, CE>
where
    SPI: Transfer<u8, Error = SpiE> + Write<u8, Error = SpiE>,
    CE: OutputPin<Error = CeE>,
{
    fn send(&mut self, addr: &[u8; 5], payload: &[u8]) -> Result<(), RadioError> {
        self.ce_low()?;
        self.set_prim_rx(false)?;

        // Pipe 0 must match the TX address for the auto-ack to be received
        self.write_addr(REG_TX_ADDR, addr)?;
        self.write_addr(REG_RX_ADDR_P0, addr)?;

        self.command(CMD_FLUSH_TX)?;
        self.clear_flags()?;

        // Load the payload
        let mut frame = Vec::with_capacity(1 + payload.len());
        frame.push(CMD_W_TX_PAYLOAD);
        frame.extend_from_slice(payload);
        self.spi.write(&frame).map_err(|_| RadioError::Spi)?;

        // Pulse CE to start the transmission
        self.ce_high()?;

        // Wait for the chip to report the outcome
        let deadline = Instant::now() + TX_SETTLE;
        loop {
            let status = self.read_status()?;

            if status & STATUS_TX_DS != 0 {
                self.ce_low()?;
                self.clear_flags()?;
                return Ok(());
            }

            if status & STATUS_MAX_RT != 0 {
                self.ce_low()?;
                self.command(CMD_FLUSH_TX)?;
                self.clear_flags()?;
                return Err(RadioError::TxFailed);
            }

            if Instant::now() > deadline {
                self.ce_low()?;
                return Err(RadioError::TxFailed);
            }
        }
    }

    fn recv(&mut self, addr: &[u8; 5], timeout: Duration) -> Result<Option<Vec<u8>>, RadioError> {
        self.ce_low()?;
        self.set_prim_rx(true)?;
        self.write_addr(REG_RX_ADDR_P0, addr)?;
        self.ce_high()?;

        let deadline = Instant::now() + timeout;
        loop {
            let status = self.read_status()?;

            if status & STATUS_RX_DR != 0 {
                // Read the fixed-width payload out of the FIFO
                let mut frame = [0u8; 1 + RADIO_ACK_LEN];
                frame[0] = CMD_R_RX_PAYLOAD;
                self.spi.transfer(&mut frame).map_err(|_| RadioError::Spi)?;

                self.ce_low()?;
                self.clear_flags()?;

                return Ok(Some(frame[1..].to_vec()));
            }

            if Instant::now() > deadline {
                self.ce_low()?;
                return Ok(None);
            }
        }
    }
}
