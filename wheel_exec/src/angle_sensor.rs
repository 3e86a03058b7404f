//! # Absolute Steering Angle Sensors
//!
//! Each wheel carries an AS5600-style 12 bit magnetic absolute angle sensor on its steering
//! axis. All four share one I2C bus behind a TCA9548-style channel multiplexer, since the
//! sensor's slave address is fixed.
//!
//! The driver converts raw counts to degrees and reports magnet and bus faults as status bits, so
//! upstream code can distinguish a stuck wheel from a sensor fault. Calibration (zero offset and
//! direction) is applied by the wheel controller, not here.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::wheel::{WheelId, NUM_WHEELS};
use embedded_hal::blocking::i2c::{Write, WriteRead};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// I2C slave address of the angle sensor.
const AS5600_ADDR: u8 = 0x36;

/// Status register address.
const REG_STATUS: u8 = 0x0B;

/// Raw angle register address (two bytes, big endian on the wire).
const REG_RAW_ANGLE: u8 = 0x0C;

/// Counts per full revolution.
pub const COUNTS_PER_REV: u16 = 4096;

// AS5600 status register bits
const AS5600_MH: u8 = 0x08;
const AS5600_ML: u8 = 0x10;
const AS5600_MD: u8 = 0x20;

/// Status bits reported in an [`AngleReading`].
pub mod status {
    /// The magnet is too close to the sensor.
    pub const MAGNET_TOO_STRONG: u8 = 0x01;

    /// The magnet is too far from the sensor.
    pub const MAGNET_TOO_WEAK: u8 = 0x02;

    /// No magnet detected, the reading is meaningless.
    pub const MAGNET_NOT_DETECTED: u8 = 0x04;

    /// An I2C read transaction failed.
    pub const I2C_READ_FAILED: u8 = 0x08;

    /// An I2C write transaction failed.
    pub const I2C_WRITE_FAILED: u8 = 0x10;

    /// Bits which mean the reading itself cannot be trusted.
    pub const READING_INVALID: u8 = MAGNET_NOT_DETECTED | I2C_READ_FAILED | I2C_WRITE_FAILED;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One decoded angle sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngleReading {
    /// Raw sensor counts, 0 to [`COUNTS_PER_REV`].
    pub raw: u16,

    /// Decoded angle in degrees, [0, 360). Uncalibrated.
    pub ang_deg: f64,

    /// Status bits, see [`status`]. 0 = nominal.
    pub status: u8,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A bank of per-wheel absolute angle sensors.
///
/// Reads never fail hard, faults are carried in the reading's status bits so the control loop can
/// fall back to the last known-good angle and keep running.
pub trait AngleBank {
    /// Read the current steering angle of the given wheel.
    fn read(&mut self, wheel: WheelId) -> AngleReading;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// [`AngleBank`] implementation for four AS5600 sensors behind an I2C multiplexer.
pub struct As5600Bank<I2C> {
    i2c: I2C,
    mux_addr: u8,
}

/// [`AngleBank`] implementation returning operator-settable angles, used on the bench and in
/// tests.
#[derive(Debug, Clone, Default)]
pub struct BenchAngleBank {
    /// The angle each wheel will report.
    pub ang_deg: [f64; NUM_WHEELS],

    /// Status bits each wheel will report.
    pub status: [u8; NUM_WHEELS],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C> As5600Bank<I2C> {
    /// Create a new bank on the given bus, with the multiplexer at `mux_addr`.
    pub fn new(i2c: I2C, mux_addr: u8) -> Self {
        Self { i2c, mux_addr }
    }
}

impl<I2C, E> AngleBank for As5600Bank<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn read(&mut self, wheel: WheelId) -> AngleReading {
        let mut reading = AngleReading::default();

        // Select the wheel's multiplexer channel
        if self
            .i2c
            .write(self.mux_addr, &[1 << wheel.index()])
            .is_err()
        {
            reading.status |= status::I2C_WRITE_FAILED;
            return reading;
        }

        // Read the magnet status
        let mut buf = [0u8; 1];
        match self.i2c.write_read(AS5600_ADDR, &[REG_STATUS], &mut buf) {
            Ok(()) => {
                if buf[0] & AS5600_MH != 0 {
                    reading.status |= status::MAGNET_TOO_STRONG;
                }
                if buf[0] & AS5600_ML != 0 {
                    reading.status |= status::MAGNET_TOO_WEAK;
                }
                if buf[0] & AS5600_MD == 0 {
                    reading.status |= status::MAGNET_NOT_DETECTED;
                }
            }
            Err(_) => {
                reading.status |= status::I2C_READ_FAILED;
                return reading;
            }
        }

        // Read the raw angle
        let mut buf = [0u8; 2];
        match self.i2c.write_read(AS5600_ADDR, &[REG_RAW_ANGLE], &mut buf) {
            Ok(()) => {
                reading.raw = (u16::from(buf[0]) << 8 | u16::from(buf[1])) % COUNTS_PER_REV;
                reading.ang_deg = f64::from(reading.raw) * 360.0 / f64::from(COUNTS_PER_REV);
            }
            Err(_) => {
                reading.status |= status::I2C_READ_FAILED;
            }
        }

        reading
    }
}

impl AngleBank for BenchAngleBank {
    fn read(&mut self, wheel: WheelId) -> AngleReading {
        let i = wheel.index();
        let ang_deg = util::maths::norm_ang_deg(self.ang_deg[i]);

        AngleReading {
            raw: (ang_deg / 360.0 * f64::from(COUNTS_PER_REV)) as u16,
            ang_deg,
            status: self.status[i],
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Mock I2C bus serving a fixed status and raw angle, with optional fault injection.
    struct MockBus {
        status_reg: u8,
        raw: u16,
        fail_reads: bool,
    }

    impl Write for MockBus {
        type Error = ();

        fn write(&mut self, _addr: u8, _bytes: &[u8]) -> Result<(), ()> {
            Ok(())
        }
    }

    impl WriteRead for MockBus {
        type Error = ();

        fn write_read(&mut self, _addr: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
            if self.fail_reads {
                return Err(());
            }

            match bytes[0] {
                REG_STATUS => buffer[0] = self.status_reg,
                REG_RAW_ANGLE => {
                    buffer[0] = (self.raw >> 8) as u8;
                    buffer[1] = (self.raw & 0xFF) as u8;
                }
                _ => return Err(()),
            }

            Ok(())
        }
    }

    #[test]
    fn decodes_counts_to_degrees() {
        let mut bank = As5600Bank::new(
            MockBus {
                status_reg: AS5600_MD,
                raw: 1024,
                fail_reads: false,
            },
            0x70,
        );

        let reading = bank.read(WheelId::FrontLeft);
        assert_eq!(reading.status, 0);
        assert_eq!(reading.raw, 1024);
        assert!((reading.ang_deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn reports_magnet_faults() {
        let mut bank = As5600Bank::new(
            MockBus {
                status_reg: AS5600_MD | AS5600_ML,
                raw: 0,
                fail_reads: false,
            },
            0x70,
        );

        let reading = bank.read(WheelId::RearRight);
        assert_eq!(reading.status, status::MAGNET_TOO_WEAK);

        let mut bank = As5600Bank::new(
            MockBus {
                status_reg: 0,
                raw: 0,
                fail_reads: false,
            },
            0x70,
        );

        let reading = bank.read(WheelId::RearRight);
        assert_ne!(reading.status & status::MAGNET_NOT_DETECTED, 0);
    }

    #[test]
    fn reports_bus_faults() {
        let mut bank = As5600Bank::new(
            MockBus {
                status_reg: AS5600_MD,
                raw: 0,
                fail_reads: true,
            },
            0x70,
        );

        let reading = bank.read(WheelId::FrontRight);
        assert_ne!(reading.status & status::I2C_READ_FAILED, 0);
    }
}
