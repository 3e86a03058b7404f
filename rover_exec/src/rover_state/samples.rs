//! Dual-buffered sensor snapshots.
//!
//! Each sensor kind is held as a [`TimedSample`] pairing the newest sample with the one it
//! replaced, so deltas and rates can be computed without any global mutable history.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

use comms_if::eqpt::sensor::NUM_RADAR_BEARINGS;
use comms_if::eqpt::wheel::NUM_WHEELS;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A sensor value stamped with its capture time, holding the immediately preceding sample of the
/// same kind.
///
/// Samples are replaced wholesale on every inbound message, the old value becoming the new
/// "previous". Until the first message arrives the sample sits at its zero default and
/// [`TimedSample::received`] is false - consumers must distinguish "never received" from a real
/// zero.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TimedSample<T> {
    /// Most recent value.
    pub value: T,

    /// Capture time of `value`, session seconds.
    pub time_s: f64,

    /// The value that `value` replaced.
    pub prev_value: T,

    /// Capture time of `prev_value`, session seconds.
    pub prev_time_s: f64,

    /// Number of samples received since startup.
    count: u32,
}

/// Per-wheel odometer tick counts.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WheelOdom {
    /// Tick counts, wrapping at the odometer modulus.
    pub ticks: [i32; NUM_WHEELS],

    /// Per-wheel hardware status, 0 = nominal.
    pub status: [u8; NUM_WHEELS],
}

/// Per-wheel absolute steering angles.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WheelAng {
    /// Steering angles, degrees in [0, 360).
    pub ang_deg: [f64; NUM_WHEELS],

    /// Per-wheel hardware status, 0 = nominal.
    pub status: [u8; NUM_WHEELS],
}

/// Rover heading, rebased to the session zero.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Heading {
    /// Heading in degrees, [0, 360), relative to the first heading of the session.
    pub yaw_deg: f64,

    /// Heading sensor temperature, celsius.
    pub temp_c: f64,
}

/// Distances at the eight fixed radar bearings.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Radar {
    /// Distances in millimetres.
    pub dist_mm: [f64; NUM_RADAR_BEARINGS],

    /// Per-bearing status as received, 0 = nominal.
    pub status: [u8; NUM_RADAR_BEARINGS],
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl<T: Copy> TimedSample<T> {
    /// Replace the sample, retiring the current value into the "previous" slot.
    pub fn update(&mut self, value: T, time_s: f64) {
        self.prev_value = self.value;
        self.prev_time_s = self.time_s;
        self.value = value;
        self.time_s = time_s;
        self.count = self.count.saturating_add(1);
    }

    /// True once at least one sample has been received.
    pub fn received(&self) -> bool {
        self.count > 0
    }

    /// True once both the current and previous slots hold real samples, so deltas are
    /// meaningful.
    pub fn has_pair(&self) -> bool {
        self.count > 1
    }

    /// Time elapsed between the previous and current samples.
    pub fn dt_s(&self) -> f64 {
        self.time_s - self.prev_time_s
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn update_retires_current_to_previous() {
        let mut sample: TimedSample<f64> = TimedSample::default();

        assert!(!sample.received());
        assert!(!sample.has_pair());

        sample.update(10.0, 1.0);
        assert!(sample.received());
        assert!(!sample.has_pair());

        sample.update(20.0, 1.5);
        assert!(sample.has_pair());
        assert_eq!(sample.value, 20.0);
        assert_eq!(sample.prev_value, 10.0);
        assert!((sample.dt_s() - 0.5).abs() < 1e-9);
    }
}
