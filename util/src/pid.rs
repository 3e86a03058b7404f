//! # Generic PID controller
//!
//! This module provides the PID controller used by the steering and
//! wall-following control loops. The controller is time-aware, sampling the
//! monotonic clock on each call, and supports a configurable dead-band and an
//! injectable error metric so that wrapping quantities (headings, steering
//! angles) are handled without a discontinuity at 0/360.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;
use serde::{Deserialize, Serialize};

// Internal
use crate::maths::ang_diff_deg;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Error magnitude at or below which the integral accumulation is reset.
///
/// Together with the reset on zero-crossing this keeps the integral bounded
/// around the set point, avoiding windup oscillation.
const INTEGRAL_RESET_ERROR: f64 = 0.1;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the controller measures the distance between the set point and the
/// current value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ErrorMetric {
    /// Plain subtraction, for unbounded quantities such as distances.
    Linear,

    /// Signed smallest angular difference in degrees, in [-180, 180), for
    /// quantities which wrap at 360.
    AngularDeg,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and shaping terms for a [`PidController`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Dervative gain
    pub k_d: f64,

    /// Gain applied to the combined output
    pub output_gain: f64,

    /// Error magnitude at or below which the error is treated as exactly zero
    pub dead_band: f64,
}

/// A PID controller
///
/// One instance is constructed per control axis and mutated on every control
/// tick. Instances are never shared between axes.
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    gains: PidGains,

    metric: ErrorMetric,

    /// Previous instant that a sample was passed in, `None` until the first
    /// call to `process`
    #[serde(skip)]
    prev_time: Option<Instant>,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PidGains {
    fn default() -> Self {
        Self {
            k_p: 1.0,
            k_i: 0.0,
            k_d: 0.0,
            output_gain: 1.0,
            dead_band: 0.0,
        }
    }
}

impl PidController {
    /// Create a new controller with the given gains and error metric.
    pub fn new(gains: PidGains, metric: ErrorMetric) -> Self {
        Self {
            gains,
            metric,
            prev_time: None,
            prev_error: 0.0,
            integral: 0.0,
        }
    }

    /// Get the controller output for the given set point and current value.
    ///
    /// This function is time-aware so there is no need to pass in a delta-time
    /// value.
    ///
    /// The very first call only primes the internal state and returns 0, since
    /// no rate information is available without a prior sample.
    pub fn process(&mut self, set_point: f64, current: f64) -> f64 {
        self.process_at(set_point, current, Instant::now())
    }

    /// As [`PidController::process`] but with an explicit sample instant.
    pub fn process_at(&mut self, set_point: f64, current: f64, now: Instant) -> f64 {
        // Calculate the error using the configured metric
        let mut error = match self.metric {
            ErrorMetric::Linear => set_point - current,
            ErrorMetric::AngularDeg => ang_diff_deg(set_point, current),
        };

        // Errors inside the dead band are treated as exactly zero, removing
        // output chatter near the set point.
        if error.abs() <= self.gains.dead_band {
            error = 0.0;
        }

        // On the first sample there is no rate information, just prime the
        // state and output zero.
        let prev_time = match self.prev_time {
            Some(t) => t,
            None => {
                self.prev_time = Some(now);
                self.prev_error = error;
                return 0.0;
            }
        };

        // A degenerate delta time (zero or negative) must not divide, the
        // derivative is skipped in that case.
        let dt_s = now
            .checked_duration_since(prev_time)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        // Accumulate the integral term.
        //
        // The integral is reset whenever the error crosses zero or is close
        // enough to it, preventing windup oscillation about the set point.
        if error * self.prev_error < 0.0 || error.abs() <= INTEGRAL_RESET_ERROR {
            self.integral = 0.0;
        }
        else {
            self.integral += error * dt_s;
        }

        // Calculate the derivative
        let deriv = if dt_s > 0.0 {
            (error - self.prev_error) / dt_s
        }
        else {
            0.0
        };

        // Calculate the output
        let out = (
            self.gains.k_p * error
            + self.gains.k_i * self.integral
            + self.gains.k_d * deriv
        ) * self.gains.output_gain;

        // Remember the previous error and time
        self.prev_error = error;
        self.prev_time = Some(now);

        out
    }

    /// Discard the accumulated state, as if the controller had just been
    /// constructed.
    pub fn reset(&mut self) {
        self.prev_time = None;
        self.prev_error = 0.0;
        self.integral = 0.0;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn gains(k_p: f64, k_i: f64, k_d: f64) -> PidGains {
        PidGains {
            k_p,
            k_i,
            k_d,
            output_gain: 1.0,
            dead_band: 0.0,
        }
    }

    #[test]
    fn first_call_returns_zero() {
        let pairs = [(0.0, 0.0), (10.0, -3.0), (-250.0, 1e6), (359.0, 1.0)];

        for &(sp, cur) in pairs.iter() {
            let mut pid = PidController::new(gains(2.0, 1.0, 0.5), ErrorMetric::Linear);
            assert_eq!(pid.process(sp, cur), 0.0);
        }
    }

    #[test]
    fn zero_error_converges_to_zero() {
        let mut pid = PidController::new(gains(2.0, 1.0, 0.5), ErrorMetric::Linear);

        let t0 = Instant::now();
        for i in 0..100 {
            let out = pid.process_at(42.0, 42.0, t0 + Duration::from_millis(i * 37));
            assert_eq!(out, 0.0);
        }
    }

    #[test]
    fn dead_band_suppresses_output() {
        let mut pid = PidController::new(
            PidGains {
                dead_band: 5.0,
                ..gains(1.0, 0.0, 0.0)
            },
            ErrorMetric::Linear,
        );

        let t0 = Instant::now();
        pid.process_at(250.0, 248.0, t0);
        let out = pid.process_at(250.0, 248.0, t0 + Duration::from_millis(100));
        assert_eq!(out, 0.0);

        // Outside the dead band the proportional term acts
        let out = pid.process_at(250.0, 150.0, t0 + Duration::from_millis(200));
        assert!(out > 0.0);
    }

    #[test]
    fn angular_metric_takes_short_way_round() {
        let mut pid = PidController::new(gains(1.0, 0.0, 0.0), ErrorMetric::AngularDeg);

        let t0 = Instant::now();
        pid.process_at(359.0, 1.0, t0);
        let out = pid.process_at(359.0, 1.0, t0 + Duration::from_millis(100));

        // 359 is 2 degrees clockwise of 1, not 358 anticlockwise
        assert!((out - (-2.0)).abs() < 1e-9);
    }

    #[test]
    fn integral_resets_on_zero_crossing() {
        let mut pid = PidController::new(gains(0.0, 1.0, 0.0), ErrorMetric::Linear);

        let t0 = Instant::now();
        pid.process_at(0.0, -10.0, t0);
        pid.process_at(0.0, -10.0, t0 + Duration::from_secs(1));
        let before = pid.process_at(0.0, -10.0, t0 + Duration::from_secs(2));
        assert!(before > 0.0);

        // Error sign flips, the integral must restart from zero
        let at_flip = pid.process_at(0.0, 10.0, t0 + Duration::from_secs(3));
        assert_eq!(at_flip, 0.0);

        // Accumulation restarts from zero on the next same-sign sample
        let after = pid.process_at(0.0, 10.0, t0 + Duration::from_secs(4));
        assert!((after - (-10.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_dt_skips_derivative() {
        let mut pid = PidController::new(gains(0.0, 0.0, 1.0), ErrorMetric::Linear);

        let t0 = Instant::now();
        pid.process_at(0.0, 1.0, t0);
        let out = pid.process_at(0.0, 5.0, t0);
        assert_eq!(out, 0.0);
    }
}
