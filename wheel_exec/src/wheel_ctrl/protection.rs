//! Motor thermal and current-draw protection.
//!
//! Each motor's cumulative current is estimated from its duty cycle over time. A motor held
//! above the overheat duty threshold for too long is forced to zero output for a cooldown
//! window, whatever the controller asks for during that window.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Duty cycle above which the overheat timer runs.
///
/// Units: percent
pub const OVERHEAT_DUTY_THRESHOLD: f64 = 50.0;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Protection settings for one motor class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtectionParams {
    /// Time a motor may sustain a duty cycle above the threshold before it is forced off.
    ///
    /// Units: seconds
    pub overheat_s: f64,

    /// Time a motor is held at zero output after overheating.
    ///
    /// Units: seconds
    pub cooldown_s: f64,

    /// Current drawn by the motor at 100% duty, used for the mAh estimate.
    ///
    /// Units: milliamps
    pub full_duty_ma: f64,
}

/// Protection state for one motor.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MotorProtection {
    /// Cumulative estimated charge drawn by the motor.
    mah: f64,

    /// Time at which the duty cycle first exceeded the threshold, if it currently does.
    over_duty_start_s: Option<f64>,

    /// End of the current cooldown window, if one is active.
    cooldown_end_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for ProtectionParams {
    fn default() -> Self {
        Self {
            overheat_s: 3.0,
            cooldown_s: 10.0,
            full_duty_ma: 900.0,
        }
    }
}

impl MotorProtection {
    /// Pass a requested duty cycle through the protection, returning the permitted duty.
    ///
    /// `duty` must be the unsigned duty in percent. The permitted duty is zero for the whole
    /// cooldown window after an overheat.
    pub fn apply(&mut self, duty: f64, time_s: f64, dt_s: f64, params: &ProtectionParams) -> f64 {
        // While cooling down the motor stays off
        if let Some(end_s) = self.cooldown_end_s {
            if time_s < end_s {
                return 0.0;
            }

            self.cooldown_end_s = None;
            self.over_duty_start_s = None;
        }

        // Run the overheat timer while the duty is above the threshold
        if duty > OVERHEAT_DUTY_THRESHOLD {
            let start_s = *self.over_duty_start_s.get_or_insert(time_s);

            if time_s - start_s > params.overheat_s {
                self.cooldown_end_s = Some(time_s + params.cooldown_s);
                return 0.0;
            }
        }
        else {
            self.over_duty_start_s = None;
        }

        // Account the charge actually drawn
        self.mah += duty / 100.0 * params.full_duty_ma * dt_s / 3600.0;

        duty
    }

    /// True while the motor is being held off after an overheat.
    pub fn overheated(&self) -> bool {
        self.cooldown_end_s.is_some()
    }

    /// Cumulative estimated charge drawn by the motor in mAh.
    pub fn mah_total(&self) -> f64 {
        self.mah
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> ProtectionParams {
        ProtectionParams {
            overheat_s: 2.0,
            cooldown_s: 5.0,
            full_duty_ma: 1000.0,
        }
    }

    #[test]
    fn low_duty_passes_through() {
        let mut prot = MotorProtection::default();

        for i in 0..100 {
            let out = prot.apply(40.0, i as f64 * 0.1, 0.1, &params());
            assert_eq!(out, 40.0);
        }

        assert!(!prot.overheated());
    }

    #[test]
    fn sustained_high_duty_forces_cooldown() {
        let mut prot = MotorProtection::default();
        let p = params();

        // Below the overheat time the duty passes
        assert_eq!(prot.apply(80.0, 0.0, 0.1, &p), 80.0);
        assert_eq!(prot.apply(80.0, 1.0, 0.1, &p), 80.0);

        // Past the overheat time the motor is forced off
        assert_eq!(prot.apply(80.0, 2.5, 0.1, &p), 0.0);
        assert!(prot.overheated());

        // Still off mid cooldown, whatever is requested
        assert_eq!(prot.apply(100.0, 5.0, 0.1, &p), 0.0);
        assert!(prot.overheated());

        // After the cooldown window normal operation resumes
        assert_eq!(prot.apply(40.0, 8.0, 0.1, &p), 40.0);
        assert!(!prot.overheated());
    }

    #[test]
    fn brief_spikes_do_not_trip() {
        let mut prot = MotorProtection::default();
        let p = params();

        assert_eq!(prot.apply(90.0, 0.0, 0.1, &p), 90.0);
        // Dropping below the threshold resets the timer
        assert_eq!(prot.apply(10.0, 1.0, 0.1, &p), 10.0);
        assert_eq!(prot.apply(90.0, 2.5, 0.1, &p), 90.0);
        assert!(!prot.overheated());
    }

    #[test]
    fn mah_accumulates_with_duty() {
        let mut prot = MotorProtection::default();
        let p = params();

        // 100% duty of a 1000 mA motor for one hour is 1000 mAh
        prot.apply(100.0, 0.0, 3600.0, &p);
        assert!((prot.mah_total() - 1000.0).abs() < 1e-9);
    }
}
