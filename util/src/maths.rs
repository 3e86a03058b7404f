//! Utility maths functions
//!
//! Angle arithmetic here works in degrees since that is the unit used on the
//! sensor and actuator wire formats.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Modulus at which the wheel odometer tick counters wrap.
pub const ODO_TICK_MODULUS: i32 = 32768;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors from checked maths functions.
#[derive(Debug, Clone, Copy, Error)]
pub enum MathsError {
    #[error("Argument {0} is outside the domain of {1}")]
    DomainError(f64, &'static str),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Clamp a value between a minimum and maximum.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Normalise an angle in degrees into the range [0, 360).
pub fn norm_ang_deg(ang_deg: f64) -> f64 {
    let a = ang_deg % 360.0;
    if a < 0.0 {
        a + 360.0
    }
    else {
        a
    }
}

/// Get the signed smallest difference `a - b` between two angles in degrees.
///
/// The result is in the range [-180, 180), accounting for wrapping at 360.
pub fn ang_diff_deg(a_deg: f64, b_deg: f64) -> f64 {
    let mut d = (a_deg - b_deg) % 360.0;

    if d < -180.0 {
        d += 360.0;
    }
    if d >= 180.0 {
        d -= 360.0;
    }

    d
}

/// Unwrap the difference between two odometer tick counts.
///
/// The counters wrap at [`ODO_TICK_MODULUS`], so the raw difference across the
/// wrap boundary would be a huge jump. This returns the smallest continuous
/// delta instead.
pub fn unwrap_ticks(new: i32, old: i32) -> i32 {
    let mut d = (new - old) % ODO_TICK_MODULUS;

    if d < -ODO_TICK_MODULUS / 2 {
        d += ODO_TICK_MODULUS;
    }
    if d >= ODO_TICK_MODULUS / 2 {
        d -= ODO_TICK_MODULUS;
    }

    d
}

/// Arcsine which reports out-of-domain arguments as an error rather than NaN.
///
/// Noisy sensor input can push trig arguments outside [-1, 1], the caller
/// chooses the fallback output for that case.
pub fn asin_checked(value: f64) -> Result<f64, MathsError> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(MathsError::DomainError(value, "asin"));
    }

    Ok(value.asin())
}

/// Arccosine which reports out-of-domain arguments as an error rather than NaN.
pub fn acos_checked(value: f64) -> Result<f64, MathsError> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(MathsError::DomainError(value, "acos"));
    }

    Ok(value.acos())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ang_diff_deg() {
        assert_eq!(ang_diff_deg(2.0, 1.0), 1.0);
        assert_eq!(ang_diff_deg(1.0, 2.0), -1.0);
        assert_eq!(ang_diff_deg(0.0, 360.0), 0.0);
        assert_eq!(ang_diff_deg(359.0, 1.0), -2.0);
        assert_eq!(ang_diff_deg(1.0, 359.0), 2.0);
        assert_eq!(ang_diff_deg(180.0, 0.0), -180.0);

        // Range and antisymmetry over a sweep of pairs
        let mut a = 0.0;
        while a < 360.0 {
            let mut b = 0.0;
            while b < 360.0 {
                let d = ang_diff_deg(a, b);
                assert!((-180.0..180.0).contains(&d), "diff({}, {}) = {}", a, b, d);

                // Antisymmetric up to the 360 wrap
                let e = ang_diff_deg(b, a);
                assert!(
                    (d + e).abs() < 1e-9 || (d + e - 360.0).abs() < 1e-9,
                    "diff({}, {}) = {}, diff({}, {}) = {}", a, b, d, b, a, e
                );

                // Adding the difference back onto b recovers a
                assert!(
                    (norm_ang_deg(d + b) - norm_ang_deg(a)).abs() < 1e-9,
                    "round trip failed for a = {}, b = {}", a, b
                );

                b += 7.3;
            }
            a += 11.1;
        }
    }

    #[test]
    fn test_norm_ang_deg() {
        assert_eq!(norm_ang_deg(0.0), 0.0);
        assert_eq!(norm_ang_deg(360.0), 0.0);
        assert_eq!(norm_ang_deg(-90.0), 270.0);
        assert_eq!(norm_ang_deg(450.0), 90.0);
    }

    #[test]
    fn test_unwrap_ticks() {
        // Continuous across the wrap boundary
        assert_eq!(unwrap_ticks(5, 32760), 13);
        assert_eq!(unwrap_ticks(32760, 5), -13);

        // Plain deltas away from the boundary
        assert_eq!(unwrap_ticks(105, 100), 5);
        assert_eq!(unwrap_ticks(100, 105), -5);
        assert_eq!(unwrap_ticks(100, 100), 0);
    }

    #[test]
    fn test_checked_trig() {
        assert!(asin_checked(0.5).is_ok());
        assert!(asin_checked(1.0).is_ok());
        assert!(asin_checked(1.01).is_err());
        assert!(asin_checked(-1.01).is_err());
        assert!(asin_checked(std::f64::NAN).is_err());

        assert!(acos_checked(-1.0).is_ok());
        assert!(acos_checked(-1.2).is_err());
    }
}
