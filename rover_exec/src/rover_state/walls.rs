//! Wall geometry estimation from the radar bearings.
//!
//! Three bearings spanning a 90 degree quadrant on each side of the rover give the wall's angle
//! relative to the forward axis and its perpendicular distance. Two trigonometric forms are
//! available, anchored on the front or back diagonal, the shorter diagonal is used so the
//! estimate stays usable close to a corner where the longer diagonal no longer sees the wall.
//!
//! The diagonal-ratio thresholds used for gap classification are empirically tuned values
//! carried over from field calibration, not derived from the geometry. Treat them as
//! calibration-time tunables.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::samples::Radar;
use comms_if::eqpt::sensor::RadarMsg;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Distance substituted for rejected or out-of-range radar readings.
///
/// Units: millimetres
pub const RADAR_DIST_FAR_MM: f64 = 4000.0;

/// Side readings below this are treated as touching the wall, the perpendicular distance is
/// reported as exactly zero.
///
/// Units: millimetres
pub const WALL_CONTACT_MM: f64 = 1.0;

/// Diagonal-to-side ratio above which the wall is considered to fall away into a chicane.
pub const CHICANE_RATIO: f64 = 1.2;

/// Diagonal-to-side ratio above which the wall is considered to end at a corner.
pub const CORNER_RATIO: f64 = 2.0;

/// Projection of a 45 degree diagonal reading onto the side axis.
const COS_45: f64 = std::f64::consts::FRAC_1_SQRT_2;

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// The side of the rover a wall estimate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallSide {
    Left,
    Right,
}

/// Classification of the gap in the wall beside the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GapClass {
    /// The wall is continuous.
    None,

    /// The wall ends, the rover can turn around it.
    Corner,

    /// The wall steps away but continues, an offset passage.
    Chicane,
}

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Derived geometry of the wall on one side of the rover.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WallEstimate {
    /// Wall angle relative to the rover's forward axis, degrees.
    ///
    /// Follows the right hand rule about the rover's Z+ axis: a positive angle means the wall
    /// is rotated anticlockwise relative to the rover's track. Mirroring the radar readings
    /// onto the other side negates the angle.
    pub ang_deg: f64,

    /// Perpendicular distance to the wall, millimetres.
    pub dist_mm: f64,

    /// Forward clearance on this side before the wall ahead, millimetres.
    pub front_dist_mm: f64,
}

/// Tuning for the estimator thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WallParams {
    /// See [`CHICANE_RATIO`].
    pub chicane_ratio: f64,

    /// See [`CORNER_RATIO`].
    pub corner_ratio: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for GapClass {
    fn default() -> Self {
        GapClass::None
    }
}

impl Default for WallParams {
    fn default() -> Self {
        Self {
            chicane_ratio: CHICANE_RATIO,
            corner_ratio: CORNER_RATIO,
        }
    }
}

impl GapClass {
    /// Fixed byte encoding used in telemetry records.
    pub fn as_u8(self) -> u8 {
        match self {
            GapClass::None => 0,
            GapClass::Corner => 1,
            GapClass::Chicane => 2,
        }
    }
}

impl WallSide {
    /// The radar bearings spanning this side's quadrant: (front diagonal, side, back diagonal).
    ///
    /// Bearings are measured anticlockwise from the forward axis, so the left quadrant is
    /// 45/90/135 and the right quadrant 315/270/225.
    pub fn bearings(self) -> (u32, u32, u32) {
        match self {
            WallSide::Left => (45, 90, 135),
            WallSide::Right => (315, 270, 225),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Estimate the wall geometry on one side of the rover.
pub fn estimate_wall(radar: &Radar, side: WallSide) -> WallEstimate {
    let (df, ds, db) = side_readings(radar, side);

    // The wall's angle of approach, positive when the rover's nose is closing on the wall.
    //
    // Anchor the estimate on whichever diagonal is shorter: near a corner the longer diagonal
    // shoots past the wall end and the formula anchored on it becomes singular.
    let approach_rad = if df < db {
        (ds - df * COS_45).atan2(df * COS_45)
    } else {
        (db * COS_45 - ds).atan2(db * COS_45)
    };

    // Map the side-relative approach into the body frame sign convention
    let ang_deg = match side {
        WallSide::Left => approach_rad.to_degrees(),
        WallSide::Right => -approach_rad.to_degrees(),
    };

    // Perpendicular distance, with a hard zero when the side reading says we are touching
    let dist_mm = if ds < WALL_CONTACT_MM {
        0.0
    } else {
        ds * approach_rad.cos()
    };

    WallEstimate {
        ang_deg,
        dist_mm,
        front_dist_mm: df * COS_45,
    }
}

/// Classify the gap in the wall on one side of the rover.
pub fn classify_gap(radar: &Radar, side: WallSide, params: &WallParams) -> GapClass {
    let (df, ds, _) = side_readings(radar, side);

    if ds < WALL_CONTACT_MM {
        return GapClass::None;
    }

    let ratio = df * COS_45 / ds;

    if ratio >= params.corner_ratio {
        GapClass::Corner
    } else if ratio >= params.chicane_ratio {
        GapClass::Chicane
    } else {
        GapClass::None
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The (front diagonal, side, back diagonal) distances for one side.
fn side_readings(radar: &Radar, side: WallSide) -> (f64, f64, f64) {
    let (bf, bs, bb) = side.bearings();

    let at = |bearing| radar.dist_mm[RadarMsg::bearing_index(bearing).unwrap()];

    (at(bf), at(bs), at(bb))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Build a radar snapshot from (bearing, distance) pairs, all other bearings far.
    fn radar(pairs: &[(u32, f64)]) -> Radar {
        let mut r = Radar {
            dist_mm: [RADAR_DIST_FAR_MM; 8],
            status: [0; 8],
        };

        for &(bearing, dist) in pairs {
            r.dist_mm[RadarMsg::bearing_index(bearing).unwrap()] = dist;
        }

        r
    }

    #[test]
    fn parallel_wall_has_zero_angle() {
        // A wall parallel to the track at 400 mm: the diagonal sees it at 400/cos45
        let d_diag = 400.0 / COS_45;
        let r = radar(&[(45, d_diag), (90, 400.0), (135, d_diag)]);

        let est = estimate_wall(&r, WallSide::Left);
        assert!(est.ang_deg.abs() < 1e-9);
        assert!((est.dist_mm - 400.0).abs() < 1e-9);
    }

    #[test]
    fn wall_angle_is_mirror_symmetric() {
        let left = radar(&[(45, 500.0), (90, 400.0), (135, 600.0)]);
        let right = radar(&[(315, 500.0), (270, 400.0), (225, 600.0)]);

        let l = estimate_wall(&left, WallSide::Left);
        let r = estimate_wall(&right, WallSide::Right);

        assert!((l.ang_deg + r.ang_deg).abs() < 1e-9);
        assert!((l.dist_mm - r.dist_mm).abs() < 1e-9);
    }

    #[test]
    fn closing_wall_has_positive_left_angle() {
        // Front diagonal shorter than parallel: the nose is closing on the left wall
        let r = radar(&[(45, 500.0), (90, 400.0), (135, 600.0)]);

        let est = estimate_wall(&r, WallSide::Left);
        assert!(est.ang_deg > 0.0);
        assert!(est.dist_mm < 400.0);
        assert!(est.dist_mm > 390.0);
    }

    #[test]
    fn back_anchored_branch_used_near_corner() {
        // Back diagonal shorter: anchor on it, estimate must stay finite and sane
        let r = radar(&[(45, 2000.0), (90, 400.0), (135, 420.0)]);

        let est = estimate_wall(&r, WallSide::Left);
        assert!(est.ang_deg.is_finite());
        assert!(est.dist_mm.is_finite());
    }

    #[test]
    fn contact_reading_gives_zero_distance() {
        let r = radar(&[(45, 10.0), (90, 0.5), (135, 10.0)]);

        let est = estimate_wall(&r, WallSide::Left);
        assert_eq!(est.dist_mm, 0.0);
    }

    #[test]
    fn gap_classification_thresholds() {
        let params = WallParams::default();

        // Continuous wall
        let r = radar(&[(45, 500.0), (90, 400.0), (135, 600.0)]);
        assert_eq!(classify_gap(&r, WallSide::Left, &params), GapClass::None);

        // Front diagonal opens slightly: chicane
        let r = radar(&[(45, 700.0), (90, 400.0), (135, 600.0)]);
        assert_eq!(classify_gap(&r, WallSide::Left, &params), GapClass::Chicane);

        // Front diagonal opens completely: corner
        let r = radar(&[(45, 1500.0), (90, 400.0), (135, 600.0)]);
        assert_eq!(classify_gap(&r, WallSide::Left, &params), GapClass::Corner);
    }
}
