//! # wind
//!
//! Wind triangle solver. Pure functions, no state.
//!
//! ```text
//!   tws² = aws² + stw² − 2·aws·stw·cos(awa)
//!   cos(twa) = (aws·cos(awa) − stw) / tws
//!   vmg = stw · cos(twa)
//! ```

use std::f64::consts::PI;

use crate::error::PolarError;

/// True wind speed from boat speed and apparent wind (law of cosines).
pub fn true_wind_speed(boat_speed: f64, apparent_wind_speed: f64, apparent_wind_angle: f64) -> f64 {
    (apparent_wind_speed.powi(2) + boat_speed.powi(2)
        - 2.0 * apparent_wind_speed * boat_speed * apparent_wind_angle.cos())
    .sqrt()
}

/// True wind angle, signed like the apparent wind angle.
///
/// `awa == 0` gives exactly `0` and `awa == ±π` gives exactly `π`.
pub fn true_wind_angle(
    boat_speed: f64,
    true_wind_speed: f64,
    apparent_wind_speed: f64,
    apparent_wind_angle: f64,
) -> Result<f64, PolarError> {
    if apparent_wind_angle == 0.0 {
        return Ok(0.0);
    }
    if apparent_wind_angle.abs() == PI {
        return Ok(PI);
    }

    let cos_alpha = (apparent_wind_speed * apparent_wind_angle.cos() - boat_speed) / true_wind_speed;
    // NaN (tws == 0) fails this check too
    if !(-1.0..=1.0).contains(&cos_alpha) {
        return Err(PolarError::InvalidTriangle {
            aws: apparent_wind_speed,
            tws: true_wind_speed,
            stw: boat_speed,
        });
    }

    let alpha = cos_alpha.acos();
    Ok(if apparent_wind_angle < 0.0 { -alpha } else { alpha })
}

/// Velocity made good towards the wind. Positive upwind, negative downwind.
pub fn velocity_made_good(boat_speed: f64, true_wind_angle: f64) -> f64 {
    boat_speed * true_wind_angle.cos()
}

/// Result of solving the full triangle for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrueWind {
    pub speed: f64,
    /// `None` when the triangle was invalid.
    pub angle: Option<f64>,
    pub vmg: Option<f64>,
}

/// Derive true wind speed, angle and VMG in one go.
///
/// An invalid triangle still yields the speed; angle and VMG are left out for that tick.
pub fn solve(boat_speed: f64, apparent_wind_speed: f64, apparent_wind_angle: f64) -> TrueWind {
    let speed = true_wind_speed(boat_speed, apparent_wind_speed, apparent_wind_angle);
    match true_wind_angle(boat_speed, speed, apparent_wind_speed, apparent_wind_angle) {
        Ok(angle) => TrueWind {
            speed,
            angle: Some(angle),
            vmg: Some(velocity_made_good(boat_speed, angle)),
        },
        Err(e) => {
            tracing::debug!("{e}");
            TrueWind { speed, angle: None, vmg: None }
        }
    }
}
