//! # query
//!
//! Real-time lookups against a polar table: polar speed at the current wind, the
//! performance ratio, and beat/gybe targets.
//!
//! Lookups use floor-to-nearest: the chosen grid point is the last one not exceeding the
//! query value, clamped to the table's ends. Values are then linearly interpolated between
//! that point and the next, first along the angle axis inside a wind bucket and then
//! across the two wind buckets around the query. Nothing is extrapolated beyond the
//! table: at either end only the angle axis is interpolated.

use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use crate::error::PolarError;
use crate::paths;
use crate::table::{Optimum, PolarTable, Tack, WindSpeedBucket};

/// Index of the last entry `<= value` in an ascending slice, clamped to `[0, len − 1]`.
pub fn closest(value: f64, sorted: &[f64]) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }
    let not_exceeding = sorted.partition_point(|&x| x <= value);
    Some(not_exceeding.saturating_sub(1))
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Boat speed at `twa` inside one bucket. Only slots holding a speed take part.
fn speed_at_angle(bucket: &WindSpeedBucket, twa: f64) -> Option<f64> {
    let points: Vec<(f64, f64)> = bucket
        .angle_data
        .iter()
        .filter_map(|e| e.speed.map(|s| (e.angle, s)))
        .collect();
    let angles: Vec<f64> = points.iter().map(|p| p.0).collect();
    let i = closest(twa, &angles)?;

    let (a0, s0) = points[i];
    match points.get(i + 1) {
        Some(&(a1, s1)) if twa > a0 => Some(lerp(twa, a0, a1, s0, s1)),
        _ => Some(s0),
    }
}

/// Where `tws` sits on the wind axis.
struct WindBracket {
    lower: usize,
    /// Upper bucket, when `tws` lies strictly between two buckets.
    upper: Option<usize>,
}

pub struct PerformanceQuery<'a> {
    table: &'a PolarTable,
    wind_speeds: Vec<f64>,
}

impl<'a> PerformanceQuery<'a> {
    pub fn new(table: &'a PolarTable) -> Self {
        Self {
            table,
            wind_speeds: table.wind_speeds(),
        }
    }

    fn bracket(&self, tws: f64) -> Option<WindBracket> {
        let lower = closest(tws, &self.wind_speeds)?;
        let upper = (tws > self.wind_speeds[lower] && lower + 1 < self.wind_speeds.len())
            .then_some(lower + 1);
        Some(WindBracket { lower, upper })
    }

    /// Evaluate `f` at the bracketing buckets and blend across wind speed.
    fn across_wind<T>(
        &self,
        tws: f64,
        f: impl Fn(&WindSpeedBucket) -> Option<T>,
        mix: impl Fn(f64, &T, &T) -> T,
    ) -> Option<T> {
        let bracket = self.bracket(tws)?;
        let lo_bucket = &self.table.wind_data[bracket.lower];
        let lo = f(lo_bucket);
        let Some(upper) = bracket.upper else {
            return lo;
        };
        let hi_bucket = &self.table.wind_data[upper];
        match (lo, f(hi_bucket)) {
            (Some(lo), Some(hi)) => {
                let t = (tws - lo_bucket.true_wind_speed)
                    / (hi_bucket.true_wind_speed - lo_bucket.true_wind_speed);
                Some(mix(t, &lo, &hi))
            }
            (lo, hi) => lo.or(hi),
        }
    }

    /// Interpolated polar boat speed at (tws, twa).
    pub fn polar_speed(&self, tws: f64, twa: f64) -> Result<f64, PolarError> {
        self.across_wind(tws, |b| speed_at_angle(b, twa), |t, lo, hi| lo + (hi - lo) * t)
            .ok_or(PolarError::LookupMiss("polar speed"))
    }

    fn optimum(
        &self,
        tws: f64,
        pick: impl Fn(&WindSpeedBucket) -> Option<Optimum>,
    ) -> Option<Optimum> {
        self.across_wind(tws, pick, |t, lo, hi| Optimum {
            angle: lo.angle + (hi.angle - lo.angle) * t,
            speed: lo.speed + (hi.speed - lo.speed) * t,
        })
    }

    pub fn beat(&self, tws: f64, tack: Tack) -> Result<Optimum, PolarError> {
        self.optimum(tws, |b| b.optimal_beat(tack))
            .ok_or(PolarError::LookupMiss("beat angle"))
    }

    pub fn gybe(&self, tws: f64, tack: Tack) -> Result<Optimum, PolarError> {
        self.optimum(tws, |b| b.optimal_gybe(tack))
            .ok_or(PolarError::LookupMiss("gybe angle"))
    }

    /// Everything the display needs for the current conditions. Outputs without data
    /// are left out.
    pub fn evaluate(&self, tws: f64, twa: f64, boat_speed: f64) -> PerformanceOutput {
        let tack = Tack::of(twa);
        let beat = self.beat(tws, tack).ok();
        let gybe = self.gybe(tws, tack).ok();
        let polar_speed = self.polar_speed(tws, twa).ok();
        let target = if twa.abs() < FRAC_PI_2 { beat } else { gybe };

        PerformanceOutput {
            beat_angle: beat.map(|o| o.angle),
            beat_angle_target_speed: beat.map(|o| o.speed),
            beat_angle_velocity_made_good: beat.map(|o| o.vmg()),
            gybe_angle: gybe.map(|o| o.angle),
            gybe_angle_target_speed: gybe.map(|o| o.speed),
            gybe_angle_velocity_made_good: gybe.map(|o| o.vmg()),
            target_angle: target.map(|o| o.angle),
            target_speed: target.map(|o| o.speed),
            polar_speed,
            polar_speed_ratio: polar_speed.filter(|p| *p > 0.0).map(|p| boat_speed / p),
        }
    }
}

/// Result of one performance tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceOutput {
    pub beat_angle: Option<f64>,
    pub beat_angle_target_speed: Option<f64>,
    pub beat_angle_velocity_made_good: Option<f64>,
    pub gybe_angle: Option<f64>,
    pub gybe_angle_target_speed: Option<f64>,
    pub gybe_angle_velocity_made_good: Option<f64>,
    pub target_angle: Option<f64>,
    pub target_speed: Option<f64>,
    pub polar_speed: Option<f64>,
    pub polar_speed_ratio: Option<f64>,
}

impl PerformanceOutput {
    /// `(path, value)` pairs for every output that has a value.
    pub fn deltas(&self) -> Vec<(&'static str, f64)> {
        [
            (paths::BEAT_ANGLE, self.beat_angle),
            (paths::BEAT_ANGLE_TARGET_SPEED, self.beat_angle_target_speed),
            (paths::BEAT_ANGLE_VMG, self.beat_angle_velocity_made_good),
            (paths::GYBE_ANGLE, self.gybe_angle),
            (paths::GYBE_ANGLE_TARGET_SPEED, self.gybe_angle_target_speed),
            (paths::GYBE_ANGLE_VMG, self.gybe_angle_velocity_made_good),
            (paths::TARGET_ANGLE, self.target_angle),
            (paths::TARGET_SPEED, self.target_speed),
            (paths::POLAR_SPEED, self.polar_speed),
            (paths::POLAR_SPEED_RATIO, self.polar_speed_ratio),
        ]
        .into_iter()
        .filter_map(|(path, value)| value.map(|v| (path, v)))
        .collect()
    }
}
