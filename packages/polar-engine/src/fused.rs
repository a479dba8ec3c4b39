//! # fused
//!
//! Latest known value of every input the engine cares about.
//!
//! One [`FusedState`] is owned by whoever drives the gate and updater; measurements are
//! folded into it with [`FusedState::apply`]. Fields are never cleared. A measurement
//! slightly older than the value held (reordered delivery) is ignored; one older by more
//! than [`REORDER_TOLERANCE`] replaces it, so a single future-stamped value cannot freeze
//! a field.

use serde::{Deserialize, Serialize};

use crate::paths;

/// Seconds a measurement may lag the held value and still be treated as reordered.
pub const REORDER_TOLERANCE: f64 = 5.0;

/// Whether a measurement at `incoming` is a reordered, out-of-date copy of `held`.
fn is_reordered(held: f64, incoming: f64) -> bool {
    incoming < held && held - incoming <= REORDER_TOLERANCE
}

// ── Measurement ───────────────────────────────────────────────────────────────

/// Value carried by a measurement. Engine `state` paths carry text (`"started"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl MeasurementValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for MeasurementValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One named physical quantity at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub path: String,
    pub value: MeasurementValue,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Source tag of the producer, used to drop our own published values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Measurement {
    pub fn new(path: impl Into<String>, value: impl Into<MeasurementValue>, timestamp: f64) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            timestamp,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ── Fused state ───────────────────────────────────────────────────────────────

/// A value with the timestamp of the measurement that set it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stamped {
    pub value: f64,
    pub timestamp: f64,
}

/// Engine indicator reading (text for `state`, number for `revolutions`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineReading {
    pub value: MeasurementValue,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    RateOfTurn,
    SpeedThroughWater,
    ApparentWindAngle,
    ApparentWindSpeed,
    TrueWindAngle,
    TrueWindSpeed,
    VelocityMadeGood,
    CourseOverGround,
    SpeedOverGround,
    Engine,
}

impl Field {
    pub fn from_path(path: &str) -> Option<Self> {
        Some(match path {
            paths::RATE_OF_TURN => Self::RateOfTurn,
            paths::SPEED_THROUGH_WATER => Self::SpeedThroughWater,
            paths::APPARENT_WIND_ANGLE => Self::ApparentWindAngle,
            paths::APPARENT_WIND_SPEED => Self::ApparentWindSpeed,
            paths::TRUE_WIND_ANGLE => Self::TrueWindAngle,
            paths::TRUE_WIND_SPEED => Self::TrueWindSpeed,
            paths::VELOCITY_MADE_GOOD => Self::VelocityMadeGood,
            paths::COURSE_OVER_GROUND => Self::CourseOverGround,
            paths::SPEED_OVER_GROUND => Self::SpeedOverGround,
            _ => return None,
        })
    }

    /// Inputs to the wind triangle; a change to any of these warrants a new derivation.
    pub fn feeds_true_wind(self) -> bool {
        matches!(
            self,
            Self::SpeedThroughWater | Self::ApparentWindAngle | Self::ApparentWindSpeed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedState {
    pub rate_of_turn: Option<Stamped>,
    pub speed_through_water: Option<Stamped>,
    pub apparent_wind_angle: Option<Stamped>,
    pub apparent_wind_speed: Option<Stamped>,
    pub true_wind_angle: Option<Stamped>,
    pub true_wind_speed: Option<Stamped>,
    pub velocity_made_good: Option<Stamped>,
    pub course_over_ground: Option<Stamped>,
    pub speed_over_ground: Option<Stamped>,
    pub engine: Option<EngineReading>,
}

impl FusedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one measurement in. Returns the field it updated, if any.
    ///
    /// `engine_path` is the engine indicator path being monitored, when there is one.
    pub fn apply(&mut self, m: &Measurement, engine_path: Option<&str>) -> Option<Field> {
        if engine_path == Some(m.path.as_str()) {
            if self.engine.as_ref().is_some_and(|e| is_reordered(e.timestamp, m.timestamp)) {
                return None;
            }
            self.engine = Some(EngineReading {
                value: m.value.clone(),
                timestamp: m.timestamp,
            });
            return Some(Field::Engine);
        }

        let field = Field::from_path(&m.path)?;
        let value = m.value.as_f64()?;
        self.set(field, value, m.timestamp).then_some(field)
    }

    /// Store a numeric value. Returns false if the slot holds something slightly newer.
    pub fn set(&mut self, field: Field, value: f64, timestamp: f64) -> bool {
        let Some(slot) = self.slot_mut(field) else {
            return false;
        };
        if slot.is_some_and(|s| is_reordered(s.timestamp, timestamp)) {
            return false;
        }
        *slot = Some(Stamped { value, timestamp });
        true
    }

    pub fn get(&self, field: Field) -> Option<Stamped> {
        match field {
            Field::RateOfTurn => self.rate_of_turn,
            Field::SpeedThroughWater => self.speed_through_water,
            Field::ApparentWindAngle => self.apparent_wind_angle,
            Field::ApparentWindSpeed => self.apparent_wind_speed,
            Field::TrueWindAngle => self.true_wind_angle,
            Field::TrueWindSpeed => self.true_wind_speed,
            Field::VelocityMadeGood => self.velocity_made_good,
            Field::CourseOverGround => self.course_over_ground,
            Field::SpeedOverGround => self.speed_over_ground,
            Field::Engine => None,
        }
    }

    fn slot_mut(&mut self, field: Field) -> Option<&mut Option<Stamped>> {
        Some(match field {
            Field::RateOfTurn => &mut self.rate_of_turn,
            Field::SpeedThroughWater => &mut self.speed_through_water,
            Field::ApparentWindAngle => &mut self.apparent_wind_angle,
            Field::ApparentWindSpeed => &mut self.apparent_wind_speed,
            Field::TrueWindAngle => &mut self.true_wind_angle,
            Field::TrueWindSpeed => &mut self.true_wind_speed,
            Field::VelocityMadeGood => &mut self.velocity_made_good,
            Field::CourseOverGround => &mut self.course_over_ground,
            Field::SpeedOverGround => &mut self.speed_over_ground,
            Field::Engine => return None,
        })
    }

    /// `(timeMin, timeMax)` over the fields a recorded sample is built from.
    /// `None` until all of them have been seen at least once.
    pub fn sample_window(&self) -> Option<(f64, f64)> {
        let stamps = [
            self.speed_through_water?.timestamp,
            self.apparent_wind_angle?.timestamp,
            self.apparent_wind_speed?.timestamp,
            self.course_over_ground?.timestamp,
        ];
        let min = stamps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = stamps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

/// Functional form of [`FusedState::apply`]: returns the updated state.
pub fn apply_measurement(mut state: FusedState, m: &Measurement, engine_path: Option<&str>) -> FusedState {
    state.apply(m, engine_path);
    state
}
