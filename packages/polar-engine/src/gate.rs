//! # gate
//!
//! Decides, on every fused update, whether the current sample is clean enough to record
//! into the dynamic polar.
//!
//! A sample is eligible iff:
//!   1. recording is enabled (`doNotStore` disables it)
//!   2. speed through water, apparent wind angle/speed and COG are all known and their
//!      timestamps span less than `max_interval` (2 s)
//!   3. the engine is not running
//!   4. the course is stable (`|rate of turn| < limit`, or rate of turn unknown)
//!   5. nothing was stored within the last second (`last_stored < timeMax − 1`)

use std::f64::consts::PI;

use thiserror::Error;

use crate::error::PolarError;
use crate::fused::{EngineReading, FusedState};

/// Rate of turn arrives in rad/s, the limit is configured in deg/min.
const RAD_PER_SEC_TO_DEG_PER_MIN: f64 = 180.0 / PI * 60.0;

/// Max spread between the sample's field timestamps, seconds.
pub const MAX_INTERVAL: f64 = 2.0;

/// Engine data this much older than the sample counts as "engine off", seconds.
pub const ENGINE_STALE_AFTER: f64 = 10.0;

// ── Engine monitoring ─────────────────────────────────────────────────────────

/// How engine status is monitored. Recording only happens with the engine off.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineMonitor {
    /// Assume the engine is always off
    #[default]
    AlwaysOff,
    /// Running when the value at this path is ≥ 1
    Revolutions(String),
    /// Running when the value at this path is `"started"`
    State(String),
    /// Never record
    DoNotStore,
}

impl EngineMonitor {
    /// Parse a configured mode. `*` in a path is replaced by `instance`
    /// (`propulsion.*.state` + `port` → `propulsion.port.state`).
    pub fn parse(mode: &str, instance: Option<&str>) -> Result<Self, PolarError> {
        match mode {
            "alwaysOff" | "AlwaysOff" => return Ok(Self::AlwaysOff),
            "doNotStore" => return Ok(Self::DoNotStore),
            _ => {}
        }

        let path = if mode.contains('*') {
            let instance = instance.filter(|i| !i.is_empty()).ok_or_else(|| {
                PolarError::InvalidConfig(format!("engine mode {mode} needs an engine instance"))
            })?;
            mode.replace('*', instance)
        } else {
            mode.to_string()
        };

        if path.ends_with(".revolutions") {
            Ok(Self::Revolutions(path))
        } else if path.ends_with(".state") {
            Ok(Self::State(path))
        } else {
            Err(PolarError::InvalidConfig(format!("unknown engine mode {mode}")))
        }
    }

    /// The measurement path to subscribe to, if this mode watches one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Revolutions(p) | Self::State(p) => Some(p),
            Self::AlwaysOff | Self::DoNotStore => None,
        }
    }

    /// Missing or stale engine data counts as "off".
    pub fn is_running(&self, engine: Option<&EngineReading>, time_max: f64) -> bool {
        let Some(reading) = engine else {
            return false;
        };
        if time_max - reading.timestamp > ENGINE_STALE_AFTER {
            return false;
        }
        match self {
            Self::AlwaysOff | Self::DoNotStore => false,
            Self::Revolutions(_) => reading.value.as_f64().is_some_and(|rev| rev >= 1.0),
            Self::State(_) => reading.value.as_str() == Some("started"),
        }
    }
}

// ── Gate ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub engine: EngineMonitor,
    /// deg/min
    pub rate_of_turn_limit: f64,
    /// seconds
    pub max_interval: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            engine: EngineMonitor::AlwaysOff,
            rate_of_turn_limit: 5.0,
            max_interval: MAX_INTERVAL,
        }
    }
}

/// Why a sample was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("recording disabled")]
    RecordingDisabled,
    #[error("required fields not yet received")]
    Incomplete,
    #[error("fields too far apart in time")]
    Stale,
    #[error("engine running")]
    EngineRunning,
    #[error("vessel turning")]
    Turning,
    #[error("already stored this second")]
    AlreadyStored,
}

impl From<Rejection> for PolarError {
    fn from(r: Rejection) -> Self {
        PolarError::StaleData(r.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SampleGate {
    config: GateConfig,
    engine_running: bool,
    stable_course: bool,
    last_stored: f64,
}

impl SampleGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            engine_running: false,
            stable_course: true,
            last_stored: f64::NEG_INFINITY,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn engine_running(&self) -> bool {
        self.engine_running
    }

    pub fn stable_course(&self) -> bool {
        self.stable_course
    }

    pub fn last_stored(&self) -> f64 {
        self.last_stored
    }

    /// Evaluate the current fused state. On success returns `timeMax`, the instant the
    /// sample represents; pass it to [`SampleGate::mark_stored`] once the update landed.
    pub fn evaluate(&mut self, fused: &FusedState) -> Result<f64, Rejection> {
        if self.config.engine == EngineMonitor::DoNotStore {
            return Err(Rejection::RecordingDisabled);
        }

        let (time_min, time_max) = fused.sample_window().ok_or(Rejection::Incomplete)?;

        self.engine_running = self.config.engine.is_running(fused.engine.as_ref(), time_max);
        self.stable_course = match fused.rate_of_turn {
            Some(rot) => (rot.value * RAD_PER_SEC_TO_DEG_PER_MIN).abs() < self.config.rate_of_turn_limit,
            None => true,
        };

        if time_max - time_min >= self.config.max_interval {
            return Err(Rejection::Stale);
        }
        if self.engine_running {
            return Err(Rejection::EngineRunning);
        }
        if !self.stable_course {
            return Err(Rejection::Turning);
        }
        if self.last_stored >= time_max - 1.0 {
            return Err(Rejection::AlreadyStored);
        }
        Ok(time_max)
    }

    pub fn mark_stored(&mut self, time_max: f64) {
        if time_max > self.last_stored {
            self.last_stored = time_max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fused::{Field, Measurement};

    fn fused_at(t: f64) -> FusedState {
        let mut fused = FusedState::new();
        fused.set(Field::SpeedThroughWater, 3.0, t);
        fused.set(Field::ApparentWindAngle, 0.6, t);
        fused.set(Field::ApparentWindSpeed, 8.0, t);
        fused.set(Field::CourseOverGround, 1.0, t);
        fused
    }

    #[test]
    fn test_parse_engine_modes() {
        assert_eq!(EngineMonitor::parse("alwaysOff", None), Ok(EngineMonitor::AlwaysOff));
        assert_eq!(EngineMonitor::parse("doNotStore", None), Ok(EngineMonitor::DoNotStore));
        assert_eq!(
            EngineMonitor::parse("propulsion.*.state", Some("port")),
            Ok(EngineMonitor::State("propulsion.port.state".into()))
        );
        assert_eq!(
            EngineMonitor::parse("propulsion.main.revolutions", None),
            Ok(EngineMonitor::Revolutions("propulsion.main.revolutions".into()))
        );
        assert!(EngineMonitor::parse("propulsion.*.state", None).is_err());
        assert!(EngineMonitor::parse("propulsion.main.temperature", None).is_err());
    }

    #[test]
    fn test_clean_sample_is_eligible_once_per_second() {
        let mut gate = SampleGate::new(GateConfig::default());
        let fused = fused_at(100.0);
        assert_eq!(gate.evaluate(&fused), Ok(100.0));
        gate.mark_stored(100.0);
        assert_eq!(gate.evaluate(&fused_at(100.5)), Err(Rejection::AlreadyStored));
        assert_eq!(gate.evaluate(&fused_at(101.0)), Err(Rejection::AlreadyStored));
        assert_eq!(gate.evaluate(&fused_at(101.1)), Ok(101.1));
    }

    #[test]
    fn test_missing_fields_are_ineligible() {
        let mut gate = SampleGate::new(GateConfig::default());
        let mut fused = FusedState::new();
        fused.set(Field::SpeedThroughWater, 3.0, 1.0);
        assert_eq!(gate.evaluate(&fused), Err(Rejection::Incomplete));
    }

    #[test]
    fn test_time_spread_too_large_is_stale() {
        let mut gate = SampleGate::new(GateConfig::default());
        let mut fused = fused_at(100.0);
        fused.set(Field::CourseOverGround, 1.0, 102.0);
        assert_eq!(gate.evaluate(&fused), Err(Rejection::Stale));
    }

    #[test]
    fn test_engine_running_blocks_regardless_of_course() {
        let engine = EngineMonitor::State("propulsion.main.state".into());
        let mut gate = SampleGate::new(GateConfig { engine: engine.clone(), ..GateConfig::default() });
        let mut fused = fused_at(100.0);
        fused.apply(
            &Measurement::new("propulsion.main.state", "started", 99.0),
            engine.path(),
        );
        assert_eq!(gate.evaluate(&fused), Err(Rejection::EngineRunning));
        assert!(gate.engine_running());
        assert!(gate.stable_course());

        fused.set(Field::RateOfTurn, 0.5, 100.0);
        assert_eq!(gate.evaluate(&fused), Err(Rejection::EngineRunning));
    }

    #[test]
    fn test_revolutions_threshold_and_staleness() {
        let engine = EngineMonitor::Revolutions("propulsion.main.revolutions".into());
        let mut gate = SampleGate::new(GateConfig { engine: engine.clone(), ..GateConfig::default() });
        let mut fused = fused_at(100.0);

        fused.apply(&Measurement::new("propulsion.main.revolutions", 0.5, 99.0), engine.path());
        assert_eq!(gate.evaluate(&fused), Ok(100.0));

        fused.apply(&Measurement::new("propulsion.main.revolutions", 1.0, 99.5), engine.path());
        assert_eq!(gate.evaluate(&fused), Err(Rejection::EngineRunning));

        // engine sensor silent for more than 10 s
        let mut later = fused_at(120.0);
        later.engine = fused.engine.clone();
        assert_eq!(gate.evaluate(&later), Ok(120.0));
    }

    #[test]
    fn test_turning_is_rejected() {
        let mut gate = SampleGate::new(GateConfig::default());
        let mut fused = fused_at(100.0);
        // 0.01 rad/s ≈ 34 deg/min
        fused.set(Field::RateOfTurn, -0.01, 100.0);
        assert_eq!(gate.evaluate(&fused), Err(Rejection::Turning));
        assert!(!gate.stable_course());
        // 0.001 rad/s ≈ 3.4 deg/min
        fused.set(Field::RateOfTurn, 0.001, 100.0);
        assert_eq!(gate.evaluate(&fused), Ok(100.0));
    }

    #[test]
    fn test_do_not_store_disables_recording() {
        let mut gate = SampleGate::new(GateConfig {
            engine: EngineMonitor::DoNotStore,
            ..GateConfig::default()
        });
        assert_eq!(gate.evaluate(&fused_at(100.0)), Err(Rejection::RecordingDisabled));
    }
}
