//! # engine
//!
//! Per-measurement pipeline of the server:
//!
//! 1. drop our own published values (same source label)
//! 2. fold the measurement into the fused state
//! 3. re-derive true wind when boat speed or apparent wind changed
//!    (an unsolvable triangle blocks recording until the next solved one)
//! 4. ask the gate whether the current state is a clean sample
//! 5. offer the sample to the dynamic table
//!
//! The performance tick reads the fused state separately through
//! [`PolarEngine::performance`].

use std::sync::Arc;

use polar_engine::{
    paths, wind, DynamicUpdater, Field, FusedState, GateConfig, Measurement, PerformanceOutput,
    PerformanceQuery, PolarError, PolarTable, Rejection, Sample, SampleGate, TableRegistry, UpdateOutcome,
};
use tracing::debug;

/// What one measurement produced.
#[derive(Debug, Default)]
pub struct Processed {
    /// Derived values to publish
    pub deltas: Vec<(&'static str, f64)>,
    pub timestamp: f64,
    /// Snapshot of the dynamic table when this measurement improved it
    pub improved: Option<Arc<PolarTable>>,
}

pub struct PolarEngine {
    fused: FusedState,
    gate: SampleGate,
    updater: Option<DynamicUpdater>,
    registry: TableRegistry,
    source_label: String,
    /// Last derivation solved the angle, so true wind angle and VMG are current
    true_wind_valid: bool,
}

impl PolarEngine {
    pub fn new(
        registry: TableRegistry,
        gate: GateConfig,
        updater: Option<DynamicUpdater>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            fused: FusedState::new(),
            gate: SampleGate::new(gate),
            updater,
            registry,
            source_label: source_label.into(),
            true_wind_valid: false,
        }
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TableRegistry {
        &mut self.registry
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn on_measurement(&mut self, m: &Measurement) -> Processed {
        let mut out = Processed {
            timestamp: m.timestamp,
            ..Processed::default()
        };

        if m.source.as_deref() == Some(self.source_label.as_str()) {
            return out;
        }

        let engine_path = self.gate.config().engine.path().map(str::to_string);
        let Some(field) = self.fused.apply(m, engine_path.as_deref()) else {
            return out;
        };

        if field.feeds_true_wind() {
            out.deltas = self.derive_true_wind(m.timestamp);
        }

        out.improved = self.record();
        out
    }

    fn derive_true_wind(&mut self, timestamp: f64) -> Vec<(&'static str, f64)> {
        let (Some(stw), Some(aws), Some(awa)) = (
            self.fused.speed_through_water,
            self.fused.apparent_wind_speed,
            self.fused.apparent_wind_angle,
        ) else {
            return Vec::new();
        };

        let tw = wind::solve(stw.value, aws.value, awa.value);
        let mut deltas = Vec::with_capacity(3);
        self.true_wind_valid = tw.angle.is_some();

        self.fused.set(Field::TrueWindSpeed, tw.speed, timestamp);
        deltas.push((paths::TRUE_WIND_SPEED, tw.speed));
        if let (Some(angle), Some(vmg)) = (tw.angle, tw.vmg) {
            self.fused.set(Field::TrueWindAngle, angle, timestamp);
            self.fused.set(Field::VelocityMadeGood, vmg, timestamp);
            deltas.push((paths::TRUE_WIND_ANGLE, angle));
            deltas.push((paths::VELOCITY_MADE_GOOD, vmg));
        }
        deltas
    }

    /// Run the gate and offer the sample to the dynamic table.
    fn record(&mut self) -> Option<Arc<PolarTable>> {
        let updater = self.updater.as_ref()?;
        let dynamic_id = self.registry.dynamic_id()?;
        if !self.true_wind_valid {
            return None;
        }

        let time_max = match self.gate.evaluate(&self.fused) {
            Ok(t) => t,
            Err(Rejection::Incomplete | Rejection::AlreadyStored) => return None,
            Err(reason) => {
                debug!("Sample not recorded: {}", PolarError::from(reason));
                return None;
            }
        };

        let sample = self.sample(time_max)?;
        let table = self.registry.dynamic_mut()?;
        match updater.apply(table, &sample) {
            Ok(UpdateOutcome::Improved { .. }) => {
                self.gate.mark_stored(time_max);
                self.registry.get(dynamic_id)
            }
            Ok(UpdateOutcome::Discarded) => None,
            Err(e @ PolarError::IndexOutOfRange { .. }) => {
                debug!("Sample outside the dynamic grid: {e}");
                None
            }
            Err(e) => {
                debug!("Sample rejected: {e}");
                None
            }
        }
    }

    fn sample(&self, timestamp: f64) -> Option<Sample> {
        Some(Sample {
            true_wind_speed: self.fused.true_wind_speed?.value,
            true_wind_angle: self.fused.true_wind_angle?.value,
            boat_speed: self.fused.speed_through_water?.value,
            vmg: self.fused.velocity_made_good?.value,
            timestamp,
        })
    }

    /// Targets and polar ratio for the current conditions against the active table.
    pub fn performance(&self) -> Option<PerformanceOutput> {
        let table = self.registry.active()?;
        let tws = self.fused.true_wind_speed?.value;
        let twa = self.fused.true_wind_angle?.value;
        let stw = self.fused.speed_through_water?.value;
        Some(PerformanceQuery::new(&table).evaluate(tws, twa, stw))
    }
}
