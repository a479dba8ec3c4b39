//! # updater
//!
//! Grows the dynamic polar from gated samples.
//!
//! The grid has `ceil(maxWind / twsInterval)` wind buckets keyed by their upper bound
//! (`twsInterval`, `2·twsInterval`, …) and `round(2π / angleResolution)` angle slots
//! starting at `−π`. A slot only ever improves: a sample overwrites it when the slot is
//! empty or holds a lower boat speed, otherwise the sample is dropped.

use std::f64::consts::PI;

use tracing::debug;
use uuid::Uuid;

use crate::error::PolarError;
use crate::table::{AngleEntry, PolarTable, Tack, WindSpeedBucket};

/// Shape of the dynamic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// m/s
    pub tws_interval: f64,
    /// m/s
    pub max_wind: f64,
    /// radians
    pub angle_resolution: f64,
}

impl GridSpec {
    pub fn new(tws_interval: f64, max_wind: f64, angle_resolution_deg: f64) -> Result<Self, PolarError> {
        if !(tws_interval > 0.0 && max_wind > 0.0 && angle_resolution_deg > 0.0) {
            return Err(PolarError::InvalidConfig(format!(
                "grid needs positive twsInterval/maxWind/angleResolution, got {tws_interval}/{max_wind}/{angle_resolution_deg}"
            )));
        }
        if angle_resolution_deg > 180.0 {
            return Err(PolarError::InvalidConfig(format!(
                "angle resolution {angle_resolution_deg}° is wider than half a circle"
            )));
        }
        Ok(Self {
            tws_interval,
            max_wind,
            angle_resolution: angle_resolution_deg.to_radians(),
        })
    }

    pub fn wind_buckets(&self) -> usize {
        (self.max_wind / self.tws_interval).ceil() as usize
    }

    pub fn angle_slots(&self) -> usize {
        (2.0 * PI / self.angle_resolution).round() as usize
    }

    /// Bucket holding `tws`: `ceil(tws / twsInterval) − 1`.
    pub fn wind_index(&self, tws: f64) -> Result<usize, PolarError> {
        let out_of_range = || PolarError::IndexOutOfRange { axis: "wind speed", value: tws };
        if !tws.is_finite() || tws <= 0.0 {
            return Err(out_of_range());
        }
        let index = (tws / self.tws_interval).ceil() as usize - 1;
        if index >= self.wind_buckets() {
            return Err(out_of_range());
        }
        Ok(index)
    }

    /// Slot holding `twa`: `round((π + twa) / resolution)`, wrapping `+π` onto `−π`.
    pub fn angle_index(&self, twa: f64) -> Result<usize, PolarError> {
        if !twa.is_finite() || twa.abs() > PI + 1e-9 {
            return Err(PolarError::IndexOutOfRange { axis: "wind angle", value: twa });
        }
        let slots = self.angle_slots();
        let index = ((PI + twa) / self.angle_resolution).round() as usize;
        Ok(index % slots)
    }

    /// A table with every slot present and empty.
    pub fn empty_table(&self, id: Uuid, name: &str, description: &str) -> PolarTable {
        let angles: Vec<AngleEntry> = (0..self.angle_slots())
            .map(|i| AngleEntry::empty(-PI + i as f64 * self.angle_resolution))
            .collect();
        let wind_data = (1..=self.wind_buckets())
            .map(|k| WindSpeedBucket::new(k as f64 * self.tws_interval, angles.clone()))
            .collect();
        PolarTable::new(id, name, description, wind_data)
    }

    /// Whether a stored table has this grid's shape.
    pub fn matches(&self, table: &PolarTable) -> bool {
        table.wind_data.len() == self.wind_buckets()
            && table
                .wind_data
                .iter()
                .enumerate()
                .all(|(k, b)| {
                    (b.true_wind_speed - (k + 1) as f64 * self.tws_interval).abs() < 1e-9
                        && b.angle_data.len() == self.angle_slots()
                })
    }
}

/// A gated, derived observation ready to be recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub true_wind_speed: f64,
    pub true_wind_angle: f64,
    pub boat_speed: f64,
    pub vmg: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The slot improved and the bucket should be persisted.
    Improved { wind_index: usize, angle_index: usize },
    /// A better (or equal) sample already owns the slot.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct DynamicUpdater {
    grid: GridSpec,
}

impl DynamicUpdater {
    pub fn new(grid: GridSpec) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Apply the monotonic improvement rule for one sample.
    ///
    /// Out-of-grid samples return `IndexOutOfRange`; the caller skips them.
    pub fn apply(&self, table: &mut PolarTable, sample: &Sample) -> Result<UpdateOutcome, PolarError> {
        let wind_index = self.grid.wind_index(sample.true_wind_speed)?;
        let angle_index = self.grid.angle_index(sample.true_wind_angle)?;

        let bucket = table.wind_data.get_mut(wind_index).ok_or(PolarError::IndexOutOfRange {
            axis: "wind speed",
            value: sample.true_wind_speed,
        })?;
        let entry = bucket.angle_data.get_mut(angle_index).ok_or(PolarError::IndexOutOfRange {
            axis: "wind angle",
            value: sample.true_wind_angle,
        })?;

        let not_moving = sample.boat_speed.is_nan() || sample.boat_speed <= 0.0;
        if not_moving || entry.speed.is_some_and(|stored| stored >= sample.boat_speed) {
            return Ok(UpdateOutcome::Discarded);
        }

        entry.speed = Some(sample.boat_speed);
        entry.vmg = Some(sample.vmg);
        bucket.recompute_optimums();

        debug!(
            "Polar improved: tws bucket {} ({:.1} m/s), twa {:.1}° {:?}, bsp {:.2} m/s",
            wind_index,
            bucket.true_wind_speed,
            sample.true_wind_angle.to_degrees(),
            Tack::of(sample.true_wind_angle),
            sample.boat_speed
        );

        Ok(UpdateOutcome::Improved { wind_index, angle_index })
    }
}
