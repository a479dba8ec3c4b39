//! # table
//!
//! The polar table data model.
//!
//! A [`PolarTable`] is an ordered list of [`WindSpeedBucket`]s. Each bucket holds the
//! best known boat speed per true wind angle (`angleData`, ascending by angle) and the
//! derived optimal beat/gybe per tack.
//!
//! Persisted/served shape:
//!
//! ```json
//! {
//!   "id": "…", "name": "…", "description": "…", "source": { "label": "…" },
//!   "windData": [
//!     { "trueWindSpeed": 4.0,
//!       "optimalBeats": [[-0.78, 2.9], [0.78, 3.0]],
//!       "optimalGybes": [null, [2.6, 3.4]],
//!       "angleData": [[-3.14, null, null], [-3.12, 3.1, -3.09], …] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wind::velocity_made_good;

/// `source.label` stamped on tables created by this engine.
pub const SOURCE_LABEL: &str = "polar-engine";

// ── Tack ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tack {
    Port,
    Starboard,
}

impl Tack {
    /// Negative angles are port, everything else starboard.
    pub fn of(true_wind_angle: f64) -> Self {
        if true_wind_angle < 0.0 {
            Self::Port
        } else {
            Self::Starboard
        }
    }

    /// Slot in the `[port, starboard]` optimum arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Port => 0,
            Self::Starboard => 1,
        }
    }
}

// ── Cells ─────────────────────────────────────────────────────────────────────

type AngleTuple = (f64, Option<f64>, Option<f64>);

/// One angle slot. Serialized as `[angle, speed, vmg]`; empty dynamic slots hold nulls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "AngleTuple", into = "AngleTuple")]
pub struct AngleEntry {
    pub angle: f64,
    pub speed: Option<f64>,
    pub vmg: Option<f64>,
}

impl AngleEntry {
    pub fn empty(angle: f64) -> Self {
        Self { angle, speed: None, vmg: None }
    }

    /// A measured/imported point, VMG computed from the angle.
    pub fn with_speed(angle: f64, speed: f64) -> Self {
        Self {
            angle,
            speed: Some(speed),
            vmg: Some(velocity_made_good(speed, angle)),
        }
    }
}

impl From<AngleTuple> for AngleEntry {
    fn from((angle, speed, vmg): AngleTuple) -> Self {
        Self { angle, speed, vmg }
    }
}

impl From<AngleEntry> for AngleTuple {
    fn from(e: AngleEntry) -> Self {
        (e.angle, e.speed, e.vmg)
    }
}

/// Optimal beat or gybe point. Serialized as `[angle, speed]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Optimum {
    pub angle: f64,
    pub speed: f64,
}

impl Optimum {
    pub fn vmg(&self) -> f64 {
        velocity_made_good(self.speed, self.angle)
    }
}

impl From<(f64, f64)> for Optimum {
    fn from((angle, speed): (f64, f64)) -> Self {
        Self { angle, speed }
    }
}

impl From<Optimum> for (f64, f64) {
    fn from(o: Optimum) -> Self {
        (o.angle, o.speed)
    }
}

// ── Wind speed bucket ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindSpeedBucket {
    pub true_wind_speed: f64,
    /// `[port, starboard]`, highest positive VMG per side
    #[serde(default)]
    pub optimal_beats: [Option<Optimum>; 2],
    /// `[port, starboard]`, most negative VMG per side
    #[serde(default)]
    pub optimal_gybes: [Option<Optimum>; 2],
    pub angle_data: Vec<AngleEntry>,
}

impl WindSpeedBucket {
    /// Build a bucket, sorting the entries by angle and deriving the optimums.
    pub fn new(true_wind_speed: f64, mut angle_data: Vec<AngleEntry>) -> Self {
        angle_data.sort_by(|a, b| a.angle.total_cmp(&b.angle));
        let mut bucket = Self {
            true_wind_speed,
            optimal_beats: [None; 2],
            optimal_gybes: [None; 2],
            angle_data,
        };
        bucket.recompute_optimums();
        bucket
    }

    /// Re-derive `optimalBeats`/`optimalGybes` from `angleData`.
    /// Ties keep the first entry in ascending angle order.
    pub fn recompute_optimums(&mut self) {
        let mut beats: [Option<(Optimum, f64)>; 2] = [None; 2];
        let mut gybes: [Option<(Optimum, f64)>; 2] = [None; 2];

        for entry in &self.angle_data {
            let (Some(speed), Some(vmg)) = (entry.speed, entry.vmg) else {
                continue;
            };
            let side = Tack::of(entry.angle).index();
            let point = Optimum { angle: entry.angle, speed };

            if vmg > 0.0 && beats[side].map_or(true, |(_, best)| vmg > best) {
                beats[side] = Some((point, vmg));
            }
            if vmg < 0.0 && gybes[side].map_or(true, |(_, best)| vmg < best) {
                gybes[side] = Some((point, vmg));
            }
        }

        self.optimal_beats = beats.map(|b| b.map(|(o, _)| o));
        self.optimal_gybes = gybes.map(|g| g.map(|(o, _)| o));
    }

    pub fn optimal_beat(&self, tack: Tack) -> Option<Optimum> {
        self.optimal_beats[tack.index()]
    }

    pub fn optimal_gybe(&self, tack: Tack) -> Option<Optimum> {
        self.optimal_gybes[tack.index()]
    }

    pub fn angles(&self) -> Vec<f64> {
        self.angle_data.iter().map(|e| e.angle).collect()
    }

    pub fn has_data(&self) -> bool {
        self.angle_data.iter().any(|e| e.speed.is_some())
    }

    fn is_sorted(&self) -> bool {
        self.angle_data.windows(2).all(|w| w[0].angle <= w[1].angle)
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarTable {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source: TableSource,
    pub wind_data: Vec<WindSpeedBucket>,
}

impl PolarTable {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        wind_data: Vec<WindSpeedBucket>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            source: TableSource {
                label: SOURCE_LABEL.to_string(),
            },
            wind_data,
        }
    }

    pub fn wind_speeds(&self) -> Vec<f64> {
        self.wind_data.iter().map(|b| b.true_wind_speed).collect()
    }

    pub fn bucket(&self, index: usize) -> Option<&WindSpeedBucket> {
        self.wind_data.get(index)
    }

    /// Number of angle slots holding a boat speed, over all buckets.
    pub fn data_points(&self) -> usize {
        self.wind_data
            .iter()
            .flat_map(|b| &b.angle_data)
            .filter(|e| e.speed.is_some())
            .count()
    }

    /// Check the ordering invariants of a table that came from outside (store, HTTP).
    pub fn validate(&self) -> Result<(), String> {
        if !self
            .wind_data
            .windows(2)
            .all(|w| w[0].true_wind_speed < w[1].true_wind_speed)
        {
            return Err("wind speeds are not strictly ascending".into());
        }
        if let Some(b) = self.wind_data.iter().find(|b| !b.is_sorted()) {
            return Err(format!("angles at {} m/s are not ascending", b.true_wind_speed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deg(d: f64) -> f64 {
        d.to_radians()
    }

    #[test]
    fn test_tack_convention() {
        assert_eq!(Tack::of(-0.1), Tack::Port);
        assert_eq!(Tack::of(0.0), Tack::Starboard);
        assert_eq!(Tack::of(2.0), Tack::Starboard);
    }

    #[test]
    fn test_bucket_sorts_and_derives_optimums() {
        let bucket = WindSpeedBucket::new(
            5.0,
            vec![
                AngleEntry::with_speed(deg(150.0), 4.0),
                AngleEntry::with_speed(deg(45.0), 3.0),
                AngleEntry::with_speed(deg(-40.0), 2.8),
                AngleEntry::with_speed(deg(90.0), 4.5),
                AngleEntry::with_speed(deg(-170.0), 3.0),
                AngleEntry::empty(deg(60.0)),
            ],
        );

        let angles = bucket.angles();
        assert!(angles.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(bucket.optimal_beat(Tack::Starboard).unwrap().angle, deg(45.0));
        assert_eq!(bucket.optimal_beat(Tack::Port).unwrap().angle, deg(-40.0));
        assert_eq!(bucket.optimal_gybe(Tack::Starboard).unwrap().angle, deg(150.0));
        assert_eq!(bucket.optimal_gybe(Tack::Port).unwrap().angle, deg(-170.0));
    }

    #[test]
    fn test_side_without_candidates_is_null() {
        let bucket = WindSpeedBucket::new(5.0, vec![AngleEntry::with_speed(deg(50.0), 3.0)]);
        assert!(bucket.optimal_beat(Tack::Port).is_none());
        assert!(bucket.optimal_gybe(Tack::Starboard).is_none());
    }

    #[test]
    fn test_tie_keeps_first_angle() {
        let mut bucket = WindSpeedBucket::new(5.0, vec![]);
        bucket.angle_data = vec![
            AngleEntry { angle: 0.5, speed: Some(3.0), vmg: Some(2.0) },
            AngleEntry { angle: 0.7, speed: Some(3.2), vmg: Some(2.0) },
        ];
        bucket.recompute_optimums();
        assert_eq!(bucket.optimal_beat(Tack::Starboard).unwrap().angle, 0.5);
    }

    #[test]
    fn test_serialized_shape() {
        let table = PolarTable::new(
            Uuid::nil(),
            "design",
            "",
            vec![WindSpeedBucket::new(
                4.0,
                vec![AngleEntry::empty(-1.0), AngleEntry::with_speed(1.0, 2.0)],
            )],
        );
        let value = serde_json::to_value(&table).unwrap();
        let bucket = &value["windData"][0];
        assert_eq!(bucket["trueWindSpeed"], json!(4.0));
        assert_eq!(bucket["angleData"][0], json!([-1.0, null, null]));
        assert_eq!(bucket["angleData"][1][1], json!(2.0));
        assert_eq!(bucket["optimalBeats"], json!([null, [1.0, 2.0]]));
        assert_eq!(value["source"]["label"], json!(SOURCE_LABEL));

        let back: PolarTable = serde_json::from_value(value).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_validate_rejects_unsorted() {
        let mut table = PolarTable::new(Uuid::nil(), "t", "", vec![]);
        table.wind_data.push(WindSpeedBucket::new(8.0, vec![]));
        table.wind_data.push(WindSpeedBucket::new(4.0, vec![]));
        assert!(table.validate().is_err());
        table.wind_data.reverse();
        assert!(table.validate().is_ok());
        table.wind_data[0].angle_data = vec![AngleEntry::empty(1.0), AngleEntry::empty(0.0)];
        assert!(table.validate().is_err());
    }
}
