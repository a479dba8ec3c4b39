//! # delta
//!
//! Signal K style delta messages, in both directions.
//!
//! Inbound: a delta carries one or more `updates`, each with an optional source and
//! timestamp and a list of `{path, value}` pairs. Numeric and text values become
//! [`Measurement`]s; object values (positions, attitudes) are not polar inputs and are
//! skipped.
//!
//! Outbound: derived true wind and performance values are published as a single update
//! tagged with our source label, so receivers (and our own ingress) can tell them apart.

use chrono::{DateTime, TimeZone, Utc};
use polar_engine::{Measurement, MeasurementValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeltaMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub updates: Vec<DeltaUpdate>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeltaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DeltaSource>,
    #[serde(rename = "$source", default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub values: Vec<PathValue>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeltaSource {
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathValue {
    pub path: String,
    pub value: Value,
}

impl DeltaUpdate {
    /// `source.label` wins over `$source`.
    pub fn source_label(&self) -> Option<&str> {
        self.source
            .as_ref()
            .map(|s| s.label.as_str())
            .filter(|l| !l.is_empty())
            .or(self.source_ref.as_deref())
    }
}

impl DeltaMessage {
    /// Flatten into measurements. Updates without a timestamp are stamped `now`.
    pub fn into_measurements(self, now: DateTime<Utc>) -> Vec<Measurement> {
        let mut out = Vec::new();
        for update in self.updates {
            let timestamp = epoch_seconds(update.timestamp.unwrap_or(now));
            let source = update.source_label().map(str::to_string);
            for pv in update.values {
                let value = match pv.value {
                    Value::Number(n) => match n.as_f64() {
                        Some(v) => MeasurementValue::Number(v),
                        None => continue,
                    },
                    Value::String(s) => MeasurementValue::Text(s),
                    _ => continue,
                };
                out.push(Measurement {
                    path: pv.path,
                    value,
                    timestamp,
                    source: source.clone(),
                });
            }
        }
        out
    }

    /// One update from `label` carrying `values` at `timestamp` (epoch seconds).
    pub fn outbound(label: &str, values: &[(&str, f64)], timestamp: f64) -> Self {
        Self {
            context: Some("vessels.self".to_string()),
            updates: vec![DeltaUpdate {
                source: Some(DeltaSource { label: label.to_string() }),
                source_ref: None,
                timestamp: Some(from_epoch_seconds(timestamp)),
                values: values
                    .iter()
                    .map(|(path, value)| PathValue {
                        path: (*path).to_string(),
                        value: Value::from(*value),
                    })
                    .collect(),
            }],
        }
    }
}

pub fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 1000.0
}

pub fn from_epoch_seconds(seconds: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt((seconds * 1000.0).round() as i64)
        .single()
        .unwrap_or_else(Utc::now)
}
