use thiserror::Error;
use uuid::Uuid;

/// Every recoverable failure the polar engine can report.
///
/// None of these are fatal: per-tick failures are skipped by the caller, import
/// failures are returned to whoever asked for the import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolarError {
    /// Wind triangle geometry is inconsistent (`|cos(twa)| > 1`).
    #[error("invalid wind triangle: aws={aws:.2} tws={tws:.2} stw={stw:.2}")]
    InvalidTriangle { aws: f64, tws: f64, stw: f64 },

    /// Fused fields are missing, too far apart in time, or already recorded.
    #[error("stale data: {0}")]
    StaleData(String),

    /// Malformed static table input. `row` is 1-based, counting the header.
    #[error("import error at row {row}: {message}")]
    Import { row: usize, message: String },

    /// A computed bucket index lies outside the table's grid.
    #[error("{axis} index out of range for value {value:.4}")]
    IndexOutOfRange { axis: &'static str, value: f64 },

    /// A query found no data at the nearest bucket.
    #[error("no polar data for {0}")]
    LookupMiss(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PolarError {
    pub fn import(row: usize, message: impl Into<String>) -> Self {
        Self::Import { row, message: message.into() }
    }
}

/// Failures from a [`crate::store::TableStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("table (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("stored table {0} is corrupt: {1}")]
    Corrupt(Uuid, String),
}
