//! # polar-engine
//!
//! Polar diagram engine for a single sailing vessel.
//!
//! A polar table maps (true wind speed, true wind angle) to the best boat speed the
//! vessel has achieved or is designed to achieve. This crate:
//! - derives true wind and VMG from apparent wind and boat speed (`wind`)
//! - fuses the latest measurements and decides which samples are clean enough to record
//!   (`fused`, `gate`)
//! - builds static tables from ORC/`.pol` style text matrices (`builder`)
//! - grows a dynamic table from observed performance, only ever improving it (`updater`)
//! - answers target angle/speed and polar-ratio queries against any table (`query`)
//!
//! It has no runtime or network dependencies. The server crate owns I/O and persistence;
//! storage backends plug in through [`store::TableStore`].
//!
//! ## Conventions
//!
//! - Angles are radians, speeds m/s, timestamps seconds since the Unix epoch.
//! - Positive true wind angle = wind on the starboard side, negative = port.
//! - VMG = boat speed · cos(twa): positive upwind, negative downwind.
//! - Optimal beat/gybe pairs are stored as `[port, starboard]`.

pub mod builder;
pub mod error;
pub mod fused;
pub mod gate;
pub mod paths;
pub mod query;
pub mod registry;
pub mod store;
pub mod table;
pub mod units;
pub mod updater;
pub mod wind;

pub use builder::{build_table, ImportOptions};
pub use error::{PolarError, StoreError};
pub use fused::{apply_measurement, Field, FusedState, Measurement, MeasurementValue};
pub use gate::{EngineMonitor, GateConfig, Rejection, SampleGate};
pub use query::{PerformanceOutput, PerformanceQuery};
pub use registry::TableRegistry;
pub use store::{MemoryStore, TableStore};
pub use table::{AngleEntry, Optimum, PolarTable, Tack, WindSpeedBucket};
pub use units::{AngleUnit, SpeedUnit};
pub use updater::{DynamicUpdater, GridSpec, Sample, UpdateOutcome};
