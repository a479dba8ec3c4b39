//! # config
//!
//! TOML configuration. Missing keys fall back to defaults; a missing file falls back to
//! the bundled `polar.toml`. `PORT`, `POLAR_UDP_PORT` and `POLAR_DATA_DIR` override the
//! file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polar_engine::{
    AngleUnit, DynamicUpdater, EngineMonitor, GateConfig, GridSpec, ImportOptions, PolarError,
    SpeedUnit,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

const BUNDLED_CONFIG: &str = include_str!("../polar.toml");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub update_tables: bool,
    pub server: ServerConfig,
    pub dynamic: DynamicConfig,
    #[serde(rename = "static")]
    pub static_tables: Vec<StaticTableConfig>,
}

// ── [server] ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP + Socket.IO port
    pub port: u16,
    /// UDP port receiving measurement deltas
    pub udp_port: u16,
    /// Directory of the JSON table store
    pub data_dir: PathBuf,
    /// Source label on our own deltas; incoming deltas carrying it are dropped
    pub source_label: String,
    pub active_table: Option<Uuid>,
    /// Only accept deltas for this context (e.g. `vessels.urn:mrn:imo:mmsi:230099999`)
    pub self_context: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            udp_port: 10119,
            data_dir: PathBuf::from("polar-data"),
            source_label: "polar-server".to_string(),
            active_table: None,
            self_context: None,
        }
    }
}

// ── [dynamic] ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamicConfig {
    pub enabled: bool,
    pub engine: String,
    pub engine_instance: Option<String>,
    pub name: String,
    pub description: String,
    pub uuid: Option<Uuid>,
    /// degrees
    pub angle_resolution: f64,
    /// m/s
    pub tws_interval: f64,
    /// m/s
    pub max_wind: f64,
    /// deg/min
    pub rate_of_turn_limit: f64,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            engine: "alwaysOff".to_string(),
            engine_instance: None,
            name: "dynamicPolar".to_string(),
            description: "Dynamic polar diagram from actual sailing".to_string(),
            uuid: None,
            angle_resolution: 1.0,
            tws_interval: 4.0,
            max_wind: 15.0,
            rate_of_turn_limit: 5.0,
        }
    }
}

impl DynamicConfig {
    pub fn gate_config(&self) -> Result<GateConfig, PolarError> {
        Ok(GateConfig {
            engine: EngineMonitor::parse(&self.engine, self.engine_instance.as_deref())?,
            rate_of_turn_limit: self.rate_of_turn_limit,
            ..GateConfig::default()
        })
    }

    pub fn grid(&self) -> Result<GridSpec, PolarError> {
        GridSpec::new(self.tws_interval, self.max_wind, self.angle_resolution)
    }

    pub fn updater(&self) -> Result<Option<DynamicUpdater>, PolarError> {
        Ok(self.enabled.then(|| self.grid()).transpose()?.map(DynamicUpdater::new))
    }

    /// Configured id, or one derived from the name so it survives restarts.
    pub fn table_id(&self) -> Uuid {
        self.uuid
            .unwrap_or_else(|| Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("dynamic:{}", self.name).as_bytes()))
    }
}

// ── [[static]] ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticTableConfig {
    pub name: String,
    pub description: String,
    pub uuid: Option<Uuid>,
    pub angle_unit: AngleUnit,
    pub wind_speed_unit: SpeedUnit,
    pub boat_speed_unit: SpeedUnit,
    pub mirror: bool,
    /// Inline table text
    pub csv: Option<String>,
    /// Table file, relative to the config file
    pub csv_file: Option<PathBuf>,
}

impl Default for StaticTableConfig {
    fn default() -> Self {
        Self {
            name: "Design".to_string(),
            description: String::new(),
            uuid: None,
            angle_unit: AngleUnit::Deg,
            wind_speed_unit: SpeedUnit::Knots,
            boat_speed_unit: SpeedUnit::Knots,
            mirror: true,
            csv: None,
            csv_file: None,
        }
    }
}

impl StaticTableConfig {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            angle_unit: self.angle_unit,
            wind_speed_unit: self.wind_speed_unit,
            boat_speed_unit: self.boat_speed_unit,
            mirror: self.mirror,
        }
    }

    pub fn table_id(&self) -> Uuid {
        self.uuid
            .unwrap_or_else(|| Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("static:{}", self.name).as_bytes()))
    }

    /// Inline text wins over the file.
    pub fn read_text(&self, base_dir: &Path) -> Result<String> {
        if let Some(csv) = &self.csv {
            return Ok(csv.clone());
        }
        let file = self
            .csv_file
            .as_ref()
            .with_context(|| format!("static polar {} has neither csv nor csv_file", self.name))?;
        let path = base_dir.join(file);
        std::fs::read_to_string(&path)
            .with_context(|| format!("reading polar file {}", path.display()))
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid polar configuration")
    }

    /// Load `path`, or the bundled defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::parse(&text)?
        } else {
            info!("No {} found, using bundled configuration", path.display());
            Self::parse(BUNDLED_CONFIG)?
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(port) = std::env::var("POLAR_UDP_PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.udp_port = port;
        }
        if let Ok(dir) = std::env::var("POLAR_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
    }
}
