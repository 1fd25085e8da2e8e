use config::{Config, ConfigError, Environment, File, FileFormat};
use occupy_map::MapConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "UGV_MAPPER";

/// Which kind of scan feeds the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// A single global scan is latched at startup.
    Global,
    /// Scans arrive continuously from the onboard sensor.
    #[default]
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Id of this vehicle inside the swarm.
    pub id: u32,
    /// Number of vehicles in the swarm; peer ids run from 1.
    pub swarm_size: u32,
    /// Scans are already in the world frame and skip the odometry transform.
    pub sim_mode: bool,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            id: 0,
            swarm_size: 1,
            sim_mode: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scan_mode: ScanMode,
    pub scan_rate_hz: f64,
    pub publish_period_ms: u64,
    pub monitor_period_ms: u64,
    pub scan_timeout_ms: u64,
    pub safety_check_distance: f64,
    pub sensor_range: f64,
    pub drive_radius: f64,
    pub drive_speed: f64,
    pub noise_amplitude: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::Local,
            scan_rate_hz: 10.0,
            publish_period_ms: 200,
            monitor_period_ms: 100,
            scan_timeout_ms: 1_000,
            safety_check_distance: 0.4,
            sensor_range: 4.0,
            drive_radius: 2.0,
            drive_speed: 0.3,
            noise_amplitude: 0.01,
        }
    }
}

impl RuntimeConfig {
    pub fn scan_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.scan_rate_hz.max(0.1))
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms.max(1))
    }

    pub fn monitor_period(&self) -> Duration {
        Duration::from_millis(self.monitor_period_ms.max(1))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

/// Full node configuration: map parameters, vehicle identity and runtime pacing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub map: MapConfig,
    pub vehicle: VehicleConfig,
    pub runtime: RuntimeConfig,
}

/// Loads the node configuration from `path`, then applies `UGV_MAPPER__*`
/// environment overrides (e.g. `UGV_MAPPER__MAP__RESOLUTION=0.1`).
pub fn load_config(path: &str) -> Result<NodeConfig, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<NodeConfig>());

    match settings {
        Ok(node_config) => {
            info!("Successfully loaded configuration: {:?}", node_config);
            Ok(node_config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
