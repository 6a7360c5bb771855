//! Configuration for the sensor node.

use poolsense_common::{LoggingConfig, MqttConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sensor::analog::TemperatureCalibration;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Wireless network settings
    pub wifi: WifiConfig,

    /// Broker connection settings
    pub mqtt: MqttConfig,

    /// Sensor wiring
    pub sensors: SensorsConfig,

    /// Cycle timing
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wireless network the node reports signal strength for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiConfig {
    /// Network name (exact match against scan results)
    pub ssid: String,

    /// Wireless interface
    #[serde(default = "default_interface")]
    pub interface: String,

    /// How long to wait for the link at startup (0 = forever)
    #[serde(default)]
    pub connect_timeout_secs: u64,
}

fn default_interface() -> String {
    "wlan0".to_string()
}

impl WifiConfig {
    /// Startup link wait, `None` meaning unbounded.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

/// All sensor channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    pub analog: AnalogConfig,
    pub onewire: OneWireConfig,
    pub climate: ClimateConfig,
}

/// Onboard analog temperature channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogConfig {
    /// Sysfs file holding the raw ADC sample
    pub path: PathBuf,

    /// ADC reference voltage
    #[serde(default = "default_vref")]
    pub vref: f64,

    /// Raw value corresponding to `vref`
    #[serde(default = "default_full_scale")]
    pub full_scale: u32,

    /// Sensor voltage at the reference temperature
    #[serde(default = "default_ref_volts")]
    pub ref_volts: f64,

    /// Reference temperature (°C)
    #[serde(default = "default_ref_celsius")]
    pub ref_celsius: f64,

    /// Voltage change per degree (V/°C)
    #[serde(default = "default_slope")]
    pub slope_volts_per_degree: f64,
}

fn default_vref() -> f64 {
    3.3
}

fn default_full_scale() -> u32 {
    65535
}

fn default_ref_volts() -> f64 {
    0.706
}

fn default_ref_celsius() -> f64 {
    27.0
}

fn default_slope() -> f64 {
    0.001721
}

impl AnalogConfig {
    pub fn calibration(&self) -> TemperatureCalibration {
        TemperatureCalibration {
            vref: self.vref,
            full_scale: self.full_scale as f64,
            ref_volts: self.ref_volts,
            ref_celsius: self.ref_celsius,
            slope_volts_per_degree: self.slope_volts_per_degree,
        }
    }
}

/// One-wire bus and probe addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneWireConfig {
    /// Bus master directory (scan and bulk conversion)
    #[serde(default = "default_master_path")]
    pub master_path: PathBuf,

    /// Directory holding one entry per slave device
    #[serde(default = "default_devices_path")]
    pub devices_path: PathBuf,

    /// Address of the pool probe
    pub pool: String,

    /// Address of the pond probe
    pub pond: String,

    /// Conversion settle delay in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_master_path() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices/w1_bus_master1")
}

fn default_devices_path() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices")
}

fn default_settle_ms() -> u64 {
    750
}

/// Combined temperature/humidity probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateConfig {
    /// IIO device directory of the probe
    pub path: PathBuf,

    /// Delay after each measurement in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Cycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Idle time after each cycle in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi.ssid.is_empty() {
            return Err(ConfigError::Validation("wifi.ssid must not be empty".into()));
        }
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Validation("mqtt.host must not be empty".into()));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::Validation("mqtt.port must not be 0".into()));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Validation(
                "mqtt.client_id must not be empty".into(),
            ));
        }
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::Validation("mqtt.topic must not be empty".into()));
        }

        let onewire = &self.sensors.onewire;
        if onewire.pool.is_empty() || onewire.pond.is_empty() {
            return Err(ConfigError::Validation(
                "sensors.onewire.pool and sensors.onewire.pond are required".into(),
            ));
        }
        if onewire.pool == onewire.pond {
            return Err(ConfigError::Validation(format!(
                "Pool and pond probes share address '{}'",
                onewire.pool
            )));
        }

        let analog = &self.sensors.analog;
        if analog.full_scale == 0 {
            return Err(ConfigError::Validation(
                "sensors.analog.full_scale must be positive".into(),
            ));
        }
        if analog.slope_volts_per_degree == 0.0 {
            return Err(ConfigError::Validation(
                "sensors.analog.slope_volts_per_degree must not be 0".into(),
            ));
        }

        Ok(())
    }
}
