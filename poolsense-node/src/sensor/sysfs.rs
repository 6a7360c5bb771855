//! Linux sysfs drivers.
//!
//! - Analog channel: an IIO `in_voltageN_raw` attribute
//! - One-wire bus: the kernel `w1` subsystem with the `w1_therm` driver
//! - Combined probe: the IIO `dht11` driver

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::analog::AnalogChannel;
use super::climate::{ClimateProbe, ClimateSample};
use super::onewire::{OneWireBus, SensorIdentity};
use crate::error::DeviceError;

/// DS18B20 power-on reset value, reported when no conversion has completed.
const POWER_ON_RESET_MILLICELSIUS: i64 = 85_000;

/// Raw ADC attribute read synchronously on every sample.
#[derive(Debug)]
pub struct SysfsAnalogChannel {
    path: PathBuf,
}

impl SysfsAnalogChannel {
    /// Open the channel, failing if the attribute does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DeviceError> {
        let path = path.into();
        if !path.exists() {
            return Err(DeviceError::NotFound(path.display().to_string()));
        }
        Ok(Self { path })
    }
}

impl AnalogChannel for SysfsAnalogChannel {
    fn read_u16(&mut self) -> Result<u16, DeviceError> {
        let content = std::fs::read_to_string(&self.path)?;
        content
            .trim()
            .parse()
            .map_err(|e| DeviceError::InvalidData(format!("raw sample '{}': {}", content.trim(), e)))
    }
}

/// One-wire bus exposed by a kernel bus master.
#[derive(Debug, Clone)]
pub struct W1SysfsBus {
    master_path: PathBuf,
    devices_path: PathBuf,
}

impl W1SysfsBus {
    pub fn new(master_path: impl Into<PathBuf>, devices_path: impl Into<PathBuf>) -> Self {
        Self {
            master_path: master_path.into(),
            devices_path: devices_path.into(),
        }
    }
}

impl OneWireBus for W1SysfsBus {
    async fn scan(&mut self) -> Result<Vec<SensorIdentity>, DeviceError> {
        let content = fs::read_to_string(self.master_path.join("w1_master_slaves")).await?;
        Ok(parse_master_slaves(&content))
    }

    async fn convert(&mut self) -> Result<(), DeviceError> {
        fs::write(self.master_path.join("therm_bulk_read"), "trigger\n")
            .await
            .map_err(DeviceError::from)
    }

    async fn read_celsius(&mut self, id: &SensorIdentity) -> Result<f64, DeviceError> {
        let path = self.devices_path.join(id.as_str()).join("w1_slave");
        let content = read_attribute(&path, id.as_str()).await?;
        parse_w1_slave(&content)
    }
}

/// `dht11` style IIO device exposing processed temperature and humidity.
#[derive(Debug, Clone)]
pub struct IioClimateProbe {
    path: PathBuf,
}

impl IioClimateProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClimateProbe for IioClimateProbe {
    async fn measure(&mut self) -> Result<ClimateSample, DeviceError> {
        let name = self.path.display().to_string();
        let temperature = read_attribute(&self.path.join("in_temp_input"), &name).await?;
        let humidity = read_attribute(&self.path.join("in_humidityrelative_input"), &name).await?;

        Ok(ClimateSample {
            celsius: parse_milli(&temperature)? as f64 / 1000.0,
            humidity_percent: parse_milli(&humidity)? as f64 / 1000.0,
        })
    }
}

async fn read_attribute(path: &Path, device: &str) -> Result<String, DeviceError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(DeviceError::NotFound(device.to_string())),
        Err(e) if e.kind() == ErrorKind::TimedOut => Err(DeviceError::Timeout),
        Err(e) => Err(DeviceError::Io(e)),
    }
}

fn parse_milli(content: &str) -> Result<i64, DeviceError> {
    content
        .trim()
        .parse()
        .map_err(|_| DeviceError::InvalidData(format!("'{}'", content.trim())))
}

/// Parse `w1_master_slaves`, one address per line.
pub fn parse_master_slaves(content: &str) -> Vec<SensorIdentity> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "not found.")
        .map(SensorIdentity::new)
        .collect()
}

/// Parse a `w1_slave` attribute.
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(content: &str) -> Result<f64, DeviceError> {
    let mut lines = content.lines();

    let crc_line = lines
        .next()
        .ok_or_else(|| DeviceError::InvalidData("empty w1_slave".into()))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(DeviceError::Checksum);
    }

    let data_line = lines
        .next()
        .ok_or_else(|| DeviceError::InvalidData("missing temperature line".into()))?;
    let (_, raw) = data_line
        .rsplit_once("t=")
        .ok_or_else(|| DeviceError::InvalidData(format!("no t= in '{}'", data_line)))?;
    let millicelsius = parse_milli(raw)?;

    if millicelsius == POWER_ON_RESET_MILLICELSIUS {
        return Err(DeviceError::InvalidData(
            "power-on reset value, conversion did not complete".into(),
        ));
    }

    Ok(millicelsius as f64 / 1000.0)
}
