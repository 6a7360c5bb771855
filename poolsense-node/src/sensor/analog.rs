//! Onboard analog temperature channel.

use poolsense_common::{Reading, round_tenths};
use tracing::{trace, warn};

use crate::error::DeviceError;

/// Driver for an analog-to-digital channel wired to a temperature sensor.
pub trait AnalogChannel {
    /// Take one raw sample.
    fn read_u16(&mut self) -> Result<u16, DeviceError>;
}

/// Linear conversion from a raw sample to degrees Celsius.
///
/// `volts = raw * vref / full_scale`, then
/// `celsius = ref_celsius - (volts - ref_volts) / slope_volts_per_degree`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureCalibration {
    pub vref: f64,
    pub full_scale: f64,
    pub ref_volts: f64,
    pub ref_celsius: f64,
    pub slope_volts_per_degree: f64,
}

impl TemperatureCalibration {
    /// RP2040 internal sensor read through a 16-bit scaled sample.
    pub const RP2040: Self = Self {
        vref: 3.3,
        full_scale: 65535.0,
        ref_volts: 0.706,
        ref_celsius: 27.0,
        slope_volts_per_degree: 0.001721,
    };

    /// Convert a raw sample to temperature, unrounded.
    pub fn raw_to_celsius(&self, raw: u16) -> f64 {
        let volts = raw as f64 * self.vref / self.full_scale;
        self.ref_celsius - (volts - self.ref_volts) / self.slope_volts_per_degree
    }
}

impl Default for TemperatureCalibration {
    fn default() -> Self {
        Self::RP2040
    }
}

/// Reader for the onboard temperature channel.
pub struct AnalogTemperatureReader<C> {
    channel: C,
    calibration: TemperatureCalibration,
    last_raw: Option<u16>,
}

impl<C: AnalogChannel> AnalogTemperatureReader<C> {
    pub fn new(channel: C, calibration: TemperatureCalibration) -> Self {
        Self {
            channel,
            calibration,
            last_raw: None,
        }
    }

    /// Sample the channel and convert to °C, rounded to one decimal.
    pub fn read(&mut self) -> Reading<f64> {
        match self.channel.read_u16() {
            Ok(raw) => {
                self.last_raw = Some(raw);
                let celsius = self.calibration.raw_to_celsius(raw);
                trace!(raw, celsius, "Onboard sample");
                if celsius.is_finite() {
                    Reading::Value(round_tenths(celsius))
                } else {
                    warn!(raw, "Onboard sample produced a non-finite temperature");
                    Reading::Unavailable
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed reading onboard temperature channel");
                Reading::Unavailable
            }
        }
    }

    /// Last raw sample, for diagnostics.
    pub fn last_raw_value(&self) -> Option<u16> {
        self.last_raw
    }
}
