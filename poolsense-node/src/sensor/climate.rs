//! Combined temperature/humidity probe.

use std::future::Future;
use std::time::Duration;

use poolsense_common::{Reading, round_tenths};
use tokio::time;
use tracing::{debug, warn};

use crate::error::DeviceError;

/// One raw measurement from the combined probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub celsius: f64,
    pub humidity_percent: f64,
}

/// Driver for a probe that measures temperature and humidity in one exchange.
pub trait ClimateProbe {
    /// Trigger a measurement and read both values back.
    fn measure(&mut self) -> impl Future<Output = Result<ClimateSample, DeviceError>>;
}

/// Both halves of a combined probe reading.
///
/// Either both are present or both are unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateReading {
    pub temperature: Reading<f64>,
    pub humidity: Reading<u8>,
}

impl ClimateReading {
    pub const UNAVAILABLE: Self = Self {
        temperature: Reading::Unavailable,
        humidity: Reading::Unavailable,
    };
}

/// Reader for the combined probe.
pub struct ClimateReader<P> {
    probe: P,
    settle: Duration,
}

impl<P: ClimateProbe> ClimateReader<P> {
    pub fn new(probe: P, settle: Duration) -> Self {
        Self { probe, settle }
    }

    /// Measure once, then hold the probe for the settle delay.
    pub async fn read(&mut self) -> ClimateReading {
        let result = self.probe.measure().await.and_then(validate);
        time::sleep(self.settle).await;

        match result {
            Ok(reading) => {
                debug!(?reading, "Climate probe read");
                reading
            }
            Err(e) => {
                warn!(error = %e, "Failed reading climate probe");
                ClimateReading::UNAVAILABLE
            }
        }
    }
}

fn validate(sample: ClimateSample) -> Result<ClimateReading, DeviceError> {
    if !sample.celsius.is_finite() {
        return Err(DeviceError::InvalidData(format!(
            "temperature {}",
            sample.celsius
        )));
    }
    if !(0.0..=100.0).contains(&sample.humidity_percent) {
        return Err(DeviceError::InvalidData(format!(
            "humidity {}%",
            sample.humidity_percent
        )));
    }

    Ok(ClimateReading {
        temperature: Reading::Value(round_tenths(sample.celsius)),
        humidity: Reading::Value(sample.humidity_percent.round() as u8),
    })
}
