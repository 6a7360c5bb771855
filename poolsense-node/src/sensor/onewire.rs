//! One-wire digital temperature probes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use poolsense_common::{Reading, round_tenths};
use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::{debug, warn};

use crate::error::DeviceError;

/// Address of one probe on a one-wire bus (e.g. `28-0316a2794aff`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorIdentity(String);

impl SensorIdentity {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Driver for a one-wire bus hosting temperature probes.
pub trait OneWireBus {
    /// List the probes currently present on the bus.
    fn scan(&mut self) -> impl Future<Output = Result<Vec<SensorIdentity>, DeviceError>>;

    /// Start a temperature conversion on every probe.
    fn convert(&mut self) -> impl Future<Output = Result<(), DeviceError>>;

    /// Read the result of the last conversion from one probe, in °C.
    fn read_celsius(
        &mut self,
        id: &SensorIdentity,
    ) -> impl Future<Output = Result<f64, DeviceError>>;
}

/// Reader running the two-phase probe protocol.
///
/// Every read takes exactly two settle delays whatever the outcome: one after
/// the conversion command and one after the read. A failed phase still waits
/// out the remaining delays before the bus is reused.
pub struct OneWireReader<B> {
    bus: B,
    settle: Duration,
}

impl<B: OneWireBus> OneWireReader<B> {
    pub fn new(bus: B, settle: Duration) -> Self {
        Self { bus, settle }
    }

    /// Scan the bus for probes.
    pub async fn discover(&mut self) -> Result<Vec<SensorIdentity>, DeviceError> {
        self.bus.scan().await
    }

    /// Read one probe, rounded to one decimal.
    pub async fn read(&mut self, id: &SensorIdentity) -> Reading<f64> {
        let converted = self.bus.convert().await;
        time::sleep(self.settle).await;

        let result = match converted {
            Ok(()) => self.bus.read_celsius(id).await,
            Err(e) => Err(e),
        };
        time::sleep(self.settle).await;

        match result {
            Ok(celsius) if celsius.is_finite() => {
                debug!(probe = %id, celsius, "One-wire probe read");
                Reading::Value(round_tenths(celsius))
            }
            Ok(celsius) => {
                warn!(probe = %id, celsius, "One-wire probe returned a non-finite value");
                Reading::Unavailable
            }
            Err(e) => {
                warn!(probe = %id, error = %e, "Failed reading one-wire probe");
                Reading::Unavailable
            }
        }
    }
}
