//! The sampling-and-publish cycle.
//!
//! ```text
//! Idle -> Sampling -> Publishing -> Sleeping -> Sampling -> ...
//! ```
//!
//! One cycle reads every sensor in a fixed order, assembles a [`Payload`],
//! publishes it (connecting first if needed) and then idles for the configured
//! interval. Faults never leave a cycle: sensors degrade to `null`, an
//! unreachable broker skips the publish, a failed publish drops the payload.

use std::future::Future;
use std::time::Duration;

use poolsense_common::{Payload, encode};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerSession, Transport};
use crate::link::{LinkMonitor, NetworkScanner};
use crate::sensor::{
    AnalogChannel, AnalogTemperatureReader, ClimateProbe, ClimateReader, OneWireBus,
    OneWireReader, SensorIdentity,
};

/// Every sensor the node samples, acquired once at startup.
pub struct SensorSuite<A, W, P> {
    pub analog: AnalogTemperatureReader<A>,
    pub onewire: OneWireReader<W>,
    pub pool_probe: SensorIdentity,
    pub pond_probe: SensorIdentity,
    pub climate: ClimateReader<P>,
}

/// Publish target and pacing.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub ssid: String,
    pub topic: String,
    pub interval: Duration,
}

/// What happened to a cycle's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered to the broker.
    Published,
    /// The broker could not be reached; nothing was sent.
    Skipped,
    /// The publish failed and the payload was discarded.
    Dropped,
}

/// Result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub payload: Payload,
    pub outcome: PublishOutcome,
}

/// Drives sensors, link monitor and broker session, forever.
pub struct CycleOrchestrator<A, W, P, N, T> {
    sensors: SensorSuite<A, W, P>,
    link: LinkMonitor<N>,
    session: BrokerSession<T>,
    settings: CycleSettings,
    cycles: u64,
}

impl<A, W, P, N, T> CycleOrchestrator<A, W, P, N, T>
where
    A: AnalogChannel,
    W: OneWireBus,
    P: ClimateProbe,
    N: NetworkScanner,
    T: Transport,
{
    pub fn new(
        sensors: SensorSuite<A, W, P>,
        link: LinkMonitor<N>,
        session: BrokerSession<T>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            sensors,
            link,
            session,
            settings,
            cycles: 0,
        }
    }

    pub fn session(&self) -> &BrokerSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BrokerSession<T> {
        &mut self.session
    }

    /// Read every sensor and the link once.
    pub async fn sample(&mut self) -> Payload {
        let sensors = &mut self.sensors;

        let picotemp = sensors.analog.read();
        let pooltemp = sensors.onewire.read(&sensors.pool_probe).await;
        let pondtemp = sensors.onewire.read(&sensors.pond_probe).await;
        let climate = sensors.climate.read().await;
        let wlan_rssi = self.link.signal_strength(&self.settings.ssid).await;

        Payload {
            picotemp,
            pooltemp,
            pondtemp,
            airtemp: climate.temperature,
            humidity: climate.humidity,
            wlan_rssi,
        }
    }

    /// Serialize and deliver one payload.
    pub async fn publish(&mut self, payload: &Payload) -> PublishOutcome {
        let body = match encode(payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to encode payload");
                return PublishOutcome::Dropped;
            }
        };

        if !self.session.is_connected() {
            if let Err(e) = self.session.connect().await {
                warn!(error = %e, "Broker unreachable, skipping publish this cycle");
                return PublishOutcome::Skipped;
            }
        }

        match self.session.publish(&self.settings.topic, &body).await {
            Ok(()) => {
                info!(
                    topic = %self.settings.topic,
                    payload = %String::from_utf8_lossy(&body),
                    "Published data to MQTT"
                );
                PublishOutcome::Published
            }
            Err(e) => {
                warn!(error = %e, "Failed to publish to MQTT, payload dropped");
                PublishOutcome::Dropped
            }
        }
    }

    /// Sampling and publishing phases of one cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let payload = self.sample().await;
        debug!(
            cycle = self.cycles,
            available = payload.available_count(),
            "Sampling complete"
        );
        let outcome = self.publish(&payload).await;

        CycleReport {
            cycle: self.cycles,
            payload,
            outcome,
        }
    }

    /// Run cycles until `shutdown` resolves, then close the broker session.
    ///
    /// `shutdown` is only observed while sleeping, so a started cycle always
    /// completes.
    pub async fn run<F>(mut self, shutdown: F) -> BrokerSession<T>
    where
        F: Future<Output = ()>,
    {
        info!(
            topic = %self.settings.topic,
            interval_secs = self.settings.interval.as_secs(),
            "Starting sensor cycle"
        );
        tokio::pin!(shutdown);

        loop {
            let report = self.run_cycle().await;
            debug!(cycle = report.cycle, outcome = ?report.outcome, "Cycle finished");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = time::sleep(self.settings.interval) => {}
            }
        }

        self.session.disconnect().await;
        self.session
    }
}
