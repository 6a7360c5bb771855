//! Node bootstrap: bring-up checks that run once before the first cycle.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{info, warn};

use crate::error::StartupError;
use crate::link::{LinkMonitor, NetworkScanner};
use crate::sensor::{OneWireBus, OneWireReader, SensorIdentity};

/// Interval between link checks while waiting for association.
pub const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wait for the wireless link, checking once per [`LINK_POLL_INTERVAL`].
///
/// Radio power saving is switched off first; failing to do so is only a
/// warning. `timeout` of `None` waits forever.
pub async fn wait_for_link<N: NetworkScanner>(
    link: &mut LinkMonitor<N>,
    timeout: Option<Duration>,
) -> Result<(), StartupError> {
    if let Err(e) = link.disable_power_save().await {
        warn!(error = %e, "Could not disable wireless power save");
    }

    let started = Instant::now();

    while !link.is_connected().await {
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                return Err(StartupError::LinkTimeout(limit));
            }
        }
        info!("Waiting for connection...");
        time::sleep(LINK_POLL_INTERVAL).await;
    }

    info!(waited_ms = started.elapsed().as_millis() as u64, "Connected to WiFi");
    Ok(())
}

/// Scan the one-wire bus and check the configured probes are present.
///
/// Missing probes are only warned about; their readings will be `null`.
pub async fn discover_probes<W: OneWireBus>(
    onewire: &mut OneWireReader<W>,
    expected: &[(&str, &SensorIdentity)],
) -> Result<Vec<SensorIdentity>, StartupError> {
    let found = onewire.discover().await.map_err(StartupError::BusScan)?;
    if found.is_empty() {
        return Err(StartupError::NoProbes);
    }

    let addresses: Vec<&str> = found.iter().map(SensorIdentity::as_str).collect();
    info!(probes = ?addresses, "Found one-wire probes");

    for (role, id) in expected {
        if !found.contains(*id) {
            warn!(role, probe = %id, "Configured probe not found on the bus");
        }
    }

    Ok(found)
}
