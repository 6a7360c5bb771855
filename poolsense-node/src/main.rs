//! poolsense sensor node firmware.
//!
//! Reads the pool, pond and air probes once per cycle and publishes them to
//! an MQTT broker.

use anyhow::{Context, Result};
use clap::Parser;
use poolsense_common::LoggingConfig;
use poolsense_node::config::NodeConfig;
use poolsense_node::link::{IwScanner, LinkMonitor};
use poolsense_node::mqtt::MqttTransport;
use poolsense_node::sensor::sysfs::{IioClimateProbe, SysfsAnalogChannel, W1SysfsBus};
use poolsense_node::sensor::{AnalogTemperatureReader, ClimateReader, OneWireReader, SensorIdentity};
use poolsense_node::startup::{discover_probes, wait_for_link};
use poolsense_node::{BrokerSession, CycleOrchestrator, CycleSettings, SensorSuite};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Sensor node publishing pool, pond and air readings over MQTT.
#[derive(Parser, Debug)]
#[command(name = "poolsense-node")]
#[command(about = "Samples pool, pond and air sensors and publishes them to MQTT")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "poolsense.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = NodeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    poolsense_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting poolsense-node");
    info!("Loaded configuration from {:?}", args.config);
    if config.mqtt.keep_alive_secs <= config.cycle.interval_secs {
        warn!(
            keep_alive_secs = config.mqtt.keep_alive_secs,
            interval_secs = config.cycle.interval_secs,
            "Keep-alive is not longer than the cycle, the broker may drop the session between publishes"
        );
    }

    // Wireless link
    let mut link = LinkMonitor::new(IwScanner::new(&config.wifi.interface));
    wait_for_link(&mut link, config.wifi.connect_timeout()).await?;

    // Sensors
    let sensors_config = &config.sensors;
    let channel = SysfsAnalogChannel::open(&sensors_config.analog.path)
        .context("Onboard temperature channel unavailable")?;
    let analog = AnalogTemperatureReader::new(channel, sensors_config.analog.calibration());

    let onewire_config = &sensors_config.onewire;
    let mut onewire = OneWireReader::new(
        W1SysfsBus::new(&onewire_config.master_path, &onewire_config.devices_path),
        Duration::from_millis(onewire_config.settle_ms),
    );
    let pool_probe = SensorIdentity::new(&onewire_config.pool);
    let pond_probe = SensorIdentity::new(&onewire_config.pond);
    discover_probes(&mut onewire, &[("pool", &pool_probe), ("pond", &pond_probe)]).await?;

    let climate = ClimateReader::new(
        IioClimateProbe::new(&sensors_config.climate.path),
        Duration::from_millis(sensors_config.climate.settle_ms),
    );
    info!(probe = %sensors_config.climate.path.display(), "Using climate probe");

    // Broker
    let mut session = BrokerSession::new(MqttTransport::new(&config.mqtt));
    info!(
        host = %config.mqtt.host,
        port = config.mqtt.port,
        "Connecting to MQTT broker..."
    );
    if let Err(e) = session.connect().await {
        warn!(error = %e, "Initial broker connect failed, will retry next cycle");
    }

    let mut orchestrator = CycleOrchestrator::new(
        SensorSuite {
            analog,
            onewire,
            pool_probe,
            pond_probe,
            climate,
        },
        link,
        session,
        CycleSettings {
            ssid: config.wifi.ssid.clone(),
            topic: config.mqtt.topic.clone(),
            interval: Duration::from_secs(config.cycle.interval_secs),
        },
    );

    if args.once {
        let report = orchestrator.run_cycle().await;
        info!(outcome = ?report.outcome, "Single cycle complete");
        orchestrator.session_mut().disconnect().await;
    } else {
        orchestrator.run(shutdown_signal()).await;
    }

    info!("poolsense-node stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
