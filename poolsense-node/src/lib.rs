//! poolsense sensor node.
//!
//! Samples an onboard analog temperature channel, two one-wire probes (pool
//! and pond), a combined temperature/humidity probe and the wireless signal
//! strength, then publishes the readings as one JSON message per cycle to an
//! MQTT broker.
//!
//! # Message
//!
//! ```text
//! {"picotemp":21.4,"pooltemp":18.2,"pondtemp":null,"airtemp":22.0,"humidity":55,"wlanRSSI":-47}
//! ```
//!
//! Every key is present on every publish; unavailable readings are `null`.

pub mod broker;
pub mod config;
pub mod cycle;
pub mod error;
pub mod link;
pub mod mqtt;
pub mod sensor;
pub mod startup;

pub use broker::{BrokerSession, ConnectionError, PublishError, SessionState, Transport};
pub use cycle::{CycleOrchestrator, CycleReport, CycleSettings, PublishOutcome, SensorSuite};
pub use error::{DeviceError, StartupError};
