//! Device and startup error types.

use std::time::Duration;

use thiserror::Error;

/// Fault reported by a device driver.
///
/// Readers never pass these upward; they log them and report the reading as
/// unavailable.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    NotFound(String),
    #[error("Timed out waiting for device")]
    Timeout,
    #[error("Checksum mismatch")]
    Checksum,
    #[error("Bus error: {0}")]
    Bus(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures that prevent the node from starting its cycle.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Wireless link did not come up within {0:?}")]
    LinkTimeout(Duration),
    #[error("One-wire bus scan failed: {0}")]
    BusScan(#[source] DeviceError),
    #[error("No one-wire probes found on the bus")]
    NoProbes,
}
