//! Wireless link monitoring.

use std::future::Future;
use std::path::PathBuf;

use poolsense_common::Reading;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::DeviceError;

/// One network seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    /// Signal metric as reported by the scanner (e.g. `-47.00 dBm`).
    pub signal: String,
}

/// Driver for the wireless interface.
pub trait NetworkScanner {
    /// Whether the interface is associated and up.
    fn is_connected(&mut self) -> impl Future<Output = bool>;

    /// List visible networks.
    fn scan(&mut self) -> impl Future<Output = Result<Vec<AccessPoint>, DeviceError>>;

    /// Keep the radio awake between scans. Interfaces without power
    /// management accept this as a no-op.
    fn disable_power_save(&mut self) -> impl Future<Output = Result<(), DeviceError>> {
        async { Ok(()) }
    }
}

/// Reports connectivity and signal strength.
pub struct LinkMonitor<N> {
    scanner: N,
}

impl<N: NetworkScanner> LinkMonitor<N> {
    pub fn new(scanner: N) -> Self {
        Self { scanner }
    }

    pub async fn is_connected(&mut self) -> bool {
        self.scanner.is_connected().await
    }

    pub async fn disable_power_save(&mut self) -> Result<(), DeviceError> {
        self.scanner.disable_power_save().await
    }

    /// Signal strength in dBm of the first network named `ssid`.
    pub async fn signal_strength(&mut self, ssid: &str) -> Reading<i32> {
        let access_points = match self.scanner.scan().await {
            Ok(aps) => aps,
            Err(e) => {
                warn!(error = %e, "Wireless scan failed");
                return Reading::Unavailable;
            }
        };

        let Some(ap) = access_points.iter().find(|ap| ap.ssid == ssid) else {
            warn!(ssid, seen = access_points.len(), "Network not found in scan");
            return Reading::Unavailable;
        };

        match parse_dbm(&ap.signal) {
            Some(dbm) => {
                debug!(ssid, dbm, "Signal strength");
                Reading::Value(dbm)
            }
            None => {
                warn!(ssid, signal = %ap.signal, "Unparsable signal metric");
                Reading::Unavailable
            }
        }
    }
}

/// Parse `-47.00 dBm`, `-47 dBm` or `-47` to whole dBm.
pub fn parse_dbm(signal: &str) -> Option<i32> {
    let number = signal.trim().trim_end_matches("dBm").trim();
    let value: f64 = number.parse().ok()?;
    value.is_finite().then(|| value.round() as i32)
}

/// Parse the output of `iw dev <iface> scan`.
///
/// Blocks start at a `BSS` line; `signal:` and `SSID:` lines inside a block
/// describe that network. Blocks without an SSID line are skipped.
pub fn parse_iw_scan(output: &str) -> Vec<AccessPoint> {
    let mut access_points = Vec::new();
    let mut ssid: Option<String> = None;
    let mut signal: Option<String> = None;

    let mut flush = |ssid: &mut Option<String>, signal: &mut Option<String>| {
        if let Some(name) = ssid.take() {
            access_points.push(AccessPoint {
                ssid: name,
                signal: signal.take().unwrap_or_default(),
            });
        }
        *signal = None;
    };

    for line in output.lines() {
        if line.starts_with("BSS ") {
            flush(&mut ssid, &mut signal);
            continue;
        }

        let line = line.trim();
        if let Some(value) = line.strip_prefix("signal:") {
            signal = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("SSID:") {
            ssid = Some(unescape_ssid(value.trim()));
        }
    }
    flush(&mut ssid, &mut signal);

    access_points
}

/// Undo the `\xNN` escaping `iw` applies to SSID bytes it does not print
/// verbatim.
pub fn unescape_ssid(escaped: &str) -> String {
    let raw = escaped.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && raw.get(i + 1) == Some(&b'x') {
            let decoded = raw
                .get(i + 2..i + 4)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                bytes.push(byte);
                i += 4;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Linux wireless interface, scanned with `iw`.
#[derive(Debug, Clone)]
pub struct IwScanner {
    interface: String,
    sysfs_root: PathBuf,
}

impl IwScanner {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            sysfs_root: PathBuf::from("/sys/class/net"),
        }
    }
}

impl NetworkScanner for IwScanner {
    async fn is_connected(&mut self) -> bool {
        let path = self.sysfs_root.join(&self.interface).join("operstate");
        match tokio::fs::read_to_string(&path).await {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot read operstate");
                false
            }
        }
    }

    async fn scan(&mut self) -> Result<Vec<AccessPoint>, DeviceError> {
        let output = Command::new("iw")
            .args(["dev", &self.interface, "scan"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(DeviceError::Bus(format!(
                "iw scan exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_iw_scan(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn disable_power_save(&mut self) -> Result<(), DeviceError> {
        let output = Command::new("iw")
            .args(["dev", &self.interface, "set", "power_save", "off"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(DeviceError::Bus(format!(
                "iw set power_save exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(interface = %self.interface, "Wireless power save disabled");
        Ok(())
    }
}
