//! Scripted drivers and transport shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use poolsense_node::broker::TransportError;
use poolsense_node::link::{AccessPoint, NetworkScanner};
use poolsense_node::sensor::{
    AnalogChannel, AnalogTemperatureReader, ClimateProbe, ClimateReader, ClimateSample,
    OneWireBus, OneWireReader, SensorIdentity, TemperatureCalibration,
};
use poolsense_node::{
    BrokerSession, CycleOrchestrator, CycleSettings, DeviceError, SensorSuite, Transport,
};
use tokio::time::Instant;

pub const POOL: &str = "28-0316a2794aff";
pub const POND: &str = "28-0517c1a4e3ff";
pub const SSID: &str = "home";
pub const TOPIC: &str = "home/pool/sensors";
pub const SETTLE: Duration = Duration::from_millis(750);
pub const INTERVAL: Duration = Duration::from_secs(60);

/// Raw sample that converts to 21.4 °C with the default calibration.
pub const RAW_21_4: u16 = 14212;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Convert,
    ReadProbe(String),
    Measure,
    Scan,
    Connect,
    Publish(String),
    Disconnect,
}

#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<(Instant, Call)>>>);

impl CallLog {
    pub fn record(&self, call: Call) {
        self.0.borrow_mut().push((Instant::now(), call));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().iter().map(|(_, c)| c.clone()).collect()
    }

    /// Time of every recorded call equal to `call`.
    pub fn times_of(&self, call: &Call) -> Vec<Instant> {
        self.0
            .borrow()
            .iter()
            .filter(|(_, c)| c == call)
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn published(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Publish(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.times_of(call).len()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

pub struct MockAnalog(pub Option<u16>);

impl AnalogChannel for MockAnalog {
    fn read_u16(&mut self) -> Result<u16, DeviceError> {
        self.0.ok_or(DeviceError::NotFound("adc".into()))
    }
}

#[derive(Clone)]
pub struct MockBus {
    log: CallLog,
    pub fail_convert: bool,
    pub temps: HashMap<String, Option<f64>>,
}

impl OneWireBus for MockBus {
    async fn scan(&mut self) -> Result<Vec<SensorIdentity>, DeviceError> {
        Ok(self.temps.keys().map(SensorIdentity::new).collect())
    }

    async fn convert(&mut self) -> Result<(), DeviceError> {
        self.log.record(Call::Convert);
        if self.fail_convert {
            Err(DeviceError::Bus("no presence pulse".into()))
        } else {
            Ok(())
        }
    }

    async fn read_celsius(&mut self, id: &SensorIdentity) -> Result<f64, DeviceError> {
        self.log.record(Call::ReadProbe(id.to_string()));
        match self.temps.get(id.as_str()) {
            Some(Some(celsius)) => Ok(*celsius),
            Some(None) => Err(DeviceError::Timeout),
            None => Err(DeviceError::NotFound(id.to_string())),
        }
    }
}

pub struct MockClimate {
    log: CallLog,
    pub sample: Option<ClimateSample>,
}

impl ClimateProbe for MockClimate {
    async fn measure(&mut self) -> Result<ClimateSample, DeviceError> {
        self.log.record(Call::Measure);
        self.sample.ok_or(DeviceError::Checksum)
    }
}

pub struct MockScanner {
    log: CallLog,
    pub signal: Option<String>,
}

impl NetworkScanner for MockScanner {
    async fn is_connected(&mut self) -> bool {
        true
    }

    async fn scan(&mut self) -> Result<Vec<AccessPoint>, DeviceError> {
        self.log.record(Call::Scan);
        match &self.signal {
            Some(signal) => Ok(vec![AccessPoint {
                ssid: SSID.to_string(),
                signal: signal.clone(),
            }]),
            None => Err(DeviceError::Bus("scan aborted".into())),
        }
    }
}

/// Transport answering from scripted outcomes; an empty script means success.
pub struct MockTransport {
    log: CallLog,
    pub connect_results: VecDeque<bool>,
    pub publish_results: VecDeque<bool>,
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.log.record(Call::Connect);
        if self.connect_results.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(TransportError::Unreachable("network unreachable".into()))
        }
    }

    async fn publish(&mut self, _topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.log
            .record(Call::Publish(String::from_utf8(payload.to_vec()).unwrap()));
        if self.publish_results.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(TransportError::Client("connection reset by peer".into()))
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.log.record(Call::Disconnect);
        Ok(())
    }
}

/// Sensor and broker behaviour for one test node.
pub struct Script {
    pub raw: Option<u16>,
    pub pool: Option<f64>,
    pub pond: Option<f64>,
    pub fail_convert: bool,
    pub climate: Option<ClimateSample>,
    pub signal: Option<String>,
    pub connect_results: Vec<bool>,
    pub publish_results: Vec<bool>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            raw: Some(RAW_21_4),
            pool: Some(18.2),
            pond: Some(17.9),
            fail_convert: false,
            climate: Some(ClimateSample {
                celsius: 22.0,
                humidity_percent: 55.0,
            }),
            signal: Some("-47.00 dBm".to_string()),
            connect_results: Vec::new(),
            publish_results: Vec::new(),
        }
    }
}

pub type TestNode =
    CycleOrchestrator<MockAnalog, MockBus, MockClimate, MockScanner, MockTransport>;

pub fn node(script: Script) -> (TestNode, CallLog) {
    let log = CallLog::default();

    let mut temps = HashMap::new();
    temps.insert(POOL.to_string(), script.pool);
    temps.insert(POND.to_string(), script.pond);

    let sensors = SensorSuite {
        analog: AnalogTemperatureReader::new(
            MockAnalog(script.raw),
            TemperatureCalibration::default(),
        ),
        onewire: OneWireReader::new(
            MockBus {
                log: log.clone(),
                fail_convert: script.fail_convert,
                temps,
            },
            SETTLE,
        ),
        pool_probe: SensorIdentity::new(POOL),
        pond_probe: SensorIdentity::new(POND),
        climate: ClimateReader::new(
            MockClimate {
                log: log.clone(),
                sample: script.climate,
            },
            SETTLE,
        ),
    };

    let link = poolsense_node::link::LinkMonitor::new(MockScanner {
        log: log.clone(),
        signal: script.signal,
    });

    let session = BrokerSession::new(MockTransport {
        log: log.clone(),
        connect_results: script.connect_results.into(),
        publish_results: script.publish_results.into(),
    });

    let settings = CycleSettings {
        ssid: SSID.to_string(),
        topic: TOPIC.to_string(),
        interval: INTERVAL,
    };

    (
        CycleOrchestrator::new(sensors, link, session, settings),
        log,
    )
}
