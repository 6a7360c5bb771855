//! Sensor readers.
//!
//! Each reader wraps one sensor family behind a narrow driver trait and turns
//! every device fault into [`Reading::Unavailable`](poolsense_common::Reading),
//! logging which sensor failed. Nothing raised by a driver crosses a reader.
//!
//! | Reader | Driver trait | Protocol |
//! |--------|--------------|----------|
//! | [`AnalogTemperatureReader`] | [`AnalogChannel`] | single raw read, linear calibration |
//! | [`OneWireReader`] | [`OneWireBus`] | convert, settle, read, settle |
//! | [`ClimateReader`] | [`ClimateProbe`] | measure, settle |

pub mod analog;
pub mod climate;
pub mod onewire;
pub mod sysfs;

pub use analog::{AnalogChannel, AnalogTemperatureReader, TemperatureCalibration};
pub use climate::{ClimateProbe, ClimateReader, ClimateReading, ClimateSample};
pub use onewire::{OneWireBus, OneWireReader, SensorIdentity};
