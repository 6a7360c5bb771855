use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field names of a [`Payload`], in wire order.
pub const FIELD_NAMES: [&str; 6] = [
    "picotemp", "pooltemp", "pondtemp", "airtemp", "humidity", "wlanRSSI",
];

/// A single measurement that may be absent.
///
/// Absence is a value, not an error: an unavailable reading still serializes
/// (as `null`) so the payload keeps the same shape every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    /// The sensor produced a value.
    Value(T),
    /// The sensor could not be read this cycle.
    Unavailable,
}

impl<T> Reading<T> {
    /// Whether a value is present.
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

impl<T> Default for Reading<T> {
    fn default() -> Self {
        Reading::Unavailable
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reading::Value(v),
            None => Reading::Unavailable,
        }
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => v.serialize(serializer),
            Reading::Unavailable => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Reading<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Reading::from)
    }
}

/// Round a temperature to one decimal place.
///
/// Values that round to zero from below come out as `0.0`, not `-0.0`.
pub fn round_tenths(celsius: f64) -> f64 {
    (celsius * 10.0).round() / 10.0 + 0.0
}

/// The aggregate of all readings taken during one cycle.
///
/// Every field is always present on the wire. Fields serialize in declaration
/// order, which is the order of [`FIELD_NAMES`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Onboard analog channel temperature (°C, one decimal).
    pub picotemp: Reading<f64>,

    /// Pool one-wire probe temperature (°C, one decimal).
    pub pooltemp: Reading<f64>,

    /// Pond one-wire probe temperature (°C, one decimal).
    pub pondtemp: Reading<f64>,

    /// Combined probe air temperature (°C, one decimal).
    pub airtemp: Reading<f64>,

    /// Combined probe relative humidity (integer %).
    pub humidity: Reading<u8>,

    /// Signal strength of the configured wireless network (dBm).
    #[serde(rename = "wlanRSSI")]
    pub wlan_rssi: Reading<i32>,
}

impl Payload {
    /// Number of readings that were available this cycle.
    pub fn available_count(&self) -> usize {
        [
            self.picotemp.is_available(),
            self.pooltemp.is_available(),
            self.pondtemp.is_available(),
            self.airtemp.is_available(),
            self.humidity.is_available(),
            self.wlan_rssi.is_available(),
        ]
        .into_iter()
        .filter(|available| *available)
        .count()
    }
}
