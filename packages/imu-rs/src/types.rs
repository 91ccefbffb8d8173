// Common types for capture and alerting

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;

/// Column order of a persisted trace.
pub const TRACE_HEADER: [&str; 7] = ["ts", "ax", "ay", "az", "gx", "gy", "gz"];

/// One IMU reading as sent by the device.
///
/// Every field is optional at decode time: a missing or `null` key stays
/// `None` and is written as an empty cell. Field order matches
/// [`TRACE_HEADER`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Device uptime in milliseconds
    pub ts: Option<u64>,
    /// Acceleration in m/s²
    pub ax: Option<f64>,
    pub ay: Option<f64>,
    pub az: Option<f64>,
    /// Angular velocity in rad/s
    pub gx: Option<f64>,
    pub gy: Option<f64>,
    pub gz: Option<f64>,
}

impl Sample {
    pub fn new(ts: u64, accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self {
            ts: Some(ts),
            ax: Some(accel[0]),
            ay: Some(accel[1]),
            az: Some(accel[2]),
            gx: Some(gyro[0]),
            gy: Some(gyro[1]),
            gz: Some(gyro[2]),
        }
    }

    /// Acceleration vector, only if all three axes are present.
    pub fn acceleration(&self) -> Option<[f64; 3]> {
        Some([self.ax?, self.ay?, self.az?])
    }

    /// Angular velocity vector, only if all three axes are present.
    pub fn rotation(&self) -> Option<[f64; 3]> {
        Some([self.gx?, self.gy?, self.gz?])
    }

    pub fn vector(&self, signal: SignalKind) -> Option<[f64; 3]> {
        match signal {
            SignalKind::Acceleration => self.acceleration(),
            SignalKind::Gyroscope => self.rotation(),
        }
    }
}

/// Opaque bytes delivered by a transport: a serial line or an MQTT message
/// body. Not guaranteed to be text, JSON, or complete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPayload {
    bytes: Vec<u8>,
}

impl RawPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Text form for echoing to the operator.
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for RawPayload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        Self::new(text.into_bytes())
    }
}

/// A sealed capture: every accepted sample in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub path: PathBuf,
    pub samples: Vec<Sample>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The two vector signals an IMU sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Acceleration,
    Gyroscope,
}

impl SignalKind {
    pub fn title(&self) -> &'static str {
        match self {
            SignalKind::Acceleration => "Acceleration",
            SignalKind::Gyroscope => "Gyroscope",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SignalKind::Acceleration => "m/s²",
            SignalKind::Gyroscope => "rad/s",
        }
    }
}

/// A labeled magnitude threshold. A sample is counted against the band when
/// its resultant is strictly greater than `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertBand {
    pub label: String,
    pub threshold: f64,
}

impl AlertBand {
    pub fn new(label: impl Into<String>, threshold: f64) -> Self {
        Self {
            label: label.into(),
            threshold,
        }
    }
}

/// Number of samples above one band's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCount {
    pub label: String,
    pub threshold: f64,
    pub count: usize,
}

/// Crossing counts for one signal, bands in caller order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub signal: SignalKind,
    /// Samples with all three axes present
    pub qualifying_samples: usize,
    /// Largest resultant seen, if any sample qualified
    pub peak: Option<f64>,
    pub bands: Vec<BandCount>,
}

/// Alert counts derived from a sealed trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total_samples: usize,
    pub acceleration: SignalSummary,
    pub gyroscope: SignalSummary,
}

impl AlertSummary {
    pub fn signal(&self, signal: SignalKind) -> &SignalSummary {
        match signal {
            SignalKind::Acceleration => &self.acceleration,
            SignalKind::Gyroscope => &self.gyroscope,
        }
    }

    /// Count for the band with the given label, searching both signals.
    pub fn count_for(&self, label: &str) -> Option<usize> {
        self.acceleration
            .bands
            .iter()
            .chain(self.gyroscope.bands.iter())
            .find(|b| b.label == label)
            .map(|b| b.count)
    }
}
