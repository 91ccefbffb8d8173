use crate::error::{CaptureError, CaptureResult};
use crate::source::TransportConfig;
use crate::types::AlertBand;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gravity used to express acceleration bands in g.
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Default serial read timeout (one second, like the acquisition script).
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

/// Ordered alert bands per signal. Order is presentation order only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSet {
    pub acceleration: Vec<AlertBand>,
    pub gyroscope: Vec<AlertBand>,
}

impl Default for BandSet {
    fn default() -> Self {
        Self {
            acceleration: [10.0, 6.0, 4.0, 3.0]
                .into_iter()
                .map(g_band)
                .collect(),
            gyroscope: [800.0, 500.0, 300.0, 200.0, 100.0]
                .into_iter()
                .map(deg_per_sec_band)
                .collect(),
        }
    }
}

/// `> Ng` band at N times standard gravity.
pub fn g_band(multiple: f64) -> AlertBand {
    AlertBand::new(format!("> {}g", multiple), multiple * STANDARD_GRAVITY)
}

/// `> N deg/s` band, threshold stored in rad/s.
pub fn deg_per_sec_band(degrees: f64) -> AlertBand {
    AlertBand::new(format!("> {} deg/s", degrees), degrees.to_radians())
}

impl BandSet {
    pub fn validate(&self) -> CaptureResult<()> {
        for (signal, bands) in [
            ("acceleration", &self.acceleration),
            ("gyroscope", &self.gyroscope),
        ] {
            for band in bands {
                if band.label.trim().is_empty() {
                    return Err(CaptureError::InvalidConfig(format!(
                        "{} band with empty label",
                        signal
                    )));
                }
                if !band.threshold.is_finite() {
                    return Err(CaptureError::InvalidConfig(format!(
                        "{} band '{}' has non-finite threshold",
                        signal, band.label
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        let bands: BandSet = serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfig(format!("Invalid band file: {}", e)))?;
        bands.validate()?;
        Ok(bands)
    }

    /// Load a band set from a JSON file of the form
    /// `{"acceleration": [{"label": .., "threshold": ..}], "gyroscope": [..]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::InvalidConfig(format!(
                "Failed to read band file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }
}

/// Where a run's artifacts land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("test_data")
    }
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join("summaries")
    }

    pub fn resultants_dir(&self) -> PathBuf {
        self.root.join("resultants")
    }

    /// `raw/imu_log_YYYYmmdd_HHMMSS.csv`
    pub fn trace_path(&self, started_at: DateTime<Local>) -> PathBuf {
        self.raw_dir().join(format!(
            "imu_log_{}.csv",
            started_at.format("%Y%m%d_%H%M%S")
        ))
    }
}

/// Stem used to name artifacts derived from a trace.
pub fn trace_stem(trace_path: &Path) -> String {
    trace_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("trace")
        .to_string()
}

/// Fully resolved settings for one capture run.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub transport: TransportConfig,
    pub layout: DataLayout,
    pub bands: BandSet,
    /// Upper bound on a single blocking read
    pub poll_timeout: Duration,
    /// Print accepted payloads and bad-data notices to stdout
    pub echo_payloads: bool,
}

impl CaptureConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            layout: DataLayout::default(),
            bands: BandSet::default(),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            echo_payloads: true,
        }
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.poll_timeout.is_zero() {
            return Err(CaptureError::InvalidConfig(
                "poll timeout must be positive".to_string(),
            ));
        }
        self.transport.validate()?;
        self.bands.validate()
    }
}
