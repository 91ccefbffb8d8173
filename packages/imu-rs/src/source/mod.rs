// Pluggable payload transports
//
// Every transport implements `TransportSource`. The capture session connects
// it, runs `start` on a background task and receives payloads through a
// bounded channel, so decode/append/echo logic exists once regardless of where
// bytes come from.
//
// Current implementations:
// - Serial: newline-delimited JSON from a USB serial device, read with a timeout
// - MQTT: one JSON object per message on a broker topic
// - Replay: a previously recorded newline-delimited capture file

mod line;
mod mqtt;
mod replay;
mod serial;

use crate::error::{CaptureError, CaptureResult};
use crate::types::RawPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use line::{LineReader, PollOutcome};
pub use mqtt::{MqttSettings, MqttSource};
pub use replay::ReplaySource;
pub use serial::SerialSource;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_MQTT_PORT: u16 = 8883;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

/// Transport selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    /// Serial device (e.g. /dev/ttyUSB0, COM3)
    #[serde(rename = "serial")]
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },

    /// MQTT topic subscription
    #[serde(rename = "mqtt")]
    Mqtt(MqttSettings),

    /// Recorded newline-delimited capture
    #[serde(rename = "replay")]
    Replay {
        path: PathBuf,
        /// Delay between payloads in milliseconds
        #[serde(default)]
        rate_limit_ms: Option<u64>,
    },
}

impl TransportConfig {
    pub fn validate(&self) -> CaptureResult<()> {
        match self {
            TransportConfig::Serial { port, baud_rate } => {
                if port.trim().is_empty() {
                    return Err(CaptureError::InvalidConfig(
                        "serial port must not be empty".to_string(),
                    ));
                }
                if *baud_rate == 0 {
                    return Err(CaptureError::InvalidConfig(
                        "baud rate must be positive".to_string(),
                    ));
                }
                Ok(())
            }
            TransportConfig::Mqtt(settings) => settings.validate(),
            TransportConfig::Replay { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err(CaptureError::InvalidConfig(
                        "replay path must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Serial { .. } => "serial",
            TransportConfig::Mqtt(_) => "mqtt",
            TransportConfig::Replay { .. } => "replay",
        }
    }
}

/// Descriptive information about a connected transport, for logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub kind: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl SourceMetadata {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            properties: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

/// Cloneable handle that stops a running transport.
///
/// `close` may be called any number of times, from any task, including
/// while the transport is in the middle of delivering a payload.
#[derive(Debug, Clone, Default)]
pub struct SourceCloser {
    token: CancellationToken,
}

impl SourceCloser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// A source of raw payloads.
///
/// `start` runs until the transport ends, the receiver is dropped, or the
/// closer fires. Delivery order on the channel equals arrival order.
#[async_trait]
pub trait TransportSource: Send {
    /// Establish the connection. Failure here aborts the session.
    async fn connect(&mut self) -> CaptureResult<()>;

    /// Deliver payloads to `sender` until stopped.
    async fn start(&mut self, sender: mpsc::Sender<RawPayload>) -> CaptureResult<()>;

    /// Handle for stopping `start` from another task.
    fn closer(&self) -> SourceCloser;

    fn close(&self) {
        self.closer().close();
    }

    fn is_connected(&self) -> bool;

    fn metadata(&self) -> SourceMetadata;
}

/// Build the transport named by `config`.
pub fn create_source(
    config: &TransportConfig,
    poll_timeout: Duration,
) -> CaptureResult<Box<dyn TransportSource>> {
    config.validate()?;

    match config {
        TransportConfig::Serial { port, baud_rate } => Ok(Box::new(SerialSource::new(
            port.clone(),
            *baud_rate,
            poll_timeout,
        ))),

        TransportConfig::Mqtt(settings) => Ok(Box::new(MqttSource::new(settings.clone()))),

        TransportConfig::Replay {
            path,
            rate_limit_ms,
        } => Ok(Box::new(ReplaySource::new(
            path.clone(),
            rate_limit_ms.map(Duration::from_millis),
            poll_timeout,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde_tags() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"type":"serial","port":"/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(
            config,
            TransportConfig::Serial {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: DEFAULT_BAUD_RATE,
            }
        );
        assert_eq!(config.kind(), "serial");

        let config: TransportConfig = serde_json::from_str(
            r#"{"type":"mqtt","host":"broker.local","topic":"imu/test"}"#,
        )
        .unwrap();
        match config {
            TransportConfig::Mqtt(settings) => {
                assert_eq!(settings.port, DEFAULT_MQTT_PORT);
                assert!(!settings.requires_tls());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_transport_rejected() {
        assert!(serde_json::from_str::<TransportConfig>(r#"{"type":"bluetooth"}"#).is_err());
    }

    #[test]
    fn test_create_source_validates() {
        let bad = TransportConfig::Serial {
            port: " ".to_string(),
            baud_rate: 9600,
        };
        assert!(create_source(&bad, Duration::from_millis(10)).is_err());

        let ok = TransportConfig::Replay {
            path: PathBuf::from("capture.ndjson"),
            rate_limit_ms: None,
        };
        let source = create_source(&ok, Duration::from_millis(10)).unwrap();
        assert!(!source.is_connected());
        assert_eq!(source.metadata().kind, "replay");
    }

    #[test]
    fn test_closer_is_idempotent_and_shared() {
        let closer = SourceCloser::new();
        let other = closer.clone();
        assert!(!other.is_closed());
        closer.close();
        closer.close();
        assert!(other.is_closed());
    }
}
