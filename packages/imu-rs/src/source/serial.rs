// Serial port transport
//
// Opens a USB serial device (e.g. /dev/ttyUSB0, /dev/ttyACM0, COM3) and reads
// newline-delimited JSON, one IMU sample per line. Reads are bounded by the
// poll timeout so the loop notices a close promptly even on a silent line.

use super::line::{pump_lines, LineReader, PollOutcome};
use super::{SourceCloser, SourceMetadata, TransportSource};
use crate::error::{CaptureError, CaptureResult};
use crate::types::RawPayload;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub struct SerialSource {
    port: String,
    baud_rate: u32,
    timeout: Duration,
    reader: Option<LineReader<SerialStream>>,
    closer: SourceCloser,
}

impl SerialSource {
    pub fn new(port: String, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port,
            baud_rate,
            timeout,
            reader: None,
            closer: SourceCloser::new(),
        }
    }

    /// Block up to the poll timeout for the next line.
    ///
    /// `PollOutcome::Timeout` is not an error; callers simply poll again.
    pub async fn next_payload(&mut self) -> CaptureResult<PollOutcome> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            CaptureError::Serial(format!("Serial port {} is not open", self.port))
        })?;

        reader
            .next_payload(self.timeout)
            .await
            .map_err(|e| CaptureError::Serial(format!("Read failed: {}", e)))
    }
}

#[async_trait]
impl TransportSource for SerialSource {
    async fn connect(&mut self) -> CaptureResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        log::info!(
            "Opening serial port: {} at {} baud",
            self.port,
            self.baud_rate
        );

        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .open_native_async()
            .map_err(|e| {
                CaptureError::Connection(format!(
                    "Failed to open serial port {}: {}",
                    self.port, e
                ))
            })?;

        self.reader = Some(LineReader::new(stream));
        log::info!("Serial port opened successfully");

        Ok(())
    }

    async fn start(&mut self, sender: mpsc::Sender<RawPayload>) -> CaptureResult<()> {
        if self.reader.is_none() {
            self.connect().await?;
        }

        let Some(mut reader) = self.reader.take() else {
            return Err(CaptureError::Serial(format!(
                "Serial port {} is not open",
                self.port
            )));
        };

        log::info!("Serial stream started on {}", self.port);

        let result = pump_lines(
            &mut reader,
            self.timeout,
            None,
            &sender,
            &self.closer,
            "serial",
        )
        .await;

        // Port is released when the reader drops
        drop(reader);
        log::info!("Serial port {} released", self.port);

        result.map(|_| ())
    }

    fn closer(&self) -> SourceCloser {
        self.closer.clone()
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn metadata(&self) -> SourceMetadata {
        SourceMetadata::new("serial")
            .with("port", &self.port)
            .with("baud_rate", self.baud_rate)
            .with("timeout_ms", self.timeout.as_millis())
    }
}
