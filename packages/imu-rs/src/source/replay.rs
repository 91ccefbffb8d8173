// Replay source
//
// Feeds a previously recorded newline-delimited capture (for example a serial
// dump saved with `cat /dev/ttyUSB0 > run.ndjson`) through the same pipeline
// as a live device. Useful for re-running a session offline and for testing
// without hardware. The source ends when the file does.

use super::line::{pump_lines, LineReader};
use super::{SourceCloser, SourceMetadata, TransportSource};
use crate::error::{CaptureError, CaptureResult};
use crate::types::RawPayload;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::sync::mpsc;

pub struct ReplaySource {
    path: PathBuf,
    rate_limit: Option<Duration>,
    timeout: Duration,
    reader: Option<LineReader<File>>,
    closer: SourceCloser,
}

impl ReplaySource {
    pub fn new(path: PathBuf, rate_limit: Option<Duration>, timeout: Duration) -> Self {
        Self {
            path,
            rate_limit,
            timeout,
            reader: None,
            closer: SourceCloser::new(),
        }
    }
}

#[async_trait]
impl TransportSource for ReplaySource {
    async fn connect(&mut self) -> CaptureResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let file = File::open(&self.path).await.map_err(|e| {
            CaptureError::Connection(format!(
                "Failed to open capture file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        log::info!("Replaying {}", self.path.display());
        self.reader = Some(LineReader::new(file));

        Ok(())
    }

    async fn start(&mut self, sender: mpsc::Sender<RawPayload>) -> CaptureResult<()> {
        if self.reader.is_none() {
            self.connect().await?;
        }

        let Some(mut reader) = self.reader.take() else {
            return Err(CaptureError::Connection(format!(
                "Capture file {} is not open",
                self.path.display()
            )));
        };

        pump_lines(
            &mut reader,
            self.timeout,
            self.rate_limit,
            &sender,
            &self.closer,
            "replay",
        )
        .await
        .map(|_| ())
    }

    fn closer(&self) -> SourceCloser {
        self.closer.clone()
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn metadata(&self) -> SourceMetadata {
        let meta = SourceMetadata::new("replay").with("path", self.path.display());
        match self.rate_limit {
            Some(delay) => meta.with("rate_limit_ms", delay.as_millis()),
            None => meta,
        }
    }
}
