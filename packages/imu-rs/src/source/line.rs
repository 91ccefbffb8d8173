// Newline framing with a bounded read
//
// Serial devices and capture files both deliver one payload per line. A read
// that times out keeps whatever partial line it already consumed, so the next
// call continues the same line instead of dropping bytes. A line that grows
// past the size cap without a terminator is emitted as-is.

use crate::error::{CaptureError, CaptureResult};
use crate::source::SourceCloser;
use crate::types::RawPayload;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

/// Longest line kept before it is emitted unterminated
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Result of one polling read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A complete line, terminator stripped
    Payload(RawPayload),
    /// Nothing complete arrived within the timeout
    Timeout,
    /// The underlying stream reached end of input
    Closed,
}

pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    max_line: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            max_line: MAX_LINE_BYTES,
            eof: false,
        }
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line.max(1);
        self
    }

    /// Wait up to `timeout` for the next line.
    pub async fn next_payload(&mut self, timeout: Duration) -> io::Result<PollOutcome> {
        if self.eof {
            return Ok(PollOutcome::Closed);
        }

        if self.pending.len() >= self.max_line {
            return Ok(PollOutcome::Payload(self.take_line()));
        }

        // read_until appends everything it consumes to `pending`, even when
        // the timeout drops it halfway through a line
        let limit = (self.max_line - self.pending.len()) as u64;
        let mut bounded = (&mut self.reader).take(limit);
        let read =
            tokio::time::timeout(timeout, bounded.read_until(b'\n', &mut self.pending)).await;

        match read {
            Err(_) => Ok(PollOutcome::Timeout),
            Ok(Err(e)) => Err(e),
            Ok(Ok(0)) => {
                self.eof = true;
                if self.pending.is_empty() {
                    Ok(PollOutcome::Closed)
                } else {
                    Ok(PollOutcome::Payload(self.take_line()))
                }
            }
            Ok(Ok(_)) => {
                if self.pending.last() != Some(&b'\n') {
                    if self.pending.len() >= self.max_line {
                        log::warn!("Line exceeded {} bytes without a terminator", self.max_line);
                    } else {
                        // Final unterminated line
                        self.eof = true;
                    }
                }
                Ok(PollOutcome::Payload(self.take_line()))
            }
        }
    }

    fn take_line(&mut self) -> RawPayload {
        let mut line = std::mem::take(&mut self.pending);
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        RawPayload::from(line)
    }
}

/// Forward lines to `sender` until the closer fires, input ends, or the
/// receiver goes away. Returns the number of payloads delivered.
pub(crate) async fn pump_lines<R: AsyncRead + Unpin + Send>(
    reader: &mut LineReader<R>,
    timeout: Duration,
    pacing: Option<Duration>,
    sender: &mpsc::Sender<RawPayload>,
    closer: &SourceCloser,
    label: &str,
) -> CaptureResult<u64> {
    let shutdown = closer.token();
    let mut delivered = 0u64;

    loop {
        let outcome = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                log::info!("{} source closed", label);
                break;
            }

            outcome = reader.next_payload(timeout) => outcome,
        };

        let outcome = outcome.map_err(|e| {
            log::error!("{} read error: {}", label, e);
            CaptureError::Io(e)
        })?;

        match outcome {
            PollOutcome::Payload(payload) => {
                if payload.is_empty() {
                    continue;
                }
                if sender.send(payload).await.is_err() {
                    log::info!("{} receiver closed, stopping", label);
                    break;
                }
                delivered += 1;
                if delivered % 1000 == 0 {
                    log::debug!("{}: {} payloads delivered", label, delivered);
                }

                if let Some(delay) = pacing {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
            PollOutcome::Timeout => {
                log::trace!("{} read timed out, polling again", label);
            }
            PollOutcome::Closed => {
                log::info!("{} input ended after {} payloads", label, delivered);
                break;
            }
        }
    }

    Ok(delivered)
}
