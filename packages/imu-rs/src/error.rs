// Error types for capture, persistence and analysis

use thiserror::Error;

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors that abort a capture session or a post-processing step.
///
/// Per-payload decode failures are deliberately not part of this enum; see
/// [`DecodeError`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Trace already sealed: {0}")]
    TraceSealed(String),

    #[error("Session already running")]
    AlreadyRunning,

    #[error("Background task failed: {0}")]
    Join(String),
}

impl CaptureError {
    /// True for failures to reach the transport at session start.
    pub fn is_connection(&self) -> bool {
        matches!(self, CaptureError::Connection(_))
    }
}

const EXCERPT_CHARS: usize = 80;

/// A payload that looked like a JSON object but could not be decoded.
///
/// Recoverable: the session reports it and moves on to the next payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} (payload: {raw_excerpt:?})")]
pub struct DecodeError {
    pub reason: String,
    pub raw_excerpt: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        let raw_excerpt = match raw.char_indices().nth(EXCERPT_CHARS) {
            Some((cut, _)) => format!("{}...", &raw[..cut]),
            None => raw.to_string(),
        };
        Self {
            reason: reason.into(),
            raw_excerpt,
        }
    }
}
