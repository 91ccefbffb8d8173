pub mod analyzer;
pub mod batch;
pub mod config;
pub mod decoder;
pub mod error;
pub mod report;
pub mod session;
pub mod sink;
pub mod source;
pub mod stop;
pub mod trace;
pub mod types;

pub use analyzer::{analyze, ResultantSeries};
pub use batch::{postprocess, resolve_traces, AnalyzedTrace};
pub use config::{BandSet, CaptureConfig, DataLayout};
pub use error::{CaptureError, CaptureResult, DecodeError};
pub use session::{CaptureReport, CaptureSession, SessionEvent, SessionOptions, SessionState, StopReason};
pub use source::{create_source, MqttSettings, TransportConfig, TransportSource};
pub use stop::StopSignal;
pub use trace::{read_trace, TraceWriter};
pub use types::*;
