// Capture session - drives one capture run from connect to analysis
//
// The session manages:
// - Transport lifecycle (connect, start on a background task, close)
// - Decoding payloads and appending accepted samples to the trace
// - Reporting accepted payloads and malformed data as events for echo
// - Finalizing the trace exactly once, on interrupt or end of input
// - Running post-processing sinks on the sealed trace
//
// The trace writer lives on the session loop only. Interrupts trip the
// StopSignal, which the loop observes between payloads, so a row is never
// half-written when the trace is sealed. Payloads the transport delivered
// before the stop are still written.

use crate::batch::postprocess;
use crate::config::{BandSet, CaptureConfig};
use crate::decoder::{decode, Decoded};
use crate::error::{CaptureError, CaptureResult};
use crate::sink::{default_sinks, TraceSink};
use crate::source::{create_source, SourceMetadata, TransportSource};
use crate::stop::StopSignal;
use crate::trace::TraceWriter;
use crate::types::{AlertSummary, RawPayload};
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Capturing,
    Finalizing,
    Done,
}

/// Why capturing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop signal fired
    Interrupted,
    /// The transport ran out of input
    SourceExhausted,
    /// The transport failed after connecting
    SourceFailed,
    /// A row could not be written to the trace
    WriteFailed,
}

/// Events emitted while a session runs
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    CaptureStarted {
        trace_path: PathBuf,
        source: SourceMetadata,
    },
    TraceSealed {
        trace_path: PathBuf,
        rows: u64,
    },
    /// An accepted payload, as text (only when echo is enabled)
    Payload(String),
    /// A payload that failed to decode (only when echo is enabled)
    BadData(String),
}

type EventCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Live counters, readable from any task while the session runs.
#[derive(Debug, Clone)]
pub struct CaptureProgress {
    payloads_received: Arc<AtomicU64>,
    samples_written: Arc<AtomicU64>,
    decode_errors: Arc<AtomicU64>,
    ignored: Arc<AtomicU64>,
    analysis_passes: Arc<AtomicU64>,
    state: Arc<RwLock<SessionState>>,
}

impl Default for CaptureProgress {
    fn default() -> Self {
        Self {
            payloads_received: Arc::new(AtomicU64::new(0)),
            samples_written: Arc::new(AtomicU64::new(0)),
            decode_errors: Arc::new(AtomicU64::new(0)),
            ignored: Arc::new(AtomicU64::new(0)),
            analysis_passes: Arc::new(AtomicU64::new(0)),
            state: Arc::new(RwLock::new(SessionState::Idle)),
        }
    }
}

impl CaptureProgress {
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            state: self.state(),
            payloads_received: self.payloads_received.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            analysis_passes: self.analysis_passes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub state: SessionState,
    pub payloads_received: u64,
    pub samples_written: u64,
    pub decode_errors: u64,
    pub ignored: u64,
    pub analysis_passes: u64,
}

pub struct SessionOptions {
    pub trace_path: PathBuf,
    pub echo_payloads: bool,
    pub bands: BandSet,
    pub channel_capacity: usize,
    /// How long to wait for the transport task after closing it
    pub drain_timeout: Duration,
}

impl SessionOptions {
    pub fn new(trace_path: impl Into<PathBuf>) -> Self {
        Self {
            trace_path: trace_path.into(),
            echo_payloads: false,
            bands: BandSet::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Result of a completed session.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub trace_path: PathBuf,
    pub rows: u64,
    pub stats: CaptureStats,
    pub summary: Option<AlertSummary>,
    pub stop_reason: StopReason,
    pub artifacts: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

pub struct CaptureSession {
    source: Option<Box<dyn TransportSource>>,
    options: SessionOptions,
    sinks: Vec<Box<dyn TraceSink>>,
    stop: StopSignal,
    progress: CaptureProgress,
    event_callback: Option<EventCallback>,
}

impl CaptureSession {
    pub fn new(source: Box<dyn TransportSource>, options: SessionOptions, stop: StopSignal) -> Self {
        Self {
            source: Some(source),
            options,
            sinks: Vec::new(),
            stop,
            progress: CaptureProgress::default(),
            event_callback: None,
        }
    }

    /// Build a session for `config`, with the trace named after `started_at`
    /// and the default summary and resultant sinks.
    pub fn from_config(config: &CaptureConfig, started_at: DateTime<Local>) -> CaptureResult<Self> {
        config.validate()?;
        let source = create_source(&config.transport, config.poll_timeout)?;

        let mut options = SessionOptions::new(config.layout.trace_path(started_at));
        options.echo_payloads = config.echo_payloads;
        options.bands = config.bands.clone();

        let mut session = Self::new(source, options, StopSignal::new());
        session.sinks = default_sinks(&config.layout);
        Ok(session)
    }

    pub fn with_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn set_event_callback<F>(&mut self, callback: F)
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Box::new(callback));
    }

    /// Handle for stopping the session from another task or a signal handler.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn progress(&self) -> CaptureProgress {
        self.progress.clone()
    }

    pub fn state(&self) -> SessionState {
        self.progress.state()
    }

    pub fn trace_path(&self) -> &Path {
        &self.options.trace_path
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(callback) = self.event_callback.as_ref() {
            callback(event);
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.progress.state.write() = state;
        self.emit(SessionEvent::StateChanged(state));
    }

    /// Run the session to completion.
    ///
    /// Returns once the stop signal fires or the transport ends, after the
    /// trace has been sealed and analyzed. Fails without creating a trace if
    /// the transport cannot be opened.
    pub async fn run(&mut self) -> CaptureResult<CaptureReport> {
        if self.state() != SessionState::Idle {
            return Err(CaptureError::AlreadyRunning);
        }
        let Some(source) = self.source.as_mut() else {
            return Err(CaptureError::AlreadyRunning);
        };

        source.connect().await?;
        let metadata = source.metadata();
        log::info!("Transport connected: {} {:?}", metadata.kind, metadata.properties);

        let mut writer = match TraceWriter::open(&self.options.trace_path) {
            Ok(writer) => writer,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        let Some(mut source) = self.source.take() else {
            return Err(CaptureError::AlreadyRunning);
        };
        let closer = source.closer();
        let started = Instant::now();

        self.set_state(SessionState::Capturing);
        self.emit(SessionEvent::CaptureStarted {
            trace_path: self.options.trace_path.clone(),
            source: metadata,
        });

        let (tx, mut rx) = mpsc::channel::<RawPayload>(self.options.channel_capacity);
        let mut producer = tokio::spawn(async move { source.start(tx).await });

        let stop = self.stop.clone();

        let mut stop_reason = loop {
            tokio::select! {
                // Stop wins over a payload that is already queued
                biased;

                _ = stop.stopped() => break StopReason::Interrupted,

                payload = rx.recv() => match payload {
                    Some(payload) => {
                        if let Err(e) = self.handle_payload(&mut writer, &payload) {
                            log::error!("Failed to append to {}: {}", writer.path().display(), e);
                            break StopReason::WriteFailed;
                        }
                    }
                    None => break StopReason::SourceExhausted,
                },
            }
        };

        self.set_state(SessionState::Finalizing);
        closer.close();

        if stop_reason == StopReason::Interrupted {
            // Bounded by what the channel could hold when the stop fired
            let mut drained = 0usize;
            while drained < self.options.channel_capacity {
                let Ok(payload) = rx.try_recv() else {
                    break;
                };
                drained += 1;
                if let Err(e) = self.handle_payload(&mut writer, &payload) {
                    log::error!("Failed to append to {}: {}", writer.path().display(), e);
                    stop_reason = StopReason::WriteFailed;
                    break;
                }
            }
            if drained > 0 {
                log::info!("Wrote {} payloads queued before the stop", drained);
            }
        }
        drop(rx);

        let sealed = match tokio::task::spawn_blocking(move || {
            writer.finalize().map(|path| (path, writer.rows()))
        })
        .await
        {
            Ok(sealed) => sealed,
            Err(e) => Err(CaptureError::Join(e.to_string())),
        };

        match tokio::time::timeout(self.options.drain_timeout, &mut producer).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                log::error!("Transport failed: {}", e);
                if stop_reason == StopReason::SourceExhausted {
                    stop_reason = StopReason::SourceFailed;
                }
            }
            Ok(Err(e)) => {
                log::error!("Transport task panicked: {}", e);
                if stop_reason == StopReason::SourceExhausted {
                    stop_reason = StopReason::SourceFailed;
                }
            }
            Err(_) => {
                log::warn!(
                    "Transport did not stop within {:?}, aborting it",
                    self.options.drain_timeout
                );
                producer.abort();
            }
        }

        let (trace_path, rows) = match sealed {
            Ok(sealed) => sealed,
            Err(e) => {
                self.set_state(SessionState::Done);
                return Err(e);
            }
        };

        self.emit(SessionEvent::TraceSealed {
            trace_path: trace_path.clone(),
            rows,
        });

        // Analysis failure is reported, the sealed trace is still the result
        self.progress.analysis_passes.fetch_add(1, Ordering::Relaxed);
        let bands = self.options.bands.clone();
        let mut sinks = std::mem::take(&mut self.sinks);
        let analysis_path = trace_path.clone();
        let analysis = tokio::task::spawn_blocking(move || {
            let analyzed = postprocess(&analysis_path, &bands, &mut sinks);
            (analyzed, sinks)
        })
        .await;

        let (summary, artifacts) = match analysis {
            Ok((Ok(analyzed), sinks)) => {
                self.sinks = sinks;
                (Some(analyzed.summary), analyzed.artifacts)
            }
            Ok((Err(e), sinks)) => {
                self.sinks = sinks;
                log::error!("Analysis of {} failed: {}", trace_path.display(), e);
                (None, Vec::new())
            }
            Err(e) => {
                log::error!("Analysis task for {} failed: {}", trace_path.display(), e);
                (None, Vec::new())
            }
        };

        self.set_state(SessionState::Done);

        let stats = self.progress.snapshot();
        log::info!(
            "Session finished ({:?}): {} payloads, {} samples, {} decode errors, {} ignored",
            stop_reason,
            stats.payloads_received,
            stats.samples_written,
            stats.decode_errors,
            stats.ignored
        );

        Ok(CaptureReport {
            trace_path,
            rows,
            stats,
            summary,
            stop_reason,
            artifacts,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn handle_payload(&self, writer: &mut TraceWriter, payload: &RawPayload) -> CaptureResult<()> {
        let progress = &self.progress;
        let echo = self.options.echo_payloads;
        progress.payloads_received.fetch_add(1, Ordering::Relaxed);

        match decode(payload) {
            Ok(Decoded::Sample(sample)) => {
                if echo {
                    self.emit(SessionEvent::Payload(payload.to_text_lossy().into_owned()));
                }
                writer.append(&sample)?;
                progress.samples_written.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Decoded::Ignored) => {
                progress.ignored.fetch_add(1, Ordering::Relaxed);
                log::trace!("Ignored non-object payload ({} bytes)", payload.len());
            }
            Err(e) => {
                progress.decode_errors.fetch_add(1, Ordering::Relaxed);
                if echo {
                    self.emit(SessionEvent::BadData(e.to_string()));
                }
                log::warn!("Bad data: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ResultantSeries;
    use crate::source::SourceCloser;
    use crate::trace::read_trace;
    use crate::types::Trace;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// In-memory transport: delivers a fixed script, then either ends or
    /// stays open until closed.
    struct ScriptedSource {
        script: Vec<RawPayload>,
        hold_open: bool,
        refuse: bool,
        connected: bool,
        /// Fired from the delivery task once the script is sent
        stop_when_sent: Option<StopSignal>,
        closer: SourceCloser,
    }

    impl ScriptedSource {
        fn new(script: Vec<&str>, hold_open: bool) -> Self {
            Self {
                script: script.into_iter().map(RawPayload::from).collect(),
                hold_open,
                refuse: false,
                connected: false,
                stop_when_sent: None,
                closer: SourceCloser::new(),
            }
        }

        fn refusing() -> Self {
            Self {
                refuse: true,
                ..Self::new(vec![], false)
            }
        }
    }

    #[async_trait]
    impl TransportSource for ScriptedSource {
        async fn connect(&mut self) -> CaptureResult<()> {
            if self.refuse {
                return Err(CaptureError::Connection("refused (code 5)".to_string()));
            }
            self.connected = true;
            Ok(())
        }

        async fn start(&mut self, sender: mpsc::Sender<RawPayload>) -> CaptureResult<()> {
            for payload in self.script.drain(..) {
                if sender.send(payload).await.is_err() {
                    return Ok(());
                }
            }
            if let Some(stop) = self.stop_when_sent.take() {
                stop.trigger();
            }
            if self.hold_open {
                self.closer.token().cancelled().await;
            }
            Ok(())
        }

        fn closer(&self) -> SourceCloser {
            self.closer.clone()
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn metadata(&self) -> SourceMetadata {
            SourceMetadata::new("scripted")
        }
    }

    struct CountingSink {
        calls: Arc<AtomicUsize>,
    }

    impl TraceSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn consume(
            &mut self,
            _trace: &Trace,
            _series: &ResultantSeries,
            _summary: &AlertSummary,
        ) -> CaptureResult<Option<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn sample_line(ts: u64) -> String {
        format!(
            "{{\"ts\":{},\"ax\":0.1,\"ay\":0.2,\"az\":9.8,\"gx\":0.0,\"gy\":0.0,\"gz\":0.01}}",
            ts
        )
    }

    async fn wait_for_samples(progress: &CaptureProgress, n: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while progress.samples_written() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_interrupt_after_five_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw/trace.csv");
        let lines: Vec<String> = (1..=5).map(sample_line).collect();
        let source = ScriptedSource::new(lines.iter().map(String::as_str).collect(), true);

        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = CaptureSession::new(
            Box::new(source),
            SessionOptions::new(&path),
            StopSignal::new(),
        )
        .with_sink(Box::new(CountingSink {
            calls: Arc::clone(&calls),
        }));

        let stop = session.stop_signal();
        let progress = session.progress();
        let run = tokio::spawn(async move { session.run().await });

        wait_for_samples(&progress, 5).await;
        assert_eq!(progress.state(), SessionState::Capturing);
        assert!(stop.trigger());

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.stop_reason, StopReason::Interrupted);
        assert_eq!(report.rows, 5);
        assert_eq!(report.stats.analysis_passes, 1);
        assert_eq!(report.stats.state, SessionState::Done);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let trace = read_trace(&path).unwrap();
        assert_eq!(trace.len(), 5);
        assert_eq!(trace.samples[4].ts, Some(5));
        assert_eq!(report.summary.unwrap().total_samples, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_interrupts_finalize_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.csv");
        let lines: Vec<String> = (1..=3).map(sample_line).collect();
        let source = ScriptedSource::new(lines.iter().map(String::as_str).collect(), true);

        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = CaptureSession::new(
            Box::new(source),
            SessionOptions::new(&path),
            StopSignal::new(),
        )
        .with_sink(Box::new(CountingSink {
            calls: Arc::clone(&calls),
        }));

        let stop = session.stop_signal();
        let progress = session.progress();
        let run = tokio::spawn(async move { session.run().await });
        wait_for_samples(&progress, 3).await;

        let a = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.trigger() })
        };
        let b = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.trigger() })
        };
        let fired = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(fired.iter().filter(|f| **f).count(), 1);

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.stats.analysis_passes, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("ts,")).count(), 1);
        assert_eq!(text.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_bad_payloads_do_not_stop_capture() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.csv");
        let first = sample_line(1);
        let last = sample_line(2);
        let source = ScriptedSource::new(
            vec![
                "booting...",
                first.as_str(),
                "{\"ts\":3,\"ax\":",
                "[1,2,3]",
                "{\"ts\":4,\"ax\":\"fast\"}",
                last.as_str(),
            ],
            false,
        );

        let mut session =
            CaptureSession::new(Box::new(source), SessionOptions::new(&path), StopSignal::new());
        let report = session.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::SourceExhausted);
        assert_eq!(report.rows, 2);
        assert_eq!(report.stats.payloads_received, 6);
        assert_eq!(report.stats.ignored, 2);
        assert_eq!(report.stats.decode_errors, 2);

        let ts: Vec<Option<u64>> = read_trace(&path).unwrap().samples.iter().map(|s| s.ts).collect();
        assert_eq!(ts, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_exhausted_source_finalizes_with_empty_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.csv");
        let mut session = CaptureSession::new(
            Box::new(ScriptedSource::new(vec![], false)),
            SessionOptions::new(&path),
            StopSignal::new(),
        );

        let report = session.run().await.unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(session.state(), SessionState::Done);
        let summary = report.summary.unwrap();
        assert_eq!(summary.total_samples, 0);
        assert!(summary.acceleration.bands.iter().all(|b| b.count == 0));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ts,ax,ay,az,gx,gy,gz\n"
        );

        assert!(matches!(session.run().await, Err(CaptureError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_connect_failure_creates_no_trace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw/trace.csv");
        let mut session = CaptureSession::new(
            Box::new(ScriptedSource::refusing()),
            SessionOptions::new(&path),
            StopSignal::new(),
        );

        let err = session.run().await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!path.exists());
        assert_eq!(session.progress().snapshot().analysis_passes, 0);
    }

    #[tokio::test]
    async fn test_events_in_lifecycle_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.csv");
        let line = sample_line(1);
        let mut session = CaptureSession::new(
            Box::new(ScriptedSource::new(vec![line.as_str()], false)),
            SessionOptions::new(&path),
            StopSignal::new(),
        );

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            session.set_event_callback(move |event| {
                let tag = match event {
                    SessionEvent::StateChanged(state) => format!("{:?}", state),
                    SessionEvent::CaptureStarted { .. } => "started".to_string(),
                    SessionEvent::TraceSealed { rows, .. } => format!("sealed:{}", rows),
                    SessionEvent::Payload(_) => "payload".to_string(),
                    SessionEvent::BadData(_) => "bad".to_string(),
                };
                seen.lock().push(tag);
            });
        }

        session.run().await.unwrap();
        assert_eq!(
            *seen.lock(),
            vec!["Capturing", "started", "Finalizing", "sealed:1", "Done"]
        );
    }

    #[tokio::test]
    async fn test_stop_keeps_payloads_already_delivered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.csv");
        let lines: Vec<String> = (1..=100).map(sample_line).collect();
        let stop = StopSignal::new();
        let source = ScriptedSource {
            stop_when_sent: Some(stop.clone()),
            ..ScriptedSource::new(lines.iter().map(String::as_str).collect(), true)
        };

        let mut session = CaptureSession::new(Box::new(source), SessionOptions::new(&path), stop);
        let report = tokio::time::timeout(Duration::from_secs(5), session.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::Interrupted);
        assert_eq!(report.rows, 100);
        let ts: Vec<Option<u64>> = read_trace(&path).unwrap().samples.iter().map(|s| s.ts).collect();
        assert_eq!(ts, (1..=100).map(Some).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_echo_reported_through_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.csv");
        let line = sample_line(7);
        let source = ScriptedSource::new(vec!["boot", line.as_str(), "{\"ts\":"], false);

        let mut options = SessionOptions::new(&path);
        options.echo_payloads = true;
        let mut session = CaptureSession::new(Box::new(source), options, StopSignal::new());

        let echoed = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let echoed = Arc::clone(&echoed);
            session.set_event_callback(move |event| match event {
                SessionEvent::Payload(text) => echoed.lock().push(text),
                SessionEvent::BadData(err) => echoed.lock().push(format!("bad: {}", err)),
                _ => {}
            });
        }

        session.run().await.unwrap();
        let echoed = echoed.lock();
        assert_eq!(echoed.len(), 2);
        assert_eq!(echoed[0], line);
        assert!(echoed[1].starts_with("bad: "));
    }
}
