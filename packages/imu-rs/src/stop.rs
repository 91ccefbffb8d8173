// Stop signal shared between the capture loop and interrupt handlers
//
// Ctrl+C, a source reaching end of input and a test harness can all ask the
// session to stop, possibly at the same time. Only the first request counts;
// later ones are no-ops so the trace is finalized exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` only for the call that actually
    /// triggered it.
    pub fn trigger(&self) -> bool {
        let first = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            log::info!("Stop requested");
            self.token.cancel();
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}
