// Offline post-processing of sealed traces
//
// Used once at the end of every capture session and by `imulog analyze` to
// re-run the analysis on traces recorded earlier.

use crate::analyzer::{analyze_series, ResultantSeries};
use crate::config::BandSet;
use crate::error::CaptureResult;
use crate::sink::TraceSink;
use crate::trace::read_trace;
use crate::types::AlertSummary;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of analyzing one trace.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedTrace {
    pub trace_path: PathBuf,
    pub rows: usize,
    pub summary: AlertSummary,
    /// Files written by sinks, in sink order
    pub artifacts: Vec<PathBuf>,
}

/// Read `trace_path`, compute resultants and alert counts, then hand the
/// result to each sink. Sink failures are logged and skipped.
pub fn postprocess(
    trace_path: &Path,
    bands: &BandSet,
    sinks: &mut [Box<dyn TraceSink>],
) -> CaptureResult<AnalyzedTrace> {
    let trace = read_trace(trace_path)?;
    let series = ResultantSeries::from_samples(&trace.samples);
    let summary = analyze_series(&series, bands);

    log::info!(
        "Analyzed {}: {} samples ({} with full acceleration, {} with full rotation)",
        trace_path.display(),
        summary.total_samples,
        summary.acceleration.qualifying_samples,
        summary.gyroscope.qualifying_samples
    );

    let mut artifacts = Vec::new();
    for sink in sinks.iter_mut() {
        match sink.consume(&trace, &series, &summary) {
            Ok(Some(path)) => {
                log::debug!("{} sink wrote {}", sink.name(), path.display());
                artifacts.push(path);
            }
            Ok(None) => {}
            Err(e) => log::error!("{} sink failed for {}: {}", sink.name(), trace_path.display(), e),
        }
    }

    Ok(AnalyzedTrace {
        trace_path: trace.path,
        rows: trace.samples.len(),
        summary,
        artifacts,
    })
}

/// Expand trace arguments: a directory yields the `.csv` files directly in
/// it, anything else is treated as a glob pattern. Only regular files are
/// returned, sorted and without duplicates.
pub fn resolve_traces(patterns: &[String]) -> CaptureResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_dir() {
            for entry in std::fs::read_dir(path)?.flatten() {
                let candidate = entry.path();
                let is_csv = candidate
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
                if candidate.is_file() && is_csv {
                    files.push(candidate);
                }
            }
            continue;
        }

        for entry in glob::glob(pattern)? {
            match entry {
                Ok(found) if found.is_file() => files.push(found),
                Ok(_) => {}
                Err(e) => log::warn!("glob error: {}", e),
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
