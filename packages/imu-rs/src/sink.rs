// Post-processing outputs
//
// After a trace is sealed and analyzed, each configured sink derives one
// artifact from it. Sinks run in order; a failing sink does not stop the
// others.

use crate::analyzer::ResultantSeries;
use crate::config::{trace_stem, DataLayout};
use crate::error::CaptureResult;
use crate::report;
use crate::types::{AlertSummary, Trace};
use std::fs;
use std::path::PathBuf;

/// Consumer of a sealed, analyzed trace.
pub trait TraceSink: Send {
    fn name(&self) -> &str;

    /// Write this sink's artifact. Returns its path, if it produced a file.
    fn consume(
        &mut self,
        trace: &Trace,
        series: &ResultantSeries,
        summary: &AlertSummary,
    ) -> CaptureResult<Option<PathBuf>>;
}

/// Writes the rendered alert summary to `<dir>/<stem>_summary.txt`.
pub struct SummaryFileSink {
    dir: PathBuf,
}

impl SummaryFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TraceSink for SummaryFileSink {
    fn name(&self) -> &str {
        "summary"
    }

    fn consume(
        &mut self,
        trace: &Trace,
        _series: &ResultantSeries,
        summary: &AlertSummary,
    ) -> CaptureResult<Option<PathBuf>> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}_summary.txt", trace_stem(&trace.path)));
        fs::write(&path, report::render(summary))?;
        Ok(Some(path))
    }
}

/// Writes per-sample resultants to `<dir>/<stem>_resultant.csv`.
pub struct ResultantCsvSink {
    dir: PathBuf,
}

impl ResultantCsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TraceSink for ResultantCsvSink {
    fn name(&self) -> &str {
        "resultants"
    }

    fn consume(
        &mut self,
        trace: &Trace,
        series: &ResultantSeries,
        _summary: &AlertSummary,
    ) -> CaptureResult<Option<PathBuf>> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}_resultant.csv", trace_stem(&trace.path)));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        // Explicit header so an empty series still gets one
        writer.write_record(["ts", "acc_resultant", "gyro_resultant"])?;
        for point in &series.points {
            writer.serialize(point)?;
        }
        writer.flush()?;

        Ok(Some(path))
    }
}

/// Summary text and resultant CSV under the layout's output directories.
pub fn default_sinks(layout: &DataLayout) -> Vec<Box<dyn TraceSink>> {
    vec![
        Box::new(SummaryFileSink::new(layout.summaries_dir())),
        Box::new(ResultantCsvSink::new(layout.resultants_dir())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_series;
    use crate::config::BandSet;
    use crate::types::Sample;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> (Trace, ResultantSeries, AlertSummary) {
        let trace = Trace {
            path: dir.path().join("raw/imu_log_20240101_000000.csv"),
            samples: vec![
                Sample::new(10, [3.0, 4.0, 0.0], [0.0, 0.0, 0.0]),
                Sample {
                    ts: Some(20),
                    ax: None,
                    ..Sample::new(20, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0])
                },
            ],
        };
        let series = ResultantSeries::from_samples(&trace.samples);
        let summary = analyze_series(&series, &BandSet::default());
        (trace, series, summary)
    }

    #[test]
    fn test_summary_sink_writes_report() {
        let dir = TempDir::new().unwrap();
        let (trace, series, summary) = fixture(&dir);
        let mut sink = SummaryFileSink::new(dir.path().join("summaries"));

        let path = sink.consume(&trace, &series, &summary).unwrap().unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("summaries/imu_log_20240101_000000_summary.txt")
        );
        assert_eq!(fs::read_to_string(path).unwrap(), report::render(&summary));
    }

    #[test]
    fn test_resultant_sink_rows() {
        let dir = TempDir::new().unwrap();
        let (trace, series, summary) = fixture(&dir);
        let mut sink = ResultantCsvSink::new(dir.path().join("resultants"));

        let path = sink.consume(&trace, &series, &summary).unwrap().unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["ts,acc_resultant,gyro_resultant", "10,5.0,0.0", "20,,1.0"]);
    }

    #[test]
    fn test_resultant_sink_empty_trace_has_header() {
        let dir = TempDir::new().unwrap();
        let trace = Trace {
            path: dir.path().join("empty.csv"),
            samples: vec![],
        };
        let series = ResultantSeries::default();
        let summary = analyze_series(&series, &BandSet::default());

        let path = ResultantCsvSink::new(dir.path())
            .consume(&trace, &series, &summary)
            .unwrap()
            .unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "ts,acc_resultant,gyro_resultant\n"
        );
    }
}
