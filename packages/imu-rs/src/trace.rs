// Trace persistence
//
// A trace is a CSV file with a fixed header (`ts,ax,ay,az,gx,gy,gz`) and one
// row per accepted sample. Absent fields are written as empty cells.

use crate::error::{CaptureError, CaptureResult};
use crate::types::{Sample, Trace, TRACE_HEADER};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Append-only trace writer.
///
/// The header is written once in [`TraceWriter::open`]. Every
/// [`TraceWriter::append`] flushes before returning, so an abrupt stop loses
/// at most the sample being written.
pub struct TraceWriter {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

impl TraceWriter {
    /// Create the trace file (and any missing parent directories) and write
    /// the header.
    pub fn open(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(TRACE_HEADER)?;
        writer.flush()?;

        log::debug!("Opened trace {}", path.display());

        Ok(Self {
            path,
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn append(&mut self, sample: &Sample) -> CaptureResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::TraceSealed(self.path.display().to_string()))?;

        writer.serialize(sample)?;
        writer.flush()?;
        self.rows += 1;

        Ok(())
    }

    /// Seal the trace and return its path. Further appends fail; repeated
    /// calls are no-ops.
    pub fn finalize(&mut self) -> CaptureResult<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            let file = writer
                .into_inner()
                .map_err(|e| CaptureError::Io(e.into_error()))?;
            file.sync_all()?;
            log::info!("Sealed trace {} ({} rows)", self.path.display(), self.rows);
        }

        Ok(self.path.clone())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_sealed(&self) -> bool {
        self.writer.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a trace back in row order. Empty cells become `None`.
///
/// Files whose header is not the trace header are rejected, so another CSV
/// (a resultant series, say) is never analyzed as a run of empty samples.
pub fn read_trace(path: impl AsRef<Path>) -> CaptureResult<Trace> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?;
    if !headers.iter().eq(TRACE_HEADER) {
        return Err(CaptureError::InvalidConfig(format!(
            "{} is not an IMU trace (header: {:?})",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let samples = reader
        .deserialize::<Sample>()
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Trace {
        path: path.to_path_buf(),
        samples,
    })
}
