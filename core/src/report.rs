//! Append-only report and its screen + artifact writer.

use crate::error::ReconResult;
use crate::format::{OutputFormat, ReportSection};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const ARTIFACT_STAMP: &str = "[year][month][day]_[hour][minute][second]";

/// `osint_report_<YYYYMMDD_HHMMSS>.<txt|md>` for the given UTC instant.
pub fn artifact_name(created_at: OffsetDateTime, format: OutputFormat) -> String {
    let stamp = time::format_description::parse(ARTIFACT_STAMP)
        .ok()
        .and_then(|fd| created_at.format(&fd).ok())
        .unwrap_or_else(|| created_at.unix_timestamp().to_string());
    format!("osint_report_{}.{}", stamp, format.extension())
}

pub fn iso8601(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// Artifact file opened on first write, in append mode, never reopened.
struct LazyArtifact {
    path: PathBuf,
    file: Option<File>,
}

impl Write for LazyArtifact {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.file.is_none() {
            self.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        match self.file.as_mut() {
            Some(f) => f.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "artifact not open")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

/// In-memory sink, cheap to clone; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "sink poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// Writes every chunk to the screen first and then to the artifact, flushing
/// both before returning. The artifact never holds less than the screen showed.
pub struct ReportWriter {
    screen: Box<dyn Write + Send>,
    artifact: Box<dyn Write + Send>,
}

impl ReportWriter {
    pub fn new(screen: Box<dyn Write + Send>, artifact: Box<dyn Write + Send>) -> Self {
        ReportWriter { screen, artifact }
    }

    pub fn stdout_and_file(path: PathBuf) -> Self {
        Self::new(Box::new(io::stdout()), Box::new(LazyArtifact { path, file: None }))
    }

    pub fn append(&mut self, text: &str) -> io::Result<()> {
        self.screen.write_all(text.as_bytes())?;
        self.screen.flush()?;
        self.artifact.write_all(text.as_bytes())?;
        self.artifact.flush()
    }
}

/// One report per invocation (or menu session). Sections only ever get
/// appended; the artifact name is fixed at creation.
pub struct Report {
    created_at: OffsetDateTime,
    format: OutputFormat,
    artifact: PathBuf,
    writer: ReportWriter,
    sections: Vec<ReportSection>,
}

impl Report {
    /// Report whose artifact lives in `dir` and whose screen is stdout.
    pub fn create(format: OutputFormat, dir: &Path) -> Self {
        let created_at = OffsetDateTime::now_utc();
        let artifact = dir.join(artifact_name(created_at, format));
        let writer = ReportWriter::stdout_and_file(artifact.clone());
        Report { created_at, format, artifact, writer, sections: Vec::new() }
    }

    pub fn with_writer(format: OutputFormat, created_at: OffsetDateTime, writer: ReportWriter) -> Self {
        let artifact = PathBuf::from(artifact_name(created_at, format));
        Report { created_at, format, artifact, writer, sections: Vec::new() }
    }

    pub fn format(&self) -> OutputFormat { self.format }
    pub fn created_at(&self) -> OffsetDateTime { self.created_at }
    pub fn artifact_path(&self) -> &Path { &self.artifact }
    pub fn sections(&self) -> &[ReportSection] { &self.sections }

    pub fn section_titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title()).collect()
    }

    pub fn append(&mut self, section: ReportSection) -> ReconResult<()> {
        self.writer.append(&section.render())?;
        self.sections.push(section);
        Ok(())
    }
}
