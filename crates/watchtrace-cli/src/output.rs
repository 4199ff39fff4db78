//! Access record writers.
//!
//! Both formats write one record per line in observation order. Records go
//! through the writer they are given, so standard output keeps its line
//! buffering and files get a `BufWriter`.

use std::io::Write;
use std::path::PathBuf;

use watchtrace_common::error::{Result, TraceError};
use watchtrace_common::types::AccessEvent;
use watchtrace_core::sink::EventSink;

/// Label used in I/O errors when writing to standard output.
pub const STDOUT_LABEL: &str = "<stdout>";

/// Writes `<mode>\t<path>` lines.
#[derive(Debug)]
pub struct PlainSink<W> {
    out: W,
    target: PathBuf,
}

impl<W: Write> PlainSink<W> {
    /// Creates a plain-text sink. `target` names the destination in errors.
    pub fn new(out: W, target: impl Into<PathBuf>) -> Self {
        Self {
            out,
            target: target.into(),
        }
    }
}

impl<W: Write> EventSink for PlainSink<W> {
    fn record(&mut self, event: &AccessEvent) -> Result<()> {
        writeln!(self.out, "{}\t{}", event.mode.as_short(), event.path.display())
            .map_err(|source| io_error(&self.target, source))
    }

    fn finish(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|source| io_error(&self.target, source))
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonSink<W> {
    out: W,
    target: PathBuf,
}

impl<W: Write> JsonSink<W> {
    /// Creates a JSON-lines sink. `target` names the destination in errors.
    pub fn new(out: W, target: impl Into<PathBuf>) -> Self {
        Self {
            out,
            target: target.into(),
        }
    }
}

impl<W: Write> EventSink for JsonSink<W> {
    fn record(&mut self, event: &AccessEvent) -> Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out
            .write_all(b"\n")
            .map_err(|source| io_error(&self.target, source))
    }

    fn finish(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|source| io_error(&self.target, source))
    }
}

fn io_error(target: &std::path::Path, source: std::io::Error) -> TraceError {
    TraceError::Io {
        path: target.to_path_buf(),
        source,
    }
}
