//! Report buffer.
//!
//! Every diagnostic finding, including soft failures, lands here so the
//! persisted report matches what the operator saw on the console.

use std::fs;
use std::path::Path;
use znn_diag_common::Result;

/// Ordered sequence of report lines, mirrored to stdout as it grows.
#[derive(Debug, Default)]
pub struct ReportBuffer {
    lines: Vec<String>,
}

impl ReportBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a labeled section header.
    pub fn section(&mut self, title: &str) {
        self.line(String::new());
        self.line(format!("==== {title} ===="));
    }

    /// Append a single line and mirror it to the console.
    pub fn line(&mut self, line: impl Into<String>) {
        let line = line.into();
        println!("{line}");
        self.lines.push(line);
    }

    /// Append raw multi-line command output.
    pub fn block(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line.to_string());
        }
    }

    /// Record a soft failure; mirrored through the log rather than stdout.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.lines.push(format!("WARNING: {message}"));
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Full report text, one line per entry.
    pub fn contents(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Write the report to disk.
    pub fn persist(&self, path: &Path) -> Result<()> {
        fs::write(path, self.contents())?;
        Ok(())
    }
}
