//! Classified log lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity derived from the markers embedded in a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Classify a line by its `[error]` / `[warning]` markers (any case).
    ///
    /// `[error]` takes precedence when both are present.
    pub fn classify(line: &str) -> Self {
        let lower = line.to_ascii_lowercase();
        if lower.contains("[error]") {
            Severity::Error
        } else if lower.contains("[warning]") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    /// Marker written for this severity, if any.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Severity::Info => None,
            Severity::Warning => Some("[warning]"),
            Severity::Error => Some("[error]"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single line of a log file with its derived severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let severity = Severity::classify(&text);
        Self { text, severity }
    }
}

/// The most recent lines of one log, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogView {
    /// Identifier the view was read for
    pub log: String,

    /// Entries, newest first
    pub entries: Vec<LogEntry>,

    /// Non-blank lines in the file at read time
    pub total_lines: usize,
}

impl LogView {
    /// Whether older lines were dropped by the entry cap.
    pub fn is_truncated(&self) -> bool {
        self.total_lines > self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
