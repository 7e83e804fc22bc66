//! Bounded, newest-first reads of append-only log files.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::entry::{LogEntry, LogView};
use crate::error::{ControlError, ControlResult};

/// Most entries returned for a single log view.
pub const MAX_ENTRIES: usize = 500;

/// Reads log files into [`LogView`]s.
///
/// Only the newest `limit` non-blank lines are kept in memory while the
/// file is scanned, so large logs cost time but not memory.
#[derive(Debug, Clone, Copy)]
pub struct LogReader {
    limit: usize,
}

impl Default for LogReader {
    fn default() -> Self {
        Self { limit: MAX_ENTRIES }
    }
}

impl LogReader {
    /// Reader with a smaller cap. Values above [`MAX_ENTRIES`] are clamped.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.min(MAX_ENTRIES),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Read `path` (already validated) as the view for `log`.
    pub fn read(&self, log: &str, path: &Path) -> ControlResult<LogView> {
        let file = File::open(path).map_err(|e| unavailable(log, e))?;
        let mut reader = BufReader::new(file);

        let mut recent: VecDeque<String> = VecDeque::with_capacity(self.limit.min(64));
        let mut total_lines = 0usize;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| unavailable(log, e))?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            total_lines += 1;
            if self.limit == 0 {
                continue;
            }
            if recent.len() == self.limit {
                recent.pop_front();
            }
            recent.push_back(line.to_string());
        }

        let entries = recent.into_iter().rev().map(LogEntry::new).collect();

        Ok(LogView {
            log: log.to_string(),
            entries,
            total_lines,
        })
    }
}

fn unavailable(log: &str, err: std::io::Error) -> ControlError {
    tracing::warn!(log = %log, error = %err, "Log could not be read");
    ControlError::LogUnavailable(log.to_string())
}
