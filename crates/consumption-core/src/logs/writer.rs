//! Plain-text appender for the control server's own log file.
//!
//! Lines use the same shape as the plugin's job scripts so the control log
//! can be viewed and classified like any other log:
//!
//! ```text
//! [2026-01-21 14:30:45.123] Settings saved
//! [2026-01-21 14:30:47.941] [warning] Service restart failed service=mqtt_daemon
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::Severity;

/// Appends marker-tagged lines to one log file.
pub struct LogFileWriter {
    /// Buffered file writer
    writer: Mutex<BufWriter<File>>,

    /// Path to the log file
    path: PathBuf,
}

impl LogFileWriter {
    /// Open `log_dir/file_name` for appending, creating the directory if needed.
    pub fn new(log_dir: impl AsRef<Path>, file_name: &str) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let path = log_dir.join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Newlines inside `message` are folded into spaces so
    /// one event never spans several lines.
    pub fn write_line(&self, tag: Option<&str>, message: &str) -> std::io::Result<()> {
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let message = message.replace(['\n', '\r'], " ");

        let mut writer = self.writer.lock();
        match tag {
            Some(tag) => writeln!(writer, "[{}] {} {}", ts, tag, message)?,
            None => writeln!(writer, "[{}] {}", ts, message)?,
        }
        writer.flush()
    }

    /// Append a line tagged with the marker for `severity`.
    pub fn write(&self, severity: Severity, message: &str) -> std::io::Result<()> {
        self.write_line(severity.marker(), message)
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl Drop for LogFileWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
