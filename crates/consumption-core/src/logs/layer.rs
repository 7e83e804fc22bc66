//! Tracing layer that mirrors events into the control log.
//!
//! Events become single plain-text lines with `[warning]` / `[error]`
//! markers, so the control server's own log is readable through the same
//! log viewer as the plugin's jobs.

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::writer::LogFileWriter;

/// A tracing Layer that appends events to a marker-tagged text log.
pub struct MarkerLayer {
    writer: Arc<LogFileWriter>,
}

impl MarkerLayer {
    /// Create a layer appending to `log_dir/file_name`.
    pub fn new(log_dir: impl AsRef<Path>, file_name: &str) -> std::io::Result<Self> {
        let writer = LogFileWriter::new(log_dir, file_name)?;
        Ok(Self {
            writer: Arc::new(writer),
        })
    }

    /// Get the path to the log file.
    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }
}

fn tag_for(level: &Level) -> Option<&'static str> {
    match *level {
        Level::ERROR => Some("[error]"),
        Level::WARN => Some("[warning]"),
        Level::DEBUG => Some("[debug]"),
        Level::TRACE => Some("[trace]"),
        Level::INFO => None,
    }
}

impl<S> Layer<S> for MarkerLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut line = visitor.message.unwrap_or_default();
        for (name, value) in visitor.fields {
            let _ = write!(&mut line, " {}={}", name, value);
        }

        // Write errors are dropped
        let _ = self.writer.write_line(tag_for(event.metadata().level()), &line);
    }
}

/// Collects the message and `key=value` pairs of an event.
#[derive(Default)]
struct LineVisitor {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.fields.push((field.name(), buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.push((field.name(), value.to_string()));
    }
}
