//! HTML fragments for the log viewer's refresh requests.

use std::fmt::Write;

use consumption_core::LogView;

/// Shown in place of the log when a validated file cannot be read.
pub const UNAVAILABLE_MESSAGE: &str = "Log file not found or invalid.";

/// Render `view` as one `<div class="log-<severity>">` per entry.
pub fn log_fragment(view: &LogView) -> String {
    let mut html = String::new();
    for entry in &view.entries {
        let _ = writeln!(
            html,
            "<div class=\"log-{}\">{}</div>",
            entry.severity.as_str(),
            escape_html(entry.text.trim())
        );
    }
    html
}

pub fn unavailable_fragment() -> String {
    format!("<div class=\"text-danger\">{UNAVAILABLE_MESSAGE}</div>\n")
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
