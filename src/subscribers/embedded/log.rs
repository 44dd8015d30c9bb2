//! # LogWriter: renders records through `tracing`
//!
//! Each record becomes one `tracing` event at the record's level
//! (`target: "catvisor"`). Collapsed records are a single line; expanded
//! records get one line per entry and per active category.
//!
//! ## Example output
//! ```text
//! 📟 [catvisor] | uploads | INFO | Task Created | category="photos" id="p-17" | categories=1 tasks=1
//!
//! 📟 [catvisor] | uploads | INFO | Task Complete
//!   category: photos
//!   id: p-17
//!   duration: 1.2s
//!   result: ok
//!   Active Categories: 1
//!     photos | Running Tasks: 1 | [p-18]
//!   Total Running Tasks: 1
//! ```

use async_trait::async_trait;
use tracing::Level;

use crate::events::LogRecord;
use crate::subscribers::Subscribe;

/// Record writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Renders `record` as text without emitting it.
    pub fn render(record: &LogRecord) -> String {
        if record.collapsed {
            render_collapsed(record)
        } else {
            render_expanded(record)
        }
    }
}

fn render_collapsed(r: &LogRecord) -> String {
    let mut line = r.headline();
    if !r.entries.is_empty() {
        let entries: Vec<String> = r.entries.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
        line.push_str(" | ");
        line.push_str(&entries.join(" "));
    }
    line.push_str(&format!(
        " | categories={} tasks={}",
        r.snapshot.len(),
        r.running_tasks()
    ));
    line
}

fn render_expanded(r: &LogRecord) -> String {
    let mut lines = vec![r.headline()];
    for (k, v) in &r.entries {
        lines.push(format!("  {k}: {v}"));
    }
    lines.push(format!("  Active Categories: {}", r.snapshot.len()));
    for c in &r.snapshot {
        let tasks: Vec<String> = c.tasks.iter().map(ToString::to_string).collect();
        lines.push(format!(
            "    {} | Running Tasks: {} | [{}]",
            c.category,
            c.tasks.len(),
            tasks.join(", ")
        ));
    }
    let total = r.running_tasks();
    if total > 0 {
        lines.push(format!("  Total Running Tasks: {total}"));
    }
    lines.join("\n")
}

fn write(level: Level, text: &str) {
    match level {
        Level::ERROR => tracing::error!(target: "catvisor", "{text}"),
        Level::WARN => tracing::warn!(target: "catvisor", "{text}"),
        Level::INFO => tracing::info!(target: "catvisor", "{text}"),
        Level::DEBUG => tracing::debug!(target: "catvisor", "{text}"),
        _ => tracing::trace!(target: "catvisor", "{text}"),
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_record(&self, record: &LogRecord) {
        write(record.level, &LogWriter::render(record));
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
