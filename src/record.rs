use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a log record, ordered from least to most severe.
///
/// Ordering is meaningful for the first five variants only; the remaining
/// variants are activity markers carried through to the database unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
    Start,
    Stop,
    Suspend,
    Resume,
    Transfer,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Classification of a log record, stored as the numeric event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EntryKind {
    Audit = 1,
    Trace = 2,
    DebugTrace = 3,
    Error = 4,
    Warning = 5,
}

impl EntryKind {
    pub fn event_id(self) -> i32 {
        self as i32
    }
}

/// Log level taxonomy of the host framework.
///
/// `None` marks a disabled entry; the pipeline never builds a record for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

/// Map a host log level onto the record classification and severity.
pub fn classify(level: LogLevel) -> (EntryKind, Severity) {
    match level {
        LogLevel::Critical => (EntryKind::Error, Severity::Critical),
        LogLevel::Debug => (EntryKind::DebugTrace, Severity::Verbose),
        LogLevel::Error => (EntryKind::Error, Severity::Error),
        LogLevel::Information => (EntryKind::Audit, Severity::Information),
        LogLevel::Trace => (EntryKind::Trace, Severity::Verbose),
        LogLevel::Warning => (EntryKind::Warning, Severity::Warning),
        _ => (EntryKind::Trace, Severity::Verbose),
    }
}

/// Collapse a possibly multi-line string into a single line.
///
/// Runs of newlines (any of `\r\n`, `\r`, `\n`) are replaced by `" - "`;
/// a trailing delimiter is not produced.
pub fn normalize_line(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .split('\n')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" - ")
}

/// One normalized log event, self-contained: it carries every value the
/// database and file sinks need, so neither consults shared state during a
/// write. Built once per event immediately before dispatch and not mutated
/// after it is enqueued.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub message: String,
    /// Originating component/category name.
    pub title: String,
    pub event_id: i32,
    pub severity: Severity,
    /// Reserved ranking field; never derived from severity.
    pub priority: i32,
    /// Captured when the record is constructed, not when it is written.
    pub timestamp: DateTime<Utc>,
    /// `"<application> - <host>"`; the host part is best-effort.
    pub machine_name: String,
    pub domain_name: String,
    pub process_id: String,
    pub process_name: String,
    pub thread_id: String,
    pub thread_name: String,
    /// Open-ended key/value bag; not consumed by the pipeline itself.
    pub extended_properties: BTreeMap<String, serde_json::Value>,
    error_messages: Vec<String>,
}

impl LogRecord {
    /// Build a record with its intrinsic properties collected.
    ///
    /// Every enrichment step is isolated: a failing one leaves its field
    /// empty and the rest are still collected. Construction never fails.
    pub fn new(application_name: &str) -> Self {
        let mut machine_name = application_name.to_string();
        if let Ok(host) = hostname::get() {
            machine_name.push_str(&format!(" - {}", host.to_string_lossy()));
        }

        let exe = std::env::current_exe().ok();
        let domain_name = exe
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let process_name = exe
            .as_deref()
            .and_then(|p| p.file_stem())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let current = std::thread::current();

        LogRecord {
            message: String::new(),
            title: String::new(),
            event_id: 0,
            severity: Severity::Information,
            priority: -1,
            timestamp: Utc::now(),
            machine_name,
            domain_name,
            process_id: std::process::id().to_string(),
            process_name,
            // The debug form is "ThreadId(n)"; keep the numeric part.
            thread_id: format!("{:?}", current.id())
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect(),
            thread_name: current.name().unwrap_or("").to_string(),
            extended_properties: BTreeMap::new(),
            error_messages: Vec::new(),
        }
    }

    /// Prepend an auxiliary error note; the newest note comes first.
    pub fn add_error_message(&mut self, message: impl Into<String>) {
        self.error_messages.insert(0, message.into());
    }

    /// All accumulated error notes as one string, each followed by a blank
    /// line, or `None` when no note was added.
    pub fn error_messages(&self) -> Option<String> {
        if self.error_messages.is_empty() {
            return None;
        }
        let mut joined = String::new();
        for note in &self.error_messages {
            joined.push_str(note);
            joined.push_str("\n\n");
        }
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_table() {
        assert_eq!(
            classify(LogLevel::Critical),
            (EntryKind::Error, Severity::Critical)
        );
        assert_eq!(
            classify(LogLevel::Debug),
            (EntryKind::DebugTrace, Severity::Verbose)
        );
        assert_eq!(classify(LogLevel::Error), (EntryKind::Error, Severity::Error));
        assert_eq!(
            classify(LogLevel::Information),
            (EntryKind::Audit, Severity::Information)
        );
        assert_eq!(classify(LogLevel::Trace), (EntryKind::Trace, Severity::Verbose));
        assert_eq!(
            classify(LogLevel::Warning),
            (EntryKind::Warning, Severity::Warning)
        );
        // Unmatched levels fall back to a verbose trace entry.
        assert_eq!(classify(LogLevel::None), (EntryKind::Trace, Severity::Verbose));
    }

    #[test]
    fn severity_orders_by_weight() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Information);
        assert!(Severity::Information > Severity::Verbose);
    }

    #[test]
    fn event_ids_are_stable() {
        assert_eq!(EntryKind::Audit.event_id(), 1);
        assert_eq!(EntryKind::Trace.event_id(), 2);
        assert_eq!(EntryKind::DebugTrace.event_id(), 3);
        assert_eq!(EntryKind::Error.event_id(), 4);
        assert_eq!(EntryKind::Warning.event_id(), 5);
    }

    #[test]
    fn normalize_replaces_embedded_newlines() {
        assert_eq!(normalize_line("connection\nrefused"), "connection - refused");
        assert_eq!(normalize_line("a\r\nb\rc"), "a - b - c");
    }

    #[test]
    fn normalize_collapses_newline_runs() {
        assert_eq!(normalize_line("a\n\n\nb"), "a - b");
    }

    #[test]
    fn normalize_strips_trailing_delimiter() {
        assert_eq!(normalize_line("done\n"), "done");
        assert_eq!(normalize_line("done\n\n"), "done");
    }

    #[test]
    fn normalize_keeps_single_line_unchanged() {
        assert_eq!(normalize_line("plain"), "plain");
        assert_eq!(normalize_line(""), "");
    }

    #[test]
    fn new_record_has_defaults_and_enrichment() {
        let record = LogRecord::new("billing");
        assert_eq!(record.priority, -1);
        assert_eq!(record.event_id, 0);
        assert!(record.machine_name.starts_with("billing"));
        assert!(!record.process_id.is_empty());
        assert!(record.extended_properties.is_empty());
        assert_eq!(record.error_messages(), None);
    }

    #[test]
    fn error_notes_prepend_newest_first() {
        let mut record = LogRecord::new("app");
        record.add_error_message("first");
        record.add_error_message("second");
        assert_eq!(record.error_messages().unwrap(), "second\n\nfirst\n\n");
    }
}
