use crate::record::LogRecord;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Category of the diagnostic channel: the file that records failures of
/// the delivery pipeline itself, kept separate from any application
/// category.
pub const DIAGNOSTIC_CATEGORY: &str = "dblog_exceptions";

/// Append-only file sink used when the database is unreachable.
///
/// Lines land in one file per category per UTC day. Every write takes the
/// same lock, opens the file, appends one line and closes it again; the
/// coarse lock trades throughput for append atomicity, which is acceptable
/// on an already-degraded path. File handles are never held between writes.
pub struct FallbackFileSink {
    directory: PathBuf,
    files_lock: Mutex<()>,
}

impl FallbackFileSink {
    /// Create the sink, creating the target directory if missing.
    pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(FallbackFileSink {
            directory,
            files_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Append a formatted record line to the file of the record's category.
    pub async fn append_record(&self, record: &LogRecord) -> io::Result<()> {
        let line = format!(
            "TimeStamp: {} EventId: {} Title: {} Severity: {} Message: {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            record.event_id,
            record.title,
            record.severity,
            record.message
        );
        self.append_line(&record.title, &line).await
    }

    /// Append one line to the daily file of `category`.
    pub async fn append_line(&self, category: &str, line: &str) -> io::Result<()> {
        let _guard = self.files_lock.lock().await;

        let path = self.daily_path(category);
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    /// `<directory>/<category>_<YYYYMMDD>.log`, UTC date.
    pub fn daily_path(&self, category: &str) -> PathBuf {
        self.directory.join(format!(
            "{}_{}.log",
            sanitize_category(category),
            Utc::now().format("%Y%m%d")
        ))
    }
}

/// Make a category name safe to use as a file-name stem.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`; a name that sanitizes to
/// nothing becomes `unnamed`.
pub fn sanitize_category(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "unnamed".to_string()
    } else {
        safe
    }
}
