use crate::config::PipelineOptions;
use crate::fallback::{FallbackFileSink, DIAGNOSTIC_CATEGORY};
use crate::flatten::{self, SourceError};
use crate::record::{classify, normalize_line, LogLevel, LogRecord};
use crate::sink::LogSink;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DIAGNOSTIC_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Error type returned when building the delivery pipeline.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("failed to create fallback directory: {0}")]
    FallbackDir(#[from] std::io::Error),
}

/// Delivery pipeline for log records: builds a record per submission,
/// decides between synchronous and queued dispatch, and drives the
/// database-then-file fallback ladder.
///
/// One pipeline per process is the intended shape, but nothing here is a
/// global: construct it once with its [`PipelineOptions`] and share the
/// `Arc` wherever records are submitted. No submission path ever returns an
/// error; every failure terminates inside the pipeline.
pub struct DeliveryPipeline {
    options: PipelineOptions,
    writer: Arc<RecordWriter>,
    queue: mpsc::UnboundedSender<LogRecord>,
    submitted: AtomicU64,
}

impl DeliveryPipeline {
    /// Build the pipeline and spawn its drain worker.
    ///
    /// The worker is a single long-lived task fed by an unbounded channel:
    /// one consumer means strict FIFO, no concurrent queue pops and no
    /// task-per-enqueue proliferation under load. It drains until every
    /// sender is dropped, then exits; the returned [`JoinHandle`] completes
    /// at that point.
    ///
    /// Fails only when a configured fallback directory cannot be created.
    pub fn new(
        options: PipelineOptions,
        db: Arc<dyn LogSink>,
    ) -> Result<(Arc<Self>, JoinHandle<()>), BuildError> {
        let fallback = options
            .fallback_dir
            .as_ref()
            .map(|dir| FallbackFileSink::new(dir))
            .transpose()?;

        let writer = Arc::new(RecordWriter {
            db,
            fallback,
            attempted: AtomicU64::new(0),
            db_failures: AtomicU64::new(0),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<LogRecord>();

        let drain_writer = Arc::clone(&writer);
        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                // Each pass runs in its own task, awaited in place: order
                // is preserved and a panicking pass surfaces here as a
                // JoinError instead of killing the drain loop.
                let writer = Arc::clone(&drain_writer);
                let pass = tokio::spawn(async move { writer.deliver(&record).await });
                if let Err(failure) = pass.await {
                    drain_writer.note_drain_failure(&failure.to_string()).await;
                    drain_writer.attempted.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        let pipeline = Arc::new(DeliveryPipeline {
            options,
            writer,
            queue: tx,
            submitted: AtomicU64::new(0),
        });

        Ok((pipeline, handle))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Whether records at `level` are accepted at all.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None
    }

    /// Records accepted by the pipeline so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Write attempts completed (success or exhausted fallback).
    pub fn attempted(&self) -> u64 {
        self.writer.attempted.load(Ordering::Relaxed)
    }

    /// Database writes that failed and entered the fallback ladder.
    pub fn database_failures(&self) -> u64 {
        self.writer.db_failures.load(Ordering::Relaxed)
    }

    /// Submit one log event.
    ///
    /// In synchronous mode the future completes only after the full write
    /// attempt, fallback included. In asynchronous mode the record is
    /// enqueued and the future completes immediately, before any I/O.
    pub fn log<'a>(
        &'a self,
        level: LogLevel,
        category: &str,
        message: &str,
        error: Option<SourceError<'_>>,
    ) -> impl std::future::Future<Output = ()> + 'a {
        // Build the record synchronously so the borrowed (non-`Send`) error is
        // consumed here and never captured by the returned future; only the
        // owned record crosses the await, keeping the future `Send`.
        let record = if self.enabled(level) {
            let record = self.build_record(level, category, message, error);
            self.submitted.fetch_add(1, Ordering::Relaxed);
            Some(record)
        } else {
            None
        };

        async move {
            let Some(record) = record else {
                return;
            };

            if self.options.async_write {
                let _ = self.queue.send(record);
            } else {
                self.writer.deliver(&record).await;
            }
        }
    }

    /// Build a normalized record for `level` without dispatching it.
    ///
    /// The formatted message is normalized to one line (a whitespace-only
    /// message becomes empty), the error chain, if any, is flattened into
    /// the message text, and the enrichment fields are collected.
    pub fn build_record(
        &self,
        level: LogLevel,
        category: &str,
        message: &str,
        error: Option<SourceError<'_>>,
    ) -> LogRecord {
        let (kind, severity) = classify(level);

        let mut text = if message.trim().is_empty() {
            String::new()
        } else {
            normalize_line(message)
        };
        if let Some(source) = error {
            let trace = flatten::capture_stack_trace();
            flatten::append_error_details(&mut text, source, trace.as_deref());
        }

        let mut record = LogRecord::new(&self.options.application_name);
        record.message = text;
        record.title = category.to_string();
        record.event_id = kind.event_id();
        record.severity = severity;
        record
    }

    /// Dispatch a prebuilt record from a synchronous context (the tracing
    /// layer calls this from `on_event`).
    ///
    /// Asynchronous mode enqueues and returns. Synchronous mode blocks the
    /// calling thread for the full attempt where the runtime permits it
    /// (multi-thread flavor); on a current-thread runtime the write is
    /// spawned instead, since blocking there would deadlock the executor.
    pub fn dispatch_record(&self, record: LogRecord) {
        self.submitted.fetch_add(1, Ordering::Relaxed);

        if self.options.async_write {
            let _ = self.queue.send(record);
            return;
        }

        let writer = Arc::clone(&self.writer);
        match Handle::try_current() {
            Ok(handle) if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(move || {
                    handle.block_on(async move { writer.deliver(&record).await });
                });
            }
            Ok(handle) => {
                handle.spawn(async move { writer.deliver(&record).await });
            }
            Err(_) => {
                eprintln!("tracing-dblog: no tokio runtime available, record dropped");
            }
        }
    }
}

/// The per-record write path shared by the drain worker and synchronous
/// submissions: database first, then the file tiers.
struct RecordWriter {
    db: Arc<dyn LogSink>,
    fallback: Option<FallbackFileSink>,
    attempted: AtomicU64,
    db_failures: AtomicU64,
}

impl RecordWriter {
    /// One full write attempt. Never fails outward.
    async fn deliver(&self, record: &LogRecord) {
        if let Err(db_err) = self.db.write(record).await {
            self.db_failures.fetch_add(1, Ordering::Relaxed);
            self.fall_back(record, &*db_err).await;
        }
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// File tiers. With no fallback directory configured the record is
    /// dropped here, deliberately and silently: best-effort delivery.
    async fn fall_back(&self, record: &LogRecord, db_err: &(dyn std::error::Error + Send + Sync)) {
        let Some(fallback) = &self.fallback else {
            return;
        };

        // The two writes are independent: a failed record write must not
        // stop the diagnostic write.
        if let Err(file_err) = fallback.append_record(record).await {
            eprintln!("tracing-dblog: fallback write failed: {}", file_err);
        }

        let line = format!(
            "Timestamp {} - error while writing log record: {}",
            Utc::now().format(DIAGNOSTIC_TIMESTAMP),
            db_err
        );
        if let Err(diag_err) = fallback.append_line(DIAGNOSTIC_CATEGORY, &line).await {
            eprintln!("tracing-dblog: diagnostic write failed: {}", diag_err);
        }
    }

    async fn note_drain_failure(&self, detail: &str) {
        if let Some(fallback) = &self.fallback {
            let line = format!(
                "Timestamp {} - error while draining log queue: {}",
                Utc::now().format(DIAGNOSTIC_TIMESTAMP),
                detail
            );
            if fallback
                .append_line(DIAGNOSTIC_CATEGORY, &line)
                .await
                .is_err()
            {
                eprintln!("tracing-dblog: diagnostic write failed after drain error");
            }
        }
    }
}
