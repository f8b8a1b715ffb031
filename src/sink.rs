use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Destination capable of durably storing a [`LogRecord`].
///
/// Implementations transport a record to a concrete store (relational
/// database, file, test double). The delivery pipeline calls `write` once
/// per record, either on the drain task or, in synchronous mode, on the
/// submitting task.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Persist a single record.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`]; it is self-contained and
    ///   no other state may be consulted.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the store.
    /// - `Err(..)` if the store failed (connection error, statement error,
    ///   I/O error). The pipeline treats any error as "this tier failed"
    ///   and moves on to the next fallback tier; it never retries.
    async fn write(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;
}
