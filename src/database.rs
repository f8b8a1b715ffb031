use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::Connection;
use std::error::Error;
use uuid::Uuid;

/// Stored procedure invoked for every record. It accepts the thirteen
/// parameters bound in [`DatabaseSink::write`], in that order.
const WRITE_LOG_CALL: &str = "CALL WriteLog(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// MySQL implementation of [`LogSink`].
///
/// Each write opens a fresh connection, invokes the `WriteLog` stored
/// procedure with every field of the record plus a newly generated log id,
/// and closes the connection. Pooling is intentionally left to the driver
/// layer; this sink holds no connection state between writes.
pub struct DatabaseSink {
    connection_string: String,
}

impl DatabaseSink {
    pub fn new(connection_string: impl Into<String>) -> Self {
        DatabaseSink {
            connection_string: connection_string.into(),
        }
    }
}

#[async_trait]
impl LogSink for DatabaseSink {
    async fn write(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = MySqlConnection::connect(&self.connection_string).await?;

        sqlx::query(WRITE_LOG_CALL)
            .bind(Uuid::new_v4().to_string())
            .bind(record.event_id)
            .bind(record.priority)
            .bind(record.severity.to_string())
            .bind(&record.title)
            .bind(record.timestamp)
            .bind(&record.machine_name)
            .bind(&record.domain_name)
            .bind(&record.process_id)
            .bind(&record.process_name)
            .bind(&record.thread_name)
            .bind(&record.thread_id)
            .bind(&record.message)
            .execute(&mut conn)
            .await?;

        conn.close().await?;
        Ok(())
    }
}
