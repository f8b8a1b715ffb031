//! Synchronous delivery with an unreachable database: every record lands in
//! the per-category fallback files instead.

use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tracing_dblog::config::PipelineOptions;
use tracing_dblog::pipeline::DeliveryPipeline;
use tracing_dblog::record::{LogLevel, LogRecord};
use tracing_dblog::sink::LogSink;

struct UnreachableDb;

#[async_trait]
impl LogSink for UnreachableDb {
    async fn write(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err("connection refused".into())
    }
}

#[tokio::main]
async fn main() {
    let options = PipelineOptions::new("mysql://db.invalid/logs", "demo-app")
        .with_fallback_dir("./demo-logs");
    let (pipeline, _drain) =
        DeliveryPipeline::new(options, Arc::new(UnreachableDb)).expect("create fallback dir");

    pipeline
        .log(
            LogLevel::Error,
            "demo::checkout",
            "database is down\nfalling back to files",
            None,
        )
        .await;
    pipeline
        .log(LogLevel::Warning, "demo::inventory", "stock level low", None)
        .await;

    println!(
        "attempted {} writes, {} database failures; see ./demo-logs",
        pipeline.attempted(),
        pipeline.database_failures()
    );
}
