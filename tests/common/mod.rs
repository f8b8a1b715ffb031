use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing_dblog::record::LogRecord;
use tracing_dblog::sink::LogSink;

/// Sink that stores every record it receives, in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn write(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Sink whose every write fails, as an unreachable database would.
pub struct FailingSink;

#[async_trait]
impl LogSink for FailingSink {
    async fn write(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err("database unavailable".into())
    }
}

/// Sink that parks every write on a gate until the test releases it.
pub struct BlockingSink {
    pub started: AtomicU64,
    gate: Semaphore,
}

impl BlockingSink {
    pub fn new() -> Self {
        BlockingSink {
            started: AtomicU64::new(0),
            gate: Semaphore::new(0),
        }
    }

    pub fn release(&self, writes: usize) {
        self.gate.add_permits(writes);
    }
}

#[async_trait]
impl LogSink for BlockingSink {
    async fn write(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await?.forget();
        Ok(())
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
