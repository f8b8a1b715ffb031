//! Asynchronous delivery into MySQL, configured from the `DBLOG_*`
//! environment variables. Events are emitted through the installed tracing
//! subscriber and drained in the background.

use std::time::Duration;
use tracing_dblog::config::PipelineOptions;
use tracing_dblog::init;

#[tokio::main]
async fn main() {
    let options = PipelineOptions::from_env().with_async_write(true);
    let (pipeline, _drain) = init::install(options).expect("install pipeline");

    tracing::info!(target: "demo", "service started");
    tracing::error!(target: "demo", attempt = 1, "simulated failure");

    // Give the drain worker a moment before the process exits.
    tokio::time::sleep(Duration::from_secs(1)).await;

    println!(
        "submitted={} attempted={} database_failures={}",
        pipeline.submitted(),
        pipeline.attempted(),
        pipeline.database_failures()
    );
}
