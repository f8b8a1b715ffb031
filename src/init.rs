use crate::config::PipelineOptions;
use crate::layer::DbLogLayer;
use crate::pipeline::{BuildError, DeliveryPipeline};
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// One-time installation: build a [`DeliveryPipeline`] over `sink`, wrap it
/// in a [`DbLogLayer`] and install that as the global `tracing` subscriber.
///
/// **Parameters**
/// - `options`: process-wide [`PipelineOptions`], immutable afterwards.
/// - `sink`: database-tier [`LogSink`] implementation.
///
/// **Returns**
/// - The pipeline handle (for direct submissions and counters) and the
///   drain task's `JoinHandle`.
///
/// Must run inside a tokio runtime, since it spawns the drain worker.
pub fn install_with_sink(
    options: PipelineOptions,
    sink: Arc<dyn LogSink>,
) -> Result<(Arc<DeliveryPipeline>, JoinHandle<()>), BuildError> {
    let (pipeline, handle) = DeliveryPipeline::new(options, sink)?;
    let layer = DbLogLayer::new(Arc::clone(&pipeline));

    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");

    Ok((pipeline, handle))
}

/// Same as [`install_with_sink`], with a `fmt` layer stacked on top so
/// events are echoed to the console as well.
pub fn install_with_sink_and_stdout(
    options: PipelineOptions,
    sink: Arc<dyn LogSink>,
) -> Result<(Arc<DeliveryPipeline>, JoinHandle<()>), BuildError> {
    let (pipeline, handle) = DeliveryPipeline::new(options, sink)?;
    let layer = DbLogLayer::new(Arc::clone(&pipeline));

    let fmt_layer = tracing_subscriber::fmt::layer();
    let subscriber = Registry::default().with(layer).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");

    Ok((pipeline, handle))
}

/// Install against the relational database named by the options'
/// connection string. This is the recommended entrypoint for services that
/// use the stock MySQL sink.
#[cfg(feature = "mysql")]
pub fn install(options: PipelineOptions) -> Result<(Arc<DeliveryPipeline>, JoinHandle<()>), BuildError> {
    let sink = Arc::new(crate::database::DatabaseSink::new(
        options.connection_string.clone(),
    ));
    install_with_sink(options, sink)
}
