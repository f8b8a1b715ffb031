use crate::flatten::{self, SourceError};
use crate::pipeline::DeliveryPipeline;
use crate::record::LogLevel;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`crate::record::LogRecord`]s
/// and hands them to a [`DeliveryPipeline`].
///
/// The event target becomes the record's category, the `message` field its
/// text, and every other event field lands in the record's extended
/// properties. An error recorded on the event (`error = &err as &dyn Error`)
/// is flattened into the message. In asynchronous mode `on_event` never
/// performs I/O on the application thread.
pub struct DbLogLayer {
    pipeline: Arc<DeliveryPipeline>,
}

impl DbLogLayer {
    pub fn new(pipeline: Arc<DeliveryPipeline>) -> Self {
        DbLogLayer { pipeline }
    }
}

/// Map a `tracing` level onto the pipeline's level taxonomy.
pub fn map_level(level: &Level) -> LogLevel {
    if *level == Level::ERROR {
        LogLevel::Error
    } else if *level == Level::WARN {
        LogLevel::Warning
    } else if *level == Level::INFO {
        LogLevel::Information
    } else if *level == Level::DEBUG {
        LogLevel::Debug
    } else {
        LogLevel::Trace
    }
}

impl<S> Layer<S> for DbLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = map_level(event.metadata().level());
        if !self.pipeline.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let message = visitor.message.unwrap_or_default();
        let mut record =
            self.pipeline
                .build_record(level, event.metadata().target(), &message, None);
        record.message.push_str(&visitor.error_details);
        record.extended_properties = visitor.fields;

        self.pipeline.dispatch_record(record);
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    error_details: String,
    fields: BTreeMap<String, serde_json::Value>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        // The concrete type is already erased by the time tracing hands the
        // error over, so only the chain itself can be flattened here.
        let trace = flatten::capture_stack_trace();
        flatten::append_error_details(
            &mut self.error_details,
            SourceError::from_dyn(value),
            trace.as_deref(),
        );
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // Macro-formatted messages arrive through this callback.
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{:?}", value)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_levels_map_onto_host_taxonomy() {
        assert_eq!(map_level(&Level::ERROR), LogLevel::Error);
        assert_eq!(map_level(&Level::WARN), LogLevel::Warning);
        assert_eq!(map_level(&Level::INFO), LogLevel::Information);
        assert_eq!(map_level(&Level::DEBUG), LogLevel::Debug);
        assert_eq!(map_level(&Level::TRACE), LogLevel::Trace);
    }
}
