use std::fmt;
use std::time::SystemTime;

use opentelemetry::logs::{
    AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity as OtelSeverity,
};
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::severity::{CRITICAL_TARGET, Severity};

/// Exports critical records at OTel `FATAL`.
///
/// `tracing` has no level above ERROR, so the general log bridge would ship
/// these as errors. It skips [`CRITICAL_TARGET`] and this layer emits them instead.
/// Trace context comes from the span activated by the OTel span layer.
pub struct CriticalLogLayer {
    logger: SdkLogger,
}

impl CriticalLogLayer {
    pub fn new(provider: &SdkLoggerProvider) -> Self {
        Self {
            logger: provider.logger("greenhouse-app"),
        }
    }
}

impl<S> Layer<S> for CriticalLogLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target() != CRITICAL_TARGET {
            return;
        }

        let mut message = MessageVisitor::default();
        event.record(&mut message);

        let mut record = self.logger.create_log_record();
        record.set_timestamp(SystemTime::now());
        record.set_target(metadata.target());
        record.set_event_name(metadata.name());
        record.set_severity_number(OtelSeverity::Fatal);
        record.set_severity_text(Severity::Critical.as_str());
        record.set_body(AnyValue::from(message.0.unwrap_or_default()));
        self.logger.emit(record);
    }
}

#[derive(Default)]
struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}
