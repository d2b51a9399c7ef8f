use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

/// A span observed by [`CaptureLayer`] after it closed.
#[derive(Debug, Clone)]
pub struct RecordedSpan {
    /// Position in open order, starting at 1.
    pub index: usize,
    pub name: &'static str,
    pub request_number: Option<u64>,
    /// Messages of the events emitted while the span was current.
    pub events: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub severity: Option<String>,
    /// [`RecordedSpan::index`] of the enclosing span.
    pub span_index: Option<usize>,
}

#[derive(Debug, Default)]
pub struct Capture {
    pub opened: usize,
    pub spans: Vec<RecordedSpan>,
    pub events: Vec<RecordedEvent>,
}

impl Capture {
    pub fn closed(&self) -> usize {
        self.spans.len()
    }

    pub fn events_in_span(&self, index: usize) -> impl Iterator<Item = &RecordedEvent> {
        self.events
            .iter()
            .filter(move |event| event.span_index == Some(index))
    }
}

struct SpanState {
    index: usize,
    request_number: Option<u64>,
    events: Vec<String>,
}

/// Layer capturing spans and events for assertions in tests.
pub struct CaptureLayer {
    store: Arc<Mutex<Capture>>,
}

impl CaptureLayer {
    pub fn new(store: Arc<Mutex<Capture>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<Mutex<Capture>> {
        Arc::clone(&self.store)
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: Context<'_, S>,
    ) {
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);

        let Ok(mut store) = self.store.lock() else {
            return;
        };
        store.opened += 1;
        let index = store.opened;
        drop(store);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanState {
                index,
                request_number: fields.request_number,
                events: Vec::new(),
            });
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        let mut fields = FieldCollector::default();
        values.record(&mut fields);

        if let (Some(span), Some(number)) = (ctx.span(id), fields.request_number) {
            if let Some(state) = span.extensions_mut().get_mut::<SpanState>() {
                state.request_number = Some(number);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        let message = fields.message.unwrap_or_default();

        let span_index = ctx.event_span(event).and_then(|span| {
            let mut extensions = span.extensions_mut();
            let state = extensions.get_mut::<SpanState>()?;
            state.events.push(message.clone());
            Some(state.index)
        });

        if let Ok(mut store) = self.store.lock() {
            store.events.push(RecordedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                message,
                severity: fields.severity,
                span_index,
            });
        }
    }

    fn on_close(&self, id: tracing::span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let Some(state) = span.extensions_mut().remove::<SpanState>() else {
            return;
        };

        if let Ok(mut store) = self.store.lock() {
            store.spans.push(RecordedSpan {
                index: state.index,
                name: span.metadata().name(),
                request_number: state.request_number,
                events: state.events,
            });
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    severity: Option<String>,
    request_number: Option<u64>,
}

impl Visit for FieldCollector {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "request.number" {
            self.request_number = Some(value);
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match u64::try_from(value) {
            Ok(value) => self.record_u64(field, value),
            Err(_) => self.record_debug(field, &value),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "severity" => self.severity = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            "severity" => self.severity = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

/// Returns a capture layer and shared storage to inspect spans and events in tests.
pub fn span_recorder() -> (CaptureLayer, Arc<Mutex<Capture>>) {
    let storage = Arc::new(Mutex::new(Capture::default()));
    let layer = CaptureLayer::new(Arc::clone(&storage));
    (layer, storage)
}
