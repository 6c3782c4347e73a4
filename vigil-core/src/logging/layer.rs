use std::fmt;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{self, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::{LookupSpan, SpanRef};
use tracing_subscriber::Layer;

use super::fanout::Fanout;
use crate::events::{Attributes, EventRecord, Severity};

/// Visitor to extract message and typed fields from tracing events
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    attributes: Attributes,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.attributes.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record(field, Value::String(value.to_string()));
    }
}

/// Fanout view stored in a span's extensions
/// Grouped under the span name and carrying the span's fields
struct SpanView(Fanout);

/// Tracing layer that turns every event into an `EventRecord` for the fanout
///
/// Each span derives its own view from its parent's (or the root) with
/// `with_group(span name)` and `with_attributes(span fields)`, and events are
/// dispatched through the view of the span they happen in.
pub struct FanoutLayer {
    fanout: Fanout,
}

impl FanoutLayer {
    pub fn new(fanout: Fanout) -> Self {
        Self { fanout }
    }

    fn view_of<S>(&self, span: Option<SpanRef<'_, S>>) -> Fanout
    where
        S: for<'a> LookupSpan<'a>,
    {
        if let Some(span) = span {
            let extensions = span.extensions();
            if let Some(view) = extensions.get::<SpanView>() {
                return view.0.clone();
            }
        }
        self.fanout.clone()
    }
}

impl<S> Layer<S> for FanoutLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);

        let view = self
            .view_of(span.parent())
            .with_group(span.name())
            .with_attributes(visitor.attributes);
        span.extensions_mut().insert(SpanView(view));
    }

    fn on_record(&self, id: &span::Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        if visitor.attributes.is_empty() {
            return;
        }

        let mut extensions = span.extensions_mut();
        if let Some(view) = extensions.get_mut::<SpanView>() {
            view.0 = view.0.with_attributes(visitor.attributes);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = Severity::from(*event.metadata().level());
        if !self.fanout.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = EventRecord::new(level, visitor.message.unwrap_or_default());
        record.attributes = visitor.attributes;

        // Clone out of the extensions before dispatching so no span lock is held
        let view = self.view_of(ctx.event_span(event));
        view.dispatch(record);
    }
}
