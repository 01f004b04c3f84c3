use crate::init::LayerConfig;
use crate::record::{EventId, ExceptionInfo, LogLevel, LogRecord, Scope};
use crate::sink::{ExportResult, LogExporter};
use chrono::Utc;
use opentelemetry::trace::{SpanId, TraceFlags, TraceId};
use serde_json::Value;
use std::error::Error;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::field::{Field, Visit};
use tracing::span;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from this crate are never exported, otherwise a failing
/// submission would log, be exported, fail again, and so on.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Crates the HTTP client drives. Their connection tasks outlive a single
/// request and log through the global dispatcher, so anything below WARN
/// from them is not exported.
const TRANSPORT_TARGETS: &[&str] = &["hyper", "h2", "reqwest", "rustls", "want", "tower"];

fn is_feedback_event(target: &str, level: &Level) -> bool {
    if target.starts_with(OWN_TARGET) {
        return true;
    }
    let krate = target.split("::").next().unwrap_or(target);
    *level > Level::WARN && TRANSPORT_TARGETS.contains(&krate)
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to a [`LogExporter`] via a bounded channel and background task.
///
/// Fields of the spans an event happens in are attached as scopes, innermost
/// span first. Network I/O is fully decoupled from application threads.
pub struct ElmahIoLayer {
    sender: mpsc::Sender<LogRecord>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl ElmahIoLayer {
    /// Create a new layer and spawn a background task that pulls
    /// [`LogRecord`]s from a bounded channel and exports them in batches.
    ///
    /// The configured resource is pushed to the exporter before the task
    /// starts. Minimal thresholds are enforced for `channel_buffer`,
    /// `batch_size` and `flush_interval` to avoid degenerate configurations.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; the `init_*` helpers check
    /// for one and return an error instead.
    pub fn new(exporter: Arc<dyn LogExporter>, config: &LayerConfig) -> (Self, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));

        if !config.resource.is_empty() {
            exporter.set_resource(config.resource.clone());
        }

        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                export_batch(&*exporter, &mut batch);
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                export_batch(&*exporter, &mut batch);
                            }
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            export_batch(&*exporter, &mut batch);
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                min_level: config.min_level,
                total_events: Arc::new(AtomicU64::new(0)),
                enqueued_events: Arc::new(AtomicU64::new(0)),
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }
}

fn export_batch(exporter: &dyn LogExporter, batch: &mut Vec<LogRecord>) {
    if exporter.export(batch) == ExportResult::Failure {
        tracing::warn!(records = batch.len(), "log exporter rejected batch; dropping it");
    }
    batch.clear();
}

impl<S> Layer<S> for ElmahIoLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.into_values()));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = FieldVisitor { fields: std::mem::take(&mut fields.0), ..Default::default() };
            values.record(&mut visitor);
            fields.0 = visitor.into_values();
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.min_level || is_feedback_event(meta.target(), meta.level()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let scopes: Vec<Scope> = ctx
            .event_scope(event)
            .map(|spans| {
                spans
                    .map(|span| Scope {
                        name: Some(span.name().to_string()),
                        values: span
                            .extensions()
                            .get::<SpanFields>()
                            .map(|fields| fields.0.clone())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut record = LogRecord {
            timestamp: Utc::now(),
            level: LogLevel::from(*meta.level()),
            category: Some(meta.target().to_string()),
            formatted_message: visitor.message,
            exception: visitor.exception,
            attributes: visitor.fields,
            event_id: EventId::default(),
            trace_id: None,
            span_id: None,
            trace_flags: None,
            scopes,
        };
        extract_event_id(&mut record);
        extract_trace_context(&mut record);

        match self.sender.try_send(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log record");
            }
        }
    }
}

/// Pull `event_id` / `event_name` fields out of the attributes.
fn extract_event_id(record: &mut LogRecord) {
    let id = take_field(&mut record.attributes, "event_id", |v| v.as_i64().and_then(|n| i32::try_from(n).ok()));
    if let Some(id) = id {
        let name = take_field(&mut record.attributes, "event_name", |v| v.as_str().map(str::to_string));
        record.event_id = EventId { id, name };
    }
}

/// Fill the trace context from `trace_id` / `span_id` / `trace_flags` hex
/// fields: event fields first (removed from the attributes), then the
/// enclosing spans from innermost outwards.
fn extract_trace_context(record: &mut LogRecord) {
    let parse_trace = |v: &Value| v.as_str().and_then(|s| TraceId::from_hex(s).ok());
    let parse_span = |v: &Value| v.as_str().and_then(|s| SpanId::from_hex(s).ok());
    let parse_flags = |v: &Value| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()).map(TraceFlags::new),
        Value::String(s) => u8::from_str_radix(s, 16).ok().map(TraceFlags::new),
        _ => None,
    };

    record.trace_id = take_field(&mut record.attributes, "trace_id", parse_trace)
        .or_else(|| find_in_scopes(&record.scopes, "trace_id", parse_trace));
    record.span_id = take_field(&mut record.attributes, "span_id", parse_span)
        .or_else(|| find_in_scopes(&record.scopes, "span_id", parse_span));
    record.trace_flags = take_field(&mut record.attributes, "trace_flags", parse_flags)
        .or_else(|| find_in_scopes(&record.scopes, "trace_flags", parse_flags));
}

fn take_field<T>(fields: &mut Vec<(String, Value)>, key: &str, parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
    let index = fields.iter().position(|(k, _)| k == key)?;
    let parsed = parse(&fields[index].1)?;
    fields.remove(index);
    Some(parsed)
}

fn find_in_scopes<T>(scopes: &[Scope], key: &str, parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
    scopes
        .iter()
        .flat_map(|scope| scope.values.iter())
        .filter(|(k, _)| k == key)
        .find_map(|(_, v)| parse(v))
}

/// Recorded fields of a span, stored in its extensions.
struct SpanFields(Vec<(String, Value)>);

#[derive(Default)]
pub struct FieldVisitor {
    pub fields: Vec<(String, Value)>,
    pub message: Option<String>,
    pub exception: Option<ExceptionInfo>,
}

impl FieldVisitor {
    fn set(&mut self, field: &Field, value: Value) {
        let name = field.name();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Flatten into plain fields, the way span fields are kept.
    fn into_values(mut self) -> Vec<(String, Value)> {
        if let Some(message) = self.message.take() {
            self.fields.push(("message".to_string(), Value::String(message)));
        }
        if let Some(exception) = self.exception.take() {
            self.fields.push(("error".to_string(), Value::String(exception.to_string())));
        }
        self.fields
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.set(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.set(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.set(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.set(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.set(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exception.is_none() {
            self.exception = Some(ExceptionInfo::from_dyn_error(value));
        } else {
            self.set(field, Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.set(field, Value::String(format!("{:?}", value)));
        }
    }
}
