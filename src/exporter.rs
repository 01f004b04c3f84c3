use crate::attributes::{render_attributes, route_attribute, stringify};
use crate::client::{user_agent, ClientFactory, ClientOptions, MessagesClient, CLIENT_TIMEOUT};
use crate::error::ClientError;
use crate::message::{CreateMessage, Item, Severity};
use crate::options::ElmahIoExporterOptions;
use crate::record::{LogLevel, LogRecord, Resource};
use crate::sink::{ExportResult, LogExporter};
use once_cell::sync::OnceCell;
use opentelemetry::trace::{SpanId, TraceFlags, TraceId};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

const ACTIVE: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const DISPOSED: u8 = 2;

/// Lifecycle of an [`ElmahIoExporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterState {
    Active,
    ShuttingDown,
    Disposed,
}

/// [`LogExporter`] that stores log records as elmah.io messages.
///
/// The messages client is created on the first `export` call, not in the
/// constructor, and shared by every later call. Submissions are
/// fire-and-forget: failures reach `on_error`, never the caller.
pub struct ElmahIoExporter {
    options: ElmahIoExporterOptions,
    factory: Box<dyn ClientFactory>,
    client: OnceCell<Arc<dyn MessagesClient>>,
    resource: RwLock<Arc<Resource>>,
    state: AtomicU8,
    dispose_notified: AtomicBool,
}

impl ElmahIoExporter {
    /// Exporter backed by the reqwest-based HTTP client.
    #[cfg(feature = "http")]
    pub fn new(options: ElmahIoExporterOptions) -> Self {
        Self::with_factory(options, crate::http::HttpClientFactory)
    }

    /// Exporter that builds its client lazily through `factory`.
    pub fn with_factory(options: ElmahIoExporterOptions, factory: impl ClientFactory + 'static) -> Self {
        ElmahIoExporter {
            options,
            factory: Box::new(factory),
            client: OnceCell::new(),
            resource: RwLock::new(Arc::new(Resource::empty())),
            state: AtomicU8::new(ACTIVE),
            dispose_notified: AtomicBool::new(false),
        }
    }

    /// Exporter using an already constructed client.
    ///
    /// The client was built elsewhere, so submission failures only reach
    /// `on_error` if the caller wired that up when building it.
    pub fn with_client(options: ElmahIoExporterOptions, client: Arc<dyn MessagesClient>) -> Self {
        ElmahIoExporter {
            options,
            factory: Box::new(|_: ClientOptions| -> Result<Arc<dyn MessagesClient>, ClientError> {
                Err(ClientError::ClientProvided)
            }),
            client: OnceCell::with_value(client),
            resource: RwLock::new(Arc::new(Resource::empty())),
            state: AtomicU8::new(ACTIVE),
            dispose_notified: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &ElmahIoExporterOptions {
        &self.options
    }

    pub fn state(&self) -> ExporterState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => ExporterState::Active,
            SHUTTING_DOWN => ExporterState::ShuttingDown,
            _ => ExporterState::Disposed,
        }
    }

    fn client(&self) -> Result<&Arc<dyn MessagesClient>, ClientError> {
        self.client.get_or_try_init(|| {
            tracing::debug!(log_id = %self.options.log_id, "creating elmah.io client");
            self.factory.create(ClientOptions {
                api_key: self.options.api_key.clone(),
                api_url: self.options.api_url().to_string(),
                web_proxy: self.options.web_proxy.clone(),
                timeout: CLIENT_TIMEOUT,
                user_agent: user_agent(),
                on_message_fail: self.options.on_error.clone(),
            })
        })
    }

    /// Flip the one-shot "export after shutdown" latch. Only the first
    /// caller gets `true` and logs the warning.
    fn notify_disposed(&self) -> bool {
        let first = self
            .dispose_notified
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            tracing::warn!(log_id = %self.options.log_id, "elmah.io exporter received records after shutdown; dropping them");
        }
        first
    }

    /// Build the elmah.io message for one record.
    pub fn create_message(&self, record: &LogRecord, resource: &Resource) -> CreateMessage {
        let root = record.exception.as_ref().map(|e| e.root_cause());

        let mut msg = CreateMessage::new(title(record), log_level_to_severity(record.level));
        msg.date_time = Some(record.timestamp);
        msg.category = record.category.clone();
        msg.application = self.options.application.clone();
        if let Some(exception) = &record.exception {
            msg.detail = Some(exception.to_string());
            msg.type_name = exception.root_type_name().map(str::to_string);
            msg.data = exception.data.iter().map(|(k, v)| Item::new(k.as_str(), v.as_str())).collect();
        }
        msg.source = root.and_then(|r| r.source.clone());

        for (key, value) in &record.attributes {
            route_attribute(&mut msg, key, value);
        }

        for (key, value) in &resource.attributes {
            msg.data.push(Item::new(key.as_str(), stringify(value)));
        }

        if !record.event_id.is_default() {
            msg.data.push(Item::new("EventId", record.event_id.id.to_string()));
            if let Some(name) = record.event_id.name.as_deref().filter(|n| !n.trim().is_empty()) {
                msg.data.push(Item::new("EventName", name));
            }
        }

        // Applied after the attribute scan so the trace id always wins over
        // a correlation id attribute.
        if let Some(trace_id) = record.trace_id.filter(|id| *id != TraceId::INVALID) {
            let trace_id = trace_id.to_string();
            msg.data.push(Item::new("TraceId", trace_id.as_str()));
            msg.correlation_id = Some(trace_id);
        }
        if let Some(span_id) = record.span_id.filter(|id| *id != SpanId::INVALID) {
            msg.data.push(Item::new("SpanId", span_id.to_string()));
        }
        if let Some(flags) = record.trace_flags.filter(|f| *f != TraceFlags::default()) {
            msg.data.push(Item::new("TraceFlags", trace_flags_name(flags)));
        }

        for scope in &record.scopes {
            for (key, value) in &scope.values {
                msg.data.push(Item::new(key.as_str(), stringify(value)));
            }
        }

        msg
    }
}

impl LogExporter for ElmahIoExporter {
    fn export(&self, batch: &[LogRecord]) -> ExportResult {
        if self.state() != ExporterState::Active {
            self.notify_disposed();
            return ExportResult::Failure;
        }

        let client = match self.client() {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "failed to create elmah.io client");
                return ExportResult::Failure;
            }
        };

        let resource = Arc::clone(&self.resource.read().unwrap_or_else(PoisonError::into_inner));

        for record in batch {
            let mut msg = self.create_message(record, &resource);

            if let Some(on_filter) = &self.options.on_filter {
                if on_filter(&msg) {
                    continue;
                }
            }

            if let Some(on_message) = &self.options.on_message {
                on_message(&mut msg);
            }

            client.create_and_notify(self.options.log_id, msg);
        }

        ExportResult::Success
    }

    fn shutdown(&self) {
        if self
            .state
            .compare_exchange(ACTIVE, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Nothing is buffered here; delivery already belongs to the client.
            self.state.store(DISPOSED, Ordering::Release);
            tracing::debug!(log_id = %self.options.log_id, "elmah.io exporter shut down");
        }
    }

    fn set_resource(&self, resource: Resource) {
        *self.resource.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(resource);
    }
}

/// Map a pipeline log level onto an elmah.io severity.
pub fn log_level_to_severity(level: LogLevel) -> Severity {
    match level {
        LogLevel::Debug => Severity::Debug,
        LogLevel::Error => Severity::Error,
        LogLevel::Critical => Severity::Fatal,
        LogLevel::Trace => Severity::Verbose,
        LogLevel::Warning => Severity::Warning,
        _ => Severity::Information,
    }
}

/// Trace flags the way the .NET `ActivityTraceFlags` enum prints them: the
/// sampled bit alone is `Recorded`, anything else is the decimal value.
fn trace_flags_name(flags: TraceFlags) -> String {
    if flags == TraceFlags::SAMPLED {
        "Recorded".to_string()
    } else {
        flags.to_u8().to_string()
    }
}

fn title(record: &LogRecord) -> String {
    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };

    record
        .formatted_message
        .clone()
        .and_then(non_empty)
        .or_else(|| non_empty(render_attributes(&record.attributes)))
        .or_else(|| {
            record
                .exception
                .as_ref()
                .and_then(|e| non_empty(e.root_cause().message.clone()))
        })
        .unwrap_or_else(|| "No message".to_string())
}
