use chrono::{DateTime, Utc};
use opentelemetry::trace::{SpanId, TraceFlags, TraceId};
use serde_json::Value;
use std::error::Error;
use std::fmt;

/// Severity of a [`LogRecord`] as reported by the logging pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::DEBUG => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Numeric event identifier with an optional name.
///
/// Only the numeric part decides whether the id is set: `id == 0` counts as
/// "no event id" even if a name is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventId {
    pub id: i32,
    pub name: Option<String>,
}

impl EventId {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        EventId { id, name: Some(name.into()) }
    }

    pub fn is_default(&self) -> bool {
        self.id == 0
    }
}

/// Error attached to a log record.
///
/// Mirrors an exception chain: each level has an optional type name, a
/// message, an optional originating component and its own key/value data,
/// and may wrap an inner cause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionInfo {
    pub type_name: Option<String>,
    pub message: String,
    pub source: Option<String>,
    pub data: Vec<(String, String)>,
    pub cause: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionInfo {
            type_name: Some(type_name.into()),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Capture a concrete error together with its `source()` chain.
    ///
    /// The outermost level gets the fully-qualified type name of `E`; inner
    /// causes are only known as trait objects and get the name
    /// [`from_dyn_error`](Self::from_dyn_error) can recover.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut info = Self::from_dyn_error(err);
        info.type_name = Some(std::any::type_name::<E>().to_string());
        info
    }

    /// Capture an error known only as a trait object.
    ///
    /// The type name of each level is recovered from its `Debug` output,
    /// which for derived impls starts with the type's name (`Outer(..)`,
    /// `Timeout { .. }`). `std::io::Error` is recognised by downcasting since
    /// its `Debug` names the inner representation instead. Levels whose
    /// `Debug` does not start with a type-like name are left unnamed.
    pub fn from_dyn_error(err: &(dyn Error + 'static)) -> Self {
        ExceptionInfo {
            type_name: dyn_type_name(err),
            message: err.to_string(),
            source: None,
            data: Vec::new(),
            cause: err.source().map(|inner| Box::new(Self::from_dyn_error(inner))),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    pub fn with_cause(mut self, cause: ExceptionInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Innermost error of the chain (`self` when there is no cause).
    pub fn root_cause(&self) -> &ExceptionInfo {
        let mut current = self;
        while let Some(inner) = current.cause.as_deref() {
            current = inner;
        }
        current
    }

    /// Type name of the innermost level that has one. Causes captured from
    /// `dyn Error` chains carry no type name, so this may stop short of
    /// [`root_cause`](Self::root_cause).
    pub fn root_type_name(&self) -> Option<&str> {
        let mut found = self.type_name.as_deref();
        let mut current = self.cause.as_deref();
        while let Some(level) = current {
            if let Some(type_name) = level.type_name.as_deref() {
                found = Some(type_name);
            }
            current = level.cause.as_deref();
        }
        found
    }
}

fn dyn_type_name(err: &(dyn Error + 'static)) -> Option<String> {
    if err.is::<std::io::Error>() {
        return Some("std::io::Error".to_string());
    }
    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let last = name.rsplit("::").next().unwrap_or_default();
    if last.chars().next().map_or(false, char::is_uppercase) {
        Some(name)
    } else {
        None
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = Some(self);
        let mut first = true;
        while let Some(level) = current {
            if !first {
                f.write_str("\n ---> ")?;
            }
            match &level.type_name {
                Some(type_name) if level.message.is_empty() => f.write_str(type_name)?,
                Some(type_name) => write!(f, "{}: {}", type_name, level.message)?,
                None => f.write_str(&level.message)?,
            }
            first = false;
            current = level.cause.as_deref();
        }
        Ok(())
    }
}

/// Ordered key/value group attached to a record by an enclosing logging
/// context (for `tracing`, the fields of an active span).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub name: Option<String>,
    pub values: Vec<(String, Value)>,
}

/// Service and environment attributes shared by every record of a process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub attributes: Vec<(String, Value)>,
}

impl Resource {
    pub fn empty() -> Self {
        Resource::default()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_service_name(self, name: impl Into<String>) -> Self {
        self.with_attribute("service.name", name.into())
    }
}

/// One structured log event handed to an exporter.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: Option<String>,
    pub formatted_message: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub attributes: Vec<(String, Value)>,
    pub event_id: EventId,
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub trace_flags: Option<TraceFlags>,
    pub scopes: Vec<Scope>,
}

impl Default for LogRecord {
    fn default() -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level: LogLevel::default(),
            category: None,
            formatted_message: None,
            exception: None,
            attributes: Vec::new(),
            event_id: EventId::default(),
            trace_id: None,
            span_id: None,
            trace_flags: None,
            scopes: Vec::new(),
        }
    }
}

impl LogRecord {
    pub fn new(level: LogLevel) -> Self {
        LogRecord { level, ..Default::default() }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.formatted_message = Some(message.into());
        self
    }

    pub fn exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn trace_context(mut self, trace_id: TraceId, span_id: SpanId, flags: TraceFlags) -> Self {
        self.trace_id = Some(trace_id);
        self.span_id = Some(span_id);
        self.trace_flags = Some(flags);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn root_cause_walks_to_innermost() {
        let info = ExceptionInfo::new("a::Outer", "outer")
            .with_cause(ExceptionInfo::new("a::Middle", "middle").with_cause(ExceptionInfo::new("a::Inner", "inner")));

        assert_eq!(info.root_cause().type_name.as_deref(), Some("a::Inner"));
        assert_eq!(info.to_string(), "a::Outer: outer\n ---> a::Middle: middle\n ---> a::Inner: inner");
    }

    #[test]
    fn from_error_captures_type_and_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let info = ExceptionInfo::from_error(&err);

        assert!(info.type_name.as_deref().unwrap().ends_with("Outer"));
        assert_eq!(info.root_type_name(), Some("std::io::Error"));
        assert_eq!(info.root_cause().message, "disk gone");
        assert!(info.to_string().ends_with("Outer: outer failure\n ---> std::io::Error: disk gone"));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("request timed out after {secs}s")]
    struct Timeout {
        secs: u64,
    }

    #[test]
    fn dyn_errors_keep_a_type_name() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let info = ExceptionInfo::from_dyn_error(&err);
        assert_eq!(info.type_name.as_deref(), Some("Outer"));
        assert_eq!(info.to_string(), "Outer: outer failure\n ---> std::io::Error: disk gone");

        let info = ExceptionInfo::from_dyn_error(&Timeout { secs: 3 });
        assert_eq!(info.root_type_name(), Some("Timeout"));
    }

    #[test]
    fn dyn_errors_without_type_like_debug_stay_unnamed() {
        let boxed: Box<dyn Error + Send + Sync> = "plain text".into();
        let info = ExceptionInfo::from_dyn_error(boxed.as_ref());
        assert_eq!(info.type_name, None);
        assert_eq!(info.to_string(), "plain text");
    }

    #[test]
    fn event_id_default_only_looks_at_number() {
        assert!(EventId::default().is_default());
        assert!(EventId { id: 0, name: Some("named".into()) }.is_default());
        assert!(!EventId::new(1, "EventName").is_default());
    }
}
