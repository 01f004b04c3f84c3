use elmahio_log_exporter::client::{ClientOptions, FailureHandler, MessagesClient};
use elmahio_log_exporter::error::ClientError;
use elmahio_log_exporter::message::{CreateMessage, Item, Severity};
use elmahio_log_exporter::options::ElmahIoExporterOptions;
use elmahio_log_exporter::record::{EventId, ExceptionInfo, LogLevel, LogRecord};
use elmahio_log_exporter::{ElmahIoExporter, ExportResult, LogExporter};
use opentelemetry::trace::{SpanId, TraceFlags, TraceId};
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("something generic went wrong")]
struct GenericException;

#[derive(Default)]
struct RecordingClient {
    sent: Mutex<Vec<(Uuid, CreateMessage)>>,
}

impl MessagesClient for RecordingClient {
    fn create_and_notify(&self, log_id: Uuid, message: CreateMessage) {
        self.sent.lock().unwrap().push((log_id, message));
    }
}

/// Client that rejects every message right away through its failure hook.
struct RejectingClient {
    on_fail: Option<FailureHandler>,
}

impl MessagesClient for RejectingClient {
    fn create_and_notify(&self, _log_id: Uuid, message: CreateMessage) {
        if let Some(on_fail) = &self.on_fail {
            on_fail(&message, &ClientError::Status { status: 401, body: "bad api key".into() });
        }
    }
}

fn recording_exporter(options: ElmahIoExporterOptions) -> (ElmahIoExporter, Arc<RecordingClient>) {
    let client = Arc::new(RecordingClient::default());
    (ElmahIoExporter::with_client(options, client.clone()), client)
}

#[test]
fn can_export_batch() {
    let options = ElmahIoExporterOptions::new(Uuid::new_v4().to_string(), Uuid::new_v4());
    let log_id = options.log_id;
    let (exporter, client) = recording_exporter(options);

    let record = LogRecord::new(LogLevel::Warning)
        .category("Category")
        .message("A message")
        .exception(ExceptionInfo::from_error(&GenericException))
        .event_id(EventId::new(1, "EventName"))
        .trace_context(TraceId::INVALID, SpanId::INVALID, TraceFlags::default());

    assert_eq!(exporter.export(&[record]), ExportResult::Success);

    let sent = client.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (sent_log_id, msg) = &sent[0];
    assert_eq!(*sent_log_id, log_id);
    assert_eq!(msg.title, "A message");
    assert!(msg.date_time.is_some());
    assert!(msg.detail.as_deref().unwrap().contains("GenericException"));
    assert_eq!(msg.type_name.as_deref(), Some(std::any::type_name::<GenericException>()));
    assert_eq!(msg.severity, Severity::Warning);
    assert_eq!(msg.category.as_deref(), Some("Category"));
    assert_eq!(msg.data, vec![Item::new("EventId", "1"), Item::new("EventName", "EventName")]);
}

#[test]
fn reserved_attributes_never_reach_data() {
    let (exporter, client) = recording_exporter(ElmahIoExporterOptions::new("key", Uuid::new_v4()));

    let record = LogRecord::new(LogLevel::Error)
        .message("checkout failed")
        .attribute("{OriginalFormat}", "checkout failed for {User}")
        .attribute("statuscode", 500)
        .attribute("hostname", "web-01")
        .attribute("user", "alice")
        .attribute("method", "POST")
        .attribute("url", "/checkout")
        .attribute("remoteaddr", "10.1.2.3")
        .attribute("form", json!({"card": "****"}))
        .attribute("cart_size", 3);

    exporter.export(&[record]);

    let sent = client.sent.lock().unwrap();
    let msg = &sent[0].1;
    assert_eq!(msg.title_template.as_deref(), Some("checkout failed for {User}"));
    assert_eq!(msg.status_code, Some(500));
    assert_eq!(msg.hostname.as_deref(), Some("web-01"));
    assert_eq!(msg.method.as_deref(), Some("POST"));
    assert_eq!(msg.server_variables, vec![Item::new("Client-IP", "10.1.2.3")]);
    assert_eq!(msg.form, vec![Item::new("card", "****")]);
    assert_eq!(msg.data, vec![Item::new("cart_size", "3")]);
}

#[test]
fn trace_id_wins_over_correlation_attribute() {
    let (exporter, client) = recording_exporter(ElmahIoExporterOptions::new("key", Uuid::new_v4()));
    let trace_id = TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap();

    let with_attribute = LogRecord::new(LogLevel::Error)
        .attribute("correlationid", "from-attribute")
        .trace_context(trace_id, SpanId::INVALID, TraceFlags::default());
    let without_attribute =
        LogRecord::new(LogLevel::Error).trace_context(trace_id, SpanId::INVALID, TraceFlags::default());

    exporter.export(&[with_attribute, without_attribute]);

    let sent = client.sent.lock().unwrap();
    for (_, msg) in sent.iter() {
        assert_eq!(msg.correlation_id.as_deref(), Some("0af7651916cd43dd8448eb211c80319c"));
        assert_eq!(msg.data_value("TraceId"), Some("0af7651916cd43dd8448eb211c80319c"));
    }
}

#[test]
fn batch_order_is_preserved() {
    let (exporter, client) = recording_exporter(ElmahIoExporterOptions::new("key", Uuid::new_v4()));
    let batch: Vec<_> = (0..5).map(|i| LogRecord::new(LogLevel::Information).message(format!("m{i}"))).collect();

    exporter.export(&batch);

    let titles: Vec<_> = client.sent.lock().unwrap().iter().map(|(_, m)| m.title.clone()).collect();
    assert_eq!(titles, ["m0", "m1", "m2", "m3", "m4"]);
}

#[test]
fn submission_failures_reach_on_error() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&failures);
    let options = ElmahIoExporterOptions::new("key", Uuid::new_v4()).on_error(move |msg, err| {
        seen.lock().unwrap().push((msg.title.clone(), err.to_string()));
    });

    let exporter = ElmahIoExporter::with_factory(
        options,
        |opts: ClientOptions| -> Result<Arc<dyn MessagesClient>, ClientError> {
            Ok(Arc::new(RejectingClient { on_fail: opts.on_message_fail }))
        },
    );

    assert_eq!(exporter.export(&[LogRecord::new(LogLevel::Error).message("lost")]), ExportResult::Success);

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "lost");
    assert!(failures[0].1.contains("401"));
}

#[test]
fn submission_failures_without_on_error_are_dropped() {
    let exporter = ElmahIoExporter::with_factory(
        ElmahIoExporterOptions::new("key", Uuid::new_v4()),
        |opts: ClientOptions| -> Result<Arc<dyn MessagesClient>, ClientError> {
            assert!(opts.on_message_fail.is_none());
            Ok(Arc::new(RejectingClient { on_fail: opts.on_message_fail }))
        },
    );

    assert_eq!(exporter.export(&[LogRecord::new(LogLevel::Error)]), ExportResult::Success);
}

#[test]
fn filtered_records_skip_on_message_and_on_error() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let on_message_calls = Arc::clone(&calls);
    let on_error_calls = Arc::clone(&calls);
    let options = ElmahIoExporterOptions::new("key", Uuid::new_v4())
        .on_filter(|msg| msg.severity == Severity::Verbose)
        .on_message(move |_| on_message_calls.lock().unwrap().push("on_message"))
        .on_error(move |_, _| on_error_calls.lock().unwrap().push("on_error"));

    let exporter = ElmahIoExporter::with_factory(
        options,
        |opts: ClientOptions| -> Result<Arc<dyn MessagesClient>, ClientError> {
            Ok(Arc::new(RejectingClient { on_fail: opts.on_message_fail }))
        },
    );

    exporter.export(&[LogRecord::new(LogLevel::Trace).message("noise")]);
    assert!(calls.lock().unwrap().is_empty());

    exporter.export(&[LogRecord::new(LogLevel::Error).message("real")]);
    assert_eq!(*calls.lock().unwrap(), ["on_message", "on_error"]);
}

#[test]
fn concurrent_exports_after_shutdown_all_fail() {
    let (exporter, client) = recording_exporter(ElmahIoExporterOptions::new("key", Uuid::new_v4()));
    let exporter = Arc::new(exporter);
    exporter.shutdown();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let exporter = Arc::clone(&exporter);
            std::thread::spawn(move || exporter.export(&[LogRecord::new(LogLevel::Critical)]))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), ExportResult::Failure);
    }
    assert!(client.sent.lock().unwrap().is_empty());
}
