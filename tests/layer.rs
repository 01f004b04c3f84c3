use elmahio_log_exporter::client::MessagesClient;
use elmahio_log_exporter::init::LayerConfig;
use elmahio_log_exporter::message::{CreateMessage, Item, Severity};
use elmahio_log_exporter::options::ElmahIoExporterOptions;
use elmahio_log_exporter::record::Resource;
use elmahio_log_exporter::{ElmahIoExporter, ElmahIoLayer, LogExporter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;
use uuid::Uuid;

#[derive(Default)]
struct RecordingClient {
    sent: Mutex<Vec<CreateMessage>>,
}

impl MessagesClient for RecordingClient {
    fn create_and_notify(&self, _log_id: Uuid, message: CreateMessage) {
        self.sent.lock().unwrap().push(message);
    }
}

fn config() -> LayerConfig {
    LayerConfig {
        flush_interval: Duration::from_millis(20),
        enable_stdout: false,
        min_level: Level::WARN,
        ..LayerConfig::default()
    }
}

fn exporter() -> (Arc<ElmahIoExporter>, Arc<RecordingClient>) {
    let client = Arc::new(RecordingClient::default());
    let options = ElmahIoExporterOptions::new("key", Uuid::new_v4()).application("shop");
    (Arc::new(ElmahIoExporter::with_client(options, client.clone())), client)
}

#[tokio::test]
async fn exports_events_with_fields_and_span_scopes() {
    let (exporter, client) = exporter();
    let config = LayerConfig { resource: Resource::empty().with_service_name("checkout"), ..config() };
    let (layer, task) = ElmahIoLayer::new(exporter.clone(), &config);
    let total = Arc::clone(&layer.total_events);
    let enqueued = Arc::clone(&layer.enqueued_events);

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        let span = tracing::info_span!("request", request_id = "r-1");
        let _guard = span.enter();
        tracing::info!("below the configured level");
        tracing::error!(statuscode = 503, order = 7, user = "alice", "checkout failed");
    });

    // Dropping the subscriber closes the channel; the task flushes and ends.
    task.await.unwrap();

    assert_eq!(total.load(Ordering::Relaxed), 2);
    assert_eq!(enqueued.load(Ordering::Relaxed), 1);

    let sent = client.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let msg = &sent[0];
    assert_eq!(msg.title, "checkout failed");
    assert_eq!(msg.severity, Severity::Error);
    assert_eq!(msg.category.as_deref(), Some(module_path!()));
    assert_eq!(msg.application.as_deref(), Some("shop"));
    assert_eq!(msg.status_code, Some(503));
    assert_eq!(msg.user.as_deref(), Some("alice"));
    assert_eq!(
        msg.data,
        vec![
            Item::new("order", "7"),
            Item::new("service.name", "checkout"),
            Item::new("request_id", "r-1"),
        ]
    );
}

#[tokio::test]
async fn error_fields_become_exception_details() {
    let (exporter, client) = exporter();
    let (layer, task) = ElmahIoLayer::new(exporter.clone(), &config());

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        tracing::error!(error = &err as &(dyn std::error::Error + 'static), "write failed");
    });
    task.await.unwrap();

    let sent = client.sent.lock().unwrap();
    assert_eq!(sent[0].title, "write failed");
    assert_eq!(sent[0].detail.as_deref(), Some("std::io::Error: disk full"));
    assert_eq!(sent[0].type_name.as_deref(), Some("std::io::Error"));
    assert!(sent[0].data.is_empty());
}

#[derive(Debug, thiserror::Error)]
#[error("could not save order")]
struct SaveFailed(#[source] std::io::Error);

#[tokio::test]
async fn chained_error_fields_carry_type_names() {
    let (exporter, client) = exporter();
    let (layer, task) = ElmahIoLayer::new(exporter.clone(), &config());

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        let err = SaveFailed(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"));
        tracing::error!(error = &err as &(dyn std::error::Error + 'static), "order lost");
    });
    task.await.unwrap();

    let sent = client.sent.lock().unwrap();
    assert_eq!(
        sent[0].detail.as_deref(),
        Some("SaveFailed: could not save order\n ---> std::io::Error: read-only volume")
    );
    assert_eq!(sent[0].type_name.as_deref(), Some("std::io::Error"));
}

#[tokio::test]
async fn event_and_trace_fields_are_mapped() {
    let (exporter, client) = exporter();
    let (layer, task) = ElmahIoLayer::new(exporter.clone(), &config());

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::warn!(
            event_id = 12,
            event_name = "StockLow",
            trace_id = "4bf92f3577b34da6a3ce929d0e0e4736",
            correlationid = "overridden",
            "stock is low"
        );
    });
    task.await.unwrap();

    let sent = client.sent.lock().unwrap();
    let msg = &sent[0];
    assert_eq!(msg.correlation_id.as_deref(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
    assert_eq!(msg.data_value("EventId"), Some("12"));
    assert_eq!(msg.data_value("EventName"), Some("StockLow"));
    assert_eq!(msg.data_value("event_id"), None);
}

#[tokio::test]
async fn batches_after_shutdown_are_dropped() {
    let (exporter, client) = exporter();
    let (layer, task) = ElmahIoLayer::new(exporter.clone(), &config());
    exporter.shutdown();

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::error!("too late");
    });
    task.await.unwrap();

    assert!(client.sent.lock().unwrap().is_empty());
}

#[cfg(feature = "http")]
#[tokio::test]
async fn http_client_logging_is_not_exported_back() {
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let mut options = ElmahIoExporterOptions::new("key", Uuid::new_v4()).on_error(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    // Nothing listens on the discard port, so every submission fails fast.
    options.api_url = Some("http://127.0.0.1:9".to_string());
    let exporter = Arc::new(ElmahIoExporter::new(options));

    let config = LayerConfig { min_level: Level::TRACE, ..config() };
    let (layer, task) = ElmahIoLayer::new(exporter, &config);
    let enqueued = Arc::clone(&layer.enqueued_events);
    let dropped = Arc::clone(&layer.dropped_events);

    let guard = tracing::subscriber::set_default(Registry::default().with(layer));
    tracing::error!("payment declined");
    tokio::time::sleep(Duration::from_millis(500)).await;
    drop(guard);
    task.await.unwrap();

    assert_eq!(enqueued.load(Ordering::Relaxed), 1);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}
