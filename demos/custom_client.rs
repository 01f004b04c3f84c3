use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{error, info};
use uuid::Uuid;

use elmahio_log_exporter::{
    env::{env_or, ELMAHIO_APPLICATION_ENV},
    init::init_tracing,
    message::CreateMessage,
    ElmahIoExporter, ElmahIoExporterOptions, MessagesClient,
};

/// Example of plugging in a completely custom client by implementing
/// `MessagesClient` directly. Imagine this forwards to an internal
/// gateway instead of calling elmah.io; here it just prints the payload.
struct StdoutClient;

impl MessagesClient for StdoutClient {
    fn create_and_notify(&self, log_id: Uuid, message: CreateMessage) {
        match serde_json::to_string_pretty(&message) {
            Ok(json) => println!("[{log_id}] {json}"),
            Err(e) => eprintln!("could not serialize message: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = ElmahIoExporterOptions::new("unused", Uuid::new_v4())
        .application(env_or(ELMAHIO_APPLICATION_ENV, "custom-client-demo"))
        .on_filter(|msg| msg.title.contains("healthz"))
        .on_message(|msg| msg.version = Some(env!("CARGO_PKG_VERSION").to_string()));

    let exporter = Arc::new(ElmahIoExporter::with_client(options, Arc::new(StdoutClient)));
    init_tracing(exporter)?;

    info!("GET /healthz");
    error!(db = "orders", "simulated error sent through a custom client");

    sleep(Duration::from_secs(2)).await;
    Ok(())
}
