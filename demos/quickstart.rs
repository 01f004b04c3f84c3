use tokio::time::{sleep, Duration};
use tracing::{error, info, info_span};

use elmahio_log_exporter::init::init_elmahio_from_env;

/// Reads ELMAHIO_API_KEY / ELMAHIO_LOG_ID (and optionally OTEL_SERVICE_NAME)
/// from the environment and ships everything from INFO upwards to elmah.io.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handle = init_elmahio_from_env()?;

    info!("starting service");

    let span = info_span!("request", method = "POST", url = "/login");
    let _guard = span.enter();
    error!(statuscode = 401, user = "alice", reason = "invalid password", "authentication failed");

    // Give the background task time to flush and the client time to deliver.
    sleep(Duration::from_secs(2)).await;
    handle.shutdown();
    Ok(())
}
