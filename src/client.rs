use crate::error::ClientError;
use crate::message::CreateMessage;
use crate::options::WebProxy;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Connection timeout handed to every client the exporter builds.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Name and semver-compatible version line (not the exact release) of the
/// pipeline this exporter plugs into. `tracing-subscriber` exposes no version
/// at runtime, so the user agent reports the line this crate depends on,
/// matching the `tracing-subscriber = "0.3"` requirement in `Cargo.toml`.
pub const HOST_PIPELINE: (&str, &str) = ("tracing-subscriber", "0.3");

/// Invoked by a client when a submission it accepted later fails.
pub type FailureHandler = Arc<dyn Fn(&CreateMessage, &ClientError) + Send + Sync>;

/// Remote side of the exporter: the elmah.io messages API.
///
/// `create_and_notify` hands a message over for delivery and returns
/// immediately. Delivery failures are not returned; they are reported to the
/// [`FailureHandler`] the client was built with.
pub trait MessagesClient: Send + Sync {
    fn create_and_notify(&self, log_id: Uuid, message: CreateMessage);
}

/// Everything a client needs at construction time.
#[derive(Clone)]
pub struct ClientOptions {
    pub api_key: Option<String>,
    pub api_url: String,
    pub web_proxy: Option<WebProxy>,
    pub timeout: Duration,
    pub user_agent: String,
    pub on_message_fail: Option<FailureHandler>,
}

/// Builds the messages client the first time an exporter needs one.
pub trait ClientFactory: Send + Sync {
    fn create(&self, options: ClientOptions) -> Result<Arc<dyn MessagesClient>, ClientError>;
}

impl<F> ClientFactory for F
where
    F: Fn(ClientOptions) -> Result<Arc<dyn MessagesClient>, ClientError> + Send + Sync,
{
    fn create(&self, options: ClientOptions) -> Result<Arc<dyn MessagesClient>, ClientError> {
        self(options)
    }
}

/// `User-Agent` value identifying this exporter and its host pipeline, e.g.
/// `elmahio-log-exporter/0.1.0 tracing-subscriber/0.3`. The exporter part is
/// the exact package version; the pipeline part is a version line, see
/// [`HOST_PIPELINE`].
pub fn user_agent() -> String {
    format!(
        "{}/{} {}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        HOST_PIPELINE.0,
        HOST_PIPELINE.1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_exporter_and_pipeline() {
        let ua = user_agent();
        assert!(ua.starts_with("elmahio-log-exporter/"));
        assert!(ua.ends_with(" tracing-subscriber/0.3"));
        assert!(ua.contains(concat!("/", env!("CARGO_PKG_VERSION"), " ")));
    }
}
