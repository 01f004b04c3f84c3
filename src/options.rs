use crate::error::{ClientError, ConfigError};
use crate::message::CreateMessage;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Called with every message right before it is submitted.
pub type OnMessage = Arc<dyn Fn(&mut CreateMessage) + Send + Sync>;

/// Called when the elmah.io API rejects or fails to receive a message.
pub type OnError = Arc<dyn Fn(&CreateMessage, &ClientError) + Send + Sync>;

/// Returning `true` drops the message client-side.
pub type OnFilter = Arc<dyn Fn(&CreateMessage) -> bool + Send + Sync>;

/// Outbound HTTP proxy used for all requests to elmah.io.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebProxy {
    /// Proxy URL, e.g. "http://proxy.local:3128"
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl WebProxy {
    pub fn new(url: impl Into<String>) -> Self {
        WebProxy { url: url.into(), username: None, password: None }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Settings for [`ElmahIoExporter`](crate::exporter::ElmahIoExporter).
///
/// `api_key` and `log_id` are not validated here; a missing value shows up
/// as a [`ClientError`] passed to `on_error` once a message is submitted.
#[derive(Clone, Default)]
pub struct ElmahIoExporterOptions {
    /// API key from the elmah.io UI.
    pub api_key: Option<String>,
    /// Id of the log messages are stored in.
    pub log_id: Uuid,
    /// Application name put on every message unless an `application`
    /// attribute overrides it.
    pub application: Option<String>,
    pub on_message: Option<OnMessage>,
    pub on_error: Option<OnError>,
    pub on_filter: Option<OnFilter>,
    pub web_proxy: Option<WebProxy>,
    /// Base URL of the API. Defaults to [`DEFAULT_API_URL`] when unset.
    pub api_url: Option<String>,
}

/// Public elmah.io API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.elmah.io";

impl ElmahIoExporterOptions {
    pub fn new(api_key: impl Into<String>, log_id: Uuid) -> Self {
        ElmahIoExporterOptions {
            api_key: Some(api_key.into()),
            log_id,
            ..Default::default()
        }
    }

    /// Build options from `ELMAHIO_*` environment variables.
    ///
    /// `ELMAHIO_API_KEY` and `ELMAHIO_LOG_ID` are required; application,
    /// proxy and API URL are picked up when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        use crate::env::*;

        let api_key = std::env::var(ELMAHIO_API_KEY_ENV).map_err(|_| ConfigError::MissingVar(ELMAHIO_API_KEY_ENV))?;
        let log_id = std::env::var(ELMAHIO_LOG_ID_ENV).map_err(|_| ConfigError::MissingVar(ELMAHIO_LOG_ID_ENV))?;
        let log_id = Uuid::parse_str(log_id.trim())?;

        let mut options = ElmahIoExporterOptions::new(api_key, log_id);
        options.application = env_opt(ELMAHIO_APPLICATION_ENV);
        options.web_proxy = env_opt(ELMAHIO_PROXY_ENV).map(WebProxy::new);
        options.api_url = env_opt(ELMAHIO_API_URL_ENV);
        Ok(options)
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn web_proxy(mut self, proxy: WebProxy) -> Self {
        self.web_proxy = Some(proxy);
        self
    }

    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CreateMessage) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&CreateMessage, &ClientError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&CreateMessage) -> bool + Send + Sync + 'static,
    {
        self.on_filter = Some(Arc::new(f));
        self
    }

    pub(crate) fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }
}

impl fmt::Debug for ElmahIoExporterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElmahIoExporterOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("log_id", &self.log_id)
            .field("application", &self.application)
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_filter", &self.on_filter.is_some())
            .field("web_proxy", &self.web_proxy.as_ref().map(|p| &p.url))
            .field("api_url", &self.api_url())
            .finish()
    }
}
