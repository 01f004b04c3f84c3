/// Errors raised while constructing or using a messages client.
///
/// Apart from [`ClientError::NoRuntime`] and [`ClientError::Proxy`], which
/// can only happen while the client is being built, these are reported
/// through the exporter's `on_error` callback and never returned from
/// `export`.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("no log id configured")]
    MissingLogId,

    #[error("no tokio runtime available to drive submissions")]
    NoRuntime,

    #[error("invalid proxy configuration: {0}")]
    Proxy(String),

    #[cfg(feature = "http")]
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("elmah.io responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("exporter was given a ready client; nothing to build")]
    ClientProvided,
}

/// Error returned when reading exporter settings from the environment.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("invalid log id: {0}")]
    InvalidLogId(#[from] uuid::Error),
}

/// Error returned by the `init_*` helpers.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("the logging layer must be installed from within a tokio runtime")]
    NoRuntime,

    #[error("a global tracing subscriber is already installed")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
