use crate::client::{ClientFactory, ClientOptions, FailureHandler, MessagesClient};
use crate::error::ClientError;
use crate::message::CreateMessage;
use reqwest::Client;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::instrument::WithSubscriber;
use tracing::subscriber::NoSubscriber;
use uuid::Uuid;

/// [`MessagesClient`] talking to the elmah.io v3 HTTP API.
///
/// Each submission is spawned onto the tokio runtime that was current when
/// the client was built, so `create_and_notify` never blocks the caller.
/// The request runs under a [`NoSubscriber`], so whatever the HTTP stack logs
/// while sending is never fed back into the exporter.
#[derive(Clone)]
pub struct HttpMessagesClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    runtime: Handle,
    on_message_fail: Option<FailureHandler>,
}

impl HttpMessagesClient {
    /// Build a client from [`ClientOptions`].
    ///
    /// **Returns**
    /// - `Err(ClientError::NoRuntime)` when called outside a tokio runtime.
    /// - `Err(ClientError::Proxy)` when the proxy URL cannot be parsed.
    ///
    /// The API key and log id are only checked when a message is sent.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let mut builder = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent);

        if let Some(web_proxy) = &options.web_proxy {
            let mut proxy =
                reqwest::Proxy::all(web_proxy.url.as_str()).map_err(|e| ClientError::Proxy(e.to_string()))?;
            if let (Some(user), Some(password)) = (&web_proxy.username, &web_proxy.password) {
                proxy = proxy.basic_auth(user, password);
            }
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: options.api_key,
            base_url: options.api_url,
            runtime,
            on_message_fail: options.on_message_fail,
        })
    }

    fn endpoint(&self, log_id: Uuid, api_key: &str) -> String {
        format!(
            "{}/v3/messages/{}?api_key={}",
            self.base_url.trim_end_matches('/'),
            log_id,
            urlencoding::encode(api_key)
        )
    }

    async fn send(&self, log_id: Uuid, message: &CreateMessage) -> Result<(), ClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ClientError::MissingApiKey)?;
        if log_id.is_nil() {
            return Err(ClientError::MissingLogId);
        }

        let resp = self.client.post(self.endpoint(log_id, api_key)).json(message).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(ClientError::Status { status, body })
        }
    }
}

impl MessagesClient for HttpMessagesClient {
    fn create_and_notify(&self, log_id: Uuid, message: CreateMessage) {
        let this = self.clone();
        let submission = async move {
            let result = this.send(log_id, &message).await;
            (this, message, result)
        };
        self.runtime.spawn(async move {
            let (this, message, result) = submission.with_subscriber(NoSubscriber::default()).await;
            if let Err(err) = result {
                tracing::debug!(error = %err, %log_id, "elmah.io submission failed");
                if let Some(on_fail) = &this.on_message_fail {
                    on_fail(&message, &err);
                }
            }
        });
    }
}

/// Default [`ClientFactory`] producing [`HttpMessagesClient`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn create(&self, options: ClientOptions) -> Result<Arc<dyn MessagesClient>, ClientError> {
        let client = HttpMessagesClient::new(options)?;
        Ok(Arc::new(client) as Arc<dyn MessagesClient>)
    }
}
