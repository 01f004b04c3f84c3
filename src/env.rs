//! Environment variable names used by this crate for configuring the
//! exporter without code changes.
//!
//! These are purely helpers; the exporter itself never reads the
//! environment on its own.

use crate::record::Resource;
use serde_json::Value;

/// API key from the elmah.io UI.
pub const ELMAHIO_API_KEY_ENV: &str = "ELMAHIO_API_KEY";

/// Target log id (a GUID).
pub const ELMAHIO_LOG_ID_ENV: &str = "ELMAHIO_LOG_ID";

/// Optional application name stamped on every message.
pub const ELMAHIO_APPLICATION_ENV: &str = "ELMAHIO_APPLICATION";

/// Optional outbound proxy URL.
pub const ELMAHIO_PROXY_ENV: &str = "ELMAHIO_PROXY";

/// Optional API base URL, e.g. for a local test double.
pub const ELMAHIO_API_URL_ENV: &str = "ELMAHIO_API_URL";

/// Standard OpenTelemetry service name variable.
pub const OTEL_SERVICE_NAME_ENV: &str = "OTEL_SERVICE_NAME";

/// Standard OpenTelemetry resource attribute list, `k1=v1,k2=v2`.
pub const OTEL_RESOURCE_ATTRIBUTES_ENV: &str = "OTEL_RESOURCE_ATTRIBUTES";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating blank values as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an `OTEL_RESOURCE_ATTRIBUTES` style list. Malformed entries
/// (no `=`, empty key) are skipped.
pub fn parse_resource_attributes(raw: &str) -> Vec<(String, Value)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = urlencoding::decode(value.trim())
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.trim().to_string());
            Some((key.to_string(), Value::String(value)))
        })
        .collect()
}

impl Resource {
    /// Resource described by `OTEL_RESOURCE_ATTRIBUTES` and
    /// `OTEL_SERVICE_NAME`; the latter wins over a `service.name` entry in
    /// the list.
    pub fn from_env() -> Self {
        let mut attributes = env_opt(OTEL_RESOURCE_ATTRIBUTES_ENV)
            .map(|raw| parse_resource_attributes(&raw))
            .unwrap_or_default();

        if let Some(name) = env_opt(OTEL_SERVICE_NAME_ENV) {
            attributes.retain(|(k, _)| k != "service.name");
            attributes.push(("service.name".to_string(), Value::String(name)));
        }

        Resource { attributes }
    }
}
