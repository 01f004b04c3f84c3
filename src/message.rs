use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Severity values understood by the elmah.io API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Verbose => "Verbose",
            Severity::Debug => "Debug",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value pair used by every collection on [`CreateMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub key: String,
    pub value: String,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Item { key: key.into(), value: value.into() }
    }
}

/// Payload of a single `POST /v3/messages/{logId}` request.
///
/// Built fresh for every exported record; `OnMessage` callbacks receive it
/// mutably right before submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    pub date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_template: Option<String>,
    pub data: Vec<Item>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub server_variables: Vec<Item>,
    pub cookies: Vec<Item>,
    pub form: Vec<Item>,
    pub query_string: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl CreateMessage {
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        CreateMessage {
            date_time: None,
            detail: None,
            type_name: None,
            title: title.into(),
            title_template: None,
            data: Vec::new(),
            severity,
            source: None,
            category: None,
            server_variables: Vec::new(),
            cookies: Vec::new(),
            form: Vec::new(),
            query_string: Vec::new(),
            status_code: None,
            application: None,
            hostname: None,
            user: None,
            method: None,
            version: None,
            url: None,
            correlation_id: None,
        }
    }

    /// First `data` value stored under `key`, if any.
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.iter().find(|item| item.key == key).map(|item| item.value.as_str())
    }
}
