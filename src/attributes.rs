//! Routing of record attributes onto [`CreateMessage`] fields.
//!
//! elmah.io reserves a fixed set of property names for first-class message
//! fields. The table below is checked top to bottom and the first entry
//! whose name matches and whose value has an acceptable shape wins. Every
//! other attribute lands in `CreateMessage::data`.

use crate::message::{CreateMessage, Item};
use serde_json::Value;

/// Attribute that carries the unformatted message template.
pub const ORIGINAL_FORMAT_KEY: &str = "{OriginalFormat}";

/// Message field a reserved attribute is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserved {
    TitleTemplate,
    StatusCode,
    Application,
    Source,
    Hostname,
    User,
    Method,
    Version,
    Url,
    Type,
    CorrelationId,
    Category,
    RemoteAddr,
    UserAgent,
    ServerVariables,
    Cookies,
    Form,
    QueryString,
}

/// Recognizers in priority order.
pub const RECOGNIZERS: &[(&str, Reserved)] = &[
    (ORIGINAL_FORMAT_KEY, Reserved::TitleTemplate),
    ("statuscode", Reserved::StatusCode),
    ("application", Reserved::Application),
    ("source", Reserved::Source),
    ("hostname", Reserved::Hostname),
    ("user", Reserved::User),
    ("method", Reserved::Method),
    ("version", Reserved::Version),
    ("url", Reserved::Url),
    ("type", Reserved::Type),
    ("correlationid", Reserved::CorrelationId),
    ("category", Reserved::Category),
    ("remoteaddr", Reserved::RemoteAddr),
    ("useragent", Reserved::UserAgent),
    ("servervariables", Reserved::ServerVariables),
    ("cookies", Reserved::Cookies),
    ("form", Reserved::Form),
    ("querystring", Reserved::QueryString),
];

impl Reserved {
    fn matches_key(self, name: &str, key: &str) -> bool {
        match self {
            // The template key comes from the logging pipeline itself, not
            // from users, and is matched verbatim.
            Reserved::TitleTemplate => key == name,
            _ => key.eq_ignore_ascii_case(name),
        }
    }

    /// Store `value` on `msg`. Returns `false` when the value does not have
    /// the shape this field needs, leaving `msg` untouched.
    fn apply(self, msg: &mut CreateMessage, value: &Value) -> bool {
        match self {
            Reserved::TitleTemplate => match value {
                Value::String(template) => {
                    msg.title_template = Some(template.clone());
                    true
                }
                _ => false,
            },
            Reserved::StatusCode => match status_code(value) {
                Some(code) => {
                    msg.status_code = Some(code);
                    true
                }
                None => false,
            },
            Reserved::Application => set_scalar(&mut msg.application, value),
            Reserved::Source => set_scalar(&mut msg.source, value),
            Reserved::Hostname => set_scalar(&mut msg.hostname, value),
            Reserved::User => set_scalar(&mut msg.user, value),
            Reserved::Method => set_scalar(&mut msg.method, value),
            Reserved::Version => set_scalar(&mut msg.version, value),
            Reserved::Url => set_scalar(&mut msg.url, value),
            Reserved::Type => set_scalar(&mut msg.type_name, value),
            Reserved::CorrelationId => set_scalar(&mut msg.correlation_id, value),
            Reserved::Category => set_scalar(&mut msg.category, value),
            Reserved::RemoteAddr => push_server_variable(msg, "Client-IP", value),
            Reserved::UserAgent => push_server_variable(msg, "User-Agent", value),
            Reserved::ServerVariables => match items(value) {
                Some(items) => {
                    msg.server_variables.extend(items);
                    true
                }
                None => false,
            },
            Reserved::Cookies => replace_items(&mut msg.cookies, value),
            Reserved::Form => replace_items(&mut msg.form, value),
            Reserved::QueryString => replace_items(&mut msg.query_string, value),
        }
    }
}

/// Route one attribute. Returns the reserved field that consumed it, or
/// `None` if it was appended to `data`.
pub fn route_attribute(msg: &mut CreateMessage, key: &str, value: &Value) -> Option<Reserved> {
    for &(name, reserved) in RECOGNIZERS {
        if reserved.matches_key(name, key) && reserved.apply(msg, value) {
            return Some(reserved);
        }
    }
    msg.data.push(Item::new(key, stringify(value)));
    None
}

/// Plain-text form of an attribute value. Strings are not quoted, `null`
/// becomes the empty string, everything else is rendered as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `key=value` listing used as a title when a record has no message.
pub fn render_attributes(attributes: &[(String, Value)]) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!("{}={}", key, stringify(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn set_scalar(field: &mut Option<String>, value: &Value) -> bool {
    match scalar(value) {
        Some(s) => {
            *field = Some(s);
            true
        }
        None => false,
    }
}

fn push_server_variable(msg: &mut CreateMessage, name: &str, value: &Value) -> bool {
    match scalar(value) {
        Some(s) => {
            msg.server_variables.push(Item::new(name, s));
            true
        }
        None => false,
    }
}

fn replace_items(field: &mut Vec<Item>, value: &Value) -> bool {
    match items(value) {
        Some(items) => {
            *field = items;
            true
        }
        None => false,
    }
}

fn status_code(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret a value as a key/value collection.
///
/// Accepts an object, an array of `{"key": .., "value": ..}` objects or of
/// `[key, value]` pairs, or a string holding one of those as JSON (which is
/// how collections arrive through `tracing` fields).
fn items(value: &Value) -> Option<Vec<Item>> {
    match value {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => structured_items(&parsed),
            _ => None,
        },
        other => structured_items(other),
    }
}

fn structured_items(value: &Value) -> Option<Vec<Item>> {
    match value {
        Value::Object(map) => Some(map.iter().map(|(k, v)| Item::new(k.as_str(), stringify(v))).collect()),
        Value::Array(entries) => entries.iter().map(entry_item).collect(),
        _ => None,
    }
}

fn entry_item(entry: &Value) -> Option<Item> {
    match entry {
        Value::Object(map) => {
            let field = |name: &str| {
                map.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            };
            let key = field("key")?.as_str()?;
            let value = field("value").map(stringify).unwrap_or_default();
            Some(Item::new(key, value))
        }
        Value::Array(pair) if pair.len() == 2 => {
            let key = pair[0].as_str()?;
            Some(Item::new(key, stringify(&pair[1])))
        }
        _ => None,
    }
}
