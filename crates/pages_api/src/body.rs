//! Request and response envelopes plus body field extraction.

use pages_core::{LinkOrderUpdate, PagesServiceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Incoming request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: Value,
}

impl ApiRequest {
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
            body,
        }
    }
}

/// Outgoing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub content: String,
}

impl ApiResponse {
    pub fn json(content: String) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_JSON.to_string(),
            content,
        }
    }

    pub fn text(status: u16, content: impl Into<String>) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT.to_string(),
            content: content.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses JSON content; text responses yield `Value::Null`.
    pub fn content_value(&self) -> Value {
        if self.content_type != CONTENT_TYPE_JSON {
            return Value::Null;
        }
        serde_json::from_str(&self.content).unwrap_or(Value::Null)
    }
}

/// Request handling failures.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or ill-typed body field.
    BadRequest(String),
    Service(PagesServiceError),
    Encode(serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Service(PagesServiceError::InvalidName)
            | Self::Service(PagesServiceError::InvalidExternalId)
            | Self::Service(PagesServiceError::NotUserManaged(_)) => 400,
            Self::Service(_) | Self::Encode(_) => 500,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "response encoding failed: {err}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BadRequest(_) => None,
            Self::Service(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<PagesServiceError> for ApiError {
    fn from(value: PagesServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Reads an optional row id. Accepts integers and integer strings;
/// `null` and absent fields yield `None`.
pub fn optional_id(body: &Value, key: &str) -> Result<Option<i64>, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_id(value)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("`{key}` must be an integer id"))),
    }
}

/// Like [`optional_id`], but empty values (`0`, `""`, `false`) also count
/// as absent.
pub fn non_empty_id(body: &Value, key: &str) -> Result<Option<i64>, ApiError> {
    match body.get(key) {
        Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => Ok(None),
        _ => optional_id(body, key),
    }
}

pub fn required_id(body: &Value, key: &str) -> Result<i64, ApiError> {
    optional_id(body, key)?.ok_or_else(|| ApiError::BadRequest(format!("`{key}` is required")))
}

pub fn required_str<'a>(body: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    match body.get(key) {
        Some(Value::String(value)) => Ok(value),
        Some(Value::Null) | None => Err(ApiError::BadRequest(format!("`{key}` is required"))),
        Some(_) => Err(ApiError::BadRequest(format!("`{key}` must be a string"))),
    }
}

/// Reads an `{"<link id>": order, ...}` object.
pub fn link_order_updates(body: &Value) -> Result<Vec<LinkOrderUpdate>, ApiError> {
    let Some(entries) = body.as_object() else {
        return Err(ApiError::BadRequest(
            "body must map link ids to orders".to_string(),
        ));
    };

    entries
        .iter()
        .map(|(key, value)| {
            let link_id = key
                .trim()
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("`{key}` is not a link id")))?;
            let order = parse_id(value).ok_or_else(|| {
                ApiError::BadRequest(format!("order for link `{key}` must be an integer"))
            })?;
            Ok(LinkOrderUpdate { link_id, order })
        })
        .collect()
}

fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        link_order_updates, non_empty_id, optional_id, required_id, required_str, ApiError,
    };
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let body = json!({"item": 7, "other": " 12 ", "none": null});
        assert_eq!(optional_id(&body, "item").unwrap(), Some(7));
        assert_eq!(optional_id(&body, "other").unwrap(), Some(12));
        assert_eq!(optional_id(&body, "none").unwrap(), None);
        assert_eq!(optional_id(&body, "missing").unwrap(), None);
    }

    #[test]
    fn ids_reject_other_shapes() {
        let body = json!({"item": "seven", "flag": true, "float": 1.5});
        for key in ["item", "flag", "float"] {
            assert!(matches!(
                optional_id(&body, key),
                Err(ApiError::BadRequest(_))
            ));
        }
        assert!(matches!(
            required_id(&json!({}), "item"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_values_count_as_absent() {
        let body = json!({"zero": 0, "blank": "", "off": false, "item": 4});
        for key in ["zero", "blank", "off", "missing"] {
            assert_eq!(non_empty_id(&body, key).unwrap(), None, "{key}");
        }
        assert_eq!(non_empty_id(&body, "item").unwrap(), Some(4));
        assert!(non_empty_id(&json!({"item": true}), "item").is_err());
    }

    #[test]
    fn required_str_checks_type() {
        let body = json!({"name": "Home", "count": 3});
        assert_eq!(required_str(&body, "name").unwrap(), "Home");
        assert!(required_str(&body, "count").is_err());
        assert!(required_str(&body, "missing").is_err());
    }

    #[test]
    fn link_order_updates_parse_object_entries() {
        let mut updates = link_order_updates(&json!({"3": 1, "10": "0"})).unwrap();
        updates.sort_by_key(|update| update.link_id);
        let pairs: Vec<_> = updates
            .iter()
            .map(|update| (update.link_id, update.order))
            .collect();
        assert_eq!(pairs, vec![(3, 1), (10, 0)]);

        assert!(link_order_updates(&json!([1, 2])).is_err());
        assert!(link_order_updates(&json!({"x": 1})).is_err());
        assert!(link_order_updates(&json!({"1": null})).is_err());
    }
}
