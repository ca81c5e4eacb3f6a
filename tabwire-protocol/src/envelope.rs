//! The agent channel envelope and correlation ids

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::kinds;

/// Process-unique token pairing a request with the agent's reply
///
/// Rendered on the wire as a decimal string (`"request_id": "7"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Errors raised while decoding or encoding agent frames
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One frame on the agent channel
///
/// Envelopes are values: the builder methods consume and return a new
/// envelope, and nothing mutates one after it has been handed to a sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_request_id"
    )]
    request_id: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

/// Agents have been seen echoing the id as a number; accept both forms.
fn deserialize_request_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl Envelope {
    /// Create an envelope of the given type with an empty payload
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            request_id: None,
            payload: Map::new(),
        }
    }

    /// Add a payload field. The envelope fields `type` and `request_id`
    /// are reserved and silently kept out of the payload.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" && key != "request_id" {
            self.payload.insert(key, value.into());
        }
        self
    }

    /// Tag the envelope with a correlation id
    pub fn with_request_id(mut self, id: CorrelationId) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    /// The `type` discriminator
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The raw `request_id`, as it appeared on the wire
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The `request_id` as a correlation id, if it is one the bridge could have issued
    ///
    /// Only the canonical decimal form matches; `"+7"` or `"007"` never name id 7.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        let raw = self.request_id.as_deref()?;
        raw.parse::<CorrelationId>()
            .ok()
            .filter(|id| id.to_string() == raw)
    }

    /// Everything except `type` and `request_id`
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Look up one payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Shorthand for the `data` field agents put their results in
    pub fn data(&self) -> Option<&Value> {
        self.get("data")
    }

    /// Decode a text frame
    pub fn from_text(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text).map_err(EnvelopeError::InvalidJson)?;
        if !value.is_object() {
            return Err(EnvelopeError::NotAnObject);
        }
        if !value.get("type").is_some_and(Value::is_string) {
            return Err(EnvelopeError::MissingType);
        }
        serde_json::from_value(value).map_err(EnvelopeError::InvalidJson)
    }

    /// Encode as a text frame
    pub fn to_text(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    // ==================== Handshake frames ====================

    /// First frame the bridge sends on a fresh connection
    pub fn server_ready() -> Self {
        Self::new(kinds::SERVER_READY).with_field("message", "MCP WebSocket Bridge Ready")
    }

    /// Reply to the agent's `chrome_extension_connected`
    pub fn connection_confirmed() -> Self {
        Self::new(kinds::CONNECTION_CONFIRMED)
            .with_field("message", "MCP Bridge connected successfully")
    }

    /// Reply to the agent's `test` message
    pub fn test_response() -> Self {
        Self::new(kinds::TEST_RESPONSE).with_field("message", "Test successful")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_correlation_id_display_and_parse() {
        let id = CorrelationId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<CorrelationId>().unwrap(), id);
        assert!("abc".parse::<CorrelationId>().is_err());
    }

    #[test]
    fn test_request_frame_layout() {
        let env = Envelope::new(kinds::GET_ELEMENT_STYLES)
            .with_field("selector", ".btn")
            .with_request_id(CorrelationId::new(3));

        let value: Value = serde_json::from_str(&env.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "get_element_styles", "request_id": "3", "selector": ".btn"})
        );
    }

    #[test]
    fn test_notification_has_no_request_id() {
        let text = Envelope::server_ready().to_text().unwrap();
        assert!(!text.contains("request_id"));
        assert!(text.contains("server_ready"));
    }

    #[test]
    fn test_decode_reply() {
        let env = Envelope::from_text(r#"{"type":"reply","request_id":"7","data":{"url":"https://x"}}"#)
            .unwrap();
        assert_eq!(env.kind(), "reply");
        assert_eq!(env.request_id(), Some("7"));
        assert_eq!(env.correlation_id(), Some(CorrelationId::new(7)));
        assert_eq!(env.data(), Some(&json!({"url": "https://x"})));
        assert!(env.get("request_id").is_none());
    }

    #[test]
    fn test_loosely_formatted_request_id_does_not_match() {
        for raw in ["+7", "007", " 7 ", "7 "] {
            let text = format!(r#"{{"type":"page_info","request_id":"{}"}}"#, raw);
            let env = Envelope::from_text(&text).unwrap();
            assert_eq!(env.request_id(), Some(raw));
            assert_eq!(env.correlation_id(), None, "request_id {:?} matched", raw);
        }
    }

    #[test]
    fn test_decode_numeric_request_id() {
        let env = Envelope::from_text(r#"{"type":"page_info","request_id":12}"#).unwrap();
        assert_eq!(env.correlation_id(), Some(CorrelationId::new(12)));
    }

    #[test]
    fn test_decode_foreign_request_id() {
        let env = Envelope::from_text(r#"{"type":"page_info","request_id":"tab-5"}"#).unwrap();
        assert_eq!(env.request_id(), Some("tab-5"));
        assert_eq!(env.correlation_id(), None);
    }

    #[test]
    fn test_decode_null_request_id() {
        let env = Envelope::from_text(r#"{"type":"tab_updated","request_id":null}"#).unwrap();
        assert_eq!(env.request_id(), None);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(matches!(
            Envelope::from_text("{not json"),
            Err(EnvelopeError::InvalidJson(_))
        ));
        assert!(matches!(
            Envelope::from_text("[1,2]"),
            Err(EnvelopeError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::from_text(r#"{"data":1}"#),
            Err(EnvelopeError::MissingType)
        ));
        assert!(matches!(
            Envelope::from_text(r#"{"type":5}"#),
            Err(EnvelopeError::MissingType)
        ));
    }

    #[test]
    fn test_reserved_fields_stay_out_of_payload() {
        let env = Envelope::new("x")
            .with_field("type", "y")
            .with_field("request_id", "9")
            .with_field("css", "body{}");
        assert_eq!(env.kind(), "x");
        assert_eq!(env.request_id(), None);
        assert_eq!(env.payload().len(), 1);
    }

    #[test]
    fn test_handshake_frames() {
        assert_eq!(Envelope::server_ready().kind(), kinds::SERVER_READY);
        assert_eq!(Envelope::connection_confirmed().kind(), kinds::CONNECTION_CONFIRMED);
        assert_eq!(
            Envelope::test_response().get("message"),
            Some(&json!("Test successful"))
        );
    }
}
