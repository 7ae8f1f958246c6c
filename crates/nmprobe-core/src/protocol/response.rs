//! Responses decoded from the host's output stream.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Placeholder shown for messages the host emitted without a `requestId`.
pub const MISSING_REQUEST_ID: &str = "N/A";

/// Response type tag.
///
/// Unrecognised tags are kept verbatim; a frame with no tag at all maps to
/// `Unknown(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseType {
    AvailabilityResponse,
    CompletionResponse,
    StreamChunk,
    StreamEnd,
    PlaygroundSessionStarted,
    SessionEnded,
    Error,
    Unknown(Option<String>),
}

impl ResponseType {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("availabilityResponse") => ResponseType::AvailabilityResponse,
            Some("completionResponse") => ResponseType::CompletionResponse,
            Some("streamChunk") => ResponseType::StreamChunk,
            Some("streamEnd") => ResponseType::StreamEnd,
            Some("playgroundSessionStarted") => ResponseType::PlaygroundSessionStarted,
            Some("sessionEnded") => ResponseType::SessionEnded,
            Some("error") => ResponseType::Error,
            other => ResponseType::Unknown(other.map(str::to_string)),
        }
    }

    /// Wire tag, or `"unknown"` when the frame carried none.
    pub fn tag(&self) -> &str {
        match self {
            ResponseType::AvailabilityResponse => "availabilityResponse",
            ResponseType::CompletionResponse => "completionResponse",
            ResponseType::StreamChunk => "streamChunk",
            ResponseType::StreamEnd => "streamEnd",
            ResponseType::PlaygroundSessionStarted => "playgroundSessionStarted",
            ResponseType::SessionEnded => "sessionEnded",
            ResponseType::Error => "error",
            ResponseType::Unknown(Some(tag)) => tag,
            ResponseType::Unknown(None) => "unknown",
        }
    }

    /// Tags that count as a successful outcome of a command.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResponseType::CompletionResponse
                | ResponseType::PlaygroundSessionStarted
                | ResponseType::SessionEnded
        )
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for ResponseType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// One decoded message. Only the decoder builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Echoed request id, absent for unsolicited messages.
    pub request_id: Option<String>,

    /// Classified `type` tag.
    #[serde(rename = "type")]
    pub kind: ResponseType,

    /// `payload` object; empty when missing or not an object.
    pub payload: Map<String, Value>,

    /// The whole frame body as decoded.
    #[serde(skip)]
    pub raw: Value,
}

impl Response {
    /// Interpret a decoded frame body. Returns `None` unless it is a JSON object.
    pub fn from_value(raw: Value) -> Option<Self> {
        let object = raw.as_object()?;

        let request_id = object
            .get("requestId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let kind = ResponseType::from_tag(object.get("type").and_then(Value::as_str));
        let payload = object
            .get("payload")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Some(Self {
            request_id,
            kind,
            payload,
            raw,
        })
    }

    /// Request id for display, `"N/A"` when absent.
    pub fn request_id_or_na(&self) -> &str {
        self.request_id.as_deref().unwrap_or(MISSING_REQUEST_ID)
    }

    /// `payload.available`, defaulting to `false`.
    pub fn available(&self) -> bool {
        self.payload
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// `payload.message`, defaulting to the empty string.
    pub fn error_message(&self) -> &str {
        self.str_field("message").unwrap_or_default()
    }

    /// `payload.code` on error responses.
    pub fn error_code(&self) -> Option<&str> {
        self.str_field("code")
    }

    /// `payload.response` on completion responses.
    pub fn completion_text(&self) -> Option<&str> {
        self.str_field("response")
    }

    /// `payload.token` on stream chunks.
    pub fn token(&self) -> Option<&str> {
        self.str_field("token")
    }

    pub fn session_id(&self) -> Option<&str> {
        self.str_field("sessionId")
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}
