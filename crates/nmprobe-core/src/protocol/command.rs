//! Commands sent to the host under test.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque command payload. The codec transports it untouched.
pub type Payload = Map<String, Value>;

/// Closed vocabulary of command tags understood by the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    CheckAvailability,
    GetCompletion,
    GetCompletionStream,
    StartPlaygroundSession,
    SendPlaygroundMessage,
    EndPlaygroundSession,
}

impl CommandKind {
    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::CheckAvailability => "checkAvailability",
            CommandKind::GetCompletion => "getCompletion",
            CommandKind::GetCompletionStream => "getCompletionStream",
            CommandKind::StartPlaygroundSession => "startPlaygroundSession",
            CommandKind::SendPlaygroundMessage => "sendPlaygroundMessage",
            CommandKind::EndPlaygroundSession => "endPlaygroundSession",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request. Immutable once built; the builder methods consume `self`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Caller-assigned id, echoed back by the host.
    pub request_id: String,

    /// Command tag.
    pub command: CommandKind,

    /// Command-specific payload, omitted from the wire when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Command {
    /// Create a command without payload.
    pub fn new(request_id: impl Into<String>, command: CommandKind) -> Self {
        Self {
            request_id: request_id.into(),
            command,
            payload: None,
        }
    }

    /// Attach a payload. Non-object values are wrapped under `"value"`.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        });
        self
    }

    pub fn check_availability(request_id: impl Into<String>) -> Self {
        Self::new(request_id, CommandKind::CheckAvailability)
    }

    pub fn get_completion(request_id: impl Into<String>, prompt: &str, temperature: f64) -> Self {
        Self::new(request_id, CommandKind::GetCompletion).with_payload(serde_json::json!({
            "prompt": prompt,
            "temperature": temperature,
        }))
    }

    pub fn get_completion_stream(
        request_id: impl Into<String>,
        prompt: &str,
        temperature: f64,
    ) -> Self {
        Self::new(request_id, CommandKind::GetCompletionStream).with_payload(serde_json::json!({
            "prompt": prompt,
            "temperature": temperature,
        }))
    }

    pub fn start_playground_session(request_id: impl Into<String>) -> Self {
        Self::new(request_id, CommandKind::StartPlaygroundSession)
    }

    pub fn send_playground_message(
        request_id: impl Into<String>,
        session_id: &str,
        prompt: &str,
    ) -> Self {
        Self::new(request_id, CommandKind::SendPlaygroundMessage).with_payload(serde_json::json!({
            "sessionId": session_id,
            "prompt": prompt,
        }))
    }

    pub fn end_playground_session(request_id: impl Into<String>, session_id: &str) -> Self {
        Self::new(request_id, CommandKind::EndPlaygroundSession).with_payload(serde_json::json!({
            "sessionId": session_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_kind_wire_names_match_serde() {
        for kind in [
            CommandKind::CheckAvailability,
            CommandKind::GetCompletion,
            CommandKind::GetCompletionStream,
            CommandKind::StartPlaygroundSession,
            CommandKind::SendPlaygroundMessage,
            CommandKind::EndPlaygroundSession,
        ] {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_command_without_payload_omits_field() {
        let cmd = Command::check_availability("001");
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value, json!({"requestId": "001", "command": "checkAvailability"}));
    }

    #[test]
    fn test_command_with_payload() {
        let cmd = Command::get_completion("002", "Say hello", 0.7);
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["command"], "getCompletion");
        assert_eq!(value["payload"]["prompt"], "Say hello");
        assert_eq!(value["payload"]["temperature"], 0.7);
    }

    #[test]
    fn test_with_payload_wraps_scalars() {
        let cmd = Command::new("x", CommandKind::GetCompletion).with_payload(json!(42));
        assert_eq!(cmd.payload.unwrap()["value"], json!(42));
    }

    #[test]
    fn test_unknown_command_tag_rejected() {
        let parsed: Result<Command, _> =
            serde_json::from_value(json!({"requestId": "1", "command": "launchRockets"}));
        assert!(parsed.is_err());
    }
}
