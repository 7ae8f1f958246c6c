//! Per-command payload checks.
//!
//! These sit above the codec: the codec transports payloads untouched, and the
//! runner only reports issues (a malformed payload is a legitimate probe).

use super::command::{Command, CommandKind};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A single payload shape problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadIssue {
    pub request_id: String,
    pub command: CommandKind,
    pub field: String,
    pub problem: String,
}

impl fmt::Display for PayloadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: payload.{} {}",
            self.request_id, self.command, self.field, self.problem
        )
    }
}

#[derive(Clone, Copy)]
enum FieldShape {
    String,
    Number,
    NonNegativeInteger,
}

impl FieldShape {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldShape::String => value.is_string(),
            FieldShape::Number => value.is_number(),
            FieldShape::NonNegativeInteger => value.is_u64(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldShape::String => "must be a string",
            FieldShape::Number => "must be a number",
            FieldShape::NonNegativeInteger => "must be a non-negative integer",
        }
    }
}

/// (field, shape, required)
type FieldRule = (&'static str, FieldShape, bool);

const GENERATION_RULES: &[FieldRule] = &[
    ("prompt", FieldShape::String, true),
    ("temperature", FieldShape::Number, false),
    ("maximumResponseTokens", FieldShape::NonNegativeInteger, false),
];

const PLAYGROUND_MESSAGE_RULES: &[FieldRule] = &[
    ("sessionId", FieldShape::String, true),
    ("prompt", FieldShape::String, true),
    ("temperature", FieldShape::Number, false),
    ("maximumResponseTokens", FieldShape::NonNegativeInteger, false),
];

const END_SESSION_RULES: &[FieldRule] = &[("sessionId", FieldShape::String, true)];

fn rules_for(kind: CommandKind) -> &'static [FieldRule] {
    match kind {
        CommandKind::CheckAvailability | CommandKind::StartPlaygroundSession => &[],
        CommandKind::GetCompletion | CommandKind::GetCompletionStream => GENERATION_RULES,
        CommandKind::SendPlaygroundMessage => PLAYGROUND_MESSAGE_RULES,
        CommandKind::EndPlaygroundSession => END_SESSION_RULES,
    }
}

/// Check a command's payload against the shape its host handler expects.
pub fn validate(command: &Command) -> Vec<PayloadIssue> {
    let issue = |field: &str, problem: &str| PayloadIssue {
        request_id: command.request_id.clone(),
        command: command.command,
        field: field.to_string(),
        problem: problem.to_string(),
    };

    let mut issues = Vec::new();
    for &(field, shape, required) in rules_for(command.command) {
        match command.payload.as_ref().and_then(|p| p.get(field)) {
            Some(value) if !shape.accepts(value) => issues.push(issue(field, shape.describe())),
            Some(_) => {}
            None if required => issues.push(issue(field, "is required")),
            None => {}
        }
    }
    issues
}
