//! Scenarios, suites and per-scenario results.

use crate::driver::ExitInfo;
use crate::error::SuiteError;
use crate::protocol::{Command, DecodeTruncation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// A named, ordered script of commands run against one host invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,

    /// Sent in this order, back to back.
    pub commands: Vec<Command>,

    /// Collection bound; the run-wide default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            name: name.into(),
            commands,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// This scenario's collection bound, or `fallback`.
    pub fn timeout_or(&self, fallback: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(fallback)
    }
}

/// A list of scenarios, as stored in a suite file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSuite {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSuite {
    /// Parse and validate a suite from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, SuiteError> {
        let suite: ScenarioSuite = serde_json::from_str(json)?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn from_file(path: &Path) -> Result<Self, SuiteError> {
        let text = std::fs::read_to_string(path).map_err(|source| SuiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<(), SuiteError> {
        if self.scenarios.is_empty() {
            return Err(SuiteError::Empty);
        }
        for scenario in &self.scenarios {
            if scenario.name.trim().is_empty() {
                return Err(SuiteError::Invalid("scenario name must not be empty".into()));
            }
            if scenario.commands.is_empty() {
                return Err(SuiteError::Invalid(format!(
                    "scenario '{}' has no commands",
                    scenario.name
                )));
            }
            if scenario.timeout_ms == Some(0) {
                return Err(SuiteError::Invalid(format!(
                    "scenario '{}' has a zero timeout",
                    scenario.name
                )));
            }
        }
        Ok(())
    }
}

/// Outcome class of a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// Output collected, no error responses.
    Success,
    /// Output collected, at least one error response.
    Partial,
    /// Host output not collected within the timeout.
    Timeout,
    /// Host could not be launched, or collection failed.
    Error,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Success => "success",
            ScenarioStatus::Partial => "partial",
            ScenarioStatus::Timeout => "timeout",
            ScenarioStatus::Error => "error",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything observed while running one scenario.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub name: String,
    pub status: ScenarioStatus,
    pub commands_sent: usize,
    pub responses_received: usize,

    /// `payload.available` of each availability response, in stream order.
    pub availability: Vec<bool>,

    /// At most one distinct availability value was observed.
    pub availability_consistent: bool,

    /// `payload.message` of each error response, in stream order.
    pub errors: Vec<String>,

    /// Tags of success responses, in stream order.
    pub successes: Vec<String>,

    pub stream_chunks: usize,
    pub stream_ends: usize,

    /// Tags that are neither errors, successes nor stream frames.
    pub unknown_types: Vec<String>,

    /// Request ids never echoed by any response. Informational.
    pub unanswered_requests: Vec<String>,

    pub stdout_bytes: usize,

    /// SHA-256 of the captured stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_digest: Option<String>,

    /// Host stderr, kept for inspection only.
    pub diagnostics: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<DecodeTruncation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitInfo>,

    /// Launch or timeout message for `timeout` / `error` results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl ScenarioResult {
    /// A result with no observations yet.
    pub fn empty(name: impl Into<String>, commands_sent: usize) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Success,
            commands_sent,
            responses_received: 0,
            availability: Vec::new(),
            availability_consistent: true,
            errors: Vec::new(),
            successes: Vec::new(),
            stream_chunks: 0,
            stream_ends: 0,
            unknown_types: Vec::new(),
            unanswered_requests: Vec::new(),
            stdout_bytes: 0,
            output_digest: None,
            diagnostics: String::new(),
            truncation: None,
            exit: None,
            failure: None,
            duration_ms: 0,
            started_at: Utc::now(),
        }
    }

    /// A `timeout` or `error` result with no response data.
    pub fn failed(
        name: impl Into<String>,
        commands_sent: usize,
        status: ScenarioStatus,
        failure: impl Into<String>,
    ) -> Self {
        let mut result = Self::empty(name, commands_sent);
        result.status = status;
        result.failure = Some(failure.into());
        result
    }

    pub fn succeeded(&self) -> bool {
        self.status == ScenarioStatus::Success
    }

    /// Distinct availability values, sorted.
    pub fn distinct_availability(&self) -> BTreeSet<bool> {
        self.availability.iter().copied().collect()
    }
}
