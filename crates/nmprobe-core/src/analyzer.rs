//! Response classification and cross-response invariants.

use crate::protocol::{Command, Response, ResponseType};
use crate::scenario::{ScenarioResult, ScenarioStatus};
use std::collections::HashSet;
use tracing::debug;

/// Classifies decoded responses and evaluates scenario invariants.
pub struct ResponseAnalyzer;

impl ResponseAnalyzer {
    /// Build the result for a scenario whose output was collected.
    ///
    /// Responses are taken in stream order; no request/response pairing by
    /// position is assumed. Classification by `type`:
    /// - `availabilityResponse`: `payload.available` (default `false`) appended
    /// - `error`: `payload.message` (default empty) appended
    /// - `completionResponse`, `playgroundSessionStarted`, `sessionEnded`: success
    /// - `streamChunk`, `streamEnd`: counted
    /// - anything else, including a missing tag: recorded as unknown
    ///
    /// Availability is consistent iff at most one distinct value was seen.
    /// Status is `success` without error responses, `partial` otherwise.
    pub fn analyze(
        scenario_name: &str,
        commands: &[Command],
        responses: &[Response],
    ) -> ScenarioResult {
        let mut result = ScenarioResult::empty(scenario_name, commands.len());
        result.responses_received = responses.len();

        for (i, response) in responses.iter().enumerate() {
            debug!(
                index = i + 1,
                request_id = response.request_id_or_na(),
                kind = %response.kind,
                "response"
            );

            match &response.kind {
                ResponseType::AvailabilityResponse => {
                    result.availability.push(response.available());
                }
                ResponseType::Error => {
                    result.errors.push(response.error_message().to_string());
                }
                kind if kind.is_success() => {
                    result.successes.push(kind.tag().to_string());
                }
                ResponseType::StreamChunk => result.stream_chunks += 1,
                ResponseType::StreamEnd => result.stream_ends += 1,
                other => result.unknown_types.push(other.tag().to_string()),
            }
        }

        result.availability_consistent = result.distinct_availability().len() <= 1;
        result.unanswered_requests = unanswered(commands, responses);
        result.status = if result.errors.is_empty() {
            ScenarioStatus::Success
        } else {
            ScenarioStatus::Partial
        };
        result
    }
}

/// Request ids, in send order, that no response echoed.
fn unanswered(commands: &[Command], responses: &[Response]) -> Vec<String> {
    let echoed: HashSet<&str> = responses
        .iter()
        .filter_map(|r| r.request_id.as_deref())
        .collect();

    let mut seen = HashSet::new();
    commands
        .iter()
        .map(|c| c.request_id.as_str())
        .filter(|id| !echoed.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect()
}
