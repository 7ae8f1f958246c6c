//! Built-in reference scenarios.

use crate::protocol::{Command, CommandKind};
use crate::error::Result;
use crate::scenario::{Scenario, ScenarioSuite};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

/// Collection bound used by every built-in scenario.
pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(5);

/// The four reference scenarios. Each brackets or repeats `checkAvailability`
/// so the availability answer can be checked for stability.
pub fn default_suite() -> ScenarioSuite {
    let scenarios = vec![
        Scenario::new(
            "Basic Availability Check",
            vec![
                Command::check_availability("001"),
                Command::check_availability("002"),
            ],
        ),
        Scenario::new(
            "Simple Completion Test",
            vec![
                Command::check_availability("001"),
                Command::get_completion("002", "Say hello", 0.7),
                Command::check_availability("003"),
            ],
        ),
        Scenario::new(
            "Streaming Test",
            vec![
                Command::check_availability("001"),
                Command::get_completion_stream("002", "Count 1 to 3", 0.5),
            ],
        ),
        Scenario::new(
            "Playground Session Basic Test",
            vec![
                Command::check_availability("001"),
                Command::start_playground_session("002"),
                Command::check_availability("003"),
            ],
        ),
    ];

    ScenarioSuite {
        scenarios: scenarios
            .into_iter()
            .map(|s| s.with_timeout(DEFAULT_SCENARIO_TIMEOUT))
            .collect(),
    }
}

/// Availability, completion, stream, availability: the full-feature smoke run.
pub fn smoke_scenario() -> Scenario {
    Scenario::new(
        "Complete Functionality",
        vec![
            Command::check_availability("001"),
            Command::new("002", CommandKind::GetCompletion).with_payload(json!({
                "prompt": "Say hello",
                "temperature": 0.8,
                "maximumResponseTokens": 50
            })),
            Command::get_completion_stream("003", "Count to 3", 0.5),
            Command::check_availability("004"),
        ],
    )
    .with_timeout(DEFAULT_SCENARIO_TIMEOUT)
}

/// Suite from `path`, or the built-in suite when no path is given.
pub fn load_suite(path: Option<&Path>) -> Result<ScenarioSuite> {
    match path {
        Some(path) => Ok(ScenarioSuite::from_file(path)?),
        None => Ok(default_suite()),
    }
}

/// Single availability probe used when comparing binaries.
pub fn availability_probe() -> Scenario {
    Scenario::new("Availability Probe", vec![Command::check_availability("test")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarnessError, SuiteError};
    use crate::protocol::schema;

    #[test]
    fn test_load_suite_defaults_without_path() {
        assert_eq!(load_suite(None).unwrap(), default_suite());
    }

    #[test]
    fn test_load_suite_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        std::fs::write(
            &path,
            r#"{"scenarios": [{"name": "Only", "commands": [{"requestId": "1", "command": "checkAvailability"}]}]}"#,
        )
        .unwrap();

        let suite = load_suite(Some(&path)).unwrap();
        assert_eq!(suite.scenarios.len(), 1);
        assert_eq!(suite.scenarios[0].name, "Only");
    }

    #[test]
    fn test_load_suite_missing_file_is_suite_error() {
        let err = load_suite(Some(Path::new("/nonexistent/suite.json"))).unwrap_err();
        assert!(matches!(err, HarnessError::Suite(SuiteError::Io { .. })));
        assert!(err.to_string().contains("/nonexistent/suite.json"));
    }

    #[test]
    fn test_default_suite_shape() {
        let suite = default_suite();
        let names: Vec<_> = suite.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Basic Availability Check",
                "Simple Completion Test",
                "Streaming Test",
                "Playground Session Basic Test"
            ]
        );
        assert!(suite
            .scenarios
            .iter()
            .all(|s| s.timeout_ms == Some(5_000)));
    }

    #[test]
    fn test_builtin_payloads_are_well_formed() {
        let mut scenarios = default_suite().scenarios;
        scenarios.push(smoke_scenario());
        scenarios.push(availability_probe());
        for scenario in &scenarios {
            for command in &scenario.commands {
                assert!(schema::validate(command).is_empty(), "{}", scenario.name);
            }
        }
    }

    #[test]
    fn test_default_suite_survives_json_roundtrip() {
        let suite = default_suite();
        let json = serde_json::to_string(&suite).unwrap();
        assert_eq!(ScenarioSuite::from_json_str(&json).unwrap(), suite);
    }
}
