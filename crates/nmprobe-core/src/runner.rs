//! Scenario orchestration.
//!
//! Scenarios run strictly one after another, one host process each. A failure
//! inside a scenario (launch error, timeout) becomes that scenario's status
//! and never stops the run.

use crate::analyzer::ResponseAnalyzer;
use crate::config::HarnessConfig;
use crate::driver::{DriverTiming, ProcessDriver, SubprocessDriver};
use crate::error::DriverError;
use crate::protocol::{self, schema};
use crate::scenario::{Scenario, ScenarioResult, ScenarioStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Aggregated results of one run, in scenario order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub executable: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl RunReport {
    /// Every scenario finished with status `success`.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(ScenarioResult::succeeded)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    /// Availability answers across all scenarios, in run order.
    pub fn availability_values(&self) -> Vec<bool> {
        self.results
            .iter()
            .flat_map(|r| r.availability.iter().copied())
            .collect()
    }

    /// At most one distinct availability value across the whole run.
    pub fn availability_consistent(&self) -> bool {
        let distinct: HashSet<bool> = self.availability_values().into_iter().collect();
        distinct.len() <= 1
    }

    /// Error messages across all scenarios, first occurrence order, deduplicated.
    pub fn unique_errors(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.results
            .iter()
            .flat_map(|r| r.errors.iter())
            .filter(|e| seen.insert(e.as_str()))
            .cloned()
            .collect()
    }
}

/// Drives scenarios against one host executable.
pub struct ScenarioRunner {
    driver: Arc<dyn ProcessDriver>,
    executable: PathBuf,
    args: Vec<String>,
    config: HarnessConfig,
}

impl ScenarioRunner {
    /// Runner using real subprocesses.
    pub fn new(executable: impl Into<PathBuf>, config: HarnessConfig) -> Self {
        Self::with_driver(Arc::new(SubprocessDriver::new()), executable, config)
    }

    pub fn with_driver(
        driver: Arc<dyn ProcessDriver>,
        executable: impl Into<PathBuf>,
        config: HarnessConfig,
    ) -> Self {
        Self {
            driver,
            executable: executable.into(),
            args: Vec::new(),
            config,
        }
    }

    /// Arguments passed to the host on every launch (e.g. a caller origin).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario through the driver, codec and analyzer.
    ///
    /// Always yields a result: `timeout` when output was not collected in
    /// time, `error` when the host could not be launched, otherwise the
    /// analyzer's verdict over the decoded stdout.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let span = tracing::info_span!("nmprobe.scenario", scenario = %scenario.name);
        self.run_scenario_inner(scenario).instrument(span).await
    }

    async fn run_scenario_inner(&self, scenario: &Scenario) -> ScenarioResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let sent = scenario.commands.len();

        for issue in scenario.commands.iter().flat_map(schema::validate) {
            warn!(%issue, "payload does not match the command's expected shape");
        }

        let input = match protocol::encode_all(&scenario.commands) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode commands");
                return finish(
                    ScenarioResult::failed(&scenario.name, sent, ScenarioStatus::Error, e.to_string()),
                    started_at,
                    start,
                );
            }
        };

        let timing = DriverTiming {
            grace_period: self.config.grace_period(),
            collect_timeout: scenario.timeout_or(self.config.collect_timeout()),
            settle: self.config.settle,
        };

        info!(commands = sent, bytes = input.len(), driver = self.driver.name(), "sending commands");

        let output = match self.driver.run(&self.executable, &self.args, &input, &timing).await {
            Ok(output) => output,
            Err(e) => {
                let status = match e {
                    DriverError::Timeout { .. } => ScenarioStatus::Timeout,
                    DriverError::Launch { .. } | DriverError::Io(_) => ScenarioStatus::Error,
                };
                warn!(%status, error = %e, "scenario produced no output");
                return finish(
                    ScenarioResult::failed(&scenario.name, sent, status, e.to_string()),
                    started_at,
                    start,
                );
            }
        };

        let decoded = protocol::decode(&output.stdout);
        let mut result = ResponseAnalyzer::analyze(&scenario.name, &scenario.commands, &decoded.responses);
        result.stdout_bytes = output.stdout.len();
        result.output_digest = Some(output.stdout_digest());
        result.diagnostics = output.stderr_text();
        result.truncation = decoded.truncation;
        result.exit = Some(output.exit);

        info!(
            status = %result.status,
            responses = result.responses_received,
            availability_consistent = result.availability_consistent,
            errors = result.errors.len(),
            "scenario finished"
        );

        finish(result, started_at, start)
    }

    /// Run scenarios in order, one at a time, never short-circuiting.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(%run_id, scenarios = scenarios.len(), executable = %self.executable.display(), "starting run");

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run_scenario(scenario).await);
        }

        let report = RunReport {
            run_id,
            executable: self.executable.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        };

        info!(
            %run_id,
            passed = report.passed_count(),
            failed = report.failed_count(),
            availability_consistent = report.availability_consistent(),
            "run finished"
        );

        report
    }
}

fn finish(mut result: ScenarioResult, started_at: DateTime<Utc>, start: Instant) -> ScenarioResult {
    result.started_at = started_at;
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(results: Vec<ScenarioResult>) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            executable: PathBuf::from("host"),
            started_at: Utc::now(),
            duration_ms: 0,
            results,
        }
    }

    fn with_availability(name: &str, values: &[bool]) -> ScenarioResult {
        let mut r = ScenarioResult::empty(name, values.len());
        r.availability = values.to_vec();
        r
    }

    #[test]
    fn test_report_counts() {
        let r = report(vec![
            ScenarioResult::empty("ok", 1),
            ScenarioResult::failed("slow", 1, ScenarioStatus::Timeout, "timeout"),
        ]);
        assert!(!r.all_succeeded());
        assert_eq!(r.passed_count(), 1);
        assert_eq!(r.failed_count(), 1);
    }

    #[test]
    fn test_empty_report_succeeds() {
        let r = report(vec![]);
        assert!(r.all_succeeded());
        assert!(r.availability_consistent());
    }

    #[test]
    fn test_cross_scenario_availability() {
        let r = report(vec![
            with_availability("a", &[true, true]),
            with_availability("b", &[true]),
        ]);
        assert_eq!(r.availability_values(), vec![true, true, true]);
        assert!(r.availability_consistent());

        let r = report(vec![
            with_availability("a", &[true]),
            with_availability("b", &[false]),
        ]);
        assert!(!r.availability_consistent());
    }

    #[test]
    fn test_unique_errors_keep_first_seen_order() {
        let mut a = ScenarioResult::empty("a", 1);
        a.errors = vec!["Missing prompt".into(), "Session not found: x".into()];
        let mut b = ScenarioResult::empty("b", 1);
        b.errors = vec!["Missing prompt".into(), "Invalid JSON message".into()];

        let r = report(vec![a, b]);
        assert_eq!(
            r.unique_errors(),
            vec!["Missing prompt", "Session not found: x", "Invalid JSON message"]
        );
    }
}
