//! Availability comparison across host binaries (e.g. an installed copy
//! against a fresh build).

use crate::catalog::availability_probe;
use crate::config::HarnessConfig;
use crate::driver::ProcessDriver;
use crate::runner::ScenarioRunner;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// What one binary answered.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BinaryAvailability {
    pub path: PathBuf,
    pub available: Option<bool>,
    pub error: Option<String>,
}

/// Per-binary answers, in the order given.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub binaries: Vec<BinaryAvailability>,
}

impl ComparisonReport {
    /// Answers from binaries that produced one.
    pub fn answers(&self) -> Vec<bool> {
        self.binaries.iter().filter_map(|b| b.available).collect()
    }

    /// `None` when fewer than two binaries answered.
    pub fn consistent(&self) -> Option<bool> {
        let answers = self.answers();
        if answers.len() < 2 {
            return None;
        }
        Some(answers.windows(2).all(|w| w[0] == w[1]))
    }
}

/// Send one `checkAvailability` to each binary and compare the answers.
///
/// The first availability response of each binary counts. Launch failures,
/// timeouts and silent binaries are reported per binary.
pub async fn compare_availability(
    driver: Arc<dyn ProcessDriver>,
    binaries: &[PathBuf],
    config: &HarnessConfig,
) -> ComparisonReport {
    let probe = availability_probe();
    let mut results = Vec::with_capacity(binaries.len());

    for path in binaries {
        let runner = ScenarioRunner::with_driver(driver.clone(), path.clone(), config.clone());
        let result = runner.run_scenario(&probe).await;

        let entry = match (result.failure, result.availability.first()) {
            (Some(failure), _) => BinaryAvailability {
                path: path.clone(),
                available: None,
                error: Some(failure),
            },
            (None, Some(&available)) => BinaryAvailability {
                path: path.clone(),
                available: Some(available),
                error: None,
            },
            (None, None) => BinaryAvailability {
                path: path.clone(),
                available: None,
                error: Some("No valid response received".to_string()),
            },
        };

        info!(path = %path.display(), available = ?entry.available, error = ?entry.error, "binary probed");
        results.push(entry);
    }

    ComparisonReport { binaries: results }
}
