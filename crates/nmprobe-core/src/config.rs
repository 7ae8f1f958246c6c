//! Harness timing configuration.
//!
//! Defaults: 2 s grace period after delivering input, 5 s to reap the host
//! and drain its pipes. Environment overrides:
//!
//! - `NMPROBE_GRACE_MS`
//! - `NMPROBE_COLLECT_TIMEOUT_MS`
//! - `NMPROBE_SETTLE` (`fixed` | `quiescent`)
//! - `NMPROBE_IDLE_MS` (quiescence window, implies `quiescent`)

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2_000;
pub const DEFAULT_COLLECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_IDLE_MS: u64 = 250;

/// How the driver decides the host has finished reacting to its input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Settle {
    /// Sleep for the whole grace period. No completion detection; a slow host
    /// can be cut off mid-reply.
    #[default]
    Fixed,

    /// Return once stdout has been silent for `idle_ms` after producing at
    /// least one byte, or the host exited. Still bounded by the grace period.
    Quiescent { idle_ms: u64 },
}

/// Timing knobs shared by every scenario in a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Upper bound on the wait between delivering input and sending SIGTERM.
    pub grace_period_ms: u64,

    /// Collection bound for scenarios that do not set their own timeout.
    pub collect_timeout_ms: u64,

    pub settle: Settle,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            collect_timeout_ms: DEFAULT_COLLECT_TIMEOUT_MS,
            settle: Settle::Fixed,
        }
    }
}

impl HarnessConfig {
    /// Defaults overlaid with `NMPROBE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_ms(&lookup, "NMPROBE_GRACE_MS")? {
            config.grace_period_ms = ms;
        }
        if let Some(ms) = parse_ms(&lookup, "NMPROBE_COLLECT_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(ConfigError::InvalidVar {
                    var: "NMPROBE_COLLECT_TIMEOUT_MS",
                    value: "0".to_string(),
                    reason: "collect timeout must be positive".to_string(),
                });
            }
            config.collect_timeout_ms = ms;
        }

        let idle = parse_ms(&lookup, "NMPROBE_IDLE_MS")?;
        config.settle = match lookup("NMPROBE_SETTLE").as_deref().map(str::trim) {
            None => match idle {
                Some(idle_ms) => Settle::Quiescent { idle_ms },
                None => Settle::Fixed,
            },
            Some(mode) => Settle::parse(mode, idle).map_err(|reason| ConfigError::InvalidVar {
                var: "NMPROBE_SETTLE",
                value: mode.to_string(),
                reason,
            })?,
        };

        Ok(config)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }
}

impl Settle {
    /// Parse a settle mode name; `idle_ms` applies to `quiescent` only.
    pub fn parse(mode: &str, idle_ms: Option<u64>) -> Result<Self, String> {
        match mode.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Settle::Fixed),
            "quiescent" => Ok(Settle::Quiescent {
                idle_ms: idle_ms.unwrap_or(DEFAULT_IDLE_MS),
            }),
            other => Err(format!("unknown settle mode '{}' (expected fixed|quiescent)", other)),
        }
    }
}

fn parse_ms<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidVar {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.grace_period(), Duration::from_secs(2));
        assert_eq!(cfg.collect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.settle, Settle::Fixed);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let cfg = HarnessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = HarnessConfig::from_lookup(lookup(&[
            ("NMPROBE_GRACE_MS", "100"),
            ("NMPROBE_COLLECT_TIMEOUT_MS", " 900 "),
            ("NMPROBE_SETTLE", "quiescent"),
            ("NMPROBE_IDLE_MS", "40"),
        ]))
        .unwrap();
        assert_eq!(cfg.grace_period_ms, 100);
        assert_eq!(cfg.collect_timeout_ms, 900);
        assert_eq!(cfg.settle, Settle::Quiescent { idle_ms: 40 });
    }

    #[test]
    fn test_idle_alone_implies_quiescent() {
        let cfg = HarnessConfig::from_lookup(lookup(&[("NMPROBE_IDLE_MS", "75")])).unwrap();
        assert_eq!(cfg.settle, Settle::Quiescent { idle_ms: 75 });
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = HarnessConfig::from_lookup(lookup(&[("NMPROBE_GRACE_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("NMPROBE_GRACE_MS"));
    }

    #[test]
    fn test_zero_collect_timeout_rejected() {
        assert!(HarnessConfig::from_lookup(lookup(&[("NMPROBE_COLLECT_TIMEOUT_MS", "0")])).is_err());
    }

    #[test]
    fn test_unknown_settle_mode_rejected() {
        assert!(HarnessConfig::from_lookup(lookup(&[("NMPROBE_SETTLE", "vibes")])).is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = HarnessConfig {
            grace_period_ms: 10,
            collect_timeout_ms: 20,
            settle: Settle::Quiescent { idle_ms: 5 },
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: HarnessConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
