//! Error types for nmprobe operations.

use std::path::PathBuf;

/// Errors produced while framing outgoing messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("frame body of {len} bytes does not fit a u32 length prefix")]
    FrameTooLarge { len: usize },
}

/// Errors produced by the subprocess driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("process output not collected within {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while loading scenario suites.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("failed to read suite file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid suite JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("suite contains no scenarios")]
    Empty,

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level error for nmprobe.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("suite error: {0}")]
    Suite(#[from] SuiteError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Result type for nmprobe operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = DriverError::Timeout { limit_ms: 3000 };
        assert_eq!(err.to_string(), "process output not collected within 3000ms");
    }

    #[test]
    fn test_launch_message_names_path() {
        let err = DriverError::Launch {
            path: PathBuf::from("/missing/host"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/missing/host"));
    }

    #[test]
    fn test_harness_error_from_codec() {
        let err: HarnessError = CodecError::FrameTooLarge { len: 1 }.into();
        assert!(err.to_string().starts_with("codec error"));
    }
}
