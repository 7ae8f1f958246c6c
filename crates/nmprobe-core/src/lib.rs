//! nmprobe core
//!
//! Contract checks for native-messaging hosts: processes that read
//! length-prefixed JSON commands on stdin and answer with length-prefixed
//! JSON responses on stdout.
//!
//! - `protocol`: wire model and frame codec
//! - `driver`: launch a host, feed it bytes, collect its output under a timeout
//! - `analyzer`: classify responses, check availability stability
//! - `runner`: run scenarios sequentially and aggregate a `RunReport`
//! - `compare`: availability agreement between several host binaries

pub mod analyzer;
pub mod catalog;
pub mod compare;
pub mod config;
pub mod driver;
pub mod error;
pub mod fakes;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod telemetry;

pub use analyzer::ResponseAnalyzer;
pub use compare::{compare_availability, BinaryAvailability, ComparisonReport};
pub use config::{HarnessConfig, Settle};
pub use driver::{DriverTiming, ExitInfo, ProcessDriver, ProcessOutput, SubprocessDriver};
pub use error::{CodecError, ConfigError, DriverError, HarnessError, Result, SuiteError};
pub use protocol::{
    decode, encode, encode_all, Command, CommandKind, DecodeTruncation, Decoded, Payload,
    PayloadIssue, Response, ResponseType, TruncationReason,
};
pub use runner::{RunReport, ScenarioRunner};
pub use scenario::{Scenario, ScenarioResult, ScenarioStatus, ScenarioSuite};
pub use telemetry::init_tracing;

/// nmprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
