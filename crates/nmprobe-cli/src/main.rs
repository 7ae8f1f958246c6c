//! nmprobe - native-messaging host contract checker
//!
//! ## Commands
//!
//! - `run`: run the built-in suite (or a suite file) against a host
//! - `compare`: compare availability answers of several host binaries
//! - `encode`: print one JSON message as a hex-encoded frame
//! - `decode`: decode a captured stdout dump

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nmprobe_core::protocol::frame::encode_message;
use nmprobe_core::protocol::schema;
use nmprobe_core::{
    catalog, compare_availability, decode, Command, HarnessConfig, Response, ResponseType,
    RunReport, ScenarioResult, ScenarioRunner, Settle, SubprocessDriver,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "nmprobe")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Contract checks for native-messaging hosts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios against a host executable
    Run {
        /// Host executable
        #[arg(env = "NMPROBE_HOST")]
        executable: PathBuf,

        /// Scenario suite (JSON); the built-in suite is used when omitted
        #[arg(short, long)]
        suite: Option<PathBuf>,

        #[command(flatten)]
        timing: TimingArgs,

        /// Print the run report as JSON instead of text
        #[arg(long)]
        json_report: bool,
    },

    /// Compare availability answers of several host binaries
    Compare {
        /// Host executables, in the order to report them
        #[arg(required = true, num_args = 2..)]
        executables: Vec<PathBuf>,

        #[command(flatten)]
        timing: TimingArgs,
    },

    /// Print one JSON message as a hex-encoded frame
    Encode {
        /// Message JSON, e.g. '{"requestId":"1","command":"checkAvailability"}'
        message: String,
    },

    /// Decode a captured host stdout dump
    Decode {
        /// File holding raw stdout bytes
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SettleMode {
    Fixed,
    Quiescent,
}

/// Timing flags; each one overrides the matching `NMPROBE_*` variable.
#[derive(clap::Args, Debug, Default)]
struct TimingArgs {
    /// Settle phase bound in milliseconds
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Reap and drain bound in milliseconds
    #[arg(long)]
    collect_timeout_ms: Option<u64>,

    /// How to wait before asking the host to stop
    #[arg(long, value_enum)]
    settle: Option<SettleMode>,

    /// Quiet period that ends a quiescent settle, in milliseconds
    #[arg(long)]
    idle_ms: Option<u64>,
}

impl TimingArgs {
    fn apply(&self, mut config: HarnessConfig) -> Result<HarnessConfig> {
        if let Some(ms) = self.grace_ms {
            config.grace_period_ms = ms;
        }
        if let Some(ms) = self.collect_timeout_ms {
            anyhow::ensure!(ms > 0, "--collect-timeout-ms must be positive");
            config.collect_timeout_ms = ms;
        }

        let current_idle = match config.settle {
            Settle::Quiescent { idle_ms } => Some(idle_ms),
            Settle::Fixed => None,
        };
        let idle = self.idle_ms.or(current_idle);

        config.settle = match self.settle {
            Some(SettleMode::Fixed) => Settle::Fixed,
            Some(SettleMode::Quiescent) => {
                Settle::parse("quiescent", idle).map_err(anyhow::Error::msg)?
            }
            None => match (config.settle, self.idle_ms) {
                (_, Some(idle_ms)) => Settle::Quiescent { idle_ms },
                (settle, None) => settle,
            },
        };
        Ok(config)
    }

    fn resolve(&self) -> Result<HarnessConfig> {
        let config = HarnessConfig::from_env().context("Invalid NMPROBE_* environment")?;
        self.apply(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    nmprobe_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            executable,
            suite,
            timing,
            json_report,
        } => cmd_run(&executable, suite.as_deref(), &timing, json_report).await,
        Commands::Compare {
            executables,
            timing,
        } => cmd_compare(&executables, &timing).await,
        Commands::Encode { message } => cmd_encode(&message),
        Commands::Decode { file } => cmd_decode(&file),
    }
}

async fn cmd_run(
    executable: &Path,
    suite: Option<&Path>,
    timing: &TimingArgs,
    json_report: bool,
) -> Result<()> {
    let config = timing.resolve()?;
    let suite = catalog::load_suite(suite).context("Failed to load scenario suite")?;

    info!(
        executable = %executable.display(),
        scenarios = suite.scenarios.len(),
        settle = ?config.settle,
        "running suite"
    );

    let runner = ScenarioRunner::new(executable, config);
    let report = runner.run_all(&suite.scenarios).await;

    if json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.availability_consistent() {
        anyhow::bail!("Availability answers were inconsistent across the run");
    }
    if !report.all_succeeded() {
        anyhow::bail!(
            "{} of {} scenarios did not succeed",
            report.failed_count(),
            report.results.len()
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Host: {}", report.executable.display());
    println!("Run:  {}", report.run_id);
    println!();

    for result in &report.results {
        print_result(result);
    }

    println!("{}", "=".repeat(60));
    println!(
        "Scenarios: {} passed, {} failed ({} ms)",
        report.passed_count(),
        report.failed_count(),
        report.duration_ms
    );

    let values = report.availability_values();
    if values.is_empty() {
        println!("Availability: no answers");
    } else if report.availability_consistent() {
        println!("Availability: consistent ({})", values[0]);
    } else {
        println!("Availability: INCONSISTENT {:?}", values);
    }

    let errors = report.unique_errors();
    if !errors.is_empty() {
        println!("\nErrors seen:");
        for error in errors {
            println!("  - {}", error);
        }
    }
}

fn print_result(result: &ScenarioResult) {
    println!("[{}] {}", result.status, result.name);
    println!(
        "  sent {} / received {} in {} ms",
        result.commands_sent, result.responses_received, result.duration_ms
    );
    if let Some(failure) = &result.failure {
        println!("  failure: {}", failure);
    }
    if !result.availability.is_empty() {
        let marker = if result.availability_consistent {
            "consistent"
        } else {
            "INCONSISTENT"
        };
        println!("  availability: {:?} ({})", result.availability, marker);
    }
    if !result.successes.is_empty() {
        println!("  successes: {}", result.successes.join(", "));
    }
    if result.stream_chunks > 0 || result.stream_ends > 0 {
        println!(
            "  stream: {} chunks, {} ends",
            result.stream_chunks, result.stream_ends
        );
    }
    for error in &result.errors {
        println!("  error: {}", error);
    }
    if !result.unknown_types.is_empty() {
        println!("  unknown types: {}", result.unknown_types.join(", "));
    }
    if !result.unanswered_requests.is_empty() {
        println!("  unanswered: {}", result.unanswered_requests.join(", "));
    }
    if let Some(truncation) = &result.truncation {
        println!(
            "  stdout truncated at byte {}: {:?}",
            truncation.offset, truncation.reason
        );
    }
    if let Some(exit) = &result.exit {
        println!("  host: {}", exit.describe());
    }
    println!();
}

async fn cmd_compare(executables: &[PathBuf], timing: &TimingArgs) -> Result<()> {
    let config = timing.resolve()?;
    let report = compare_availability(Arc::new(SubprocessDriver::new()), executables, &config).await;

    for binary in &report.binaries {
        match (binary.available, &binary.error) {
            (Some(available), _) => println!("{}: available={}", binary.path.display(), available),
            (None, Some(error)) => println!("{}: {}", binary.path.display(), error),
            (None, None) => println!("{}: no answer", binary.path.display()),
        }
    }

    match report.consistent() {
        Some(true) => {
            println!("\nAll binaries agree");
            Ok(())
        }
        Some(false) => anyhow::bail!("Binaries disagree on availability"),
        None => anyhow::bail!("Fewer than two binaries answered, cannot compare"),
    }
}

fn encode_hex(message: &str) -> Result<String> {
    let value: Value = serde_json::from_str(message).context("Message is not valid JSON")?;
    anyhow::ensure!(value.is_object(), "Message must be a JSON object");

    if let Ok(command) = serde_json::from_value::<Command>(value.clone()) {
        for issue in schema::validate(&command) {
            warn!(%issue, "payload does not match the command's expected shape");
        }
    }

    let frame = encode_message(&value)?;
    Ok(hex::encode(frame))
}

fn cmd_encode(message: &str) -> Result<()> {
    println!("{}", encode_hex(message)?);
    Ok(())
}

/// One-line view of a response's payload.
fn summarize(response: &Response) -> String {
    match &response.kind {
        ResponseType::AvailabilityResponse => format!("available={}", response.available()),
        ResponseType::CompletionResponse => {
            format!("{:?}", response.completion_text().unwrap_or_default())
        }
        ResponseType::StreamChunk => format!("token={:?}", response.token().unwrap_or_default()),
        ResponseType::PlaygroundSessionStarted | ResponseType::SessionEnded => format!(
            "session={}",
            response.session_id().unwrap_or("-")
        ),
        ResponseType::Error => match response.error_code() {
            Some(code) => format!("{} ({})", response.error_message(), code),
            None => response.error_message().to_string(),
        },
        ResponseType::StreamEnd | ResponseType::Unknown(_) => {
            Value::Object(response.payload.clone()).to_string()
        }
    }
}

fn cmd_decode(file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let decoded = decode(&bytes);

    for (i, response) in decoded.responses.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} {}",
            i + 1,
            response.request_id_or_na(),
            response.kind,
            summarize(response)
        );
    }

    println!(
        "\n{} frames, {} of {} bytes consumed",
        decoded.responses.len(),
        decoded.cursor,
        bytes.len()
    );
    if let Some(truncation) = &decoded.truncation {
        anyhow::bail!(
            "Malformed frame at byte {}: {:?}",
            truncation.offset,
            truncation.reason
        );
    }
    let trailing = decoded.trailing_bytes(bytes.len());
    if trailing > 0 {
        println!("{} trailing bytes (incomplete frame)", trailing);
    }
    Ok(())
}
