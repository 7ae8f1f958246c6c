//! Log output for the `nmprobe` binary.
//!
//! Everything goes to stderr. Reports, frame dumps and JSON run reports own
//! stdout, so the two never interleave in a pipe.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Route `tracing` events to stderr, as text or as one JSON object per line.
///
/// `RUST_LOG` takes precedence over `level`. A second call in the same process
/// (e.g. from several tests) is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}
