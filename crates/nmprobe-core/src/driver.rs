//! Subprocess driver.
//!
//! One invocation = one host process: launch with all three stdio streams
//! piped, deliver the encoded input and close stdin while the host settles,
//! request termination (SIGTERM on unix), then reap it and drain both output
//! pipes within the collection timeout. On timeout the host is killed and no
//! output is returned.
//!
//! Wall-clock time is bounded by `grace_period + collect_timeout` plus spawn
//! overhead: input delivery is abandoned when the settle phase ends, and a
//! host killed after a timeout is left to tokio's orphan reaper.

use crate::config::Settle;
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Timing for a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTiming {
    /// Upper bound on the settle phase.
    pub grace_period: Duration,

    /// Bound on reaping the host and draining its pipes after termination.
    pub collect_timeout: Duration,

    pub settle: Settle,
}

impl DriverTiming {
    pub fn fixed(grace_period: Duration, collect_timeout: Duration) -> Self {
        Self {
            grace_period,
            collect_timeout,
            settle: Settle::Fixed,
        }
    }
}

/// How the host ended.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExitInfo {
    pub code: Option<i32>,

    /// Terminating signal (unix only).
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit code {}", code),
            (None, Some(signal)) => format!("signal {}", signal),
            (None, None) => "unknown exit".to_string(),
        }
    }
}

/// Everything collected from one host invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit: ExitInfo,
    pub duration_ms: u64,
}

impl ProcessOutput {
    /// SHA-256 of stdout, hex encoded.
    pub fn stdout_digest(&self) -> String {
        hex::encode(Sha256::digest(&self.stdout))
    }

    /// stderr as text. Diagnostic only, never parsed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs a host executable against a byte stream.
///
/// Implementations: [`SubprocessDriver`] (real processes) and
/// [`crate::fakes::ScriptedDriver`] (canned outcomes for tests).
#[async_trait]
pub trait ProcessDriver: Send + Sync {
    async fn run(
        &self,
        executable: &Path,
        args: &[String],
        input: &[u8],
        timing: &DriverTiming,
    ) -> DriverResult<ProcessOutput>;

    fn name(&self) -> &str;
}

/// Driver backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessDriver;

impl SubprocessDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessDriver for SubprocessDriver {
    async fn run(
        &self,
        executable: &Path,
        args: &[String],
        input: &[u8],
        timing: &DriverTiming,
    ) -> DriverResult<ProcessOutput> {
        let start = Instant::now();

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DriverError::Launch {
                path: executable.to_path_buf(),
                source,
            })?;

        debug!(pid = ?child.id(), executable = %executable.display(), "host launched");

        // Drain from the start so a chatty host never blocks on a full pipe.
        let stdout_seen = Arc::new(AtomicUsize::new(0));
        let mut stdout_task = tokio::spawn(drain(child.stdout.take(), Some(stdout_seen.clone())));
        let mut stderr_task = tokio::spawn(drain(child.stderr.take(), None));

        // A host that never reads stdin must not stall us on a full pipe.
        let deliver_task = tokio::spawn(deliver(child.stdin.take(), input.to_vec()));

        settle(&mut child, &stdout_seen, &deliver_task, timing).await;
        if !deliver_task.is_finished() {
            warn!(bytes = input.len(), "host did not consume its input within the grace period");
        }
        deliver_task.abort();
        request_termination(&mut child);

        let limit_ms = timing.collect_timeout.as_millis() as u64;
        let collected = tokio::time::timeout(timing.collect_timeout, async {
            let status = child.wait().await?;
            let (stdout, stderr) = futures::future::try_join(
                join_drain(&mut stdout_task),
                join_drain(&mut stderr_task),
            )
            .await?;
            Ok::<_, io::Error>((status, stdout, stderr))
        })
        .await;

        match collected {
            Ok(Ok((status, stdout, stderr))) => {
                let exit = ExitInfo::from_status(status);
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    exit = %exit.describe(),
                    stdout_bytes = stdout.len(),
                    stderr_bytes = stderr.len(),
                    duration_ms,
                    "host reaped"
                );
                Ok(ProcessOutput {
                    stdout,
                    stderr,
                    exit,
                    duration_ms,
                })
            }
            Ok(Err(e)) => {
                force_cleanup(&mut child, &stdout_task, &stderr_task);
                Err(DriverError::Io(e))
            }
            Err(_elapsed) => {
                warn!(limit_ms, "host output not collected in time, killing host");
                force_cleanup(&mut child, &stdout_task, &stderr_task);
                Err(DriverError::Timeout { limit_ms })
            }
        }
    }

    fn name(&self) -> &str {
        "subprocess"
    }
}

/// Write the whole input then close stdin so the host sees end-of-input.
async fn deliver(stdin: Option<ChildStdin>, input: Vec<u8>) {
    let Some(mut stdin) = stdin else {
        return;
    };
    let written = async {
        stdin.write_all(&input).await?;
        stdin.flush().await?;
        stdin.shutdown().await
    };
    if let Err(e) = written.await {
        warn!(error = %e, bytes = input.len(), "failed to deliver input to host");
    }
}

async fn drain<R>(reader: Option<R>, seen: Option<Arc<AtomicUsize>>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(collected);
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);
        if let Some(seen) = &seen {
            seen.fetch_add(n, Ordering::Relaxed);
        }
    }
    Ok(collected)
}

async fn join_drain(task: &mut JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    task.await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

async fn settle(
    child: &mut Child,
    stdout_seen: &AtomicUsize,
    delivery: &JoinHandle<()>,
    timing: &DriverTiming,
) {
    match timing.settle {
        Settle::Fixed => tokio::time::sleep(timing.grace_period).await,
        Settle::Quiescent { idle_ms } => {
            let idle = Duration::from_millis(idle_ms.max(1));
            let poll = (idle / 4).max(Duration::from_millis(5));
            let deadline = Instant::now() + timing.grace_period;

            let mut last_seen = stdout_seen.load(Ordering::Relaxed);
            let mut last_change = Instant::now();

            loop {
                let now = Instant::now();
                if now >= deadline {
                    debug!("grace period elapsed before host went quiet");
                    break;
                }
                if matches!(child.try_wait(), Ok(Some(_))) {
                    debug!("host exited while settling");
                    break;
                }

                let seen = stdout_seen.load(Ordering::Relaxed);
                if seen != last_seen {
                    last_seen = seen;
                    last_change = now;
                } else if seen > 0
                    && delivery.is_finished()
                    && now.duration_since(last_change) >= idle
                {
                    debug!(stdout_bytes = seen, "host output quiescent");
                    break;
                }

                tokio::time::sleep(poll.min(deadline - now)).await;
            }
        }
    }
}

/// Ask the host to stop. Its exit is observed later by `wait`.
fn request_termination(child: &mut Child) {
    #[cfg(unix)]
    {
        // `id()` is None once the child has been reaped, so the pid is still ours.
        if let Some(pid) = child.id() {
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                debug!(error = %io::Error::last_os_error(), "SIGTERM not delivered");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.start_kill() {
            debug!(error = %e, "termination request failed");
        }
    }
}

/// SIGKILL the host and stop draining. Does not wait: the zombie is reaped
/// by tokio once `child` is dropped.
fn force_cleanup(
    child: &mut Child,
    stdout_task: &JoinHandle<io::Result<Vec<u8>>>,
    stderr_task: &JoinHandle<io::Result<Vec<u8>>>,
) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "kill failed (host may already be gone)");
    }
    if let Ok(Some(status)) = child.try_wait() {
        debug!(exit = %ExitInfo::from_status(status).describe(), "killed host reaped");
    }
    stdout_task.abort();
    stderr_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_info_describe() {
        assert_eq!(
            ExitInfo {
                code: Some(0),
                signal: None
            }
            .describe(),
            "exit code 0"
        );
        assert_eq!(
            ExitInfo {
                code: None,
                signal: Some(15)
            }
            .describe(),
            "signal 15"
        );
        assert_eq!(ExitInfo::default().describe(), "unknown exit");
    }

    #[test]
    fn test_stdout_digest_deterministic() {
        let a = ProcessOutput {
            stdout: b"abc".to_vec(),
            ..Default::default()
        };
        let b = ProcessOutput {
            stdout: b"abc".to_vec(),
            stderr: b"noise".to_vec(),
            ..Default::default()
        };
        assert_eq!(a.stdout_digest(), b.stdout_digest());
        assert_eq!(a.stdout_digest().len(), 64);
    }

    #[test]
    fn test_stderr_text_is_lossy() {
        let out = ProcessOutput {
            stderr: vec![b'o', b'k', 0xff],
            ..Default::default()
        };
        assert!(out.stderr_text().starts_with("ok"));
    }

    #[tokio::test]
    async fn test_launch_error_for_missing_executable() {
        let timing = DriverTiming::fixed(Duration::from_millis(10), Duration::from_millis(100));
        let err = SubprocessDriver::new()
            .run(Path::new("/definitely/not/a/host"), &[], b"", &timing)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cat_echoes_input() {
        let timing = DriverTiming::fixed(Duration::from_millis(50), Duration::from_secs(5));
        let out = SubprocessDriver::new()
            .run(Path::new("/bin/cat"), &[], b"hello", &timing)
            .await
            .expect("cat run failed");
        assert_eq!(out.stdout, b"hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_quiescent_settle_returns_when_host_exits() {
        let timing = DriverTiming {
            grace_period: Duration::from_secs(5),
            collect_timeout: Duration::from_secs(5),
            settle: Settle::Quiescent { idle_ms: 50 },
        };
        let started = std::time::Instant::now();
        let out = SubprocessDriver::new()
            .run(Path::new("/bin/cat"), &[], b"ping", &timing)
            .await
            .expect("cat run failed");
        assert_eq!(out.stdout, b"ping");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_quiescent_settle_returns_when_live_host_goes_quiet() {
        let timing = DriverTiming {
            grace_period: Duration::from_secs(10),
            collect_timeout: Duration::from_secs(5),
            settle: Settle::Quiescent { idle_ms: 100 },
        };
        let args = vec!["-c".to_string(), "printf ready; exec sleep 30".to_string()];

        let started = std::time::Instant::now();
        let out = SubprocessDriver::new()
            .run(Path::new("/bin/sh"), &args, b"", &timing)
            .await
            .expect("sh run failed");

        assert_eq!(out.stdout, b"ready");
        assert_eq!(out.exit.signal, Some(libc::SIGTERM));
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unread_input_larger_than_pipe_does_not_block() {
        let timing = DriverTiming::fixed(Duration::from_millis(200), Duration::from_millis(500));
        let args = vec!["-c".to_string(), "exec sleep 30".to_string()];
        let input = vec![b'x'; 1 << 20];

        let started = std::time::Instant::now();
        let out = SubprocessDriver::new()
            .run(Path::new("/bin/sh"), &args, &input, &timing)
            .await
            .expect("sh run failed");

        assert!(out.stdout.is_empty());
        assert!(started.elapsed() < Duration::from_millis(200 + 500 + 300));
    }
}
