//! Scripted driver for tests.
//!
//! `ScriptedDriver` plays back queued outcomes instead of launching a process
//! and records every input stream it was handed.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::{DriverTiming, ExitInfo, ProcessDriver, ProcessOutput};
use crate::error::{DriverError, DriverResult};
use crate::protocol::frame::{decode, encode_message};

type Responder = Box<dyn Fn(&[Value]) -> Vec<Value> + Send + Sync>;

/// One canned driver outcome.
pub enum ScriptedOutcome {
    /// Frame these messages onto stdout.
    Reply(Vec<Value>),
    /// Build replies from the decoded commands.
    Respond(Responder),
    /// Return this output verbatim.
    Raw(ProcessOutput),
    Timeout,
    LaunchFailure,
}

impl ScriptedOutcome {
    pub fn respond<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Vec<Value> + Send + Sync + 'static,
    {
        ScriptedOutcome::Respond(Box::new(f))
    }
}

/// Driver returning queued outcomes in order; empty stdout once exhausted.
#[derive(Default)]
pub struct ScriptedDriver {
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    inputs: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedDriver {
    pub fn new(outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Input streams received so far, one per invocation.
    pub fn inputs(&self) -> Vec<Vec<u8>> {
        self.inputs.lock().unwrap().clone()
    }

    fn framed(messages: &[Value]) -> ProcessOutput {
        let mut stdout = Vec::new();
        for message in messages {
            stdout.extend(encode_message(message).expect("scripted reply encodes"));
        }
        ProcessOutput {
            stdout,
            exit: ExitInfo {
                code: Some(0),
                signal: None,
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl ProcessDriver for ScriptedDriver {
    async fn run(
        &self,
        executable: &Path,
        _args: &[String],
        input: &[u8],
        timing: &DriverTiming,
    ) -> DriverResult<ProcessOutput> {
        self.inputs.lock().unwrap().push(input.to_vec());
        let outcome = self.outcomes.lock().unwrap().pop_front();

        match outcome {
            None => Ok(ProcessOutput::default()),
            Some(ScriptedOutcome::Reply(messages)) => Ok(Self::framed(&messages)),
            Some(ScriptedOutcome::Respond(responder)) => {
                let commands: Vec<Value> = decode(input).responses.into_iter().map(|r| r.raw).collect();
                Ok(Self::framed(&responder(&commands)))
            }
            Some(ScriptedOutcome::Raw(output)) => Ok(output),
            Some(ScriptedOutcome::Timeout) => Err(DriverError::Timeout {
                limit_ms: timing.collect_timeout.as_millis() as u64,
            }),
            Some(ScriptedOutcome::LaunchFailure) => Err(DriverError::Launch {
                path: executable.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
