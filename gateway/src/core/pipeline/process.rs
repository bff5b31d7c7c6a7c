//! Line-oriented worker subprocesses shared by the STT and TTS adapters.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PipelineError, PipelineResult};

/// A running worker process with piped stdin and stderr forwarded to the log.
pub(crate) struct Worker {
    name: &'static str,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: JoinHandle<()>,
}

impl Worker {
    /// Spawn `command` (argv form). Returns the worker and its stdout.
    pub fn spawn(name: &'static str, command: &[String]) -> PipelineResult<(Self, ChildStdout)> {
        let (program, args) = command.split_first().ok_or_else(|| {
            PipelineError::InvalidConfiguration(format!("{name} command is empty"))
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::ProcessSpawn(format!("{name} ({program}): {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::ProcessSpawn(format!("{name} stdin unavailable")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::ProcessSpawn(format!("{name} stdout unavailable")))?;

        let stderr_task = match child.stderr.take() {
            Some(stderr) => tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("{} stderr: {}", name, line);
                }
            }),
            None => tokio::spawn(async {}),
        };

        debug!("Started {} worker: {}", name, program);
        Ok((
            Self {
                name,
                child,
                stdin: Some(stdin),
                stderr_task,
            },
            stdout,
        ))
    }

    /// Write raw bytes to the worker's stdin and flush.
    pub async fn write(&mut self, bytes: &[u8]) -> PipelineResult<()> {
        let stdin = self.stdin.as_mut().ok_or(PipelineError::NotStarted)?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| PipelineError::Io(format!("{} write failed: {e}", self.name)))?;
        stdin
            .flush()
            .await
            .map_err(|e| PipelineError::Io(format!("{} flush failed: {e}", self.name)))
    }

    /// Stop the worker. Closing stdin first lets well-behaved workers exit.
    pub fn shutdown(&mut self) {
        self.stdin.take();
        if let Err(e) = self.child.start_kill() {
            debug!("{} worker already exited: {}", self.name, e);
        }
        self.stderr_task.abort();
    }
}
