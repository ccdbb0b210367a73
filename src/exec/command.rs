// src/exec/command.rs

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::task::{BoxInitFuture, Initializable};

/// A task whose work is a shell command.
#[derive(Debug, Clone)]
pub struct CommandTask {
    name: String,
    cmd: String,
}

impl CommandTask {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }
}

impl Initializable for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, cancel: CancellationToken) -> BoxInitFuture {
        let name = self.name.clone();
        let cmd = self.cmd.clone();
        Box::pin(async move { run_command(name, cmd, cancel).await })
    }
}

async fn run_command(name: String, cmd: String, cancel: CancellationToken) -> Result<()> {
    info!(task = %name, cmd = %cmd, "starting command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{name}'"))?;

    // Drain both pipes so the child never blocks on a full buffer.
    if let Some(stdout) = child.stdout.take() {
        let task = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let task = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status = child.wait() => {
            let status = status
                .with_context(|| format!("waiting for process of task '{name}'"))?;
            let code = status.code().unwrap_or(-1);
            info!(task = %name, exit_code = code, success = status.success(), "command exited");
            if !status.success() {
                bail!("command `{cmd}` exited with status {code}");
            }
            Ok(())
        }
        _ = cancel.cancelled() => {
            info!(task = %name, "run cancelled; killing command");
            if let Err(e) = child.kill().await {
                warn!(task = %name, error = %e, "failed to kill command on cancellation");
            }
            bail!("command `{cmd}` cancelled")
        }
    }
}
