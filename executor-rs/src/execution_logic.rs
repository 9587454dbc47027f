// executor-rs/src/execution_logic.rs
// Process-backed sandbox: a throwaway container per run, or a host
// interpreter on a temporary script file.

use std::io::{ErrorKind, Write};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use shared_types::ExecutionResult;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::classifier::classify_stderr;
use crate::config::{SandboxConfig, SandboxMode};
use crate::Sandbox;

const TRUNCATION_MARKER: &str = "\n... [output truncated]";
const CONTAINER_PIDS_LIMIT: &str = "64";

/// Failures of the sandbox machinery itself. These never leave the crate:
/// `Sandbox::execute` turns them into an `ExecutionResult`.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare script file: {0}")]
    Script(#[source] std::io::Error),

    #[error("i/o error while running code: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution exceeded {0:?}")]
    TimedOut(Duration),
}

pub(crate) struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Arguments for `docker run`; the code itself is piped to `python -`.
pub fn docker_args(config: &SandboxConfig, container_name: &str) -> Vec<String> {
    [
        "run",
        "--rm",
        "-i",
        "--name",
        container_name,
        "--network",
        "none",
        "--memory",
        config.memory_limit.as_str(),
        "--cpus",
        config.cpu_limit.as_str(),
        "--pids-limit",
        CONTAINER_PIDS_LIMIT,
        config.docker_image.as_str(),
        "python",
        "-",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    config: SandboxConfig,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(SandboxConfig::from_env())
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn run(&self, code: &str, timeout: Duration) -> Result<RawOutput, SandboxError> {
        match self.config.mode {
            SandboxMode::Docker => self.run_in_container(code, timeout).await,
            SandboxMode::Local => self.run_on_host(code, timeout).await,
        }
    }

    async fn run_in_container(&self, code: &str, timeout: Duration) -> Result<RawOutput, SandboxError> {
        let container_name = format!("repair-sandbox-{}", uuid::Uuid::new_v4().simple());

        let mut command = Command::new(&self.config.docker_bin);
        command.args(docker_args(&self.config, &container_name));

        let result = self.run_command(command, Some(code), timeout).await;
        // Killing the docker client does not stop the container.
        if matches!(result, Err(SandboxError::TimedOut(_))) {
            self.kill_container(&container_name).await;
        }
        result
    }

    async fn run_on_host(&self, code: &str, timeout: Duration) -> Result<RawOutput, SandboxError> {
        let mut script = tempfile::Builder::new()
            .prefix("repair-")
            .suffix(".py")
            .tempfile()
            .map_err(SandboxError::Script)?;
        script
            .write_all(code.as_bytes())
            .and_then(|_| script.flush())
            .map_err(SandboxError::Script)?;

        let mut command = Command::new(&self.config.python_bin);
        command.arg(script.path());
        if let Some(dir) = script.path().parent() {
            command.current_dir(dir);
        }

        // `script` lives until the process has finished.
        self.run_command(command, None, timeout).await
    }

    async fn run_command(
        &self,
        mut command: Command,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<RawOutput, SandboxError> {
        let program = command.as_std().get_program().to_string_lossy().into_owned();

        command
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            program: program.clone(),
            source,
        })?;
        let started = Instant::now();

        let run = async move {
            if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
                // An early exit closes the pipe; its stderr explains why.
                if let Err(err) = pipe.write_all(input.as_bytes()).await {
                    if err.kind() != ErrorKind::BrokenPipe {
                        return Err(err);
                    }
                }
                drop(pipe);
            }
            child.wait_with_output().await
        };

        // Dropping the timed-out future drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, run).await {
            Ok(output) => output?,
            Err(_) => return Err(SandboxError::TimedOut(timeout)),
        };

        log::debug!("{} finished in {:?} with {}", program, started.elapsed(), output.status);

        let limit = self.config.max_output_bytes;
        Ok(RawOutput {
            stdout: truncate_output(String::from_utf8_lossy(&output.stdout).into_owned(), limit),
            stderr: truncate_output(String::from_utf8_lossy(&output.stderr).into_owned(), limit),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn kill_container(&self, name: &str) {
        let status = Command::new(&self.config.docker_bin)
            .args(["kill", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => log::info!("Killed timed-out container {}", name),
            Ok(_) => log::debug!("Container {} was already gone", name),
            Err(err) => log::warn!("Failed to kill container {}: {}", name, err),
        }
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult {
        log::info!(
            "Executing {} bytes of code in {} sandbox (timeout {:?})",
            code.len(),
            self.config.mode,
            timeout
        );

        match self.run(code, timeout).await {
            Ok(raw) => to_execution_result(raw),
            Err(SandboxError::TimedOut(limit)) => {
                log::warn!("Execution exceeded {:?}, process terminated", limit);
                ExecutionResult::timeout("")
            }
            Err(err) => {
                log::error!("Sandbox failure: {}", err);
                ExecutionResult::internal_failure(err)
            }
        }
    }
}

/// Success needs a zero exit code and no stderr output.
pub(crate) fn to_execution_result(raw: RawOutput) -> ExecutionResult {
    if raw.exit_code == 0 && raw.stderr.trim().is_empty() {
        return ExecutionResult::success(raw.stdout);
    }

    let (error_type, message) = classify_stderr(&raw.stderr);
    let message = if message.is_empty() {
        format!("Process exited with code {}", raw.exit_code)
    } else {
        message
    };

    ExecutionResult::failure(raw.stdout, raw.stderr, raw.exit_code, error_type, message)
}

pub(crate) fn truncate_output(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_MARKER);
    text
}
