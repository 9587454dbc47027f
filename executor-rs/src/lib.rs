//! Executor Library
//! Runs untrusted Python source in an isolated process and reports the
//! outcome as a classified `ExecutionResult`.

mod classifier;
mod config;
mod execution_logic;

pub use classifier::classify_stderr;
pub use config::{SandboxConfig, SandboxMode};
pub use execution_logic::{docker_args, ProcessSandbox, SandboxError};

use std::time::Duration;

use async_trait::async_trait;
use shared_types::ExecutionResult;

/// Timeout used by the connectivity probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The code execution sandbox.
///
/// `execute` never fails: spawn errors, I/O errors and timeouts are all
/// reported through the returned `ExecutionResult`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(&self, code: &str, timeout: Duration) -> ExecutionResult;

    /// Run a trivial program and report whether it succeeded.
    async fn check_connection(&self) -> bool {
        let result = self.execute("print('ok')", PROBE_TIMEOUT).await;
        if !result.is_success() {
            log::warn!(
                "Sandbox probe failed: {}",
                result.error_message().unwrap_or("no error message")
            );
        }
        result.is_success()
    }
}

#[cfg(test)]
mod tests;
