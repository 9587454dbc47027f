// Runs the local-mode sandbox against `sh` so the tests need no Python or
// Docker installation; the script-file and process handling is identical.
#![cfg(unix)]

use std::time::{Duration, Instant};

use executor::{ProcessSandbox, Sandbox, SandboxConfig};
use shared_types::{ErrorType, ExecutionStatus};

fn shell_sandbox() -> ProcessSandbox {
    ProcessSandbox::new(SandboxConfig::local("sh"))
}

#[tokio::test]
async fn test_clean_run_succeeds() {
    let result = shell_sandbox().execute("echo hello", Duration::from_secs(5)).await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.stdout.trim(), "hello");
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn test_stderr_is_classified() {
    let script = "echo partial\necho 'KeyError: missing' >&2\nexit 1";
    let result = shell_sandbox().execute(script, Duration::from_secs(5)).await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.error_type, Some(ErrorType::Key));
    assert_eq!(result.error_message(), Some("KeyError: missing"));
    assert_eq!(result.stdout.trim(), "partial");
}

#[tokio::test]
async fn test_timeout_kills_the_process() {
    let started = Instant::now();
    let result = shell_sandbox().execute("sleep 30", Duration::from_millis(300)).await;

    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.error_type, Some(ErrorType::Runtime));
    assert_eq!(result.error_message(), Some("Code execution exceeded time limit"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_interpreter_is_a_runtime_failure() {
    let sandbox = ProcessSandbox::new(SandboxConfig::local("/nonexistent/python-for-tests"));
    let result = sandbox.execute("print(1)", Duration::from_secs(5)).await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_type, Some(ErrorType::Runtime));
    assert!(result
        .error_message()
        .unwrap_or_default()
        .starts_with("Failed to execute code:"));
}

#[tokio::test]
async fn test_output_is_capped() {
    let mut config = SandboxConfig::local("sh");
    config.max_output_bytes = 16;
    let sandbox = ProcessSandbox::new(config);

    let result = sandbox
        .execute("i=0; while [ $i -lt 100 ]; do echo line; i=$((i+1)); done", Duration::from_secs(5))
        .await;

    assert!(result.is_success());
    assert!(result.stdout.ends_with("[output truncated]"));
    assert!(result.stdout.len() < 64);
}

#[tokio::test]
async fn test_connection_probe_reports_failure() {
    // `sh` cannot run `print('ok')`, so the probe must fail cleanly.
    assert!(!shell_sandbox().check_connection().await);
}
