use super::*;
use crate::execution_logic::{to_execution_result, truncate_output, RawOutput};
use shared_types::{ErrorType, ExecutionStatus};

const NAME_ERROR_TRACE: &str = "Traceback (most recent call last):\n  \
File \"main.py\", line 1, in <module>\n    prnt('x')\nNameError: name 'prnt' is not defined\n";

#[test]
fn test_last_line_decides_class() {
    let (error_type, message) = classify_stderr(NAME_ERROR_TRACE);
    assert_eq!(error_type, ErrorType::Name);
    assert_eq!(message, "NameError: name 'prnt' is not defined");
}

#[test]
fn test_taxonomy_mapping() {
    let cases = [
        ("  File \"x\", line 1\n    if x\n        ^\nSyntaxError: expected ':'", ErrorType::Syntax),
        ("IndentationError: expected an indented block", ErrorType::Syntax),
        ("ModuleNotFoundError: No module named 'numpyy'", ErrorType::Import),
        ("TypeError: can only concatenate str (not \"int\") to str", ErrorType::Type),
        ("AttributeError: 'tuple' object has no attribute 'append'", ErrorType::Attribute),
        ("IndexError: list index out of range", ErrorType::Index),
        ("KeyError: 'age'", ErrorType::Key),
        ("ValueError: invalid literal for int() with base 10: 'abc'", ErrorType::Value),
        ("ZeroDivisionError: division by zero", ErrorType::Runtime),
        ("RecursionError: maximum recursion depth exceeded", ErrorType::Runtime),
    ];

    for (stderr, expected) in cases {
        assert_eq!(classify_stderr(stderr).0, expected, "stderr: {}", stderr);
    }
}

#[test]
fn test_trailing_blank_lines_are_ignored() {
    let (error_type, message) = classify_stderr("KeyError: 'k'\n\n   \n");
    assert_eq!(error_type, ErrorType::Key);
    assert_eq!(message, "KeyError: 'k'");
}

#[test]
fn test_blank_stderr_is_unknown() {
    assert_eq!(classify_stderr(""), (ErrorType::Unknown, String::new()));
    assert_eq!(classify_stderr(" \n\n"), (ErrorType::Unknown, String::new()));
}

#[test]
fn test_success_requires_clean_exit_and_empty_stderr() {
    let ok = to_execution_result(RawOutput {
        stdout: "42\n".to_string(),
        stderr: String::new(),
        exit_code: 0,
    });
    assert!(ok.is_success());
    assert_eq!(ok.stdout, "42\n");
    assert_eq!(ok.error_type, None);

    let warned = to_execution_result(RawOutput {
        stdout: String::new(),
        stderr: "DeprecationWarning: old api".to_string(),
        exit_code: 0,
    });
    assert_eq!(warned.status, ExecutionStatus::Error);
    assert_eq!(warned.error_type, Some(ErrorType::Runtime));
}

#[test]
fn test_failure_keeps_full_trace() {
    let result = to_execution_result(RawOutput {
        stdout: "partial\n".to_string(),
        stderr: NAME_ERROR_TRACE.to_string(),
        exit_code: 1,
    });

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_type, Some(ErrorType::Name));
    assert_eq!(result.traceback.as_deref(), Some(NAME_ERROR_TRACE));
    assert_eq!(result.stdout, "partial\n");
}

#[test]
fn test_silent_failure_reports_exit_code() {
    let result = to_execution_result(RawOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: 3,
    });

    assert_eq!(result.error_type, Some(ErrorType::Unknown));
    assert_eq!(result.error_message(), Some("Process exited with code 3"));
}

#[test]
fn test_truncate_output_respects_char_boundaries() {
    assert_eq!(truncate_output("short".to_string(), 10), "short");

    let text = "é".repeat(10);
    let truncated = truncate_output(text, 5);
    assert!(truncated.starts_with("éé"));
    assert!(truncated.ends_with("[output truncated]"));
}

#[test]
fn test_docker_args_isolate_the_run() {
    let config = SandboxConfig::default();
    let args = docker_args(&config, "repair-sandbox-test");

    assert_eq!(&args[..3], &["run", "--rm", "-i"]);
    assert!(args.windows(2).any(|pair| pair == ["--network", "none"]));
    assert!(args.windows(2).any(|pair| pair == ["--memory", "256m"]));
    assert!(args.windows(2).any(|pair| pair == ["--name", "repair-sandbox-test"]));
    assert_eq!(&args[args.len() - 3..], &["python:3.11-slim", "python", "-"]);
}

#[test]
fn test_sandbox_mode_parsing() {
    assert_eq!("docker".parse::<SandboxMode>(), Ok(SandboxMode::Docker));
    assert_eq!(" LOCAL ".parse::<SandboxMode>(), Ok(SandboxMode::Local));
    assert!("vm".parse::<SandboxMode>().is_err());
}

#[test]
fn test_local_config_keeps_other_defaults() {
    let config = SandboxConfig::local("/usr/bin/python3");
    assert_eq!(config.mode, SandboxMode::Local);
    assert_eq!(config.python_bin, "/usr/bin/python3");
    assert_eq!(config.max_output_bytes, SandboxConfig::default().max_output_bytes);
}
