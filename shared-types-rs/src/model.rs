// shared-types-rs/src/model.rs
// Execution results, code versions and patches.
//
// Every value in this module is produced once and treated as immutable by
// its consumers; the only field that changes after construction is
// `Patch::applied`, which the orchestration loop sets upon acceptance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed taxonomy of failure classes reported by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Syntax,
    Import,
    Name,
    Type,
    Attribute,
    Index,
    Key,
    Value,
    Runtime,
    Logic,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Syntax => "syntax",
            ErrorType::Import => "import",
            ErrorType::Name => "name",
            ErrorType::Type => "type",
            ErrorType::Attribute => "attribute",
            ErrorType::Index => "index",
            ErrorType::Key => "key",
            ErrorType::Value => "value",
            ErrorType::Runtime => "runtime",
            ErrorType::Logic => "logic",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Error => write!(f, "error"),
            ExecutionStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of running one piece of source text through the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
    pub status: ExecutionStatus,
    pub error_type: Option<ErrorType>,
    pub error_message: Option<String>,
    pub traceback: Option<String>,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            status: ExecutionStatus::Success,
            error_type: None,
            error_message: None,
            traceback: None,
        }
    }

    /// A failed run carrying its classification, message and full trace.
    pub fn failure(
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
        error_type: ErrorType,
        error_message: impl Into<String>,
    ) -> Self {
        let stderr = stderr.into();
        let traceback = if stderr.is_empty() {
            None
        } else {
            Some(stderr.clone())
        };

        Self {
            stdout: stdout.into(),
            stderr,
            exit_code,
            status: ExecutionStatus::Error,
            error_type: Some(error_type),
            error_message: Some(error_message.into()),
            traceback,
        }
    }

    pub fn timeout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: "Execution timed out".to_string(),
            exit_code: -1,
            status: ExecutionStatus::Timeout,
            error_type: Some(ErrorType::Runtime),
            error_message: Some("Code execution exceeded time limit".to_string()),
            traceback: None,
        }
    }

    /// Failure raised inside the sandbox itself rather than by the code.
    pub fn internal_failure(reason: impl fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: reason.to_string(),
            exit_code: -1,
            status: ExecutionStatus::Error,
            error_type: Some(ErrorType::Runtime),
            error_message: Some(format!("Failed to execute code: {}", reason)),
            traceback: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// The error message, if one was reported and it is not blank.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .filter(|message| !message.trim().is_empty())
    }
}

/// Immutable snapshot of the code at one point of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeVersion {
    pub version: u32,
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub execution_result: Option<ExecutionResult>,
}

impl CodeVersion {
    pub fn new(version: u32, code: impl Into<String>, execution_result: Option<ExecutionResult>) -> Self {
        Self {
            version,
            code: code.into(),
            timestamp: Utc::now(),
            execution_result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.execution_result
            .as_ref()
            .map(ExecutionResult::is_success)
            .unwrap_or(false)
    }
}

/// Which strategy produced a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchSource {
    RuleBased,
    LlmErrorInterpreter,
    LlmPatchGenerator,
    LlmValidator,
    LlmRefactor,
    LlmTestCreator,
}

impl PatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchSource::RuleBased => "rule_based",
            PatchSource::LlmErrorInterpreter => "llm_error_interpreter",
            PatchSource::LlmPatchGenerator => "llm_patch_generator",
            PatchSource::LlmValidator => "llm_validator",
            PatchSource::LlmRefactor => "llm_refactor",
            PatchSource::LlmTestCreator => "llm_test_creator",
        }
    }

    pub fn is_generative(&self) -> bool {
        !matches!(self, PatchSource::RuleBased)
    }
}

impl fmt::Display for PatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transition between two code versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub patch_id: String,
    pub version_from: u32,
    pub version_to: u32,
    pub source: PatchSource,
    pub reasoning: String,
    pub diff: String,
    pub timestamp: DateTime<Utc>,
    pub applied: bool,
    pub error_analysis: Option<String>,
    pub fix_strategy: Option<String>,
    pub error_category: Option<String>,
}

impl Patch {
    pub fn new(
        version_from: u32,
        source: PatchSource,
        reasoning: impl Into<String>,
        diff: impl Into<String>,
    ) -> Self {
        Self {
            patch_id: Uuid::new_v4().to_string(),
            version_from,
            version_to: version_from + 1,
            source,
            reasoning: reasoning.into(),
            diff: diff.into(),
            timestamp: Utc::now(),
            applied: false,
            error_analysis: None,
            fix_strategy: None,
            error_category: None,
        }
    }

    pub fn with_error_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.error_analysis = Some(analysis.into());
        self
    }

    pub fn with_fix_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.fix_strategy = Some(strategy.into());
        self
    }

    pub fn with_error_category(mut self, category: impl Into<String>) -> Self {
        self.error_category = Some(category.into());
        self
    }
}
