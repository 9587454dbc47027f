// repair-pipeline-rs/src/state.rs
// Mutable record shared by every stage of one escalation.

use std::fmt;

use shared_types::{ExecutionResult, Patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Running,
    Passed,
    Failed,
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassStatus::Running => write!(f, "running"),
            PassStatus::Passed => write!(f, "success"),
            PassStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Code the escalation was started with.
    pub original_code: String,
    /// Code after the latest stage that rewrote it.
    pub code: String,
    pub version: u32,
    /// Error of the latest run; replaced when validation fails.
    pub error_type: String,
    pub error_message: String,
    pub traceback: String,
    pub execution_result: Option<ExecutionResult>,
    pub patches: Vec<Patch>,
    pub transcript: Vec<String>,
    pub reasoning: String,
    /// Validation passes used so far.
    pub passes: u32,
    pub max_passes: u32,
    pub status: PassStatus,
    pub generated_tests: Option<String>,
    pub explanation: Option<String>,
    /// Analysis judged the reviewed code correct.
    pub no_fix_needed: bool,
    /// Error the escalation was started with.
    original_error_message: String,
    reviewing_success: bool,
}

impl PipelineState {
    pub fn new(code: &str, result: &ExecutionResult, version: u32, max_passes: u32) -> Self {
        Self {
            original_code: code.to_string(),
            code: code.to_string(),
            version,
            error_type: result
                .error_type
                .map(|error_type| error_type.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            error_message: result.error_message.clone().unwrap_or_default(),
            traceback: result.traceback.clone().unwrap_or_default(),
            execution_result: Some(result.clone()),
            patches: Vec::new(),
            transcript: Vec::new(),
            reasoning: String::new(),
            passes: 0,
            max_passes: max_passes.max(1),
            status: PassStatus::Running,
            generated_tests: None,
            explanation: None,
            no_fix_needed: false,
            original_error_message: result.error_message.clone().unwrap_or_default(),
            reviewing_success: result.is_success(),
        }
    }

    /// Whether the escalation is reviewing code that ran without crashing.
    pub fn reviewing_success(&self) -> bool {
        self.reviewing_success
    }

    pub fn original_error_message(&self) -> &str {
        &self.original_error_message
    }

    pub fn trace(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(trace = %line, "pipeline stage");
        self.transcript.push(line);
    }

    /// Record a failed validation so the next stages see the new error.
    pub fn record_failure(&mut self, result: ExecutionResult) {
        self.error_type = result
            .error_type
            .map(|error_type| error_type.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.error_message = result.error_message.clone().unwrap_or_default();
        self.traceback = result.traceback.clone().unwrap_or_default();
        self.execution_result = Some(result);
        self.status = PassStatus::Failed;
    }

    pub fn passes_exhausted(&self) -> bool {
        self.passes >= self.max_passes
    }
}
