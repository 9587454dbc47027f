// shared-types-rs/src/session.rs
// The DebugSession aggregate root.
//
// Invariants held by construction (fields are private, mutation goes through
// the methods below):
// - versions.len() == patches.len() + 1
// - current_version is the version number of the last element of versions
// - status only moves from Running to one terminal status, never back
// - current_iteration <= max_iterations

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CodeVersion, ExecutionResult, Patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Success,
    Failed,
    MaxIterations,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Success => "success",
            SessionStatus::Failed => "failed",
            SessionStatus::MaxIterations => "max_iterations",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed with status {0}")]
    Closed(SessionStatus),
}

/// Compact view of a session for pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub current_version: u32,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub total_patches: usize,
    pub latest_trace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugSession {
    session_id: String,
    original_code: String,
    current_version: u32,
    versions: Vec<CodeVersion>,
    patches: Vec<Patch>,
    traces: Vec<String>,
    max_iterations: u32,
    current_iteration: u32,
    status: SessionStatus,
    final_code: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl DebugSession {
    /// Create a running session whose version 0 is the submitted code.
    pub fn new(
        session_id: impl Into<String>,
        original_code: impl Into<String>,
        max_iterations: u32,
        initial_result: Option<ExecutionResult>,
    ) -> Self {
        let original_code = original_code.into();
        let initial = CodeVersion::new(0, original_code.clone(), initial_result);

        Self {
            session_id: session_id.into(),
            original_code,
            current_version: 0,
            versions: vec![initial],
            patches: Vec::new(),
            traces: Vec::new(),
            max_iterations,
            current_iteration: 0,
            status: SessionStatus::Running,
            final_code: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn original_code(&self) -> &str {
        &self.original_code
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn versions(&self) -> &[CodeVersion] {
        &self.versions
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn traces(&self) -> &[String] {
        &self.traces
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn final_code(&self) -> Option<&str> {
        self.final_code.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn latest_version(&self) -> &CodeVersion {
        // versions is never empty: version 0 is created in `new`.
        &self.versions[self.versions.len() - 1]
    }

    pub fn trace(&mut self, line: impl Into<String>) {
        self.traces.push(line.into());
    }

    /// Advance the iteration counter unless the budget is spent.
    ///
    /// Returns `false` (without incrementing) once `max_iterations` attempts
    /// have been made.
    pub fn begin_iteration(&mut self) -> Result<bool, SessionError> {
        self.ensure_running()?;
        if self.current_iteration >= self.max_iterations {
            return Ok(false);
        }
        self.current_iteration += 1;
        Ok(true)
    }

    /// Accept a patch: mark it applied, record it together with the version
    /// it produces, and move the current-version pointer forward.
    ///
    /// The patch's version numbers are rewritten to the session's own
    /// numbering so provenance always lines up with `versions`.
    pub fn apply_patch(
        &mut self,
        mut patch: Patch,
        code: impl Into<String>,
        execution_result: ExecutionResult,
    ) -> Result<&CodeVersion, SessionError> {
        self.ensure_running()?;

        let next = self.current_version + 1;
        patch.version_from = self.current_version;
        patch.version_to = next;
        patch.applied = true;

        self.patches.push(patch);
        self.versions
            .push(CodeVersion::new(next, code, Some(execution_result)));
        self.current_version = next;

        Ok(self.latest_version())
    }

    /// Move to a terminal status. Returns `false` when the session had
    /// already terminated or `status` is `Running`.
    pub fn finish(&mut self, status: SessionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }

        if status == SessionStatus::Success {
            self.final_code = Some(self.latest_version().code.clone());
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            session_id: self.session_id.clone(),
            status: self.status,
            current_version: self.current_version,
            current_iteration: self.current_iteration,
            max_iterations: self.max_iterations,
            total_patches: self.patches.len(),
            latest_trace: self.traces.last().cloned(),
        }
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::Closed(self.status));
        }
        Ok(())
    }
}
