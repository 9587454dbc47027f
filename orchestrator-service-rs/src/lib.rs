//! Orchestrator Library
//! Owns repair sessions and drives each one through the hybrid loop:
//! cheap deterministic rules first, the generative repair pipeline when no
//! rule applies or when working code needs a logic review.
//!
//! Sessions live in a [`SessionRegistry`] owned by the orchestrator. A
//! session is created synchronously by [`HybridOrchestrator::start_session`]
//! and driven to a terminal status by [`HybridOrchestrator::run_loop`],
//! usually on a background task from [`HybridOrchestrator::spawn_loop`].

mod config;
mod hybrid;
mod registry;

pub use config::{OrchestratorConfig, DEFAULT_EXECUTION_TIMEOUT_SECS, DEFAULT_MAX_ITERATIONS};
pub use hybrid::HybridOrchestrator;
pub use registry::{LoopClaim, SessionRegistry, SharedSession};

use std::sync::Arc;

use executor::{ProcessSandbox, Sandbox};
use llm_service::{CompletionService, LLMClient, LLMError};
use repair_pipeline::{PipelineConfig, RepairPipeline};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("repair loop already running for session {0}")]
    LoopAlreadyRunning(String),

    #[error("max iterations must be at least 1, got {0}")]
    InvalidIterationBudget(u32),

    #[error("completion client unavailable: {0}")]
    CompletionClient(#[from] LLMError),
}

impl HybridOrchestrator {
    /// Wire the process sandbox, the HTTP completion client and the pipeline
    /// from environment configuration.
    pub fn from_env() -> Result<Self, OrchestratorError> {
        Self::from_config(OrchestratorConfig::from_env())
    }

    /// Like [`from_env`](Self::from_env) with an explicit loop configuration.
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let client = LLMClient::from_env()?;
        if !client.is_configured() {
            log::warn!("LLM_API_KEY is not set; escalations will produce no patches");
        }

        let sandbox: Arc<dyn Sandbox> = Arc::new(ProcessSandbox::from_env());
        let completion: Arc<dyn CompletionService> = Arc::new(client);
        let pipeline = RepairPipeline::new(completion, Arc::clone(&sandbox), PipelineConfig::from_env());

        Ok(Self::new(sandbox, pipeline, config))
    }
}

#[cfg(test)]
mod tests;
