//! Repair Pipeline Library
//! Completion-backed repair as an explicit state machine:
//! Analyze -> Patch -> Validate -> (Refine | GenerateTests) -> Explain -> Exit.
//!
//! Stages share one `PipelineState`. Edges between stages are a static
//! table in `stage.rs`; a stage reports an outcome and the table decides
//! where control goes next.

mod config;
mod extract;
mod pipeline;
mod prompts;
mod stage;
mod state;

pub use config::{BranchPolicy, PipelineConfig};
pub use extract::{extract_code, is_no_fix_verdict};
pub use pipeline::{Escalation, RepairPipeline, DEFAULT_EXECUTION_TIMEOUT};
pub use stage::{next_stage, Stage, StageOutcome};
pub use state::{PassStatus, PipelineState};

use llm_service::LLMError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("completion failed during {stage}: {source}")]
    Completion {
        stage: Stage,
        #[source]
        source: LLMError,
    },

    #[error("unusable completion output during {stage}: {reason}")]
    MalformedOutput { stage: Stage, reason: String },

    #[error("no transition from {stage} on {outcome:?}")]
    InvalidTransition { stage: Stage, outcome: StageOutcome },
}
