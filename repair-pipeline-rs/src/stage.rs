// repair-pipeline-rs/src/stage.rs
// Stages of the repair pipeline and the table of legal transitions.

use std::fmt;

use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Analyze,
    Patch,
    Validate,
    Refine,
    GenerateTests,
    Explain,
    Exit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Patch => "patch",
            Stage::Validate => "validate",
            Stage::Refine => "refine",
            Stage::GenerateTests => "generate_tests",
            Stage::Explain => "explain",
            Stage::Exit => "exit",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Exit)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage reports when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOutcome {
    /// The stage did its work; follow the single forward edge.
    Advance,
    /// Validation passed and the policy picked Refine.
    PassedRefine,
    /// Validation passed and the policy picked GenerateTests.
    PassedTests,
    /// Validation failed with passes left: hand control back to the caller.
    FailedRetry,
    /// Validation failed and the pass budget is spent.
    FailedExhausted,
}

const TRANSITIONS: &[(Stage, StageOutcome, Stage)] = &[
    (Stage::Analyze, StageOutcome::Advance, Stage::Patch),
    (Stage::Patch, StageOutcome::Advance, Stage::Validate),
    (Stage::Validate, StageOutcome::PassedRefine, Stage::Refine),
    (Stage::Validate, StageOutcome::PassedTests, Stage::GenerateTests),
    (Stage::Validate, StageOutcome::FailedRetry, Stage::Exit),
    (Stage::Validate, StageOutcome::FailedExhausted, Stage::Explain),
    (Stage::Refine, StageOutcome::Advance, Stage::Explain),
    (Stage::GenerateTests, StageOutcome::Advance, Stage::Explain),
    (Stage::Explain, StageOutcome::Advance, Stage::Exit),
];

/// The stage that follows `stage` when it reports `outcome`.
pub fn next_stage(stage: Stage, outcome: StageOutcome) -> Result<Stage, PipelineError> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == stage && *on == outcome)
        .map(|(_, _, to)| *to)
        .ok_or(PipelineError::InvalidTransition { stage, outcome })
}
