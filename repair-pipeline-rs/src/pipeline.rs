// repair-pipeline-rs/src/pipeline.rs
// Drives one escalation from Analyze to Exit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use executor::Sandbox;
use llm_service::CompletionService;
use shared_types::{unified_diff, ExecutionResult, Patch, PatchSource};
use tracing::instrument;

use crate::extract::{bounded, extract_code, is_no_fix_verdict, same_code};
use crate::stage::{next_stage, Stage, StageOutcome};
use crate::state::{PassStatus, PipelineState};
use crate::{prompts, BranchPolicy, PipelineConfig, PipelineError};

/// Default sandbox timeout for validation runs.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// What an escalation hands back to the orchestration loop.
#[derive(Debug, Clone)]
pub struct Escalation {
    pub patch: Patch,
    pub fixed_code: String,
    /// Stage trace lines, in order.
    pub transcript: Vec<String>,
    /// Whether validation passed inside the pipeline.
    pub validated: bool,
    pub explanation: Option<String>,
    pub generated_tests: Option<String>,
}

pub struct RepairPipeline {
    completion: Arc<dyn CompletionService>,
    sandbox: Arc<dyn Sandbox>,
    config: PipelineConfig,
    execution_timeout: Duration,
    passed_validations: AtomicU64,
}

impl RepairPipeline {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        sandbox: Arc<dyn Sandbox>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            completion,
            sandbox,
            config,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            passed_validations: AtomicU64::new(0),
        }
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the stages once over `code` and return the last patch produced.
    ///
    /// Returns `None` when the analysis finds nothing to fix, when the patch
    /// stage hands back the same code, or when a completion fails before a
    /// patch exists. Never returns an error.
    #[instrument(
        name = "repair_escalation",
        skip(self, code, result),
        fields(status = %result.status)
    )]
    pub async fn run_escalation(
        &self,
        code: &str,
        result: &ExecutionResult,
        version: u32,
    ) -> Option<Escalation> {
        let mut state = PipelineState::new(code, result, version, self.config.max_passes);

        if let Err(err) = self.drive(&mut state).await {
            tracing::warn!(error = %err, "repair pipeline aborted");
            return None;
        }

        let patch = state.patches.pop()?;
        Some(Escalation {
            patch,
            fixed_code: state.code,
            transcript: state.transcript,
            validated: state.status == PassStatus::Passed,
            explanation: state.explanation,
            generated_tests: state.generated_tests,
        })
    }

    async fn drive(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        let mut stage = Stage::Analyze;

        while !stage.is_terminal() {
            let outcome = match stage {
                Stage::Analyze => self.analyze(state).await?,
                Stage::Patch => self.patch(state).await?,
                Stage::Validate => self.validate(state).await,
                Stage::Refine => self.refine(state).await,
                Stage::GenerateTests => self.generate_tests(state).await,
                Stage::Explain => self.explain(state).await,
                Stage::Exit => break,
            };
            let next = next_stage(stage, outcome)?;
            tracing::debug!(from = %stage, to = %next, ?outcome, "pipeline transition");
            stage = next;
        }

        Ok(())
    }

    async fn complete(&self, stage: Stage, prompt: &str) -> Result<String, PipelineError> {
        let text = self
            .completion
            .complete(prompt)
            .await
            .map_err(|source| PipelineError::Completion { stage, source })?;
        if text.trim().is_empty() {
            return Err(PipelineError::MalformedOutput {
                stage,
                reason: "empty completion".to_string(),
            });
        }
        Ok(text)
    }

    async fn analyze(&self, state: &mut PipelineState) -> Result<StageOutcome, PipelineError> {
        let prompt = if state.reviewing_success() {
            state.trace("[Analyze] Reviewing successful code for logical errors");
            prompts::analyze_success(state)
        } else {
            state.trace(format!("[Analyze] Diagnosing {} error", state.error_type));
            prompts::analyze_failure(state)
        };

        state.reasoning = self.complete(Stage::Analyze, &prompt).await?;

        if state.reviewing_success() && is_no_fix_verdict(&state.reasoning) {
            state.trace("[Analyze] No logical errors found");
            state.no_fix_needed = true;
        }
        Ok(StageOutcome::Advance)
    }

    async fn patch(&self, state: &mut PipelineState) -> Result<StageOutcome, PipelineError> {
        if state.no_fix_needed {
            state.trace("[Patch] Skipped: analysis found nothing to fix");
            return Ok(StageOutcome::Advance);
        }

        state.trace(format!("[Patch] Generating patch for version {}", state.version));
        let prompt = if state.reviewing_success() {
            prompts::patch_logic(state)
        } else {
            prompts::patch_failure(state)
        };

        let response = self.complete(Stage::Patch, &prompt).await?;
        let fixed = extract_code(&response, &state.code);
        if same_code(&fixed, &state.code) {
            state.trace("[Patch] Completion left the code unchanged");
            return Ok(StageOutcome::Advance);
        }

        let patch = Patch::new(
            state.version,
            PatchSource::LlmPatchGenerator,
            "LLM-generated patch based on error analysis",
            unified_diff(&state.code, &fixed),
        )
        .with_error_analysis(state.reasoning.clone())
        .with_fix_strategy("Applied LLM-suggested fix")
        .with_error_category(if state.reviewing_success() {
            "logic".to_string()
        } else {
            state.error_type.clone()
        });

        state.patches.push(patch);
        state.code = fixed;
        state.version += 1;
        Ok(StageOutcome::Advance)
    }

    /// Run the patched code. Without a patch the code is the escalation
    /// input, whose result is already known, so the sandbox is not called.
    async fn validate(&self, state: &mut PipelineState) -> StageOutcome {
        let known = match (&state.execution_result, state.patches.is_empty()) {
            (Some(result), true) => Some(result.clone()),
            _ => None,
        };
        let result = match known {
            Some(result) => {
                state.trace(format!("[Validate] No patch; version {} keeps its result", state.version));
                result
            }
            None => self.sandbox.execute(&state.code, self.execution_timeout).await,
        };
        state.passes += 1;

        if result.is_success() {
            state.trace(format!("[Validate] Version {} passed", state.version));
            state.execution_result = Some(result);
            state.status = PassStatus::Passed;
            return self.pick_branch(state);
        }

        state.trace(format!(
            "[Validate] Version {} failed: {}",
            state.version,
            result.error_message().unwrap_or("no error message")
        ));
        state.record_failure(result);

        if state.passes_exhausted() {
            StageOutcome::FailedExhausted
        } else {
            StageOutcome::FailedRetry
        }
    }

    /// Only validated patches advance the alternation.
    fn pick_branch(&self, state: &PipelineState) -> StageOutcome {
        match self.config.branch_policy {
            BranchPolicy::Refine => StageOutcome::PassedRefine,
            BranchPolicy::GenerateTests => StageOutcome::PassedTests,
            BranchPolicy::Alternate => {
                let turn = if state.patches.is_empty() {
                    self.passed_validations.load(Ordering::Relaxed)
                } else {
                    self.passed_validations.fetch_add(1, Ordering::Relaxed)
                };
                if turn % 2 == 0 {
                    StageOutcome::PassedRefine
                } else {
                    StageOutcome::PassedTests
                }
            }
        }
    }

    /// Polish working code. Not re-validated; the refined text replaces the
    /// patch's target and the diff is recomputed from the escalation input.
    async fn refine(&self, state: &mut PipelineState) -> StageOutcome {
        if state.patches.is_empty() {
            state.trace("[Refine] Skipped: no patch to refine");
            return StageOutcome::Advance;
        }
        state.trace("[Refine] Refining working code");
        let response = match self.complete(Stage::Refine, &prompts::refine(state)).await {
            Ok(response) => response,
            Err(err) => {
                state.trace(format!("[Refine] Skipped: {}", err));
                return StageOutcome::Advance;
            }
        };

        let refined = extract_code(&response, &state.code);
        if same_code(&refined, &state.code) {
            return StageOutcome::Advance;
        }

        let diff = unified_diff(&state.original_code, &refined);
        if let Some(patch) = state.patches.last_mut() {
            patch.diff = diff;
            patch.source = PatchSource::LlmRefactor;
            patch.reasoning = "LLM-generated patch, refined for readability".to_string();
            state.code = refined;
        }
        StageOutcome::Advance
    }

    /// Produce illustrative tests. Advisory only; they are never executed.
    async fn generate_tests(&self, state: &mut PipelineState) -> StageOutcome {
        if state.patches.is_empty() {
            state.trace("[GenerateTests] Skipped: no patch to test");
            return StageOutcome::Advance;
        }
        state.trace("[GenerateTests] Generating test cases");
        match self.complete(Stage::GenerateTests, &prompts::generate_tests(state)).await {
            Ok(response) => {
                let tests = extract_code(&response, "");
                if !tests.is_empty() {
                    state.trace(format!("[GenerateTests] Suggested tests:\n{}", tests));
                    state.generated_tests = Some(tests);
                }
            }
            Err(err) => state.trace(format!("[GenerateTests] Skipped: {}", err)),
        }
        StageOutcome::Advance
    }

    async fn explain(&self, state: &mut PipelineState) -> StageOutcome {
        if state.patches.is_empty() {
            state.trace("[Explain] Skipped: no patch was produced");
            return StageOutcome::Advance;
        }
        state.trace("[Explain] Summarizing the repair");
        match self.complete(Stage::Explain, &prompts::explain(state)).await {
            Ok(response) => {
                let explanation = bounded(&response, self.config.explanation_max_chars);
                if let Some(patch) = state.patches.last_mut() {
                    let analysis = patch.error_analysis.take().unwrap_or_default();
                    patch.error_analysis = Some(format!("{}\n\n{}", analysis, explanation).trim().to_string());
                }
                state.reasoning = format!("{}\n\n{}", state.reasoning, explanation);
                state.trace(format!("[Explain] {}", explanation));
                state.explanation = Some(explanation);
            }
            Err(err) => state.trace(format!("[Explain] Skipped: {}", err)),
        }
        StageOutcome::Advance
    }
}
