// orchestrator-service-rs/src/tests.rs
// Loop behavior against a scripted sandbox and a mocked completion service.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use executor::Sandbox;
use llm_service::{CompletionService, LLMError};
use mockall::mock;
use pretty_assertions::assert_eq;
use repair_pipeline::{PipelineConfig, RepairPipeline};
use shared_types::{DebugSession, ErrorType, ExecutionResult, PatchSource, SessionStatus};
use tokio::sync::Mutex;

use super::*;

mock! {
    pub Completion {}

    #[async_trait]
    impl CompletionService for Completion {
        async fn complete(&self, prompt: &str) -> Result<String, LLMError>;
    }
}

/// Replays queued results, then keeps returning `fallback`.
struct ScriptedSandbox {
    results: Mutex<VecDeque<ExecutionResult>>,
    fallback: ExecutionResult,
    executed: Mutex<Vec<String>>,
}

impl ScriptedSandbox {
    fn new(results: Vec<ExecutionResult>) -> Arc<Self> {
        Self::with_fallback(results, ExecutionResult::success(""))
    }

    fn with_fallback(results: Vec<ExecutionResult>, fallback: ExecutionResult) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            fallback,
            executed: Mutex::new(Vec::new()),
        })
    }

    async fn executed(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(&self, code: &str, _timeout: Duration) -> ExecutionResult {
        self.executed.lock().await.push(code.to_string());
        self.results
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn no_completions() -> MockCompletion {
    let mut completion = MockCompletion::new();
    completion.expect_complete().never();
    completion
}

fn orchestrator(
    completion: MockCompletion,
    sandbox: Arc<ScriptedSandbox>,
    max_iterations: u32,
) -> HybridOrchestrator {
    let pipeline = RepairPipeline::new(Arc::new(completion), sandbox.clone(), PipelineConfig::default());
    let config = OrchestratorConfig {
        max_iterations,
        execution_timeout: Duration::from_secs(5),
    };
    HybridOrchestrator::new(sandbox, pipeline, config)
}

fn syntax_failure(message: &str) -> ExecutionResult {
    ExecutionResult::failure(
        "",
        format!("  File \"main.py\", line 1\n{}", message),
        1,
        ErrorType::Syntax,
        message,
    )
}

fn runtime_failure(message: &str) -> ExecutionResult {
    ExecutionResult::failure(
        "",
        format!("Traceback (most recent call last):\n{}", message),
        1,
        ErrorType::Runtime,
        message,
    )
}

async fn repair(orchestrator: &HybridOrchestrator, code: &str) -> DebugSession {
    let started = orchestrator.start_session(code, None).await.expect("session starts");
    orchestrator
        .run_loop(started.session_id())
        .await
        .expect("loop runs");
    orchestrator
        .get_session(started.session_id())
        .await
        .expect("session is registered")
}

fn assert_versions_track_patches(session: &DebugSession) {
    assert_eq!(session.versions().len(), session.patches().len() + 1);
    assert!(session.current_iteration() <= session.max_iterations());
    assert_eq!(
        session.current_version(),
        session.latest_version().version
    );
}

#[tokio::test]
async fn missing_colon_converges_with_one_rule_patch() {
    let code = "if x > 0\n    print(x)";
    let sandbox = ScriptedSandbox::new(vec![
        syntax_failure("SyntaxError: expected ':'"),
        ExecutionResult::success("1\n"),
    ]);
    let orchestrator = orchestrator(no_completions(), sandbox.clone(), 10);

    let session = repair(&orchestrator, code).await;

    assert_eq!(session.status(), SessionStatus::Success);
    assert_eq!(session.current_iteration(), 1);
    assert_eq!(session.patches().len(), 1);
    let patch = &session.patches()[0];
    assert_eq!(patch.source, PatchSource::RuleBased);
    assert!(patch.applied);
    assert_eq!((patch.version_from, patch.version_to), (0, 1));
    assert_eq!(session.final_code(), Some("if x > 0:\n    print(x)"));
    assert!(session.completed_at().is_some());
    assert_eq!(
        session.traces().last().map(String::as_str),
        Some("[Success] Code fixed! Final version: 1")
    );
    assert_eq!(sandbox.executed().await, vec![code.to_string(), "if x > 0:\n    print(x)".to_string()]);
    assert_versions_track_patches(&session);
}

#[tokio::test]
async fn zero_division_guard_is_inserted_before_the_division() {
    let code = "def divide(a, b):\n    return a / b\n\nprint(divide(1, 0))";
    let sandbox = ScriptedSandbox::new(vec![
        runtime_failure("ZeroDivisionError: division by zero"),
        runtime_failure("ValueError: Cannot divide by zero"),
    ]);
    let orchestrator = orchestrator(no_completions(), sandbox, 1);

    let session = repair(&orchestrator, code).await;

    assert_eq!(session.status(), SessionStatus::MaxIterations);
    assert_eq!(session.patches().len(), 1);
    assert_eq!(
        session.latest_version().code,
        "def divide(a, b):\n    if b == 0:\n        raise ValueError(\"Cannot divide by zero\")\n    return a / b\n\nprint(divide(1, 0))"
    );
    assert!(session.final_code().is_none());
    assert_versions_track_patches(&session);
}

#[tokio::test]
async fn working_code_is_always_reviewed_by_the_pipeline() {
    let code = "def search(items, target):\n    low, high = 0, len(items) - 1\n    while low <= high:\n        mid = (low + high) // 2\n        if items[mid] < target:\n            low = mid\n        else:\n            high = mid - 1\n    return low";
    let fixed = code.replace("low = mid\n", "low = mid + 1\n");
    let reply = format!("```python\n{}\n```", fixed);

    let mut completion = MockCompletion::new();
    completion.expect_complete().times(4).returning(move |prompt| {
        Ok(if prompt.contains("FIXED CODE:") {
            reply.clone()
        } else if prompt.contains("expert at writing Python tests") {
            "```python\nassert search([1, 2, 3], 3) == 2\n```".to_string()
        } else if prompt.contains("Summarize this repair") {
            "low now moves past mid.".to_string()
        } else {
            "Logic error: low = mid never advances.".to_string()
        })
    });
    let sandbox = ScriptedSandbox::new(vec![ExecutionResult::success("")]);
    let orchestrator = orchestrator(completion, sandbox, 10);

    let session = repair(&orchestrator, code).await;

    assert_eq!(session.status(), SessionStatus::Success);
    assert_eq!(session.patches().len(), 1);
    let patch = &session.patches()[0];
    assert_eq!(patch.source, PatchSource::LlmPatchGenerator);
    assert_eq!(patch.error_category.as_deref(), Some("logic"));
    assert_eq!(session.final_code(), Some(fixed.as_str()));
    assert!(session
        .traces()
        .iter()
        .any(|line| line.starts_with("[Strategy] First execution successful")));
    assert!(session
        .traces()
        .iter()
        .any(|line| line.starts_with("[Analyze] Reviewing successful code")));
    assert!(!session
        .traces()
        .iter()
        .any(|line| line.contains("rule-based")));
    assert_versions_track_patches(&session);
}

#[tokio::test]
async fn review_without_a_patch_verifies_the_code() {
    let mut completion = MockCompletion::new();
    completion
        .expect_complete()
        .times(1)
        .returning(|_| Ok("NONE - Code is correct".to_string()));
    let sandbox = ScriptedSandbox::new(vec![ExecutionResult::success("3\n")]);
    let orchestrator = orchestrator(completion, sandbox, 10);

    let session = repair(&orchestrator, "print(1 + 2)").await;

    assert_eq!(session.status(), SessionStatus::Success);
    assert!(session.patches().is_empty());
    assert_eq!(session.final_code(), Some("print(1 + 2)"));
    assert_eq!(
        session.traces().last().map(String::as_str),
        Some("[Analysis Complete] Repair pipeline verified the code is logically correct")
    );
    assert_versions_track_patches(&session);
}

#[tokio::test]
async fn unmatched_error_with_failing_completion_fails_the_session() {
    let mut completion = MockCompletion::new();
    completion
        .expect_complete()
        .times(1)
        .returning(|_| Err(LLMError::ServerError("upstream unavailable".to_string())));
    let sandbox = ScriptedSandbox::new(vec![runtime_failure("RuntimeError: boom")]);
    let orchestrator = orchestrator(completion, sandbox, 10);

    let session = repair(&orchestrator, "raise RuntimeError('boom')").await;

    assert_eq!(session.status(), SessionStatus::Failed);
    assert_eq!(session.current_iteration(), 1);
    assert!(session.patches().is_empty());
    assert!(session.final_code().is_none());
    assert!(session.completed_at().is_some());
    let traces = session.traces();
    assert!(traces.iter().any(|line| line == "[Strategy] Attempting rule-based fix..."));
    assert!(traces
        .iter()
        .any(|line| line.starts_with("[Strategy] Rule-based fix not applicable")));
    assert_eq!(
        traces.last().map(String::as_str),
        Some("[Failed] Unable to generate patch")
    );
}

#[tokio::test]
async fn unfixable_code_stops_at_the_iteration_budget() {
    let mut attempt = 0;
    let mut completion = MockCompletion::new();
    // analyze, patch, explain per escalation; validation never passes
    completion.expect_complete().times(9).returning(move |prompt| {
        if prompt.contains("FIXED CODE:") {
            attempt += 1;
            Ok(format!("```python\nraise RuntimeError('attempt {}')\n```", attempt))
        } else {
            Ok("Still broken.".to_string())
        }
    });
    let sandbox = ScriptedSandbox::with_fallback(Vec::new(), runtime_failure("RuntimeError: boom"));
    let orchestrator = orchestrator(completion, sandbox.clone(), 3);

    let session = repair(&orchestrator, "raise RuntimeError('boom')").await;

    assert_eq!(session.status(), SessionStatus::MaxIterations);
    assert_eq!(session.current_iteration(), 3);
    assert_eq!(session.patches().len(), 3);
    assert_eq!(
        session.traces().last().map(String::as_str),
        Some("[Max Iterations] Reached maximum of 3 iterations")
    );
    // initial run, then one validation and one application per iteration
    assert_eq!(sandbox.executed().await.len(), 7);
    assert_versions_track_patches(&session);
}

#[tokio::test]
async fn pipeline_transcript_is_copied_into_the_session_trace() {
    let mut completion = MockCompletion::new();
    completion.expect_complete().times(4).returning(|prompt| {
        Ok(if prompt.contains("FIXED CODE:") {
            "```python\nprint('ok')\n```".to_string()
        } else if prompt.contains("expert at writing Python tests") {
            "```python\nassert True\n```".to_string()
        } else {
            "Explanation.".to_string()
        })
    });
    let sandbox = ScriptedSandbox::new(vec![runtime_failure("RuntimeError: boom")]);
    let orchestrator = orchestrator(completion, sandbox, 10);

    let session = repair(&orchestrator, "raise RuntimeError('boom')").await;

    assert_eq!(session.status(), SessionStatus::Success);
    let traces = session.traces();
    let analyze = traces
        .iter()
        .position(|line| line.starts_with("[Analyze] Diagnosing runtime error"))
        .expect("analyze line is traced");
    let generated = traces
        .iter()
        .position(|line| line.starts_with("[Patch Generated] Source: llm_patch_generator"))
        .expect("patch line is traced");
    assert!(analyze < generated);
}

#[tokio::test]
async fn start_session_records_the_initial_execution() {
    let sandbox = ScriptedSandbox::new(vec![syntax_failure("SyntaxError: expected ':'")]);
    let orchestrator = orchestrator(no_completions(), sandbox.clone(), 4);

    let started = orchestrator
        .start_session("if x\n    pass", None)
        .await
        .expect("session starts");

    assert_eq!(started.status(), SessionStatus::Running);
    assert_eq!(started.current_iteration(), 0);
    assert_eq!(started.max_iterations(), 4);
    assert!(started.patches().is_empty());
    assert_eq!(started.versions().len(), 1);
    assert_eq!(
        started.traces()[0],
        format!("[Session Created] ID: {}", started.session_id())
    );
    assert_eq!(sandbox.executed().await.len(), 1);

    let summary = orchestrator
        .get_status_summary(started.session_id())
        .await
        .expect("session is registered");
    assert_eq!(summary.latest_trace.as_deref(), Some("[Initial Execution] Status: error"));
}

#[tokio::test]
async fn explicit_budget_overrides_the_configured_one() {
    let sandbox = ScriptedSandbox::new(vec![ExecutionResult::success("")]);
    let orchestrator = orchestrator(no_completions(), sandbox, 10);

    let started = orchestrator.start_session("print(1)", Some(2)).await.expect("session starts");
    assert_eq!(started.max_iterations(), 2);
    assert!(started
        .traces()
        .last()
        .is_some_and(|line| line.starts_with("[Analysis] Code executed successfully")));
}

#[tokio::test]
async fn zero_iteration_budget_is_rejected_before_running_the_code() {
    let sandbox = ScriptedSandbox::new(Vec::new());
    let orchestrator = orchestrator(no_completions(), sandbox.clone(), 3);

    assert_eq!(
        orchestrator.start_session("print(1)", Some(0)).await.err(),
        Some(OrchestratorError::InvalidIterationBudget(0))
    );
    assert!(sandbox.executed().await.is_empty());
    assert!(orchestrator.registry().is_empty().await);
}

#[tokio::test]
async fn unknown_session_is_reported() {
    let orchestrator = orchestrator(no_completions(), ScriptedSandbox::new(Vec::new()), 3);

    assert_eq!(
        orchestrator.run_loop("missing").await,
        Err(OrchestratorError::SessionNotFound("missing".to_string()))
    );
    assert!(orchestrator.get_session("missing").await.is_none());
    assert!(orchestrator.get_status_summary("missing").await.is_none());
}

#[tokio::test]
async fn a_session_is_driven_by_one_loop_at_a_time() {
    let sandbox = ScriptedSandbox::new(vec![syntax_failure("SyntaxError: expected ':'")]);
    let orchestrator = orchestrator(no_completions(), sandbox, 3);
    let started = orchestrator
        .start_session("if x\n    pass", None)
        .await
        .expect("session starts");
    let session_id = started.session_id();

    let claim = orchestrator.registry().claim_loop(session_id);
    assert!(claim.is_some());
    assert_eq!(
        orchestrator.run_loop(session_id).await,
        Err(OrchestratorError::LoopAlreadyRunning(session_id.to_string()))
    );
}

#[tokio::test]
async fn finished_sessions_are_left_alone() {
    let sandbox = ScriptedSandbox::new(vec![
        syntax_failure("SyntaxError: expected ':'"),
        ExecutionResult::success(""),
    ]);
    let orchestrator = orchestrator(no_completions(), sandbox.clone(), 3);
    let session = repair(&orchestrator, "if x\n    pass").await;
    let traces = session.traces().len();

    let status = orchestrator
        .run_loop(session.session_id())
        .await
        .expect("loop can be re-entered");

    assert_eq!(status, SessionStatus::Success);
    let again = orchestrator
        .get_session(session.session_id())
        .await
        .expect("session is registered");
    assert_eq!(again.traces().len(), traces);
    assert_eq!(sandbox.executed().await.len(), 2);
}

#[tokio::test]
async fn spawned_loop_can_be_polled_to_completion() {
    let sandbox = ScriptedSandbox::new(vec![
        syntax_failure("SyntaxError: expected ':'"),
        ExecutionResult::success(""),
    ]);
    let orchestrator = Arc::new(orchestrator(no_completions(), sandbox, 3));
    let started = orchestrator
        .start_session("if x\n    pass", None)
        .await
        .expect("session starts");

    let handle = orchestrator.spawn_loop(started.session_id());
    assert_eq!(handle.await.expect("task joins"), Ok(SessionStatus::Success));

    let polled = orchestrator
        .get_status_summary(started.session_id())
        .await
        .expect("session is registered");
    assert_eq!(polled.status, SessionStatus::Success);
    assert_eq!(polled.total_patches, 1);
    assert_eq!(polled.current_version, 1);
}

/// Answers the first run, then panics on every later one.
#[derive(Default)]
struct CrashingSandbox {
    runs: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl Sandbox for CrashingSandbox {
    async fn execute(&self, _code: &str, _timeout: Duration) -> ExecutionResult {
        if self.runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst) > 0 {
            panic!("sandbox crashed");
        }
        syntax_failure("SyntaxError: expected ':'")
    }
}

#[tokio::test]
async fn a_loop_that_panics_can_be_restarted() {
    let sandbox: Arc<dyn Sandbox> = Arc::new(CrashingSandbox::default());
    let pipeline = RepairPipeline::new(Arc::new(no_completions()), Arc::clone(&sandbox), PipelineConfig::default());
    let orchestrator = Arc::new(HybridOrchestrator::new(sandbox, pipeline, OrchestratorConfig::default()));
    let started = orchestrator
        .start_session("if x\n    pass", None)
        .await
        .expect("session starts");
    let session_id = started.session_id();

    let joined = orchestrator.spawn_loop(session_id).await;

    assert!(joined.expect_err("the sandbox panics").is_panic());
    assert!(!orchestrator.registry().is_loop_running(session_id));
    assert!(orchestrator.registry().claim_loop(session_id).is_some());
}

#[test]
fn client_construction_failure_is_an_orchestrator_error() {
    let err = OrchestratorError::from(LLMError::UnknownError("failed to build HTTP client: no TLS".to_string()));

    assert!(matches!(err, OrchestratorError::CompletionClient(LLMError::UnknownError(_))));
    assert_eq!(
        err.to_string(),
        "completion client unavailable: Unknown error: failed to build HTTP client: no TLS"
    );
}

#[test]
fn default_config_matches_documented_values() {
    let config = OrchestratorConfig::default();
    assert_eq!(config.max_iterations, 10);
    assert_eq!(config.execution_timeout, Duration::from_secs(10));
}
