// orchestrator-service-rs/src/hybrid.rs
// The hybrid repair loop: rule engine first, generative pipeline on escalation.

use std::sync::Arc;

use executor::Sandbox;
use repair_pipeline::RepairPipeline;
use rule_engine::RuleEngine;
use shared_types::{
    apply_or_original, CodeVersion, DebugSession, Patch, SessionStatus, StatusSummary,
};
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

use crate::registry::{SessionRegistry, SharedSession};
use crate::{OrchestratorConfig, OrchestratorError};

/// A candidate fix ready to be executed and recorded.
struct Proposal {
    patch: Patch,
    /// Full replacement text. Empty means the diff has to be replayed.
    code: String,
    /// Pipeline stage lines to copy into the session trace.
    transcript: Vec<String>,
}

/// What one pass of the loop decided.
enum Step {
    Continue,
    Done,
}

pub struct HybridOrchestrator {
    sandbox: Arc<dyn Sandbox>,
    rules: RuleEngine,
    pipeline: Arc<RepairPipeline>,
    registry: SessionRegistry,
    config: OrchestratorConfig,
}

impl HybridOrchestrator {
    /// The pipeline should validate with the same sandbox; its validation
    /// timeout is aligned with `config.execution_timeout` here.
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        pipeline: RepairPipeline,
        config: OrchestratorConfig,
    ) -> Self {
        let pipeline = pipeline.with_execution_timeout(config.execution_timeout);
        Self {
            sandbox,
            rules: RuleEngine::new(),
            pipeline: Arc::new(pipeline),
            registry: SessionRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Execute the submitted code once and register a running session.
    ///
    /// Returns a snapshot of the new session before any repair happens;
    /// drive it with [`run_loop`](Self::run_loop) or
    /// [`spawn_loop`](Self::spawn_loop). A budget of zero iterations is
    /// rejected without running the code.
    pub async fn start_session(
        &self,
        code: &str,
        max_iterations: Option<u32>,
    ) -> Result<DebugSession, OrchestratorError> {
        let max_iterations = max_iterations.unwrap_or(self.config.max_iterations);
        if max_iterations == 0 {
            return Err(OrchestratorError::InvalidIterationBudget(max_iterations));
        }
        let session_id = Uuid::new_v4().to_string();

        let result = self.sandbox.execute(code, self.config.execution_timeout).await;
        let status = result.status;
        let succeeded = result.is_success();

        let mut session = DebugSession::new(&session_id, code, max_iterations, Some(result));
        trace(&mut session, format!("[Session Created] ID: {}", session_id));
        trace(&mut session, format!("[Initial Execution] Status: {}", status));
        if succeeded {
            trace(
                &mut session,
                "[Analysis] Code executed successfully, but analyzing for logical errors...",
            );
        }

        metrics::increment_counter!("repair_sessions_started_total");
        let snapshot = session.clone();
        self.registry.insert(session).await;
        Ok(snapshot)
    }

    /// Run the loop for a session on its own task.
    pub fn spawn_loop(
        self: &Arc<Self>,
        session_id: &str,
    ) -> JoinHandle<Result<SessionStatus, OrchestratorError>> {
        let orchestrator = Arc::clone(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move { orchestrator.run_loop(&session_id).await })
    }

    /// Drive a session until it reaches a terminal status.
    ///
    /// Internal failures never surface here; they end up as trace lines and
    /// a terminal status. Errors are only returned for an unknown session or
    /// a loop that is already being driven by another task.
    #[instrument(name = "repair_session", skip(self))]
    pub async fn run_loop(&self, session_id: &str) -> Result<SessionStatus, OrchestratorError> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;

        let Some(_claim) = self.registry.claim_loop(session_id) else {
            return Err(OrchestratorError::LoopAlreadyRunning(session_id.to_string()));
        };

        while let Step::Continue = self.iterate(&session).await {}

        let status = session.read().await.status();
        tracing::info!(%status, "repair session finished");
        Ok(status)
    }

    /// Snapshot of a session, including its versions, patches and traces.
    pub async fn get_session(&self, session_id: &str) -> Option<DebugSession> {
        let session = self.registry.get(session_id).await?;
        let snapshot = session.read().await.clone();
        Some(snapshot)
    }

    pub async fn get_status_summary(&self, session_id: &str) -> Option<StatusSummary> {
        let session = self.registry.get(session_id).await?;
        let summary = session.read().await.summary();
        Some(summary)
    }

    /// One pass of the loop. The session lock is never held across a
    /// sandbox run or a completion call.
    async fn iterate(&self, session: &SharedSession) -> Step {
        let (iteration, latest) = {
            let mut session = session.write().await;
            if !session.is_running() {
                return Step::Done;
            }

            let latest = session.latest_version().clone();
            if session.current_iteration() > 0 && latest.is_success() {
                let line = format!("[Success] Code fixed in {} iterations!", session.current_iteration());
                finish(&mut session, SessionStatus::Success, line);
                return Step::Done;
            }

            match session.begin_iteration() {
                Ok(true) => {}
                Ok(false) => {
                    let line = format!(
                        "[Max Iterations] Reached maximum of {} iterations",
                        session.max_iterations()
                    );
                    finish(&mut session, SessionStatus::MaxIterations, line);
                    return Step::Done;
                }
                Err(err) => {
                    log::warn!("Session {} not advanced: {}", session.session_id(), err);
                    return Step::Done;
                }
            }

            let iteration = session.current_iteration();
            let line = match &latest.execution_result {
                Some(result) => format!(
                    "[Iteration {}] Status: {}, Error: {}",
                    iteration,
                    result.status,
                    result.error_type.map(|error_type| error_type.as_str()).unwrap_or("none")
                ),
                None => format!("[Iteration {}] No execution result", iteration),
            };
            trace(&mut session, line);
            (iteration, latest)
        };

        let reviewing = iteration == 1 && latest.is_success();
        let Some(proposal) = self.propose(session, &latest, reviewing).await else {
            let mut session = session.write().await;
            if !session.is_running() {
                return Step::Done;
            }
            if reviewing {
                finish(
                    &mut session,
                    SessionStatus::Success,
                    "[Analysis Complete] Repair pipeline verified the code is logically correct",
                );
            } else if latest.execution_result.as_ref().and_then(|r| r.error_message()).is_none() {
                finish(
                    &mut session,
                    SessionStatus::Success,
                    "[Warning] No error to fix and not first iteration",
                );
            } else {
                finish(&mut session, SessionStatus::Failed, "[Failed] Unable to generate patch");
            }
            return Step::Done;
        };

        self.apply(session, &latest, proposal).await
    }

    /// Pick a strategy and produce a candidate fix for the latest version.
    async fn propose(
        &self,
        session: &SharedSession,
        latest: &CodeVersion,
        reviewing: bool,
    ) -> Option<Proposal> {
        let result = latest.execution_result.as_ref()?;

        if reviewing {
            record(
                session,
                "[Strategy] First execution successful - reviewing with the repair pipeline for logical errors...",
            )
            .await;
            return self.escalate(latest).await;
        }

        let message = result.error_message()?;
        record(session, "[Strategy] Attempting rule-based fix...").await;
        if let Some((patch, code)) = self.rules.generate_patch(message, &latest.code, latest.version) {
            return Some(Proposal {
                patch,
                code,
                transcript: Vec::new(),
            });
        }

        record(
            session,
            "[Strategy] Rule-based fix not applicable, escalating to the repair pipeline...",
        )
        .await;
        self.escalate(latest).await
    }

    async fn escalate(&self, latest: &CodeVersion) -> Option<Proposal> {
        let result = latest.execution_result.as_ref()?;
        let escalation = self
            .pipeline
            .run_escalation(&latest.code, result, latest.version)
            .await?;

        if !escalation.validated {
            log::info!(
                "Escalation for version {} returned an unvalidated patch",
                latest.version
            );
        }

        Some(Proposal {
            patch: escalation.patch,
            code: escalation.fixed_code,
            transcript: escalation.transcript,
        })
    }

    /// Execute the proposed code and record the new version.
    async fn apply(&self, session: &SharedSession, latest: &CodeVersion, proposal: Proposal) -> Step {
        let Proposal {
            patch,
            code,
            transcript,
        } = proposal;
        let code = if code.trim().is_empty() {
            apply_or_original(&latest.code, &patch.diff)
        } else {
            code
        };

        {
            let mut session = session.write().await;
            for line in transcript {
                trace(&mut session, line);
            }
            trace(&mut session, format!("[Patch Generated] Source: {}", patch.source.as_str()));
            trace(&mut session, format!("[Reasoning] {}", patch.reasoning));
            let next = session.current_version() + 1;
            trace(&mut session, format!("[Execution] Testing version {}...", next));
        }

        let result = self.sandbox.execute(&code, self.config.execution_timeout).await;
        let succeeded = result.is_success();
        let source = patch.source.as_str();

        let mut session = session.write().await;
        let version = match session.apply_patch(patch, code, result) {
            Ok(version) => version.version,
            Err(err) => {
                log::warn!("Patch for session {} dropped: {}", session.session_id(), err);
                return Step::Done;
            }
        };
        metrics::increment_counter!("repair_patches_applied_total", "source" => source);

        if succeeded {
            finish(
                &mut session,
                SessionStatus::Success,
                format!("[Success] Code fixed! Final version: {}", version),
            );
            return Step::Done;
        }

        let line = format!(
            "[Continue] Still has errors, continuing to iteration {}...",
            session.current_iteration() + 1
        );
        trace(&mut session, line);
        Step::Continue
    }
}

fn trace(session: &mut DebugSession, line: impl Into<String>) {
    let line = line.into();
    log::info!("[{}] {}", session.session_id(), line);
    session.trace(line);
}

async fn record(session: &SharedSession, line: impl Into<String>) {
    trace(&mut *session.write().await, line);
}

fn finish(session: &mut DebugSession, status: SessionStatus, line: impl Into<String>) {
    trace(session, line);
    if session.finish(status) {
        metrics::increment_counter!("repair_sessions_finished_total", "status" => status.as_str());
    }
}
