//! Drives a [`WorkflowConfig`] from the first step to a terminal state.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointRequest};
use crate::diagnostics::{ArtifactRef, Diagnostics, FailureArtifact, TraceEvent};
use crate::errors::AutomationError;
use crate::executor::{ActionOutcome, ClickAttempt, StepExecutor};
use crate::locator::LocatorResolver;
use crate::platforms::{create_surface, AutomationSurface, SurfaceConfig};
use crate::selector::Selector;
use crate::session::{EngineState, SessionState};
use crate::workflow::{PostCondition, Step, StepKind, WorkflowConfig};

const POST_CONDITION_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// `verified` is false when the success indicator never showed up in
    /// time. The run still counts as a success.
    Succeeded { verified: bool },
    Failed { error: String },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Succeeded { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Succeeded { verified: true } => "succeeded",
            SessionOutcome::Succeeded { verified: false } => "succeeded_unverified",
            SessionOutcome::Failed { .. } => "failed",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workflow: String,
    pub outcome: SessionOutcome,
    pub interventions: u32,
    pub steps_completed: usize,
    pub trace: Option<ArtifactRef>,
    pub failure: Option<FailureArtifact>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Process exit status: 0 for any success, 1 for failure
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Owns the automation surface for one run and closes it on every exit path.
pub struct WorkflowEngine {
    surface: Box<dyn AutomationSurface>,
    checkpoint: Box<dyn Checkpoint>,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    pub fn new(
        surface: Box<dyn AutomationSurface>,
        checkpoint: Box<dyn Checkpoint>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            surface,
            checkpoint,
            config,
        }
    }

    /// Validate `config` and launch a browser for it.
    pub async fn launch(
        config: WorkflowConfig,
        mut surface_config: SurfaceConfig,
        checkpoint: Box<dyn Checkpoint>,
    ) -> Result<Self, AutomationError> {
        config.validate()?;
        surface_config.keystroke_delay = config.settings.keystroke_delay();
        let surface = create_surface(surface_config).await?;
        Ok(Self::new(surface, checkpoint, config))
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run every step in order. Never returns an error: failures end up in
    /// the report.
    #[instrument(skip(self), fields(workflow = %self.config.name))]
    pub async fn run(self) -> RunReport {
        let settings = &self.config.settings;
        let mut session = SessionState::new(Diagnostics::new(settings.diagnostics_dir.clone()));
        session
            .diagnostics
            .start(&self.config.name, self.config.steps.len());

        let executor = StepExecutor::new(
            self.surface.as_ref(),
            self.checkpoint.as_ref(),
            LocatorResolver::new(settings.attempt_timeout()),
            settings.action_timeout(),
        );

        let mut steps_completed = 0;
        let result = match self
            .run_steps(&executor, &mut session, &mut steps_completed)
            .await
        {
            Ok(()) => self.verify(&mut session).await,
            Err(e) => Err(e),
        };

        let (outcome, screenshot) = match result {
            Ok(verified) => {
                session.transition(EngineState::Succeeded);
                if verified {
                    info!("workflow '{}' completed", self.config.name);
                } else {
                    warn!(
                        "workflow '{}' completed but the success indicator was not seen; check the result manually",
                        self.config.name
                    );
                }
                (SessionOutcome::Succeeded { verified }, None)
            }
            Err(e) => {
                error!(
                    "workflow '{}' failed at step {}: {e}",
                    self.config.name,
                    session.step_index + 1
                );
                session.transition(EngineState::Failed);
                let screenshot = session
                    .diagnostics
                    .capture_failure_snapshot(self.surface.as_ref())
                    .await;
                (SessionOutcome::Failed { error: e.to_string() }, screenshot)
            }
        };

        let trace = session.diagnostics.finalize(outcome.label());
        if let Err(e) = self.surface.close().await {
            warn!("failed to close the browser session: {e}");
        }

        let failure = (!outcome.is_success()).then(|| FailureArtifact {
            trace: trace.clone(),
            screenshot,
        });
        RunReport {
            workflow: self.config.name.clone(),
            outcome,
            interventions: session.interventions(),
            steps_completed,
            trace,
            failure,
        }
    }

    async fn run_steps(
        &self,
        executor: &StepExecutor<'_>,
        session: &mut SessionState,
        steps_completed: &mut usize,
    ) -> Result<(), AutomationError> {
        let total = self.config.steps.len();
        for (index, step) in self.config.steps.iter().enumerate() {
            session.step_index = index;
            info!(
                "Step {}/{} BEGIN kind='{}' description='{}'",
                index + 1,
                total,
                step.kind,
                step.description
            );
            session.diagnostics.record(TraceEvent::StepStart {
                index,
                kind: step.kind.to_string(),
                description: step.description.clone(),
            });

            let status = self.run_step(executor, step, session).await?;

            session.diagnostics.record(TraceEvent::StepEnd {
                index,
                outcome: status.to_string(),
            });
            info!("Step {}/{} END status={status}", index + 1, total);
            *steps_completed = index + 1;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        executor: &StepExecutor<'_>,
        step: &Step,
        session: &mut SessionState,
    ) -> Result<&'static str, AutomationError> {
        let value = step.value.as_deref().unwrap_or_default();
        let candidates = step.candidates();

        let outcome = match step.kind {
            StepKind::Navigate => {
                self.surface.goto(value).await?;
                return Ok("navigated");
            }
            StepKind::Checkpoint => {
                executor
                    .escalate(CheckpointRequest::scheduled(value), session)
                    .await?;
                return Ok("acknowledged");
            }
            StepKind::Click if step.submit => {
                return self.submit(executor, step, &candidates, session).await;
            }
            StepKind::Click => {
                executor
                    .click(&candidates, &step.description, session)
                    .await?
            }
            StepKind::Fill => {
                executor
                    .fill(&candidates, value, &step.description, session)
                    .await?
            }
            StepKind::Choose => {
                executor
                    .choose(&candidates, value, &step.description, session)
                    .await?
            }
        };
        Ok(match outcome {
            ActionOutcome::Automated { .. } => "automated",
            ActionOutcome::Manual => "manual",
        })
    }

    /// Final submission. A stalled click gets one retry after the human has
    /// had a chance to fix the form; a second stall ends the run.
    async fn submit(
        &self,
        executor: &StepExecutor<'_>,
        step: &Step,
        candidates: &[Selector],
        session: &mut SessionState,
    ) -> Result<&'static str, AutomationError> {
        let reason = match executor
            .try_click(candidates, &step.description, session)
            .await?
        {
            ClickAttempt::Done { .. } => return Ok("automated"),
            ClickAttempt::Unresolved { .. } => {
                executor
                    .escalate(
                        CheckpointRequest::fallback(
                            format!("Could not find {}.", step.description),
                            "Please submit the form manually, then continue.",
                        ),
                        session,
                    )
                    .await?;
                return Ok("manual");
            }
            ClickAttempt::TimedOut { reason, .. } => reason,
        };

        executor
            .escalate(
                CheckpointRequest::retry(
                    format!("{} did not go through: {reason}", step.description),
                    "Resolve any outstanding issues in the form, then continue to retry once.",
                ),
                session,
            )
            .await?;

        match executor
            .try_click(candidates, &step.description, session)
            .await?
        {
            ClickAttempt::Done { .. } => Ok("automated_after_retry"),
            ClickAttempt::Unresolved { attempts } => Err(AutomationError::ElementNotFound(format!(
                "{} vanished before the retry: {}",
                step.description,
                attempts.join("; ")
            ))),
            ClickAttempt::TimedOut { reason, .. } => Err(AutomationError::Timeout(format!(
                "{} failed again after retry: {reason}",
                step.description
            ))),
        }
    }

    /// Wait for the success indicator. `Ok(false)` means it never appeared.
    async fn verify(&self, session: &mut SessionState) -> Result<bool, AutomationError> {
        let Some(post) = &self.config.settings.post_condition else {
            return Ok(true);
        };
        let verified = self.wait_for_post_condition(post).await?;
        session.diagnostics.record(TraceEvent::Action {
            action: "verify".to_string(),
            target: post.url_pattern.clone(),
            value: None,
            ok: verified,
            error: (!verified).then(|| "success indicator not seen".to_string()),
        });
        Ok(verified)
    }

    async fn wait_for_post_condition(&self, post: &PostCondition) -> Result<bool, AutomationError> {
        let pattern = regex::Regex::new(&post.url_pattern)
            .map_err(|e| AutomationError::InvalidArgument(format!("post-condition pattern: {e}")))?;
        let deadline = Instant::now() + Duration::from_millis(post.timeout_ms);

        loop {
            match self.surface.current_url().await {
                Ok(url) if pattern.is_match(&url) => {
                    info!("success indicator seen at {url}");
                    return Ok(true);
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("could not read the page URL: {e}"),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POST_CONDITION_POLL).await;
        }
    }
}
