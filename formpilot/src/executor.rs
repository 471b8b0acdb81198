//! Action primitives built on the locator resolver.
//!
//! Every primitive hands control back to the caller. When automation cannot
//! finish an action the human is asked to do it through a fallback
//! checkpoint, and the workflow carries on as if it had succeeded. Only
//! surface faults come back as `Err`.

use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointRequest};
use crate::diagnostics::TraceEvent;
use crate::element::ElementHandle;
use crate::errors::AutomationError;
use crate::locator::{LocatorResolver, Resolution};
use crate::platforms::AutomationSurface;
use crate::selector::{Selector, TextPattern};
use crate::session::SessionState;

/// How an action ended, from the workflow's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Performed by automation using this locator strategy
    Automated { selector: Selector },
    /// Handed to the human, who acknowledged it
    Manual,
}

impl ActionOutcome {
    pub fn is_automated(&self) -> bool {
        matches!(self, ActionOutcome::Automated { .. })
    }
}

/// Undecided result of a single click attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAttempt {
    Done { selector: Selector },
    /// No candidate matched
    Unresolved { attempts: Vec<String> },
    /// The target was found but the click could not complete in time
    TimedOut {
        element: ElementHandle,
        reason: String,
    },
}

/// Split an action result into "done", "hand to the human" (with a reason)
/// or a fatal error.
fn triage(result: Result<(), AutomationError>) -> Result<Option<String>, AutomationError> {
    match result {
        Ok(()) => Ok(None),
        Err(e) if !e.is_fatal() => Ok(Some(e.to_string())),
        Err(e) => Err(e),
    }
}

pub struct StepExecutor<'a> {
    surface: &'a dyn AutomationSurface,
    checkpoint: &'a dyn Checkpoint,
    resolver: LocatorResolver,
    action_timeout: Duration,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        surface: &'a dyn AutomationSurface,
        checkpoint: &'a dyn Checkpoint,
        resolver: LocatorResolver,
        action_timeout: Duration,
    ) -> Self {
        Self {
            surface,
            checkpoint,
            resolver,
            action_timeout,
        }
    }

    /// Show `request` to the human and wait. Counts as one intervention.
    pub async fn escalate(
        &self,
        request: CheckpointRequest,
        session: &mut SessionState,
    ) -> Result<(), AutomationError> {
        if let Some(reason) = &request.reason {
            warn!("{reason}");
        }
        session.begin_intervention(&request);
        self.checkpoint.acknowledge(&request).await?;
        session.end_intervention();
        debug!("checkpoint acknowledged");
        Ok(())
    }

    async fn manual(
        &self,
        reason: String,
        instruction: String,
        session: &mut SessionState,
    ) -> Result<ActionOutcome, AutomationError> {
        self.escalate(CheckpointRequest::fallback(reason, instruction), session)
            .await?;
        Ok(ActionOutcome::Manual)
    }

    fn trace_action(
        session: &mut SessionState,
        action: &str,
        target: &str,
        value: Option<&str>,
        error: Option<&str>,
    ) {
        session.diagnostics.record(TraceEvent::Action {
            action: action.to_string(),
            target: target.to_string(),
            value: value.map(str::to_string),
            ok: error.is_none(),
            error: error.map(str::to_string),
        });
    }

    /// Resolve and click once, without escalating.
    pub async fn try_click(
        &self,
        candidates: &[Selector],
        description: &str,
        session: &mut SessionState,
    ) -> Result<ClickAttempt, AutomationError> {
        let resolution = self
            .resolver
            .resolve(self.surface, description, candidates, session)
            .await?;
        let (element, selector) = match resolution {
            Resolution::Found {
                element, selector, ..
            } => (element, selector),
            Resolution::Exhausted { attempts } => return Ok(ClickAttempt::Unresolved { attempts }),
        };

        let failure = triage(self.surface.click(&element, self.action_timeout).await)?;
        Self::trace_action(session, "click", description, None, failure.as_deref());
        Ok(match failure {
            None => ClickAttempt::Done { selector },
            Some(reason) => ClickAttempt::TimedOut { element, reason },
        })
    }

    #[instrument(skip(self, candidates, session))]
    pub async fn click(
        &self,
        candidates: &[Selector],
        description: &str,
        session: &mut SessionState,
    ) -> Result<ActionOutcome, AutomationError> {
        match self.try_click(candidates, description, session).await? {
            ClickAttempt::Done { selector } => {
                info!("clicked {description}");
                Ok(ActionOutcome::Automated { selector })
            }
            ClickAttempt::Unresolved { .. } => {
                self.manual(
                    format!("Could not click {description}."),
                    "Please complete it manually, then continue.".to_string(),
                    session,
                )
                .await
            }
            ClickAttempt::TimedOut { reason, .. } => {
                self.manual(
                    format!("Could not click {description}: {reason}"),
                    "Please complete it manually, then continue.".to_string(),
                    session,
                )
                .await
            }
        }
    }

    /// Clear the element and type `value` one character at a time.
    async fn type_into(&self, element: &ElementHandle, value: &str) -> Result<(), AutomationError> {
        self.surface.clear(element).await?;
        for ch in value.chars() {
            self.surface.type_char(element, ch).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, candidates, session))]
    pub async fn fill(
        &self,
        candidates: &[Selector],
        value: &str,
        description: &str,
        session: &mut SessionState,
    ) -> Result<ActionOutcome, AutomationError> {
        let instruction = format!("Please fill it with \"{value}\" manually, then continue.");
        let resolution = self
            .resolver
            .resolve(self.surface, description, candidates, session)
            .await?;
        let (element, selector) = match resolution {
            Resolution::Found {
                element, selector, ..
            } => (element, selector),
            Resolution::Exhausted { .. } => {
                return self
                    .manual(format!("Could not find the {description} field."), instruction, session)
                    .await;
            }
        };

        let failure = triage(self.type_into(&element, value).await)?;
        Self::trace_action(session, "fill", description, Some(value), failure.as_deref());
        if let Some(reason) = failure {
            return self
                .manual(format!("Could not type into {description}: {reason}"), instruction, session)
                .await;
        }

        // Validate what actually landed in the field.
        let actual = match self.surface.read_value(&element).await {
            Ok(actual) => actual,
            Err(e) if !e.is_fatal() => {
                return self
                    .manual(format!("Could not read back {description}: {e}"), instruction, session)
                    .await;
            }
            Err(e) => return Err(e),
        };
        if actual != value {
            return self
                .manual(
                    format!("{description} shows \"{actual}\" instead of \"{value}\"."),
                    "Please correct it manually, then continue.".to_string(),
                    session,
                )
                .await;
        }

        info!("filled {description}");
        Ok(ActionOutcome::Automated { selector })
    }

    #[instrument(skip(self, candidates, session))]
    pub async fn choose(
        &self,
        candidates: &[Selector],
        option_label: &str,
        description: &str,
        session: &mut SessionState,
    ) -> Result<ActionOutcome, AutomationError> {
        let instruction = format!("Please select \"{option_label}\" manually, then continue.");
        let resolution = self
            .resolver
            .resolve(self.surface, description, candidates, session)
            .await?;
        let (element, selector) = match resolution {
            Resolution::Found {
                element, selector, ..
            } => (element, selector),
            Resolution::Exhausted { .. } => {
                return self
                    .manual(format!("Could not select {description}."), instruction, session)
                    .await;
            }
        };

        let label = TextPattern::contains(option_label);
        let failure = if element.is_native_select() {
            triage(self.surface.select_native_option(&element, &label).await)?
        } else {
            self.choose_from_overlay(&element, &label, description, session)
                .await?
        };
        Self::trace_action(session, "choose", description, Some(option_label), failure.as_deref());

        match failure {
            None => {
                info!("selected \"{option_label}\" for {description}");
                Ok(ActionOutcome::Automated { selector })
            }
            Some(reason) => {
                self.manual(format!("Could not select {description}: {reason}"), instruction, session)
                    .await
            }
        }
    }

    /// Open a custom list control and click the matching option.
    /// Returns the reason when the selection could not be made.
    async fn choose_from_overlay(
        &self,
        control: &ElementHandle,
        label: &TextPattern,
        description: &str,
        session: &mut SessionState,
    ) -> Result<Option<String>, AutomationError> {
        if let Some(reason) = triage(self.surface.click(control, self.action_timeout).await)? {
            return Ok(Some(reason));
        }

        let options = [
            Selector::role("option", label.clone()),
            Selector::role("menuitem", label.clone()),
            Selector::Text(label.clone()),
        ];
        let target = format!("option {label} of {description}");
        match self
            .resolver
            .resolve(self.surface, &target, &options, session)
            .await?
        {
            Resolution::Found { element, .. } => {
                triage(self.surface.click(&element, self.action_timeout).await)
            }
            Resolution::Exhausted { .. } => Ok(Some(format!("no option matching {label}"))),
        }
    }
}
