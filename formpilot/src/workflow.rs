//! Declarative description of one form-submission run.
//!
//! A [`WorkflowConfig`] is an ordered list of [`Step`]s plus the session-wide
//! settings the engine needs. The same engine drives any form by swapping
//! the configuration; nothing in here knows about a particular site.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{AutomationError, Selector, TextPattern};

pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_POST_CONDITION_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_KEYSTROKE_DELAY_MS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Open a URL (`value`)
    Navigate,
    /// Scheduled pause; shows `value` to the human and waits
    Checkpoint,
    Click,
    /// Clear and type `value` character by character
    Fill,
    /// Pick the option labelled `value` from a list control
    Choose,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}

/// Logical, human-meaningful reference to a UI element ("the App Name field").
///
/// Locator candidates are derived from it unless a step lists explicit
/// strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub label: TextPattern,
}

impl TargetDescriptor {
    pub fn new(label: TextPattern) -> Self {
        Self { label }
    }

    /// Default candidates for `kind`, most specific first.
    pub fn candidates(&self, kind: StepKind) -> Vec<Selector> {
        let label = self.label.clone();
        match kind {
            StepKind::Click => vec![
                Selector::role("button", label.clone()),
                Selector::role("link", label.clone()),
                Selector::Text(label),
            ],
            StepKind::Fill => vec![
                Selector::Label(label.clone()),
                Selector::role("textbox", label.clone()),
                Selector::Placeholder(label),
            ],
            StepKind::Choose => vec![
                Selector::Label(label.clone()),
                Selector::role("combobox", label),
            ],
            StepKind::Navigate | StepKind::Checkpoint => Vec::new(),
        }
    }
}

/// One ordered unit of work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Explicit locator strategies, tried in order. Overrides the candidates
    /// derived from `target`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<Selector>,
    /// Marks the final submission, which gets one human-assisted retry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub submit: bool,
}

impl Step {
    fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            target: None,
            value: None,
            strategies: Vec::new(),
            submit: false,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        let url = url.into();
        let mut step = Self::new(StepKind::Navigate, format!("open {url}"));
        step.value = Some(url);
        step
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut step = Self::new(StepKind::Checkpoint, message.clone());
        step.value = Some(message);
        step
    }

    pub fn click(description: impl Into<String>, target: TextPattern) -> Self {
        let mut step = Self::new(StepKind::Click, description);
        step.target = Some(TargetDescriptor::new(target));
        step
    }

    pub fn fill(description: impl Into<String>, target: TextPattern, value: impl Into<String>) -> Self {
        let mut step = Self::new(StepKind::Fill, description);
        step.target = Some(TargetDescriptor::new(target));
        step.value = Some(value.into());
        step
    }

    pub fn choose(
        description: impl Into<String>,
        target: TextPattern,
        option: impl Into<String>,
    ) -> Self {
        let mut step = Self::new(StepKind::Choose, description);
        step.target = Some(TargetDescriptor::new(target));
        step.value = Some(option.into());
        step
    }

    pub fn with_strategies(mut self, strategies: Vec<Selector>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn as_submit(mut self) -> Self {
        self.submit = true;
        self
    }

    /// Ordered locator candidates for this step.
    pub fn candidates(&self) -> Vec<Selector> {
        if !self.strategies.is_empty() {
            return self.strategies.clone();
        }
        self.target
            .as_ref()
            .map(|t| t.candidates(self.kind))
            .unwrap_or_default()
    }

    fn validate(&self, index: usize) -> Result<(), AutomationError> {
        let fail = |why: &str| -> Result<(), AutomationError> {
            Err(AutomationError::InvalidArgument(format!(
                "step {index} ({} '{}'): {why}",
                self.kind, self.description
            )))
        };
        match self.kind {
            StepKind::Navigate | StepKind::Checkpoint if self.value.is_none() => {
                fail("a value is required")
            }
            StepKind::Click | StepKind::Fill | StepKind::Choose
                if self.target.is_none() && self.strategies.is_empty() =>
            {
                fail("needs a target or explicit strategies")
            }
            StepKind::Fill | StepKind::Choose if self.value.is_none() => fail("a value is required"),
            kind if self.submit && kind != StepKind::Click => fail("only click steps can submit"),
            _ => Ok(()),
        }
    }
}

/// Success indicator checked after the last step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCondition {
    /// Regex the page URL must match
    pub url_pattern: String,
    #[serde(default = "default_post_condition_timeout")]
    pub timeout_ms: u64,
}

fn default_post_condition_timeout() -> u64 {
    DEFAULT_POST_CONDITION_TIMEOUT_MS
}

fn default_action_timeout() -> u64 {
    DEFAULT_ACTION_TIMEOUT_MS
}

fn default_attempt_timeout() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT_MS
}

fn default_keystroke_delay() -> u64 {
    DEFAULT_KEYSTROKE_DELAY_MS
}

/// Global settings shared by every step of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Upper bound for completing an action on a resolved element
    #[serde(default = "default_action_timeout")]
    pub action_timeout_ms: u64,
    /// Upper bound for one locator candidate; strictly shorter than the action timeout
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_keystroke_delay")]
    pub keystroke_delay_ms: u64,
    /// Where traces and failure screenshots go. No diagnostics when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_condition: Option<PostCondition>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            keystroke_delay_ms: DEFAULT_KEYSTROKE_DELAY_MS,
            diagnostics_dir: None,
            post_condition: None,
        }
    }
}

impl WorkflowSettings {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }
}

/// The full ordered step sequence for one record-creation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(default)]
    pub settings: WorkflowSettings,
    pub steps: Vec<Step>,
}

impl WorkflowConfig {
    pub fn new(name: impl Into<String>, steps: Vec<Step>, settings: WorkflowSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            steps,
        }
    }

    /// Load a workflow from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, AutomationError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: WorkflowConfig = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                AutomationError::InvalidArgument(format!("{}: {e}", path.display()))
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                AutomationError::InvalidArgument(format!("{}: {e}", path.display()))
            })?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, AutomationError> {
        serde_yaml::to_string(self).map_err(|e| AutomationError::Internal(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.steps.is_empty() {
            return Err(AutomationError::InvalidArgument(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }
        let settings = &self.settings;
        if settings.attempt_timeout_ms == 0
            || settings.attempt_timeout_ms >= settings.action_timeout_ms
        {
            return Err(AutomationError::InvalidArgument(format!(
                "attempt timeout ({} ms) must be non-zero and shorter than the action timeout ({} ms)",
                settings.attempt_timeout_ms, settings.action_timeout_ms
            )));
        }
        if let Some(post) = &settings.post_condition {
            regex::Regex::new(&post.url_pattern).map_err(|e| {
                AutomationError::InvalidArgument(format!("post-condition pattern: {e}"))
            })?;
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate(index)?;
        }
        if self.steps.iter().filter(|s| s.submit).count() > 1 {
            return Err(AutomationError::InvalidArgument(
                "at most one step can be marked submit".into(),
            ));
        }
        Ok(())
    }
}
