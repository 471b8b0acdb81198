//! Resilient step execution for multi-step web forms
//!
//! This crate drives a declarative list of form actions (navigate, click, fill,
//! choose) against a live browser page. Elements are located through ordered
//! fallback strategies, and anything automation cannot finish is handed to a
//! human at a checkpoint instead of failing the run.

pub mod checkpoint;
pub mod diagnostics;
pub mod element;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod locator;
pub mod platforms;
pub mod presets;
pub mod selector;
pub mod session;
pub mod workflow;

pub use checkpoint::{Checkpoint, CheckpointKind, CheckpointRequest, TerminalCheckpoint};
pub use diagnostics::{ArtifactRef, Diagnostics, FailureArtifact, TraceEvent};
pub use element::ElementHandle;
pub use engine::{RunReport, SessionOutcome, WorkflowEngine};
pub use errors::AutomationError;
pub use executor::{ActionOutcome, ClickAttempt, StepExecutor};
pub use locator::{LocatorResolver, Resolution};
pub use platforms::{AutomationSurface, SurfaceConfig};
pub use selector::{Selector, TextPattern};
pub use session::{EngineState, SessionState};
pub use workflow::{PostCondition, Step, StepKind, WorkflowConfig, WorkflowSettings};
