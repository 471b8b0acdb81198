use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkpoint::CheckpointRequest;
use crate::diagnostics::{Diagnostics, TraceEvent};

/// Lifecycle of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Running,
    AwaitingHuman,
    Succeeded,
    Failed,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Succeeded | EngineState::Failed)
    }

    pub fn can_transition_to(self, next: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, next),
            (Running, AwaitingHuman)
                | (AwaitingHuman, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (AwaitingHuman, Failed)
        )
    }
}

/// Mutable, run-private bookkeeping. Created when a run starts and dropped
/// when it ends; never persisted.
pub struct SessionState {
    /// Index of the step currently executing
    pub step_index: usize,
    interventions: u32,
    state: EngineState,
    pub diagnostics: Diagnostics,
}

impl SessionState {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            step_index: 0,
            interventions: 0,
            state: EngineState::Running,
            diagnostics,
        }
    }

    /// Number of checkpoints the human has been asked to acknowledge so far
    pub fn interventions(&self) -> u32 {
        self.interventions
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Move the state machine. Invalid transitions (including any move out
    /// of a terminal state) are ignored and reported as `false`.
    pub fn transition(&mut self, next: EngineState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(from = ?self.state, to = ?next, "ignoring invalid state transition");
            return false;
        }
        self.diagnostics.record(TraceEvent::StateChange {
            from: self.state,
            to: next,
        });
        self.state = next;
        true
    }

    /// Count a checkpoint and note it in the trace. Called right before the
    /// human is prompted.
    pub fn begin_intervention(&mut self, request: &CheckpointRequest) {
        self.interventions += 1;
        self.diagnostics.record(TraceEvent::Checkpoint {
            kind: request.kind,
            message: request.message.clone(),
        });
        self.transition(EngineState::AwaitingHuman);
    }

    pub fn end_intervention(&mut self) {
        self.transition(EngineState::Running);
    }
}
