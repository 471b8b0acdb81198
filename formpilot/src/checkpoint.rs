use colored::*;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::AutomationError;

/// Why the workflow is handing control to a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// A `checkpoint` step, always shown (log in, review the form)
    Scheduled,
    /// Automation could not finish an action; the human does it instead
    Fallback,
    /// The submit action stalled; fix the form so it can be retried once
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRequest {
    pub kind: CheckpointKind,
    /// What the human should do
    pub message: String,
    /// Status line explaining what went wrong, shown before the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CheckpointRequest {
    pub fn scheduled(message: impl Into<String>) -> Self {
        Self {
            kind: CheckpointKind::Scheduled,
            message: message.into(),
            reason: None,
        }
    }

    pub fn fallback(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: CheckpointKind::Fallback,
            message: message.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn retry(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: CheckpointKind::Retry,
            message: message.into(),
            reason: Some(reason.into()),
        }
    }
}

/// Blocks until a human acknowledges a message.
///
/// Implementations must not time out: a checkpoint waits as long as it takes.
/// Any UI works (terminal, dialog, remote signal) as long as it returns only
/// once the human is done.
#[async_trait::async_trait]
pub trait Checkpoint: Send + Sync {
    async fn acknowledge(&self, request: &CheckpointRequest) -> Result<(), AutomationError>;
}

/// Prompts on the controlling terminal and waits for Enter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalCheckpoint;

#[async_trait::async_trait]
impl Checkpoint for TerminalCheckpoint {
    async fn acknowledge(&self, request: &CheckpointRequest) -> Result<(), AutomationError> {
        if let Some(reason) = &request.reason {
            println!("{}", reason.yellow());
        }
        let headline = match request.kind {
            CheckpointKind::Scheduled => request.message.bold(),
            CheckpointKind::Fallback | CheckpointKind::Retry => request.message.cyan().bold(),
        };
        println!("{headline}");
        println!("{}", "Press Enter to continue...".dimmed());
        info!(kind = ?request.kind, "waiting for human acknowledgment");

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        if read == 0 {
            return Err(AutomationError::Internal(
                "stdin closed while waiting at a checkpoint".into(),
            ));
        }
        Ok(())
    }
}
