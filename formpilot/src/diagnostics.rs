//! Session trace and failure snapshots.
//!
//! The trace is a JSON Lines file written under the diagnostics directory:
//! one timestamped event per line, in the order the interactions happened.
//! Nothing in here ever fails a session; write errors are logged and the
//! trace is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointKind;
use crate::platforms::AutomationSurface;
use crate::session::EngineState;

/// Reference to a file written during the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

/// What is left behind after an unrecovered terminal failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureArtifact {
    pub trace: Option<ArtifactRef>,
    pub screenshot: Option<ArtifactRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    SessionStart {
        workflow: String,
        steps: usize,
    },
    StepStart {
        index: usize,
        kind: String,
        description: String,
    },
    ResolveAttempt {
        target: String,
        strategy: String,
        attempt: usize,
        found: bool,
    },
    Action {
        action: String,
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Checkpoint {
        kind: CheckpointKind,
        message: String,
    },
    StateChange {
        from: EngineState,
        to: EngineState,
    },
    StepEnd {
        index: usize,
        outcome: String,
    },
    Snapshot {
        path: PathBuf,
    },
    SessionEnd {
        outcome: String,
    },
}

#[derive(Serialize)]
struct TraceLine<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a TraceEvent,
}

struct TraceWriter {
    path: PathBuf,
    started_at: DateTime<Utc>,
    out: BufWriter<File>,
}

/// Collects the session trace and the failure snapshot.
pub struct Diagnostics {
    dir: Option<PathBuf>,
    trace: Option<TraceWriter>,
    trace_ref: Option<ArtifactRef>,
    snapshot: Option<ArtifactRef>,
    finalized: bool,
}

impl Diagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            trace: None,
            trace_ref: None,
            snapshot: None,
            finalized: false,
        }
    }

    /// Diagnostics that record nothing.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Create the diagnostics directory if needed. Safe to call repeatedly.
    pub fn ensure_dir(&self) -> std::io::Result<Option<&Path>> {
        match &self.dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Some(dir.as_path()))
            }
            None => Ok(None),
        }
    }

    /// Open the session trace. A second call is a no-op.
    pub fn start(&mut self, workflow: &str, steps: usize) {
        if self.trace.is_some() || self.finalized {
            return;
        }
        let dir = match self.ensure_dir() {
            Ok(Some(dir)) => dir.to_path_buf(),
            Ok(None) => return,
            Err(e) => {
                warn!("diagnostics disabled, cannot create directory: {e}");
                return;
            }
        };

        let started_at = Utc::now();
        let path = dir.join(format!(
            "formpilot-trace-{}.jsonl",
            started_at.format("%Y%m%d-%H%M%S")
        ));
        match File::create(&path) {
            Ok(file) => {
                info!(path = %path.display(), "recording session trace");
                self.trace = Some(TraceWriter {
                    path,
                    started_at,
                    out: BufWriter::new(file),
                });
                self.record(TraceEvent::SessionStart {
                    workflow: workflow.to_string(),
                    steps,
                });
            }
            Err(e) => warn!(path = %path.display(), "cannot create trace file: {e}"),
        }
    }

    /// Append one event to the trace, if one is open.
    pub fn record(&mut self, event: TraceEvent) {
        let Some(trace) = self.trace.as_mut() else {
            return;
        };
        let line = TraceLine {
            at: Utc::now(),
            event: &event,
        };
        let written = serde_json::to_string(&line)
            .map_err(std::io::Error::other)
            .and_then(|json| writeln!(trace.out, "{json}"));
        if let Err(e) = written {
            warn!(path = %trace.path.display(), "trace write failed, dropping trace: {e}");
            self.trace = None;
        }
    }

    /// Screenshot the page after a terminal failure. At most once per
    /// session; never fails.
    pub async fn capture_failure_snapshot(
        &mut self,
        surface: &dyn AutomationSurface,
    ) -> Option<ArtifactRef> {
        if self.snapshot.is_some() {
            return self.snapshot.clone();
        }
        let dir = match self.ensure_dir() {
            Ok(Some(dir)) => dir.to_path_buf(),
            Ok(None) => return None,
            Err(e) => {
                warn!("cannot create diagnostics directory for snapshot: {e}");
                return None;
            }
        };

        let captured_at = Utc::now();
        let path = dir.join(format!(
            "formpilot-failure-{}.png",
            captured_at.timestamp_millis()
        ));
        match surface.screenshot(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "failure screenshot saved");
                self.record(TraceEvent::Snapshot { path: path.clone() });
                let snapshot = ArtifactRef { path, captured_at };
                self.snapshot = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(e) => {
                warn!("failure screenshot could not be captured: {e}");
                None
            }
        }
    }

    /// Flush and close the trace. Never fails; a no-op when nothing was started.
    pub fn finalize(&mut self, outcome: &str) -> Option<ArtifactRef> {
        if self.finalized {
            debug!("diagnostics already finalized");
            return self.trace_ref.clone();
        }
        self.finalized = true;
        self.record(TraceEvent::SessionEnd {
            outcome: outcome.to_string(),
        });
        let mut trace = self.trace.take()?;
        if let Err(e) = trace.out.flush() {
            warn!(path = %trace.path.display(), "trace flush failed: {e}");
        }
        info!(path = %trace.path.display(), "trace saved");
        self.trace_ref = Some(ArtifactRef {
            path: trace.path,
            captured_at: trace.started_at,
        });
        self.trace_ref.clone()
    }

    pub fn trace_path(&self) -> Option<&Path> {
        self.trace
            .as_ref()
            .map(|t| t.path.as_path())
            .or(self.trace_ref.as_ref().map(|r| r.path.as_path()))
    }

    pub fn snapshot(&self) -> Option<&ArtifactRef> {
        self.snapshot.as_ref()
    }
}
