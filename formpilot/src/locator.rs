use tracing::{debug, instrument, warn};

use crate::diagnostics::TraceEvent;
use crate::element::ElementHandle;
use crate::errors::AutomationError;
use crate::platforms::AutomationSurface;
use crate::selector::Selector;
use crate::session::SessionState;
use std::time::Duration;

// Default per-candidate timeout if none is configured
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of resolving one logical target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The candidate at `strategy_index` matched
    Found {
        element: ElementHandle,
        strategy_index: usize,
        selector: Selector,
    },
    /// Every candidate was tried without a match. Not an error: the caller
    /// decides how to recover.
    Exhausted { attempts: Vec<String> },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Tries an ordered list of locator strategies for one target and returns
/// the first that matches.
///
/// Candidates are tried strictly in order, most specific first, each with
/// the same short timeout. Nothing is clicked or typed here.
#[derive(Debug, Clone, Copy)]
pub struct LocatorResolver {
    attempt_timeout: Duration,
}

impl Default for LocatorResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl LocatorResolver {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self { attempt_timeout }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Resolve `target` using `candidates`.
    ///
    /// Misses, including a match that stalled or went stale during the
    /// attempt, move on to the next candidate. Fatal surface errors abort
    /// resolution and are returned as-is.
    #[instrument(level = "debug", skip(self, surface, candidates, session), fields(candidates = candidates.len()))]
    pub async fn resolve(
        &self,
        surface: &dyn AutomationSurface,
        target: &str,
        candidates: &[Selector],
        session: &mut SessionState,
    ) -> Result<Resolution, AutomationError> {
        let mut attempts = Vec::with_capacity(candidates.len());

        for (index, selector) in candidates.iter().enumerate() {
            debug!("resolving {target} via {selector} (attempt {})", index + 1);
            match surface.find_element(selector, self.attempt_timeout).await {
                Ok(element) => {
                    session.diagnostics.record(TraceEvent::ResolveAttempt {
                        target: target.to_string(),
                        strategy: selector.to_string(),
                        attempt: index + 1,
                        found: true,
                    });
                    debug!("resolved {target} to {element} via {selector}");
                    return Ok(Resolution::Found {
                        element,
                        strategy_index: index,
                        selector: selector.clone(),
                    });
                }
                Err(e) if !e.is_fatal() => {
                    session.diagnostics.record(TraceEvent::ResolveAttempt {
                        target: target.to_string(),
                        strategy: selector.to_string(),
                        attempt: index + 1,
                        found: false,
                    });
                    if !e.is_not_found() {
                        debug!("treating {e} as a miss for {selector}");
                    }
                    attempts.push(format!("'{selector}': {e}"));
                }
                Err(e) => {
                    warn!("surface failed while resolving {target} via {selector}: {e}");
                    return Err(e);
                }
            }
        }

        if candidates.is_empty() {
            warn!("no locator candidates for {target}");
        } else {
            debug!("all {} candidates failed for {target}", candidates.len());
        }
        Ok(Resolution::Exhausted { attempts })
    }
}
