use crate::{AutomationError, ElementHandle, Selector, TextPattern};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod chrome;
mod chrome_scripts;

pub use chrome::ChromeSurface;

/// Launch options for the browser behind a surface
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub headless: bool,
    /// Explicit browser binary; discovered from `CHROME_BIN` and common
    /// install locations when unset
    pub executable: Option<PathBuf>,
    /// Upper bound for a single protocol request
    pub request_timeout: Duration,
    /// Pause between characters when typing incrementally
    pub keystroke_delay: Duration,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            request_timeout: Duration::from_secs(30),
            keystroke_delay: Duration::from_millis(30),
        }
    }
}

/// The common trait every automation backend must implement.
///
/// The engine only ever talks to the page through this trait, which keeps
/// resolution and escalation policy testable without a browser.
#[async_trait::async_trait]
pub trait AutomationSurface: Send + Sync {
    /// Open `url` and wait for the document to load
    async fn goto(&self, url: &str) -> Result<(), AutomationError>;

    /// Find the first visible element matching `selector`, polling up to `timeout`.
    ///
    /// Returns `ElementNotFound` when nothing matched in time. Action-timeout
    /// errors (a match that went stale or stayed hidden) are also treated as
    /// a miss; anything else means the surface itself is unhealthy.
    async fn find_element(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<ElementHandle, AutomationError>;

    /// Pointer activation. Waits up to `timeout` for the element to become enabled.
    async fn click(&self, element: &ElementHandle, timeout: Duration)
        -> Result<(), AutomationError>;

    /// Remove any existing content from an editable element
    async fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Type a single character into a focused editable element
    async fn type_char(&self, element: &ElementHandle, ch: char) -> Result<(), AutomationError>;

    /// Current value (or text) of an element, used to validate typed input
    async fn read_value(&self, element: &ElementHandle) -> Result<String, AutomationError>;

    /// Select an option of a native list control by visible label
    async fn select_native_option(
        &self,
        element: &ElementHandle,
        label: &TextPattern,
    ) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Write a full-page screenshot to `path`
    async fn screenshot(&self, path: &Path) -> Result<(), AutomationError>;

    /// Release the browser session. Called once, on every exit path.
    async fn close(&self) -> Result<(), AutomationError>;
}

/// Launch the default surface (Chrome over the DevTools protocol).
pub async fn create_surface(
    config: SurfaceConfig,
) -> Result<Box<dyn AutomationSurface>, AutomationError> {
    let surface = ChromeSurface::launch(config).await?;
    Ok(Box::new(surface))
}
