use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element is not enabled: {0}")]
    ElementNotEnabled(String),

    #[error("Element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("Element is detached from DOM: {0}")]
    ElementDetached(String),

    #[error("Failed to navigate to {url}: {details}")]
    NavigationFailed { url: String, details: String },

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// The target could not be located. Resolvers move on to the next candidate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AutomationError::ElementNotFound(_))
    }

    /// The target was located but the action could not complete in time
    /// (disabled control, element vanished mid-action, and so on).
    pub fn is_action_timeout(&self) -> bool {
        matches!(
            self,
            AutomationError::Timeout(_)
                | AutomationError::ElementNotEnabled(_)
                | AutomationError::ElementNotVisible(_)
                | AutomationError::ElementDetached(_)
        )
    }

    /// Anything that is neither a miss nor an action timeout ends the session.
    pub fn is_fatal(&self) -> bool {
        !self.is_not_found() && !self.is_action_timeout()
    }
}
