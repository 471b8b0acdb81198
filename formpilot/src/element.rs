use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved, interactable element on the live page.
///
/// Handles are opaque to the engine: the surface that produced one is the
/// only thing that knows how to act on it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Surface-specific identifier
    pub id: String,
    /// Lowercase tag name (`button`, `input`, `select`, ...)
    pub tag: String,
    /// Explicit or implicit ARIA role, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Accessible name as computed by the surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ElementHandle {
    /// Native `<select>` controls take their option directly; everything
    /// else needs an overlay opened first.
    pub fn is_native_select(&self) -> bool {
        self.tag.eq_ignore_ascii_case("select")
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        if let Some(role) = &self.role {
            write!(f, " role={role}")?;
        }
        if let Some(name) = &self.name {
            write!(f, " name={name:?}")?;
        }
        write!(f, " #{}>", self.id)
    }
}
