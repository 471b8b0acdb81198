use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::AutomationError;

/// A case-insensitive text matcher used for accessible names, labels and option text.
///
/// The string form is either a plain literal (matched as a substring) or a
/// regular expression wrapped in slashes, e.g. `/^Create$/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextPattern {
    source: String,
}

impl TextPattern {
    /// Matches any text containing `literal`.
    pub fn contains(literal: &str) -> Self {
        Self {
            source: regex::escape(literal),
        }
    }

    /// Matches text equal to `literal` (ignoring case).
    pub fn exact(literal: &str) -> Self {
        Self {
            source: format!("^{}$", regex::escape(literal)),
        }
    }

    /// Uses `source` as a regular expression.
    pub fn regex(source: &str) -> Result<Self, AutomationError> {
        let pattern = Self {
            source: source.to_string(),
        };
        pattern.compile()?;
        Ok(pattern)
    }

    /// Regex source, shared with the in-page matcher.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn compile(&self) -> Result<Regex, AutomationError> {
        RegexBuilder::new(&self.source)
            .case_insensitive(true)
            .build()
            .map_err(|e| AutomationError::InvalidSelector(format!("bad pattern '{}': {e}", self.source)))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compile().map(|re| re.is_match(text)).unwrap_or(false)
    }
}

impl fmt::Display for TextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

impl FromStr for TextPattern {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() >= 2 && s.starts_with('/') && s.ends_with('/') {
            TextPattern::regex(&s[1..s.len() - 1])
        } else if s.is_empty() {
            Err(AutomationError::InvalidSelector("empty text pattern".into()))
        } else {
            Ok(TextPattern::contains(s))
        }
    }
}

impl Serialize for TextPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TextPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Represents ways to locate a UI element on a page.
///
/// For maximum precision prefer `role:button|/^Create$/` over broad
/// selectors such as `text:Create` that could match several elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by ARIA role (explicit or implicit) and optional accessible name
    Role {
        role: String,
        name: Option<TextPattern>,
    },
    /// Select a form control by the text of its label
    Label(TextPattern),
    /// Select by visible text content
    Text(TextPattern),
    /// Select an input by its placeholder
    Placeholder(TextPattern),
    /// Raw CSS selector, last resort
    Css(String),
}

impl Selector {
    pub fn role(role: &str, name: TextPattern) -> Self {
        Selector::Role {
            role: role.to_lowercase(),
            name: Some(name),
        }
    }

    /// Short name of the strategy, used in logs and traces.
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Role { .. } => "role",
            Selector::Label(_) => "label",
            Selector::Text(_) => "text",
            Selector::Placeholder(_) => "placeholder",
            Selector::Css(_) => "css",
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Role { role, name: None } => write!(f, "role:{role}"),
            Selector::Role {
                role,
                name: Some(name),
            } => write!(f, "role:{role}|{name}"),
            Selector::Label(p) => write!(f, "label:{p}"),
            Selector::Text(p) => write!(f, "text:{p}"),
            Selector::Placeholder(p) => write!(f, "placeholder:{p}"),
            Selector::Css(css) => write!(f, "css:{css}"),
        }
    }
}

impl FromStr for Selector {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (prefix, rest) = s.split_once(':').ok_or_else(|| {
            AutomationError::InvalidSelector(format!(
                "'{s}' has no strategy prefix (role:, label:, text:, placeholder:, css:)"
            ))
        })?;

        match prefix.trim().to_lowercase().as_str() {
            "role" => {
                // role:button|New App
                let (role, name) = match rest.split_once('|') {
                    Some((role, name)) => (role.trim(), Some(name.trim().parse()?)),
                    None => (rest.trim(), None),
                };
                if role.is_empty() {
                    return Err(AutomationError::InvalidSelector(format!(
                        "'{s}' is missing a role"
                    )));
                }
                Ok(Selector::Role {
                    role: role.to_lowercase(),
                    name,
                })
            }
            "label" => Ok(Selector::Label(rest.trim().parse()?)),
            "text" => Ok(Selector::Text(rest.trim().parse()?)),
            "placeholder" => Ok(Selector::Placeholder(rest.trim().parse()?)),
            "css" if !rest.trim().is_empty() => Ok(Selector::Css(rest.trim().to_string())),
            "css" => Err(AutomationError::InvalidSelector("empty css selector".into())),
            other => Err(AutomationError::InvalidSelector(format!(
                "unknown strategy '{other}' in '{s}'"
            ))),
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
