//! Core domain types shared by the pipeline, the chat responder and the server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved location value marking an absent or unresolved location.
pub const LOCATION_UNKNOWN: &str = "Unknown";

/// Disclaimer every synthesized answer must carry verbatim.
pub const DISCLAIMER: &str = "Not medical advice. Consult professional. Emergencies: seek help.";

/// Whether `location` names a real place rather than the sentinel.
pub fn is_known_location(location: &str) -> bool {
    location != LOCATION_UNKNOWN
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One information-gathering action the planner may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Medical,
    Hospitals,
    Advisories,
    Weather,
}

impl Action {
    /// The full vocabulary, in execution order.
    pub const ALL: [Action; 4] = [
        Action::Medical,
        Action::Hospitals,
        Action::Advisories,
        Action::Weather,
    ];

    /// Keyword used in prompts and plan output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Hospitals => "hospitals",
            Self::Advisories => "advisories",
            Self::Weather => "weather",
        }
    }

    /// Parse a single keyword, ignoring case and surrounding whitespace.
    pub fn parse(keyword: &str) -> Option<Self> {
        let keyword = keyword.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|a| a.as_str() == keyword)
    }

    /// Split raw keywords into recognised actions (deduplicated, first-seen
    /// order) and the keywords that fell outside the vocabulary.
    pub fn parse_list<I, S>(keywords: I) -> (Vec<Action>, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = Vec::new();
        let mut ignored = Vec::new();
        for keyword in keywords {
            match Self::parse(keyword.as_ref()) {
                Some(action) if !accepted.contains(&action) => accepted.push(action),
                Some(_) => {}
                None => ignored.push(keyword.as_ref().to_string()),
            }
        }
        (accepted, ignored)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Hospital
// ---------------------------------------------------------------------------

/// A nearby facility returned by the hospital lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub name: String,
    /// Street address, `"N/A"` when the provider has none.
    pub address: String,
    /// Average rating, `"N/A"` when unrated.
    pub rating: String,
}

impl Hospital {
    /// Bullet line used when composing the final answer.
    pub fn bullet(&self) -> String {
        format!("- {}, {} (Rating: {})", self.name, self.address, self.rating)
    }
}

// ---------------------------------------------------------------------------
// FieldOutcome
// ---------------------------------------------------------------------------

/// Result of one contained adapter call.
///
/// A field that was never attempted is `None` at the state level; a field
/// whose call failed is `Degraded` and still flows to synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FieldOutcome<T> {
    Ok(T),
    Degraded(String),
}

impl<T> FieldOutcome<T> {
    pub fn degraded(reason: impl fmt::Display) -> Self {
        Self::Degraded(reason.to_string())
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Degraded(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a language-model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
