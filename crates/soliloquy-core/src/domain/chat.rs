//! Chat domain types.
//!
//! These types represent chat sessions and messages in the domain model,
//! independent of any infrastructure concerns. Field names serialize in
//! camelCase because they are persisted verbatim as JSON records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a session's subtitle preview.
pub const SUBTITLE_MAX_CHARS: usize = 100;

/// Title shown for sessions that have not been named yet.
pub const UNTITLED_SESSION: &str = "New Chat";

/// Persisted metadata for one chat session.
///
/// The transcript itself lives in a separate per-session message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique, time-derived identifier.
    pub id: String,
    /// Short label, absent until one has been derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Preview of the latest message (at most [`SUBTITLE_MAX_CHARS`] chars).
    #[serde(default)]
    pub subtitle: String,
    /// Human-readable date of the last modification.
    #[serde(default)]
    pub date: String,
    /// Milliseconds since the Unix epoch; listings sort on this, newest first.
    pub last_modified: i64,
    /// Catalog id of the model used for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl ChatSession {
    /// Create an untitled session stamped with `now`.
    pub fn new(id: impl Into<String>, model_id: Option<String>, now: DateTime<Local>) -> Self {
        Self {
            id: id.into(),
            title: None,
            subtitle: String::new(),
            date: format_display_date(now),
            last_modified: now.timestamp_millis(),
            model_id,
        }
    }

    /// Title to display, falling back to [`UNTITLED_SESSION`].
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED_SESSION)
    }

    /// Record that `latest` was appended at `now`.
    pub fn touch(&mut self, latest: &str, now: DateTime<Local>) {
        self.subtitle = preview_of(latest);
        self.date = format_display_date(now);
        self.last_modified = now.timestamp_millis();
    }
}

/// Truncate `text` to a single-paragraph preview of at most
/// [`SUBTITLE_MAX_CHARS`] characters.
pub fn preview_of(text: &str) -> String {
    text.trim().chars().take(SUBTITLE_MAX_CHARS).collect()
}

fn format_display_date(now: DateTime<Local>) -> String {
    now.format("%b %-d, %Y %H:%M").to_string()
}

/// A chat message within a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a message with a fresh random id.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Parse a role from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Convert role to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_serializes_camel_case_without_absent_title() {
        let session = ChatSession {
            id: "1700000000000".to_string(),
            title: None,
            subtitle: "hello".to_string(),
            date: "Nov 14, 2023 22:13".to_string(),
            last_modified: 1_700_000_000_000,
            model_id: Some("gemma-1b".to_string()),
        };

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"lastModified\":1700000000000"));
        assert!(json.contains("\"modelId\":\"gemma-1b\""));
        assert!(!json.contains("title"));
    }

    #[test]
    fn preview_is_capped_at_one_hundred_chars() {
        let long = "é".repeat(150);
        assert_eq!(preview_of(&long).chars().count(), SUBTITLE_MAX_CHARS);
        assert_eq!(preview_of("  short  "), "short");
    }

    #[test]
    fn display_title_falls_back() {
        let mut session = ChatSession::new("1", None, Local::now());
        assert_eq!(session.display_title(), UNTITLED_SESSION);
        session.title = Some("Trip planning".to_string());
        assert_eq!(session.display_title(), "Trip planning");
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse("tool"), None);
    }
}
