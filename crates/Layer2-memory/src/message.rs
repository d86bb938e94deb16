//! Conversation message types

use crate::scoring::{extract_keywords, importance_score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content shorter than or equal to this is summarized verbatim
pub const SUMMARY_VERBATIM_CHARS: usize = 100;
const SUMMARY_HEAD_CHARS: usize = 50;
const SUMMARY_TAIL_CHARS: usize = 30;

/// 메시지 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering context
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = retain_foundation::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(retain_foundation::Error::InvalidInput(format!(
                "unknown role: {}",
                other
            ))),
        }
    }
}

/// A full message held in the recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub importance: f64,
    pub keywords: Vec<String>,
}

impl Message {
    /// Score and tag a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            role,
            importance: importance_score(&content, role),
            keywords: extract_keywords(&content),
            timestamp: Utc::now(),
            content,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Content cut to `max_chars`, with `...` appended when cut
    pub fn truncated(&self, max_chars: usize) -> String {
        truncate_chars(&self.content, max_chars)
    }
}

/// Compressed trace of a message that left the recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub role: Role,
    pub summary: String,
    pub keywords: Vec<String>,
    pub importance: f64,
    pub timestamp: DateTime<Utc>,
}

impl MessageSummary {
    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.role,
            summary: summarize(&message.content),
            keywords: message.keywords.clone(),
            importance: message.importance,
            timestamp: message.timestamp,
        }
    }
}

/// Head and tail of long content joined by ` [...] `
///
/// Content up to 100 characters is returned unchanged.
pub fn summarize(content: &str) -> String {
    let length = content.chars().count();
    if length <= SUMMARY_VERBATIM_CHARS {
        return content.to_string();
    }

    let head: String = content.chars().take(SUMMARY_HEAD_CHARS).collect();
    let tail: String = content.chars().skip(length - SUMMARY_TAIL_CHARS).collect();
    format!("{} [...] {}", head, tail)
}

pub(crate) fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_scored_on_creation() {
        let message = Message::user("How does quantum computing work?");
        assert_eq!(message.role, Role::User);
        assert!((message.importance - 0.75).abs() < 1e-9);
        assert_eq!(message.keywords, vec!["does", "quantum", "computing", "work"]);
    }

    #[test]
    fn test_summarize_short_is_verbatim() {
        let text = "a".repeat(100);
        assert_eq!(summarize(&text), text);
    }

    #[test]
    fn test_summarize_long_keeps_head_and_tail() {
        let text = format!("{}{}{}", "h".repeat(50), "m".repeat(40), "t".repeat(30));
        let summary = summarize(&text);
        assert_eq!(summary, format!("{} [...] {}", "h".repeat(50), "t".repeat(30)));
    }

    #[test]
    fn test_summarize_counts_chars_not_bytes() {
        let text = "é".repeat(120);
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), 50 + 7 + 30);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_role_parse_and_serde() {
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert!("system".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
