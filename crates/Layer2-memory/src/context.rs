//! Context rendering for prompt injection

use crate::session::SessionMemory;

const CONTEXT_HEADER: &str = "=== Conversation Context ===";
const SUMMARY_HEADER: &str = "=== Summary History ===";
const RECENT_HEADER: &str = "=== Recent Messages ===";
const END_MARKER: &str = "=== End Context ===\n";

/// Sessions with more messages than this get a metadata block
const METADATA_MIN_MESSAGES: usize = 5;
const MAX_TOPICS: usize = 5;
const SUMMARIES_SHOWN: usize = 3;
const RECENT_CHARS: usize = 150;
const COMPACT_RECENT_SHOWN: usize = 3;
const COMPACT_RECENT_CHARS: usize = 100;

/// Rough token count: one token per four characters
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Renders a [`SessionMemory`] into a bounded text block
///
/// The full rendering is tried first. If it is estimated over budget, a
/// compact rendering (message count, topics, last three messages) is
/// returned instead, even if that is still over budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_tokens: usize,
}

impl ContextBuilder {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn build(&self, session: &SessionMemory) -> String {
        let full = Self::full(session);
        let estimated = estimate_tokens(&full);
        if estimated <= self.max_tokens {
            return full;
        }

        tracing::debug!(
            estimated,
            budget = self.max_tokens,
            "Context over budget, using compact form"
        );
        Self::compact(session)
    }

    /// Metadata, last summaries and the whole recent window
    pub fn full(session: &SessionMemory) -> String {
        let metadata = session.metadata();
        let mut parts = Vec::new();

        if metadata.total_messages > METADATA_MIN_MESSAGES {
            parts.push(format!(
                "{}\nActive session since: {}\nMessages exchanged: {}\nTopics discussed: {}\n",
                CONTEXT_HEADER,
                metadata.created_at.format("%Y-%m-%d"),
                metadata.total_messages,
                top_topics(session),
            ));
        }

        let summaries = session.summarized();
        if !summaries.is_empty() {
            parts.push(SUMMARY_HEADER.to_string());
            let skip = summaries.len().saturating_sub(SUMMARIES_SHOWN);
            for summary in &summaries[skip..] {
                parts.push(format!("{}: {}", summary.role.label(), summary.summary));
            }
        }

        if !session.recent().is_empty() {
            parts.push(RECENT_HEADER.to_string());
            for message in session.recent() {
                parts.push(format!(
                    "{}: {}",
                    message.role.label(),
                    message.truncated(RECENT_CHARS)
                ));
            }
        }

        parts.push(END_MARKER.to_string());
        parts.join("\n")
    }

    /// Fallback rendering: counts, topics and the last few messages only
    pub fn compact(session: &SessionMemory) -> String {
        let metadata = session.metadata();
        let mut parts = Vec::new();

        if metadata.total_messages > METADATA_MIN_MESSAGES {
            parts.push(format!(
                "{}\nMessages: {}\nTopics: {}\n",
                CONTEXT_HEADER,
                metadata.total_messages,
                top_topics(session),
            ));
        }

        parts.push(RECENT_HEADER.to_string());
        let recent = session.recent();
        let skip = recent.len().saturating_sub(COMPACT_RECENT_SHOWN);
        for message in &recent[skip..] {
            parts.push(format!(
                "{}: {}",
                message.role.label(),
                message.truncated(COMPACT_RECENT_CHARS)
            ));
        }

        parts.push(END_MARKER.to_string());
        parts.join("\n")
    }
}

fn top_topics(session: &SessionMemory) -> String {
    session
        .metadata()
        .topics
        .iter()
        .take(MAX_TOPICS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
