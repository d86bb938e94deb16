//! Per-session memory: recent window, summaries, metadata

use crate::message::{Message, MessageSummary};
use chrono::{DateTime, Utc};
use retain_foundation::MemoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 세션 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub created_at: DateTime<Utc>,
    /// Messages ever added, including compressed and dropped ones
    pub total_messages: usize,
    /// Distinct keywords in first-seen order
    ///
    /// Never pruned: grows with the session's vocabulary until the session
    /// is cleared or expired.
    pub topics: Vec<String>,
    pub last_activity: DateTime<Utc>,
    /// Membership index over `topics`, rebuilt when out of step
    #[serde(skip)]
    topic_index: HashSet<String>,
}

impl PartialEq for SessionMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.created_at == other.created_at
            && self.total_messages == other.total_messages
            && self.topics == other.topics
            && self.last_activity == other.last_activity
    }
}

impl SessionMetadata {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            total_messages: 0,
            topics: Vec::new(),
            last_activity: now,
            topic_index: HashSet::new(),
        }
    }

    fn record(&mut self, message: &Message) {
        self.total_messages += 1;
        // Deserialized or hand-edited metadata arrives without an index.
        if self.topic_index.len() != self.topics.len() {
            self.topic_index = self.topics.iter().cloned().collect();
        }
        for keyword in &message.keywords {
            if self.topic_index.insert(keyword.clone()) {
                self.topics.push(keyword.clone());
            }
        }
        self.last_activity = message.timestamp;
    }
}

/// What a compression pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionOutcome {
    /// Messages that left the recent window
    pub removed: usize,
    /// Of those, how many became summaries
    pub summarized: usize,
    /// Summaries evicted to respect the summary bound
    pub evicted: usize,
}

/// Memory of one conversation
#[derive(Debug, Clone)]
pub struct SessionMemory {
    recent: Vec<Message>,
    summarized: Vec<MessageSummary>,
    metadata: SessionMetadata,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMemory {
    pub fn new() -> Self {
        Self {
            recent: Vec::new(),
            summarized: Vec::new(),
            metadata: SessionMetadata::new(),
        }
    }

    pub(crate) fn from_parts(
        recent: Vec<Message>,
        summarized: Vec<MessageSummary>,
        metadata: SessionMetadata,
    ) -> Self {
        Self {
            recent,
            summarized,
            metadata,
        }
    }

    pub fn recent(&self) -> &[Message] {
        &self.recent
    }

    pub fn summarized(&self) -> &[MessageSummary] {
        &self.summarized
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Append a message, compressing once the window passes the threshold
    pub fn push(&mut self, message: Message, config: &MemoryConfig) -> Option<CompressionOutcome> {
        self.metadata.record(&message);
        self.recent.push(message);

        if self.recent.len() > config.compression_threshold {
            Some(self.compress(config))
        } else {
            None
        }
    }

    /// Demote everything older than the last `max_recent_messages`
    ///
    /// Demoted messages scoring above the retention threshold become
    /// summaries; the rest are forgotten. When summaries exceed their bound
    /// the least important are evicted, ties keeping their existing order.
    pub fn compress(&mut self, config: &MemoryConfig) -> CompressionOutcome {
        let mut outcome = CompressionOutcome::default();

        let keep_from = self.recent.len().saturating_sub(config.max_recent_messages);
        let demoted: Vec<Message> = self.recent.drain(..keep_from).collect();
        outcome.removed = demoted.len();

        for message in &demoted {
            if message.importance > config.retention_threshold {
                self.summarized.push(MessageSummary::from_message(message));
                outcome.summarized += 1;
            }
        }

        outcome.evicted = self.enforce_summary_bound(config);

        tracing::debug!(
            removed = outcome.removed,
            summarized = outcome.summarized,
            evicted = outcome.evicted,
            "Compressed session memory"
        );

        outcome
    }

    /// Bring an externally built session back within the configured bounds
    pub(crate) fn apply_bounds(&mut self, config: &MemoryConfig) {
        if self.recent.len() > config.compression_threshold {
            self.compress(config);
        } else {
            self.enforce_summary_bound(config);
        }
    }

    fn enforce_summary_bound(&mut self, config: &MemoryConfig) -> usize {
        if self.summarized.len() <= config.max_summary_messages {
            return 0;
        }

        // sort_by is stable
        self.summarized
            .sort_by(|a, b| b.importance.total_cmp(&a.importance));
        let evicted = self.summarized.len() - config.max_summary_messages;
        self.summarized.truncate(config.max_summary_messages);
        evicted
    }
}
