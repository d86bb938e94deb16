//! ConversationMemory - multi-session memory store

use crate::context::ContextBuilder;
use crate::message::{Message, Role};
use crate::session::{SessionMemory, SessionMetadata};
use crate::snapshot::SessionSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use retain_foundation::{MemoryConfig, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Top keywords reported by [`ConversationMemory::session_analytics`]
const TOP_KEYWORDS: usize = 5;

// ============================================================================
// Analytics types
// ============================================================================

/// 세션 활동 수준 (recent window 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionActivity {
    New,
    Moderate,
    Active,
    #[serde(rename = "Very Active")]
    VeryActive,
}

impl SessionActivity {
    pub fn from_message_count(count: usize) -> Self {
        match count {
            0..=2 => SessionActivity::New,
            3..=7 => SessionActivity::Moderate,
            8..=14 => SessionActivity::Active,
            _ => SessionActivity::VeryActive,
        }
    }
}

impl std::fmt::Display for SessionActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionActivity::New => write!(f, "New"),
            SessionActivity::Moderate => write!(f, "Moderate"),
            SessionActivity::Active => write!(f, "Active"),
            SessionActivity::VeryActive => write!(f, "Very Active"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalytics {
    pub session_id: String,
    pub metadata: SessionMetadata,
    pub recent_message_count: usize,
    pub summarized_message_count: usize,
    pub avg_message_length: f64,
    /// User messages in the recent window containing `?`
    pub user_questions: usize,
    /// `(keyword, occurrences)` over the recent window, most frequent first
    pub top_keywords: Vec<(String, usize)>,
    pub activity: SessionActivity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub total_messages: usize,
    pub last_activity: DateTime<Utc>,
}

// ============================================================================
// ConversationMemory
// ============================================================================

/// Bounded memory for many concurrent conversations
///
/// The session map sits behind a read/write lock and every session behind
/// its own mutex, so work on one session never blocks another beyond the
/// brief map lookup.
pub struct ConversationMemory {
    config: MemoryConfig,
    context: ContextBuilder,
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionMemory>>>>,
}

impl ConversationMemory {
    /// Fails if the configured bounds are invalid
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            recent = config.max_recent_messages,
            summaries = config.max_summary_messages,
            threshold = config.compression_threshold,
            "Conversation memory ready"
        );
        Ok(Self {
            context: ContextBuilder::new(config.max_context_tokens),
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn session(&self, session_id: &str) -> Option<Arc<Mutex<SessionMemory>>> {
        self.sessions.read().get(session_id).cloned()
    }

    fn session_or_create(&self, session_id: &str) -> Arc<Mutex<SessionMemory>> {
        if let Some(session) = self.session(session_id) {
            return session;
        }

        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::debug!(session = %session_id, "Creating session");
            Arc::new(Mutex::new(SessionMemory::new()))
        }))
    }

    /// Record a message, creating the session on first use
    ///
    /// Returns the scored message as stored.
    pub fn add_message(&self, session_id: &str, role: Role, content: impl Into<String>) -> Message {
        let message = Message::new(role, content);
        let session = self.session_or_create(session_id);

        let mut session = session.lock();
        if let Some(outcome) = session.push(message.clone(), &self.config) {
            tracing::debug!(
                session = %session_id,
                removed = outcome.removed,
                summarized = outcome.summarized,
                "Session compressed"
            );
        }
        message
    }

    /// Context for a session within the configured token budget
    ///
    /// Unknown sessions yield an empty string and are not created.
    pub fn get_context(&self, session_id: &str) -> String {
        self.render_context(session_id, self.context)
    }

    /// Context for a session within an explicit token budget
    pub fn get_context_with_budget(&self, session_id: &str, max_tokens: usize) -> String {
        self.render_context(session_id, ContextBuilder::new(max_tokens))
    }

    fn render_context(&self, session_id: &str, builder: ContextBuilder) -> String {
        match self.session(session_id) {
            Some(session) => builder.build(&session.lock()),
            None => String::new(),
        }
    }

    /// Delete a session; returns whether it existed
    pub fn clear_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        if removed {
            tracing::info!(session = %session_id, "Session cleared");
        }
        removed
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn session_analytics(&self, session_id: &str) -> Option<SessionAnalytics> {
        let session = self.session(session_id)?;
        let session = session.lock();
        let recent = session.recent();

        let mut user_questions = 0;
        let mut total_chars = 0;
        let mut frequency: Vec<(String, usize)> = Vec::new();

        for message in recent {
            if message.role == Role::User && message.content.contains('?') {
                user_questions += 1;
            }
            total_chars += message.char_count();

            for keyword in &message.keywords {
                match frequency.iter_mut().find(|(k, _)| k == keyword) {
                    Some((_, count)) => *count += 1,
                    None => frequency.push((keyword.clone(), 1)),
                }
            }
        }

        // stable: equal counts stay in first-seen order
        frequency.sort_by(|a, b| b.1.cmp(&a.1));
        frequency.truncate(TOP_KEYWORDS);

        Some(SessionAnalytics {
            session_id: session_id.to_string(),
            metadata: session.metadata().clone(),
            recent_message_count: recent.len(),
            summarized_message_count: session.summarized().len(),
            avg_message_length: total_chars as f64 / recent.len().max(1) as f64,
            user_questions,
            top_keywords: frequency,
            activity: SessionActivity::from_message_count(recent.len()),
        })
    }

    /// Summary of every live session, oldest first
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read();
        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, session)| {
                let session = session.lock();
                let metadata = session.metadata();
                SessionInfo {
                    session_id: id.clone(),
                    created_at: metadata.created_at,
                    total_messages: metadata.total_messages,
                    last_activity: metadata.last_activity,
                }
            })
            .collect();

        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        infos
    }

    pub fn export_session(&self, session_id: &str) -> Option<SessionSnapshot> {
        let session = self.session(session_id)?;
        let snapshot = SessionSnapshot::capture(&session.lock());
        Some(snapshot)
    }

    /// Install a snapshot under `session_id`, replacing any existing state
    ///
    /// The snapshot is brought within this memory's bounds on the way in.
    pub fn import_session(&self, session_id: &str, snapshot: SessionSnapshot) {
        let mut session = snapshot.into_session();
        session.apply_bounds(&self.config);

        self.sessions
            .write()
            .insert(session_id.to_string(), Arc::new(Mutex::new(session)));
        tracing::info!(session = %session_id, "Session imported");
    }

    /// Drop sessions idle for longer than `max_idle`, returning how many
    ///
    /// Nothing calls this automatically.
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();

        sessions.retain(|_, session| {
            let last_activity = session.lock().metadata().last_activity;
            let idle = now
                .signed_duration_since(last_activity)
                .to_std()
                .unwrap_or_default();
            idle <= max_idle
        });

        let expired = before - sessions.len();
        if expired > 0 {
            tracing::info!(expired, "Expired idle sessions");
        }
        expired
    }
}

impl std::fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationMemory")
            .field("config", &self.config)
            .field("sessions", &self.session_count())
            .finish()
    }
}
