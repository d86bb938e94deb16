//! Session export/import format

use crate::message::{Message, MessageSummary};
use crate::session::{SessionMemory, SessionMetadata};
use retain_foundation::{Error, JsonStore, Result};
use serde::{Deserialize, Serialize};

/// Directory under the store's base dir holding saved sessions
pub const SESSIONS_DIR: &str = "sessions";

/// Plain, serializable copy of one session's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub recent: Vec<Message>,
    pub summarized: Vec<MessageSummary>,
    pub metadata: SessionMetadata,
}

impl SessionSnapshot {
    pub(crate) fn capture(session: &SessionMemory) -> Self {
        Self {
            recent: session.recent().to_vec(),
            summarized: session.summarized().to_vec(),
            metadata: session.metadata().clone(),
        }
    }

    pub(crate) fn into_session(self) -> SessionMemory {
        SessionMemory::from_parts(self.recent, self.summarized, self.metadata)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write to `sessions/<session_id>.json` in the store
    pub fn save(&self, store: &JsonStore, session_id: &str) -> Result<()> {
        store.save(&Self::filename(session_id)?, self)
    }

    /// Read `sessions/<session_id>.json`, `None` if it was never saved
    pub fn load(store: &JsonStore, session_id: &str) -> Result<Option<Self>> {
        store.load_optional(&Self::filename(session_id)?)
    }

    /// Delete a saved session, returning whether one existed
    pub fn remove(store: &JsonStore, session_id: &str) -> Result<bool> {
        let filename = Self::filename(session_id)?;
        let existed = store.exists(&filename);
        store.remove(&filename)?;
        Ok(existed)
    }

    fn filename(session_id: &str) -> Result<String> {
        let safe = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !session_id.starts_with('.');
        if !safe {
            return Err(Error::InvalidInput(format!(
                "session id not usable as a file name: {:?}",
                session_id
            )));
        }
        Ok(format!("{}/{}.json", SESSIONS_DIR, session_id))
    }
}
