//! Session store - chat sessions and message logs over a key-value store.
//!
//! Session metadata lives under one key as a JSON array; each transcript
//! lives under its own `messages_<id>` key so listing sessions never reads
//! message content.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::domain::{ChatSession, Message};
use crate::ports::{KeyValueStore, StorageError};

/// Key holding the JSON array of session metadata.
pub const SESSIONS_KEY: &str = "data.chatSessions";

/// Prefix of per-session message log keys.
pub const MESSAGES_KEY_PREFIX: &str = "messages_";

/// Storage key of the message log for `session_id`.
pub fn messages_key(session_id: &str) -> String {
    format!("{MESSAGES_KEY_PREFIX}{session_id}")
}

/// Persistence for chat sessions and their transcripts.
///
/// Malformed records are logged and read as empty rather than surfaced as
/// errors. Writes that touch the session list are serialized.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// All sessions, most recently modified first.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        let mut sessions = self.read_sessions().await?;
        sort_by_recency(&mut sessions);
        Ok(sessions)
    }

    /// Look up one session's metadata.
    pub async fn get_session(&self, id: &str) -> Result<Option<ChatSession>, StorageError> {
        Ok(self
            .read_sessions()
            .await?
            .into_iter()
            .find(|session| session.id == id))
    }

    /// Insert the session if its id is unseen, otherwise replace it in place.
    pub async fn upsert_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut sessions = self.read_sessions().await?;
        match sessions.iter_mut().find(|existing| existing.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        sort_by_recency(&mut sessions);

        self.write_sessions(&sessions).await?;
        debug!(target: "soliloquy.sessions", session_id = %session.id, "Session saved");
        Ok(())
    }

    /// Remove a session's metadata and its message log.
    ///
    /// The log is removed first; if the metadata write then fails the log
    /// is written back, so either both survive or neither does.
    pub async fn delete_session(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let key = messages_key(id);
        let previous_log = self.store.get(&key).await?;
        self.store.remove(&key).await?;

        let mut sessions = self.read_sessions().await?;
        let before = sessions.len();
        sessions.retain(|session| session.id != id);

        if sessions.len() != before {
            if let Err(err) = self.write_sessions(&sessions).await {
                if let Some(raw) = previous_log {
                    if let Err(restore_err) = self.store.set(&key, &raw).await {
                        error!(
                            target: "soliloquy.sessions",
                            session_id = %id,
                            error = %restore_err,
                            "Failed to restore message log after aborted delete"
                        );
                    }
                }
                return Err(err);
            }
        }

        debug!(target: "soliloquy.sessions", session_id = %id, "Session deleted");
        Ok(())
    }

    /// The transcript for `id`; empty for unknown ids or unreadable logs.
    pub async fn get_messages(&self, id: &str) -> Result<Vec<Message>, StorageError> {
        let key = messages_key(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(Vec::new());
        };
        Ok(decode_or_empty(&key, &raw))
    }

    /// Overwrite the full transcript for `id`.
    pub async fn save_messages(&self, id: &str, messages: &[Message]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(messages)?;
        self.store.set(&messages_key(id), &raw).await
    }

    async fn read_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        let Some(raw) = self.store.get(SESSIONS_KEY).await? else {
            return Ok(Vec::new());
        };
        Ok(decode_or_empty(SESSIONS_KEY, &raw))
    }

    async fn write_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(sessions)?;
        self.store.set(SESSIONS_KEY, &raw).await
    }
}

fn sort_by_recency(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
}

fn decode_or_empty<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(
            target: "soliloquy.sessions",
            key = %key,
            error = %err,
            "Malformed record, treating as empty"
        );
        Vec::new()
    })
}
