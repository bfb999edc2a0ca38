//! Generation coordinator.
//!
//! Drives one streamed completion at a time against the active engine and
//! keeps the session transcript consistent with it. Tokens accumulate in a
//! transient buffer that observers can see; only a finished, non-empty
//! answer becomes a persisted assistant message.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model_lifecycle::{EngineLease, ModelLifecycleController};
use super::session_store::SessionStore;
use super::title;
use crate::config::GenerationConfig;
use crate::domain::{
    ChatMessage, ChatSession, CompletionInput, CompletionRequest, Message, MessageRole,
};
use crate::events::AppEvent;
use crate::ports::{AppEventEmitter, EngineError, StorageError, WakeLockGuard, WakeLockPort};

/// Wake-lock tag held while a response is generated.
pub const GENERATION_WAKE_TAG: &str = "soliloquy.generation";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Message is empty")]
    EmptyMessage,

    /// A response is already being generated.
    #[error("A response is already being generated")]
    AlreadyGenerating,

    #[error("No model is loaded")]
    NoModelLoaded,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The stream failed; the partial answer stays in the transient view.
    #[error("Generation failed: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How a successful `send` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The answer was committed as message `message_id`.
    Completed { session_id: String, message_id: String },
    /// The stream produced no text; nothing was committed.
    Discarded { session_id: String },
}

/// Snapshot of the conversation shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub session: Option<ChatSession>,
    /// Committed transcript.
    pub messages: Vec<Message>,
    /// Uncommitted answer text, growing token by token.
    pub streaming: String,
    /// Marker shown after a failed stream's partial text.
    pub error: Option<String>,
    pub is_generating: bool,
}

#[derive(Default)]
struct Conversation {
    session: Option<ChatSession>,
    messages: Vec<Message>,
    streaming: String,
    error: Option<String>,
    /// Session the in-flight generation writes to.
    generating_for: Option<String>,
}

impl Conversation {
    fn shows(&self, session_id: &str) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session_id)
    }
}

/// Hands out time-derived session ids, bumped to stay unique.
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    last: AtomicI64,
}

impl SessionIdGenerator {
    pub fn next_id(&self) -> String {
        let now = Local::now().timestamp_millis();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Resets the in-flight flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Coordinates chat turns against the active model.
pub struct GenerationCoordinator {
    lifecycle: Arc<ModelLifecycleController>,
    sessions: Arc<SessionStore>,
    emitter: Arc<dyn AppEventEmitter>,
    wake_lock: Arc<dyn WakeLockPort>,
    config: GenerationConfig,
    generating: AtomicBool,
    conversation: Mutex<Conversation>,
    ids: SessionIdGenerator,
}

impl GenerationCoordinator {
    pub fn new(
        lifecycle: Arc<ModelLifecycleController>,
        sessions: Arc<SessionStore>,
        emitter: Arc<dyn AppEventEmitter>,
        wake_lock: Arc<dyn WakeLockPort>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            lifecycle,
            sessions,
            emitter,
            wake_lock,
            config,
            generating: AtomicBool::new(false),
            conversation: Mutex::new(Conversation::default()),
            ids: SessionIdGenerator::default(),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    pub fn view(&self) -> ConversationView {
        let conversation = self.lock();
        ConversationView {
            session: conversation.session.clone(),
            messages: conversation.messages.clone(),
            streaming: conversation.streaming.clone(),
            error: conversation.error.clone(),
            is_generating: self.is_generating(),
        }
    }

    /// Start a fresh, not yet persisted conversation.
    pub fn new_conversation(&self) {
        let mut conversation = self.lock();
        let generating_for = conversation.generating_for.take();
        *conversation = Conversation {
            generating_for,
            ..Conversation::default()
        };
    }

    /// Show a persisted session.
    pub async fn open_session(&self, id: &str) -> Result<ConversationView, GenerationError> {
        let session = self
            .sessions
            .get_session(id)
            .await?
            .ok_or_else(|| GenerationError::SessionNotFound(id.to_string()))?;
        let messages = self.sessions.get_messages(id).await?;

        {
            let mut conversation = self.lock();
            let generating_for = conversation.generating_for.take();
            *conversation = Conversation {
                session: Some(session),
                messages,
                generating_for,
                ..Conversation::default()
            };
        }
        Ok(self.view())
    }

    /// Delete a session, clearing the view if it was showing it.
    pub async fn delete_session(&self, id: &str) -> Result<(), GenerationError> {
        if self.lock().generating_for.as_deref() == Some(id) {
            return Err(GenerationError::AlreadyGenerating);
        }
        self.sessions.delete_session(id).await?;
        {
            let mut conversation = self.lock();
            if conversation.shows(id) {
                let generating_for = conversation.generating_for.take();
                *conversation = Conversation {
                    generating_for,
                    ..Conversation::default()
                };
            }
        }
        self.emitter.emit(AppEvent::SessionDeleted {
            session_id: id.to_string(),
        });
        Ok(())
    }

    /// Append `user_text` to the current conversation and stream a reply.
    pub async fn send(&self, user_text: &str) -> Result<SendOutcome, GenerationError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyMessage);
        }

        if self
            .generating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GenerationError::AlreadyGenerating);
        }
        let _busy = BusyGuard(&self.generating);

        let lease = self
            .lifecycle
            .lease()
            .map_err(|_| GenerationError::NoModelLoaded)?;
        let _wake = WakeLockGuard::acquire(Arc::clone(&self.wake_lock), GENERATION_WAKE_TAG);

        let (mut session, mut messages) = {
            let mut conversation = self.lock();
            let mut session = conversation.session.take().unwrap_or_else(|| {
                ChatSession::new(
                    self.ids.next_id(),
                    Some(lease.model_id().to_string()),
                    Local::now(),
                )
            });
            session.touch(text, Local::now());
            conversation.messages.push(Message::user(text));
            conversation.streaming.clear();
            conversation.error = None;
            conversation.session = Some(session.clone());
            conversation.generating_for = Some(session.id.clone());
            (session, conversation.messages.clone())
        };
        let session_id = session.id.clone();

        let result = self.run_turn(&lease, &mut session, &mut messages).await;

        match &result {
            Ok(SendOutcome::Completed { .. }) if session.title.is_none() => {
                self.derive_title(&lease, &mut session, &messages).await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "soliloquy.generation", session_id = %session_id, error = %err, "Send failed");
            }
        }

        self.lock().generating_for = None;
        result
    }

    async fn run_turn(
        &self,
        lease: &EngineLease,
        session: &mut ChatSession,
        messages: &mut Vec<Message>,
    ) -> Result<SendOutcome, GenerationError> {
        let session_id = session.id.clone();
        self.persist(session, messages).await?;

        let request = self.chat_request(messages);
        let mut buffer = String::new();
        let completion = {
            let mut sink = |token: &str| {
                buffer.push_str(token);
                {
                    let mut conversation = self.lock();
                    if conversation.shows(&session_id) {
                        conversation.streaming.push_str(token);
                    }
                }
                self.emitter.emit(AppEvent::GenerationToken {
                    session_id: session_id.clone(),
                    token: token.to_string(),
                });
            };
            lease.engine().complete(request, &mut sink).await
        };

        match completion {
            Ok(_) if buffer.is_empty() => {
                self.clear_streaming(&session_id);
                debug!(target: "soliloquy.generation", session_id = %session_id, "Empty response discarded");
                self.emitter.emit(AppEvent::GenerationDiscarded {
                    session_id: session_id.clone(),
                });
                Ok(SendOutcome::Discarded { session_id })
            }
            Ok(_) => {
                let answer = Message::assistant(buffer);
                let message_id = answer.id.clone();
                session.touch(&answer.content, Local::now());
                messages.push(answer.clone());

                {
                    let mut conversation = self.lock();
                    if conversation.shows(&session_id) {
                        conversation.streaming.clear();
                        conversation.messages.push(answer);
                        conversation.session = Some(session.clone());
                    }
                }

                self.persist(session, messages).await?;
                info!(
                    target: "soliloquy.generation",
                    session_id = %session_id,
                    message_id = %message_id,
                    "Response committed"
                );
                self.emitter.emit(AppEvent::GenerationCompleted {
                    session_id: session_id.clone(),
                    message_id: message_id.clone(),
                });
                Ok(SendOutcome::Completed {
                    session_id,
                    message_id,
                })
            }
            Err(err) => {
                {
                    let mut conversation = self.lock();
                    if conversation.shows(&session_id) {
                        conversation.error = Some(self.config.error_marker.clone());
                    }
                }
                self.emitter.emit(AppEvent::GenerationFailed {
                    session_id,
                    error: err.to_string(),
                });
                Err(GenerationError::Engine(err))
            }
        }
    }

    async fn derive_title(
        &self,
        lease: &EngineLease,
        session: &mut ChatSession,
        messages: &[Message],
    ) {
        let Some(opening) = messages.iter().find(|m| m.role == MessageRole::User) else {
            return;
        };
        if !title::wants_title(&opening.content, &self.config) {
            return;
        }
        let Some(label) = title::derive_title(lease.engine(), &opening.content, &self.config).await
        else {
            return;
        };

        session.title = Some(label);
        if let Err(err) = self.sessions.upsert_session(session).await {
            warn!(target: "soliloquy.generation", session_id = %session.id, error = %err, "Failed to save title");
            return;
        }
        {
            let mut conversation = self.lock();
            if conversation.shows(&session.id) {
                conversation.session = Some(session.clone());
            }
        }
        self.emitter.emit(AppEvent::SessionUpdated {
            session: session.clone(),
        });
    }

    fn chat_request(&self, messages: &[Message]) -> CompletionRequest {
        let mut history = Vec::with_capacity(messages.len() + 1);
        if !self.config.system_prompt.is_empty() {
            history.push(ChatMessage::new(
                MessageRole::System,
                self.config.system_prompt.clone(),
            ));
        }
        history.extend(messages.iter().map(ChatMessage::from));

        CompletionRequest {
            input: CompletionInput::Messages(history),
            max_tokens: self.config.max_tokens,
            stop: self.config.stop_markers.clone(),
            temperature: self.config.temperature,
        }
    }

    async fn persist(&self, session: &ChatSession, messages: &[Message]) -> Result<(), StorageError> {
        self.sessions.save_messages(&session.id, messages).await?;
        self.sessions.upsert_session(session).await?;
        self.emitter.emit(AppEvent::SessionUpdated {
            session: session.clone(),
        });
        Ok(())
    }

    fn clear_streaming(&self, session_id: &str) {
        let mut conversation = self.lock();
        if conversation.shows(session_id) {
            conversation.streaming.clear();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
