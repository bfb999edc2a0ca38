//! Canonical event union for everything the UI layer observes.
//!
//! Model lifecycle, download, generation and session changes all flow
//! through [`AppEvent`] and an `AppEventEmitter` port implementation.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "generation_token", "sessionId": "1718000000000", "token": "Hel" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::ChatSession;
use crate::download::DownloadEvent;

/// Canonical event types for all observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ========== Model Lifecycle Events ==========
    /// Estimated load progress in `[0, 1]`.
    ModelLoadProgress { progress: f64 },

    /// A model finished loading and is now the active engine.
    ModelLoaded {
        #[serde(rename = "modelId")]
        model_id: String,
    },

    /// The active engine was released.
    ModelUnloaded {
        #[serde(rename = "modelId")]
        model_id: String,
    },

    /// A load attempt failed; the controller is back to unloaded.
    ModelLoadFailed {
        #[serde(rename = "modelId")]
        model_id: String,
        error: String,
    },

    /// A downloaded model file was removed from disk.
    ModelDeleted {
        #[serde(rename = "modelId")]
        model_id: String,
    },

    // ========== Download Events ==========
    #[serde(rename = "download")]
    Download { event: DownloadEvent },

    // ========== Generation Events ==========
    /// One streamed token, in emission order.
    GenerationToken {
        #[serde(rename = "sessionId")]
        session_id: String,
        token: String,
    },

    /// The streamed answer was committed as an assistant message.
    GenerationCompleted {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// The stream ended without any text; nothing was committed.
    GenerationDiscarded {
        #[serde(rename = "sessionId")]
        session_id: String,
    },

    /// The stream failed; partial text stays in the transient view only.
    GenerationFailed {
        #[serde(rename = "sessionId")]
        session_id: String,
        error: String,
    },

    // ========== Session Events ==========
    SessionUpdated { session: ChatSession },

    SessionDeleted {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl AppEvent {
    pub fn model_loaded(model_id: impl Into<String>) -> Self {
        Self::ModelLoaded {
            model_id: model_id.into(),
        }
    }

    pub fn model_unloaded(model_id: impl Into<String>) -> Self {
        Self::ModelUnloaded {
            model_id: model_id.into(),
        }
    }

    pub const fn download(event: DownloadEvent) -> Self {
        Self::Download { event }
    }

    /// Stable name of the variant, useful for logging.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ModelLoadProgress { .. } => "model_load_progress",
            Self::ModelLoaded { .. } => "model_loaded",
            Self::ModelUnloaded { .. } => "model_unloaded",
            Self::ModelLoadFailed { .. } => "model_load_failed",
            Self::ModelDeleted { .. } => "model_deleted",
            Self::Download { .. } => "download",
            Self::GenerationToken { .. } => "generation_token",
            Self::GenerationCompleted { .. } => "generation_completed",
            Self::GenerationDiscarded { .. } => "generation_discarded",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::SessionUpdated { .. } => "session_updated",
            Self::SessionDeleted { .. } => "session_deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_event_serializes_with_tag() {
        let event = AppEvent::GenerationToken {
            session_id: "42".to_string(),
            token: "Hel".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"generation_token\""));
        assert!(json.contains("\"sessionId\":\"42\""));
        assert_eq!(event.event_name(), "generation_token");
    }

    #[test]
    fn download_event_is_wrapped() {
        let event = AppEvent::download(DownloadEvent::Cancelled {
            model_id: "gemma-1b".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"download\""));
        assert!(json.contains("\"cancelled\""));
    }
}
