//! Core domain types.
//!
//! These types represent the pure domain model, independent of any
//! infrastructure concerns (storage, network, engine process).
//!
//! # Structure
//!
//! - `catalog` - Static model catalog (`ModelDescriptor`, `ModelCatalog`)
//! - `chat` - Chat sessions and messages
//! - `inference` - Engine parameters and completion requests

pub mod catalog;
pub mod chat;
pub mod inference;

pub use catalog::{ModelCatalog, ModelDescriptor, NO_MODEL_SELECTED};
pub use chat::{
    ChatSession, Message, MessageRole, SUBTITLE_MAX_CHARS, UNTITLED_SESSION, preview_of,
};
pub use inference::{
    ChatMessage, CompletionInput, CompletionRequest, DEFAULT_STOP_MARKERS, EngineParams,
    default_stop_markers,
};
