//! Model and session orchestration core for an on-device chat assistant.
//!
//! - [`domain`]: catalog, chat sessions, messages and inference requests
//! - [`ports`]: traits the core expects from infrastructure (storage,
//!   inference engine, downloads, wake lock, events)
//! - [`services`]: session store, model lifecycle, generation, preferences,
//!   model library and the [`AppCore`] composition root
//! - [`events`]: the [`AppEvent`] union observed by UI adapters

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod download;
pub mod events;
pub mod paths;
pub mod ports;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{AppConfig, DownloadConfig, GenerationConfig, LoadProgressConfig};
pub use domain::{
    ChatMessage, ChatSession, CompletionInput, CompletionRequest, EngineParams, Message,
    MessageRole, ModelCatalog, ModelDescriptor,
};
pub use download::{DownloadError, DownloadEvent, DownloadProgress, DownloadResult, DownloadStatus};
pub use events::AppEvent;
pub use ports::{
    AppEventEmitter, BroadcastEmitter, CoreError, DownloadManagerConfig, DownloadManagerPort,
    EngineError, EngineLoader, InMemoryKeyValueStore, InferenceEngine, KeyValueStore,
    NoopEmitter, NoopWakeLock, StorageError, TokenSink, WakeLockGuard, WakeLockPort,
};
pub use services::{
    AppCore, ConversationView, CorePorts, EngineLease, GenerationCoordinator, GenerationError,
    LifecycleState, ModelAvailability, ModelEntry, ModelLibrary, ModelLifecycleController,
    ModelLifecycleError, Preferences, PreferencesError, PreferencesService, SendOutcome,
    SessionStore,
};

pub use paths::{
    DirectoryCreationStrategy, PathError, data_root, database_path, ensure_directory, models_dir,
};
