//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core expects from infrastructure.
//! They use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx`, `reqwest` or process types in any signature
//! - Engine handles never escape the lifecycle controller except as leases
//! - Storage is string-keyed; services own their JSON encoding

pub mod download_manager;
pub mod event_emitter;
pub mod inference;
pub mod kv_store;
pub mod wake_lock;

use thiserror::Error;

pub use download_manager::{DEFAULT_NOTIFICATION_STEP, DownloadManagerConfig, DownloadManagerPort};
pub use event_emitter::{AppEventEmitter, BroadcastEmitter, NoopEmitter};
pub use inference::{DiscardTokens, EngineError, EngineLoader, InferenceEngine, TokenSink};
pub use kv_store::{InMemoryKeyValueStore, KeyValueStore};
#[cfg(test)]
pub use kv_store::MockKeyValueStore;
pub use wake_lock::{NoopWakeLock, WakeLockGuard, WakeLockPort};

/// Errors from the key-value substrate.
///
/// Abstracts away backend details (e.g. sqlx errors).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Backend failure (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Backend(String),

    /// Serialization of a record failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Core error type for semantic domain errors.
///
/// Adapters map this to their own surface (UI messages, exit codes).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Lifecycle(#[from] crate::services::ModelLifecycleError),

    #[error(transparent)]
    Generation(#[from] crate::services::GenerationError),

    #[error(transparent)]
    Preferences(#[from] crate::services::PreferencesError),

    #[error(transparent)]
    Download(#[from] crate::download::DownloadError),

    #[error(transparent)]
    Path(#[from] crate::paths::PathError),

    /// Validation error (invalid input).
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_from_json() {
        let err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let storage: StorageError = err.into();
        assert!(matches!(storage, StorageError::Serialization(_)));
    }

    #[test]
    fn core_error_is_transparent() {
        let err: CoreError = StorageError::Backend("disk full".into()).into();
        assert_eq!(err.to_string(), "Storage error: disk full");
    }
}
