//! Core services - the orchestration layer.
//!
//! Services coordinate ports and domain logic; none of them know which
//! adapters sit behind the ports.

mod app_core;
mod generation;
mod load_progress;
mod model_library;
mod model_lifecycle;
mod preferences;
mod session_store;
pub mod title;

pub use app_core::{AppCore, CorePorts};
pub use generation::{
    ConversationView, GENERATION_WAKE_TAG, GenerationCoordinator, GenerationError, SendOutcome,
    SessionIdGenerator,
};
pub use load_progress::LoadProgressEstimator;
pub use model_library::{ModelAvailability, ModelEntry, ModelLibrary};
pub use model_lifecycle::{
    EngineLease, LifecycleState, ModelLifecycleController, ModelLifecycleError,
};
pub use preferences::{
    DARK_MODE_KEY, DEFAULT_DARK_MODE, DEFAULT_SEED_COLOR, Preferences, PreferencesError,
    PreferencesService, SEED_COLOR_KEY,
};
pub use session_store::{MESSAGES_KEY_PREFIX, SESSIONS_KEY, SessionStore, messages_key};
