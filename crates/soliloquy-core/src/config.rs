//! Application configuration.
//!
//! Plain structs with sensible defaults and builder-style setters. Nothing
//! here is user-tunable at runtime; preferences live in
//! [`crate::services::PreferencesService`].

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{EngineParams, default_stop_markers};
use crate::paths::{self, PathError};
use crate::ports::DEFAULT_NOTIFICATION_STEP;

/// Default system preamble prepended to every chat request.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, concise assistant running entirely on this device.";

/// Top-level configuration for [`crate::services::AppCore`].
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Explicit data root; `None` resolves via [`paths::data_root`].
    pub data_root: Option<PathBuf>,
    pub engine: EngineParams,
    pub generation: GenerationConfig,
    pub load_progress: LoadProgressConfig,
    pub download: DownloadConfig,
}

impl AppConfig {
    #[must_use]
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(root.into());
        self
    }

    #[must_use]
    pub const fn with_engine(mut self, engine: EngineParams) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub const fn with_load_progress(mut self, load_progress: LoadProgressConfig) -> Self {
        self.load_progress = load_progress;
        self
    }

    #[must_use]
    pub const fn with_download(mut self, download: DownloadConfig) -> Self {
        self.download = download;
        self
    }

    /// Resolve the data root (explicit, then environment, then platform).
    pub fn resolve_data_root(&self) -> Result<PathBuf, PathError> {
        paths::data_root(self.data_root.as_deref())
    }

    /// Models directory under the resolved data root.
    pub fn models_dir(&self) -> Result<PathBuf, PathError> {
        self.resolve_data_root().map(|root| paths::models_dir(&root))
    }

    /// Database file under the resolved data root.
    pub fn database_path(&self) -> Result<PathBuf, PathError> {
        self.resolve_data_root()
            .map(|root| paths::database_path(&root))
    }
}

/// Parameters for chat completions and title derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop_markers: Vec<String>,
    /// Titles are derived only when the opening message is longer than this.
    pub title_min_chars: usize,
    /// Opening message is truncated to this many characters for the title
    /// request.
    pub title_context_chars: usize,
    pub title_max_words: usize,
    pub title_max_tokens: u32,
    pub title_temperature: f32,
    /// Appended to a partial answer when its stream fails.
    pub error_marker: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 512,
            temperature: 0.7,
            stop_markers: default_stop_markers(),
            title_min_chars: 12,
            title_context_chars: 300,
            title_max_words: 5,
            title_max_tokens: 16,
            title_temperature: 0.3,
            error_marker: "[generation failed]".to_string(),
        }
    }
}

impl GenerationConfig {
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Pacing of the synthetic load progress ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgressConfig {
    /// Progress reported as soon as loading starts.
    pub initial: f64,
    /// The estimate never passes this until the load really completes.
    pub ceiling: f64,
    /// Assumed read throughput used to estimate load duration.
    pub bytes_per_second: u64,
    /// Lower bound on the estimated duration.
    pub min_estimate: Duration,
    pub tick: Duration,
    /// Duration of the final ramp to 1.0 once the engine is ready.
    pub finish_duration: Duration,
}

impl Default for LoadProgressConfig {
    fn default() -> Self {
        Self {
            initial: 0.05,
            ceiling: 0.90,
            bytes_per_second: 200 * 1024 * 1024,
            min_estimate: Duration::from_millis(500),
            tick: Duration::from_millis(100),
            finish_duration: Duration::from_millis(300),
        }
    }
}

impl LoadProgressConfig {
    /// Ramp duration for a file of `file_size` bytes.
    #[must_use]
    pub fn estimated_duration(&self, file_size: u64) -> Duration {
        let throughput = self.bytes_per_second.max(1);
        let millis = file_size.saturating_mul(1000) / throughput;
        Duration::from_millis(millis).max(self.min_estimate)
    }
}

/// Download manager settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Minimum percent advance between two progress notifications.
    pub notification_step: u8,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            notification_step: DEFAULT_NOTIFICATION_STEP,
        }
    }
}
