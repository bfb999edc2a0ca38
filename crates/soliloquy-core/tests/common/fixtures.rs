//! Harness wiring real services to fakes inside a temp directory.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use soliloquy_core::config::{GenerationConfig, LoadProgressConfig};
use soliloquy_core::{
    EngineParams, GenerationCoordinator, InMemoryKeyValueStore, ModelLifecycleController,
    SessionStore,
};

use super::fakes::{CountingWakeLock, FakeLoader, RecordingEmitter};

pub fn fast_progress() -> LoadProgressConfig {
    LoadProgressConfig {
        tick: Duration::from_millis(5),
        min_estimate: Duration::from_millis(20),
        finish_duration: Duration::from_millis(20),
        ..LoadProgressConfig::default()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub loader: Arc<FakeLoader>,
    pub emitter: RecordingEmitter,
    pub wake_lock: Arc<CountingWakeLock>,
    pub store: Arc<InMemoryKeyValueStore>,
    pub sessions: Arc<SessionStore>,
    pub lifecycle: Arc<ModelLifecycleController>,
    pub coordinator: Arc<GenerationCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_loader(FakeLoader::new())
    }

    pub fn with_loader(loader: FakeLoader) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(loader);
        let emitter = RecordingEmitter::default();
        let wake_lock = Arc::new(CountingWakeLock::default());
        let store = Arc::new(InMemoryKeyValueStore::new());
        let sessions = Arc::new(SessionStore::new(store.clone()));
        let lifecycle = Arc::new(ModelLifecycleController::new(
            loader.clone(),
            EngineParams::default(),
            dir.path().to_path_buf(),
            fast_progress(),
            Arc::new(emitter.clone()),
        ));
        let coordinator = Arc::new(GenerationCoordinator::new(
            lifecycle.clone(),
            sessions.clone(),
            Arc::new(emitter.clone()),
            wake_lock.clone(),
            GenerationConfig::default(),
        ));

        Self {
            dir,
            loader,
            emitter,
            wake_lock,
            store,
            sessions,
            lifecycle,
            coordinator,
        }
    }

    /// Create a model file in the models directory.
    pub fn add_model_file(&self, filename: &str) {
        std::fs::write(self.dir.path().join(filename), b"GGUF fake weights").unwrap();
    }

    /// Create `model.gguf` and load it as `model`.
    pub async fn loaded(self) -> Self {
        self.add_model_file("model.gguf");
        self.lifecycle.load("model", "model.gguf").await.unwrap();
        self
    }
}

/// Yield until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}
