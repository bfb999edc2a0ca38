//! `AppCore` - the composition root for core services.
//!
//! UI adapters build one `AppCore` from concrete port implementations and
//! route user events through it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use super::{
    GenerationCoordinator, ModelLibrary, ModelLifecycleController, PreferencesService,
    SessionStore,
};
use crate::config::AppConfig;
use crate::domain::{ChatSession, ModelCatalog};
use crate::download::{DownloadError, DownloadProgress};
use crate::paths::{self, DirectoryCreationStrategy};
use crate::ports::{
    AppEventEmitter, CoreError, DownloadManagerPort, EngineLoader, KeyValueStore, StorageError,
    WakeLockPort,
};

/// Concrete adapters wired into the core.
#[derive(Clone)]
pub struct CorePorts {
    pub store: Arc<dyn KeyValueStore>,
    pub loader: Arc<dyn EngineLoader>,
    pub downloads: Arc<dyn DownloadManagerPort>,
    pub wake_lock: Arc<dyn WakeLockPort>,
    pub emitter: Arc<dyn AppEventEmitter>,
}

/// The core application facade.
pub struct AppCore {
    config: AppConfig,
    models_dir: PathBuf,
    catalog: Arc<ModelCatalog>,
    sessions: Arc<SessionStore>,
    lifecycle: Arc<ModelLifecycleController>,
    generation: GenerationCoordinator,
    preferences: PreferencesService,
    library: ModelLibrary,
    downloads: Arc<dyn DownloadManagerPort>,
}

impl AppCore {
    /// Build the core with the built-in catalog. Creates the models
    /// directory if needed.
    pub fn new(config: AppConfig, ports: CorePorts) -> Result<Self, CoreError> {
        Self::with_catalog(config, ports, ModelCatalog::builtin())
    }

    pub fn with_catalog(
        config: AppConfig,
        ports: CorePorts,
        catalog: ModelCatalog,
    ) -> Result<Self, CoreError> {
        let models_dir = config.models_dir()?;
        paths::ensure_directory(&models_dir, DirectoryCreationStrategy::AutoCreate)?;

        let catalog = Arc::new(catalog);
        let sessions = Arc::new(SessionStore::new(Arc::clone(&ports.store)));
        let lifecycle = Arc::new(ModelLifecycleController::new(
            ports.loader,
            config.engine,
            models_dir.clone(),
            config.load_progress,
            Arc::clone(&ports.emitter),
        ));
        let generation = GenerationCoordinator::new(
            Arc::clone(&lifecycle),
            Arc::clone(&sessions),
            Arc::clone(&ports.emitter),
            ports.wake_lock,
            config.generation.clone(),
        );
        let library = ModelLibrary::new(
            Arc::clone(&catalog),
            Arc::clone(&lifecycle),
            ports.emitter,
        );

        Ok(Self {
            preferences: PreferencesService::new(ports.store),
            config,
            models_dir,
            catalog,
            sessions,
            lifecycle,
            generation,
            library,
            downloads: ports.downloads,
        })
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn models_dir(&self) -> &std::path::Path {
        &self.models_dir
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn lifecycle(&self) -> &ModelLifecycleController {
        &self.lifecycle
    }

    pub const fn generation(&self) -> &GenerationCoordinator {
        &self.generation
    }

    pub const fn preferences(&self) -> &PreferencesService {
        &self.preferences
    }

    pub const fn library(&self) -> &ModelLibrary {
        &self.library
    }

    pub fn downloads(&self) -> &dyn DownloadManagerPort {
        self.downloads.as_ref()
    }

    /// Sessions for the history screen, newest first.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        self.sessions.list_sessions().await
    }

    /// Banner label for the active model.
    pub fn active_model_label(&self) -> String {
        let active = self.lifecycle.active_model_id();
        self.catalog.display_name_for(active.as_deref()).to_string()
    }

    /// Begin downloading a catalog model.
    pub async fn start_download(
        &self,
        model_id: &str,
    ) -> Result<watch::Receiver<DownloadProgress>, DownloadError> {
        let descriptor = self
            .catalog
            .find(model_id)
            .ok_or_else(|| DownloadError::unknown_model(model_id))?;
        self.downloads.start_download(descriptor).await
    }

    /// Cancel a download and remove any partial data.
    pub async fn cancel_download(&self, model_id: &str) -> Result<(), DownloadError> {
        if self.catalog.find(model_id).is_none() {
            return Err(DownloadError::unknown_model(model_id));
        }
        self.downloads.cancel_download(model_id).await
    }
}
