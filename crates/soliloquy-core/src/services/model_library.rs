//! Model library - catalog entries joined with what is on disk.
//!
//! A model is downloaded exactly when its file exists in the models
//! directory. There is no manifest.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::model_lifecycle::{LifecycleState, ModelLifecycleController, ModelLifecycleError};
use crate::domain::{ModelCatalog, ModelDescriptor};
use crate::events::AppEvent;
use crate::paths;
use crate::ports::AppEventEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelAvailability {
    Downloaded,
    NotDownloaded,
}

/// One catalog model with its local status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub descriptor: ModelDescriptor,
    pub availability: ModelAvailability,
    pub is_active: bool,
    pub path: PathBuf,
}

pub struct ModelLibrary {
    catalog: Arc<ModelCatalog>,
    lifecycle: Arc<ModelLifecycleController>,
    emitter: Arc<dyn AppEventEmitter>,
}

impl ModelLibrary {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        lifecycle: Arc<ModelLifecycleController>,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            catalog,
            lifecycle,
            emitter,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Every catalog model with its availability.
    pub async fn list(&self) -> Result<Vec<ModelEntry>, ModelLifecycleError> {
        let active = self.lifecycle.active_model_id();
        let mut entries = Vec::with_capacity(self.catalog.models().len());
        for descriptor in self.catalog.models() {
            let path = self.path_of(descriptor)?;
            let availability = availability_of(&path).await;
            entries.push(ModelEntry {
                is_active: active.as_deref() == Some(descriptor.id.as_str()),
                descriptor: descriptor.clone(),
                availability,
                path,
            });
        }
        Ok(entries)
    }

    pub async fn availability(&self, model_id: &str) -> Result<ModelAvailability, ModelLifecycleError> {
        let path = self.path_of(self.descriptor(model_id)?)?;
        Ok(availability_of(&path).await)
    }

    /// Load a catalog model into the engine.
    pub async fn load_model(&self, model_id: &str) -> Result<(), ModelLifecycleError> {
        let descriptor = self.descriptor(model_id)?;
        self.lifecycle.load(&descriptor.id, &descriptor.filename).await
    }

    /// Remove a downloaded model, unloading it first if it is active.
    pub async fn delete_model(&self, model_id: &str) -> Result<(), ModelLifecycleError> {
        let descriptor = self.descriptor(model_id)?;

        match self.lifecycle.state() {
            LifecycleState::Loading { model_id: loading } if loading == descriptor.id => {
                return Err(ModelLifecycleError::Busy);
            }
            LifecycleState::Loaded { model_id: loaded } if loaded == descriptor.id => {
                self.lifecycle.unload().await?;
            }
            _ => {}
        }

        let path = self.path_of(descriptor)?;
        for candidate in [paths::partial_path(&path), path] {
            match tokio::fs::remove_file(&candidate).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(ModelLifecycleError::Io(err.to_string())),
            }
        }

        info!(target: "soliloquy.lifecycle", model_id = %descriptor.id, "Model deleted");
        self.emitter.emit(AppEvent::ModelDeleted {
            model_id: descriptor.id.clone(),
        });
        Ok(())
    }

    fn descriptor(&self, model_id: &str) -> Result<&ModelDescriptor, ModelLifecycleError> {
        self.catalog
            .find(model_id)
            .ok_or_else(|| ModelLifecycleError::UnknownModel(model_id.to_string()))
    }

    fn path_of(&self, descriptor: &ModelDescriptor) -> Result<PathBuf, ModelLifecycleError> {
        Ok(paths::model_file_path(
            self.lifecycle.models_dir(),
            &descriptor.filename,
        )?)
    }
}

async fn availability_of(path: &std::path::Path) -> ModelAvailability {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => ModelAvailability::Downloaded,
        _ => ModelAvailability::NotDownloaded,
    }
}
