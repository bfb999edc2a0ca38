//! Model lifecycle controller.
//!
//! Owns the single resident inference engine. Loads and unloads are totally
//! ordered by an internal state machine:
//!
//! ```text
//! Unloaded --load--> Loading --ok--> Loaded --unload--> Unloading --> Unloaded
//!                        \--err--> Unloaded
//! ```
//!
//! A load issued while `Loaded` tears the previous engine down before the
//! new one is created, so two engines never coexist. Generations borrow the
//! engine through an [`EngineLease`]; while any lease is alive the engine
//! cannot be unloaded or superseded.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::load_progress::LoadProgressEstimator;
use crate::config::LoadProgressConfig;
use crate::domain::EngineParams;
use crate::events::AppEvent;
use crate::paths::{self, PathError};
use crate::ports::{AppEventEmitter, EngineError, EngineLoader, InferenceEngine};

/// Errors from load, unload and lease operations.
#[derive(Debug, Error)]
pub enum ModelLifecycleError {
    /// Another load or unload is in flight.
    #[error("A model is already loading or unloading")]
    Busy,

    #[error("Model file not found: {}", path.display())]
    ModelFileNotFound { model_id: String, path: PathBuf },

    #[error(transparent)]
    ModelInit(#[from] EngineError),

    /// A generation holds the active engine.
    #[error("Cannot change the active model while a response is being generated")]
    GenerationInProgress,

    #[error("No model is loaded")]
    NoModelLoaded,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Observable lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    Unloaded,
    Loading {
        #[serde(rename = "modelId")]
        model_id: String,
    },
    Loaded {
        #[serde(rename = "modelId")]
        model_id: String,
    },
    Unloading {
        #[serde(rename = "modelId")]
        model_id: String,
    },
}

impl LifecycleState {
    pub const fn is_transitioning(&self) -> bool {
        matches!(self, Self::Loading { .. } | Self::Unloading { .. })
    }
}

struct ActiveEngine {
    model_id: String,
    engine: Arc<dyn InferenceEngine>,
}

struct Inner {
    state: LifecycleState,
    active: Option<ActiveEngine>,
}

/// Shared borrow of the active engine for the duration of one generation.
///
/// Dropping the lease lets the lifecycle controller unload the engine again.
pub struct EngineLease {
    model_id: String,
    engine: Arc<dyn InferenceEngine>,
    leases: Arc<AtomicUsize>,
}

impl EngineLease {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn engine(&self) -> &dyn InferenceEngine {
        self.engine.as_ref()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.leases.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for EngineLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLease")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

/// Owner of the single active inference engine.
pub struct ModelLifecycleController {
    loader: Arc<dyn EngineLoader>,
    params: EngineParams,
    models_dir: PathBuf,
    emitter: Arc<dyn AppEventEmitter>,
    progress: LoadProgressEstimator,
    inner: Mutex<Inner>,
    leases: Arc<AtomicUsize>,
    state_tx: watch::Sender<LifecycleState>,
}

impl ModelLifecycleController {
    pub fn new(
        loader: Arc<dyn EngineLoader>,
        params: EngineParams,
        models_dir: PathBuf,
        progress: LoadProgressConfig,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Unloaded);
        Self {
            loader,
            params,
            models_dir,
            progress: LoadProgressEstimator::new(progress, Arc::clone(&emitter)),
            emitter,
            inner: Mutex::new(Inner {
                state: LifecycleState::Unloaded,
                active: None,
            }),
            leases: Arc::new(AtomicUsize::new(0)),
            state_tx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state.clone()
    }

    /// Id of the resident model, if any.
    pub fn active_model_id(&self) -> Option<String> {
        self.lock().active.as_ref().map(|a| a.model_id.clone())
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.lock().state, LifecycleState::Loading { .. })
    }

    /// Number of live engine leases.
    pub fn active_leases(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> f64 {
        self.progress.current()
    }

    pub fn models_dir(&self) -> &std::path::Path {
        &self.models_dir
    }

    /// Load the model stored as `filename` and make it active under `model_id`.
    ///
    /// Rejected with [`ModelLifecycleError::Busy`] while another transition
    /// is in flight; the active model is left untouched in that case.
    pub async fn load(&self, model_id: &str, filename: &str) -> Result<(), ModelLifecycleError> {
        let path = paths::model_file_path(&self.models_dir, filename)?;

        let previous = {
            let mut inner = self.lock();
            if inner.state.is_transitioning() {
                debug!(target: "soliloquy.lifecycle", model_id = %model_id, "Load rejected, transition in flight");
                return Err(ModelLifecycleError::Busy);
            }
            if inner.active.is_some() && self.active_leases() > 0 {
                return Err(ModelLifecycleError::GenerationInProgress);
            }
            // A superseded model's 1.0 must not show against the new load.
            self.progress.reset();
            self.set_state(
                &mut inner,
                LifecycleState::Loading {
                    model_id: model_id.to_string(),
                },
            );
            inner.active.take()
        };

        info!(target: "soliloquy.lifecycle", model_id = %model_id, path = %path.display(), "Loading model");

        if let Some(previous) = previous {
            self.release_engine(previous).await;
        }

        let file_size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                let err = ModelLifecycleError::ModelFileNotFound {
                    model_id: model_id.to_string(),
                    path,
                };
                self.fail_load(model_id, &err);
                return Err(err);
            }
        };
        self.progress.begin(file_size);

        match self.loader.init(&path, &self.params).await {
            Ok(engine) => {
                {
                    let mut inner = self.lock();
                    inner.active = Some(ActiveEngine {
                        model_id: model_id.to_string(),
                        engine,
                    });
                    self.set_state(
                        &mut inner,
                        LifecycleState::Loaded {
                            model_id: model_id.to_string(),
                        },
                    );
                }
                self.progress.complete();
                self.emitter.emit(AppEvent::model_loaded(model_id));
                info!(target: "soliloquy.lifecycle", model_id = %model_id, "Model loaded");
                Ok(())
            }
            Err(err) => {
                let err = ModelLifecycleError::ModelInit(err);
                self.fail_load(model_id, &err);
                Err(err)
            }
        }
    }

    /// Release the active engine. A no-op unless a model is loaded.
    pub async fn unload(&self) -> Result<(), ModelLifecycleError> {
        let active = {
            let mut inner = self.lock();
            let LifecycleState::Loaded { model_id } = inner.state.clone() else {
                return Ok(());
            };
            if self.active_leases() > 0 {
                return Err(ModelLifecycleError::GenerationInProgress);
            }
            self.set_state(&mut inner, LifecycleState::Unloading { model_id });
            inner.active.take()
        };

        if let Some(active) = active {
            self.release_engine(active).await;
        }

        let mut inner = self.lock();
        self.set_state(&mut inner, LifecycleState::Unloaded);
        drop(inner);
        self.progress.reset();
        Ok(())
    }

    /// Borrow the active engine for one generation.
    pub fn lease(&self) -> Result<EngineLease, ModelLifecycleError> {
        let inner = self.lock();
        match (&inner.state, &inner.active) {
            (LifecycleState::Loaded { .. }, Some(active)) => {
                self.leases.fetch_add(1, Ordering::SeqCst);
                Ok(EngineLease {
                    model_id: active.model_id.clone(),
                    engine: Arc::clone(&active.engine),
                    leases: Arc::clone(&self.leases),
                })
            }
            _ => Err(ModelLifecycleError::NoModelLoaded),
        }
    }

    async fn release_engine(&self, active: ActiveEngine) {
        if let Err(err) = active.engine.release().await {
            warn!(
                target: "soliloquy.lifecycle",
                model_id = %active.model_id,
                error = %err,
                "Engine release reported an error"
            );
        }
        self.emitter
            .emit(AppEvent::model_unloaded(active.model_id.as_str()));
        info!(target: "soliloquy.lifecycle", model_id = %active.model_id, "Model unloaded");
    }

    fn fail_load(&self, model_id: &str, err: &ModelLifecycleError) {
        warn!(target: "soliloquy.lifecycle", model_id = %model_id, error = %err, "Model load failed");
        self.progress.fail();
        {
            let mut inner = self.lock();
            inner.active = None;
            self.set_state(&mut inner, LifecycleState::Unloaded);
        }
        self.emitter.emit(AppEvent::ModelLoadFailed {
            model_id: model_id.to_string(),
            error: err.to_string(),
        });
    }

    fn set_state(&self, inner: &mut Inner, state: LifecycleState) {
        inner.state = state.clone();
        self.state_tx.send_replace(state);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
