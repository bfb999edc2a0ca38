//! Download manager port definition.
//!
//! Cancellation tokens, HTTP clients and file handles stay behind this
//! trait; callers see only catalog descriptors and progress snapshots.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::domain::ModelDescriptor;
use crate::download::{DownloadError, DownloadProgress};
use crate::paths::PathError;

/// Notification watermark step, in percentage points.
pub const DEFAULT_NOTIFICATION_STEP: u8 = 5;

/// Configuration for creating a download manager.
#[derive(Debug, Clone)]
pub struct DownloadManagerConfig {
    /// Directory where model files are stored.
    pub models_directory: PathBuf,
    /// Minimum percent advance between two `Progress` events.
    pub notification_step: u8,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self {
            models_directory: PathBuf::from("models"),
            notification_step: DEFAULT_NOTIFICATION_STEP,
        }
    }
}

impl DownloadManagerConfig {
    #[must_use]
    pub fn new(models_directory: PathBuf) -> Self {
        Self {
            models_directory,
            ..Default::default()
        }
    }

    /// Settings for the app described by `config`. Downloads land in the
    /// same models directory the lifecycle controller loads from.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, PathError> {
        Ok(Self::new(config.models_dir()?)
            .with_notification_step(config.download.notification_step))
    }

    /// Set the notification step (clamped to at least one point).
    #[must_use]
    pub fn with_notification_step(mut self, step: u8) -> Self {
        self.notification_step = step.clamp(1, 100);
        self
    }
}

/// Port for the download subsystem.
#[async_trait]
pub trait DownloadManagerPort: Send + Sync {
    /// Start fetching `descriptor` into the models directory.
    ///
    /// Calling this while the same model is already downloading returns a
    /// receiver on the existing transfer; partial data is never touched.
    async fn start_download(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<watch::Receiver<DownloadProgress>, DownloadError>;

    /// Stop the transfer and delete its partial file.
    ///
    /// A completed model file is only removed when the cancelled transfer
    /// itself produced it. With no transfer in flight only a stale partial
    /// file is removed; finished models are deleted through the model
    /// library. Idempotent.
    async fn cancel_download(&self, model_id: &str) -> Result<(), DownloadError>;

    /// Whether a transfer for `model_id` is in flight.
    async fn is_downloading(&self, model_id: &str) -> bool;

    /// Progress receiver for an in-flight transfer.
    async fn subscribe(&self, model_id: &str) -> Option<watch::Receiver<DownloadProgress>>;
}
