//! Download manager implementation.
//!
//! Concrete implementation of `DownloadManagerPort`. Each model gets at most
//! one worker task; the manager keeps a job table keyed by model id.
//!
//! # Concurrency Model
//!
//! - One spawned task per transfer, holding a scoped wake lock
//! - Cancellation via `CancellationToken`, observed at every await in the worker
//! - Lease ids stop a finished task from removing a newer job for the same model
//! - `cancel_download` marks the model as cancelling, awaits the task and
//!   cleans up files; `start_download` is refused until the mark is gone

mod paths;
mod worker;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use soliloquy_core::domain::{ModelCatalog, ModelDescriptor};
use soliloquy_core::download::{DownloadError, DownloadEvent, DownloadProgress, DownloadStatus};
use soliloquy_core::ports::{DownloadManagerConfig, DownloadManagerPort};
use soliloquy_core::{AppEvent, AppEventEmitter, WakeLockGuard, WakeLockPort};

use crate::transport::DownloadTransport;

pub use paths::DownloadDestination;
use worker::{DownloadJob, WorkerDeps, run_job};

/// Lease ID for tracking active downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LeaseId(u64);

/// State for an active download.
struct ActiveJob {
    lease: LeaseId,
    cancel: CancellationToken,
    progress_tx: Arc<watch::Sender<DownloadProgress>>,
    destination: DownloadDestination,
    handle: JoinHandle<Result<PathBuf, DownloadError>>,
}

/// Transfers in flight, plus models whose cancellation is still cleaning up.
#[derive(Default)]
struct Jobs {
    active: HashMap<String, ActiveJob>,
    cancelling: HashSet<String>,
}

type JobTable = Arc<Mutex<Jobs>>;

/// Dependencies for building a [`DownloadManager`].
pub struct DownloadManagerDeps {
    pub transport: Arc<dyn DownloadTransport>,
    pub emitter: Arc<dyn AppEventEmitter>,
    pub wake_lock: Arc<dyn WakeLockPort>,
    /// Used to resolve file names when cancelling a model with no job.
    pub catalog: ModelCatalog,
}

/// Model download manager.
pub struct DownloadManager {
    config: DownloadManagerConfig,
    deps: DownloadManagerDeps,
    jobs: JobTable,
    /// Descriptors seen by `start_download`, for cleanup of non-catalog ids.
    seen: Mutex<HashMap<String, ModelDescriptor>>,
    next_lease: AtomicU64,
}

impl DownloadManager {
    pub fn new(config: DownloadManagerConfig, deps: DownloadManagerDeps) -> Self {
        Self {
            config,
            deps,
            jobs: Arc::new(Mutex::new(Jobs::default())),
            seen: Mutex::new(HashMap::new()),
            next_lease: AtomicU64::new(1),
        }
    }

    pub const fn config(&self) -> &DownloadManagerConfig {
        &self.config
    }

    /// Number of transfers in flight.
    pub async fn active_count(&self) -> usize {
        self.jobs.lock().await.active.len()
    }

    async fn destination_for(&self, model_id: &str) -> Result<DownloadDestination, DownloadError> {
        let filename = match self.seen.lock().await.get(model_id) {
            Some(descriptor) => descriptor.filename.clone(),
            None => self
                .deps
                .catalog
                .find(model_id)
                .map(|d| d.filename.clone())
                .ok_or_else(|| DownloadError::unknown_model(model_id))?,
        };
        DownloadDestination::plan(&self.config.models_directory, &filename)
    }

    /// Stop `job` (if any) and remove the files it leaves behind.
    async fn finish_cancel(
        &self,
        model_id: &str,
        job: Option<ActiveJob>,
    ) -> Result<(), DownloadError> {
        let Some(job) = job else {
            // Nothing in flight: a finished model file is not ours to delete.
            return self.destination_for(model_id).await?.remove_partial().await;
        };

        job.cancel.cancel();
        let committed = match job.handle.await {
            Ok(result) => result.is_ok(),
            Err(e) => {
                tracing::warn!(
                    target: "soliloquy.download",
                    model_id = %model_id,
                    error = %e,
                    "Download task ended abnormally"
                );
                false
            }
        };
        if committed {
            job.destination.remove_all().await?;
        } else {
            job.destination.remove_partial().await?;
        }

        job.progress_tx.send_modify(|p| p.status = DownloadStatus::Cancelled);
        self.deps.emitter.emit(AppEvent::download(DownloadEvent::Cancelled {
            model_id: model_id.to_string(),
        }));
        tracing::info!(target: "soliloquy.download", model_id = %model_id, "Download cancelled");
        Ok(())
    }

    fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps {
            transport: Arc::clone(&self.deps.transport),
            emitter: Arc::clone(&self.deps.emitter),
            notification_step: self.config.notification_step,
        }
    }
}

#[async_trait]
impl DownloadManagerPort for DownloadManager {
    async fn start_download(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<watch::Receiver<DownloadProgress>, DownloadError> {
        let destination =
            DownloadDestination::plan(&self.config.models_directory, &descriptor.filename)?;

        let mut jobs = self.jobs.lock().await;
        if jobs.cancelling.contains(&descriptor.id) {
            return Err(DownloadError::cancel_in_progress(&descriptor.id));
        }
        if let Some(existing) = jobs.active.get(&descriptor.id) {
            tracing::debug!(
                target: "soliloquy.download",
                model_id = %descriptor.id,
                "Download already in flight"
            );
            return Ok(existing.progress_tx.subscribe());
        }

        self.seen
            .lock()
            .await
            .insert(descriptor.id.clone(), descriptor.clone());

        let lease = LeaseId(self.next_lease.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(DownloadProgress::started(&descriptor.id));
        let progress_tx = Arc::new(tx);

        let job = DownloadJob {
            model_id: descriptor.id.clone(),
            url: descriptor.source_url.clone(),
            destination: destination.clone(),
            cancel: cancel.clone(),
            progress_tx: Arc::clone(&progress_tx),
        };

        tracing::info!(
            target: "soliloquy.download",
            model_id = %descriptor.id,
            url = %descriptor.source_url,
            "Download started"
        );
        self.deps.emitter.emit(AppEvent::download(DownloadEvent::Started {
            model_id: descriptor.id.clone(),
            display_name: descriptor.display_name.clone(),
        }));

        let handle = tokio::spawn(drive(
            job,
            lease,
            self.worker_deps(),
            Arc::clone(&self.deps.wake_lock),
            Arc::clone(&self.jobs),
        ));

        jobs.active.insert(
            descriptor.id.clone(),
            ActiveJob {
                lease,
                cancel,
                progress_tx,
                destination,
                handle,
            },
        );
        Ok(rx)
    }

    async fn cancel_download(&self, model_id: &str) -> Result<(), DownloadError> {
        let job = {
            let mut jobs = self.jobs.lock().await;
            if !jobs.cancelling.insert(model_id.to_string()) {
                return Err(DownloadError::cancel_in_progress(model_id));
            }
            jobs.active.remove(model_id)
        };

        let result = self.finish_cancel(model_id, job).await;
        self.jobs.lock().await.cancelling.remove(model_id);
        result
    }

    async fn is_downloading(&self, model_id: &str) -> bool {
        self.jobs.lock().await.active.contains_key(model_id)
    }

    async fn subscribe(&self, model_id: &str) -> Option<watch::Receiver<DownloadProgress>> {
        self.jobs
            .lock()
            .await
            .active
            .get(model_id)
            .map(|job| job.progress_tx.subscribe())
    }
}

/// Worker task body: runs the job under a wake lock, then publishes the
/// terminal state and retires the job table entry. The job's result is
/// handed back so a racing cancel knows whether a final file was committed.
async fn drive(
    job: DownloadJob,
    lease: LeaseId,
    deps: WorkerDeps,
    wake_lock: Arc<dyn WakeLockPort>,
    jobs: JobTable,
) -> Result<PathBuf, DownloadError> {
    let result = {
        let _wake = WakeLockGuard::acquire(wake_lock, format!("download:{}", job.model_id));
        run_job(&job, &deps).await
    };

    // Cancellation is finalized by `cancel_download` once files are gone.
    if matches!(&result, Err(err) if err.is_cancelled()) {
        return result;
    }

    {
        let mut jobs = jobs.lock().await;
        if jobs
            .active
            .get(&job.model_id)
            .is_some_and(|active| active.lease == lease)
        {
            jobs.active.remove(&job.model_id);
        }
    }

    match &result {
        Ok(path) => {
            job.progress_tx.send_modify(|p| {
                p.status = DownloadStatus::Completed;
                if p.total > 0 {
                    p.downloaded = p.total;
                }
            });
            tracing::info!(
                target: "soliloquy.download",
                model_id = %job.model_id,
                path = %path.display(),
                "Download completed"
            );
            deps.emitter.emit(AppEvent::download(DownloadEvent::Completed {
                model_id: job.model_id.clone(),
                path: path.clone(),
            }));
        }
        Err(err) => {
            if err.is_recoverable() {
                tracing::warn!(
                    target: "soliloquy.download",
                    model_id = %job.model_id,
                    error = %err,
                    "Download failed; partial data kept for resume"
                );
            } else {
                tracing::warn!(
                    target: "soliloquy.download",
                    model_id = %job.model_id,
                    error = %err,
                    "Download failed; discarding partial data"
                );
                if let Err(cleanup) = job.destination.remove_partial().await {
                    tracing::warn!(
                        target: "soliloquy.download",
                        model_id = %job.model_id,
                        error = %cleanup,
                        "Could not remove partial data"
                    );
                }
            }
            let message = err.user_message();
            job.progress_tx.send_modify(|p| {
                p.status = DownloadStatus::Failed {
                    error: message.clone(),
                };
            });
            deps.emitter.emit(AppEvent::download(DownloadEvent::Failed {
                model_id: job.model_id.clone(),
                error: message,
            }));
        }
    }
    result
}
