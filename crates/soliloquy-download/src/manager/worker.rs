//! Download worker pipeline.
//!
//! The worker receives a `DownloadJob` (value type) and `WorkerDeps`
//! (cloned Arcs) and has no access to the manager's job table. It writes
//! progress to the job's `watch::Sender` and emits throttled
//! `DownloadEvent::Progress` notifications; start and terminal events are
//! the manager's business.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use soliloquy_core::download::{DownloadError, DownloadEvent, DownloadProgress};
use soliloquy_core::{AppEvent, AppEventEmitter};

use super::paths::DownloadDestination;
use crate::progress::PercentWatermark;
use crate::transport::DownloadTransport;

/// Dependencies for the download worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub transport: Arc<dyn DownloadTransport>,
    pub emitter: Arc<dyn AppEventEmitter>,
    pub notification_step: u8,
}

/// A download job to be executed by the worker.
pub struct DownloadJob {
    pub model_id: String,
    pub url: String,
    pub destination: DownloadDestination,
    pub cancel: CancellationToken,
    pub progress_tx: Arc<watch::Sender<DownloadProgress>>,
}

/// Run a download job to completion, returning the final file path.
///
/// A failure leaves the `.part` file in place for the next attempt to
/// resume from. Cancellation returns `Err(DownloadError::Cancelled)`;
/// cleaning up after it is the caller's job.
pub async fn run_job(job: &DownloadJob, deps: &WorkerDeps) -> Result<PathBuf, DownloadError> {
    job.destination.ensure_dir().await?;

    let offset = job.destination.resume_offset().await;
    let recorded = if offset > 0 {
        job.destination.read_validator().await
    } else {
        None
    };
    let body = tokio::select! {
        biased;
        () = job.cancel.cancelled() => return Err(DownloadError::Cancelled),
        body = deps.transport.open(&job.url, offset, recorded.as_deref()) => body?,
    };
    if !body.resumed || recorded.is_none() {
        job.destination
            .store_validator(body.validator.as_deref())
            .await?;
    }

    let mut downloaded = if body.resumed { offset } else { 0 };
    let total = body.total.unwrap_or(0);
    if offset > 0 {
        tracing::debug!(
            target: "soliloquy.download",
            model_id = %job.model_id,
            offset,
            resumed = body.resumed,
            "Resuming partial download"
        );
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(body.resumed)
        .truncate(!body.resumed)
        .open(&job.destination.partial_path)
        .await
        .map_err(|e| DownloadError::from_io_error(&e))?;

    let mut watermark = PercentWatermark::new(deps.notification_step);
    publish(job, deps, &mut watermark, downloaded, total);

    let mut chunks = body.chunks;
    let streamed: Result<(), DownloadError> = async {
        loop {
            let next = tokio::select! {
                biased;
                () = job.cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = chunks.next() => next,
            };
            let Some(chunk) = next else { return Ok(()) };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::from_io_error(&e))?;
            downloaded += chunk.len() as u64;
            publish(job, deps, &mut watermark, downloaded, total);
        }
    }
    .await;

    // Flush on every path so a failed transfer leaves a resumable prefix.
    let flushed = file.flush().await;
    streamed?;
    flushed.map_err(|e| DownloadError::from_io_error(&e))?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::from_io_error(&e))?;
    drop(file);

    if total > 0 && downloaded != total {
        return Err(DownloadError::Interrupted {
            bytes_downloaded: downloaded,
            bytes_expected: total,
        });
    }
    if job.cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    job.destination.commit().await?;
    Ok(job.destination.final_path.clone())
}

fn publish(
    job: &DownloadJob,
    deps: &WorkerDeps,
    watermark: &mut PercentWatermark,
    downloaded: u64,
    total: u64,
) {
    job.progress_tx.send_modify(|state| {
        state.downloaded = downloaded;
        state.total = total;
    });
    let percent = job.progress_tx.borrow().percent();
    if total > 0 {
        if let Some(percent) = watermark.advance(percent) {
            deps.emitter.emit(AppEvent::download(DownloadEvent::Progress {
                model_id: job.model_id.clone(),
                percent,
            }));
        }
    }
}
