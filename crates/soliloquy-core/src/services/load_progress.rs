//! Synthetic load progress.
//!
//! Engines do not report how far initialization has got, so progress is
//! estimated: a small initial jump, a timed ramp toward a ceiling paced by
//! file size, then a short ramp to 1.0 once the engine is actually ready.
//! The estimator never gates the load itself; the lifecycle controller only
//! tells it when things start, finish or fail.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::LoadProgressConfig;
use crate::events::AppEvent;
use crate::ports::AppEventEmitter;

/// Publishes a non-decreasing progress value per load attempt.
pub struct LoadProgressEstimator {
    config: LoadProgressConfig,
    publisher: Arc<Publisher>,
    ramp: Mutex<Option<JoinHandle<()>>>,
}

impl LoadProgressEstimator {
    pub fn new(config: LoadProgressConfig, emitter: Arc<dyn AppEventEmitter>) -> Self {
        let (tx, _) = watch::channel(0.0);
        Self {
            config,
            publisher: Arc::new(Publisher {
                tx,
                epoch: AtomicU64::new(0),
                emitter,
            }),
            ramp: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.publisher.tx.subscribe()
    }

    pub fn current(&self) -> f64 {
        *self.publisher.tx.borrow()
    }

    /// Start a new attempt: jump to the initial value and ramp toward the
    /// ceiling over the time a file of `file_size` bytes is expected to take.
    pub fn begin(&self, file_size: u64) {
        let epoch = self.publisher.reset_to(self.config.initial);
        let from = self.config.initial;
        let to = self.config.ceiling.max(from);
        let duration = self.config.estimated_duration(file_size);
        self.spawn_ramp(epoch, from, to, duration);
    }

    /// The engine is ready: ramp from wherever the estimate is to 1.0.
    pub fn complete(&self) {
        let epoch = self.publisher.epoch.load(Ordering::SeqCst);
        let from = self.current();
        self.spawn_ramp(epoch, from, 1.0, self.config.finish_duration);
    }

    /// The attempt failed: stop ramping and drop back to zero.
    pub fn fail(&self) {
        self.stop();
        self.publisher.reset_to(0.0);
    }

    /// Return to zero without a failure (model unloaded).
    pub fn reset(&self) {
        self.fail();
    }

    fn stop(&self) {
        if let Some(handle) = self.ramp_slot().take() {
            handle.abort();
        }
    }

    fn spawn_ramp(&self, epoch: u64, from: f64, to: f64, duration: Duration) {
        self.stop();
        let publisher = Arc::clone(&self.publisher);
        let tick = self.config.tick.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            publisher.advance(epoch, from);
            let start = Instant::now();
            loop {
                let elapsed = start.elapsed();
                if elapsed >= duration {
                    break;
                }
                tokio::time::sleep(tick).await;
                let fraction = start.elapsed().as_secs_f64() / duration.as_secs_f64();
                publisher.advance(epoch, (to - from).mul_add(fraction.min(1.0), from));
            }
            publisher.advance(epoch, to);
        });
        *self.ramp_slot() = Some(handle);
    }

    fn ramp_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ramp.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LoadProgressEstimator {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Publisher {
    tx: watch::Sender<f64>,
    /// Bumped on every reset; ramps from older attempts become no-ops.
    epoch: AtomicU64,
    emitter: Arc<dyn AppEventEmitter>,
}

impl Publisher {
    fn reset_to(&self, value: f64) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(value);
        self.emitter.emit(AppEvent::ModelLoadProgress { progress: value });
        epoch
    }

    /// Raise the published value, never lowering it.
    fn advance(&self, epoch: u64, value: f64) {
        let value = value.clamp(0.0, 1.0);
        let changed = self.tx.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch || value <= *current {
                return false;
            }
            *current = value;
            true
        });
        if changed {
            self.emitter
                .emit(AppEvent::ModelLoadProgress { progress: value });
        }
    }
}
