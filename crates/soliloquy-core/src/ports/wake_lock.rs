//! Wake-lock port.
//!
//! Long transfers and generations keep the device awake. The lock is scoped:
//! [`WakeLockGuard`] acquires on construction and releases on drop, so it is
//! released on success, failure, cancellation and unwinding alike.

use std::sync::Arc;

/// Platform hook that keeps the device awake while held.
pub trait WakeLockPort: Send + Sync {
    /// Acquire a lock identified by `tag`.
    fn acquire(&self, tag: &str);

    /// Release the lock identified by `tag`.
    fn release(&self, tag: &str);
}

/// A port that does nothing (headless runs, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWakeLock;

impl WakeLockPort for NoopWakeLock {
    fn acquire(&self, _tag: &str) {}
    fn release(&self, _tag: &str) {}
}

/// Scoped wake lock.
#[must_use = "the wake lock is released as soon as the guard is dropped"]
pub struct WakeLockGuard {
    port: Arc<dyn WakeLockPort>,
    tag: String,
}

impl WakeLockGuard {
    pub fn acquire(port: Arc<dyn WakeLockPort>, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        port.acquire(&tag);
        tracing::trace!(target: "soliloquy.wake_lock", tag = %tag, "Wake lock acquired");
        Self { port, tag }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        self.port.release(&self.tag);
        tracing::trace!(target: "soliloquy.wake_lock", tag = %self.tag, "Wake lock released");
    }
}

impl std::fmt::Debug for WakeLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeLockGuard")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}
