//! Download manager for soliloquy model files.
//!
//! - [`DownloadManager`]: implementation of the core `DownloadManagerPort`
//! - [`DownloadTransport`]: byte source behind the manager; [`HttpTransport`]
//!   fetches over HTTP with `Range` resume
//! - [`PercentWatermark`]: throttles notification events to whole-step
//!   percentage advances
//!
//! Transfers write to `<filename>.part` and are renamed onto the final
//! name only once complete, so a model file that exists is always whole.

// Re-export core types for convenience
pub use soliloquy_core::download::{
    DownloadError, DownloadEvent, DownloadProgress, DownloadResult, DownloadStatus,
};
pub use soliloquy_core::ports::{DownloadManagerConfig, DownloadManagerPort};

pub(crate) mod progress;
mod transport;

pub use progress::PercentWatermark;
pub use transport::{ByteStream, DownloadTransport, HttpTransport, TransferBody};

mod manager;

pub use manager::{DownloadDestination, DownloadManager, DownloadManagerDeps};
