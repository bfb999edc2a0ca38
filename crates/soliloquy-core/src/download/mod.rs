//! Download domain types, events and errors.
//!
//! This module contains pure data types for the download subsystem. No I/O,
//! networking, or runtime dependencies allowed; the manager itself lives in
//! the `soliloquy-download` crate.

pub mod errors;
pub mod events;

pub use errors::{DownloadError, DownloadResult};
pub use events::{DownloadEvent, DownloadProgress, DownloadStatus};
