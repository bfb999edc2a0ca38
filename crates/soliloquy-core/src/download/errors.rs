//! Download error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error`. For I/O errors, we capture the kind
//! and message as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for download operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "not found", "permission denied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Network/HTTP error during download.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The model id is not in the catalog.
    #[error("Unknown model: {model_id}")]
    UnknownModel {
        /// The id that could not be resolved.
        model_id: String,
    },

    /// A cancellation for this model is still cleaning up its files.
    #[error("Cancellation in progress: {model_id}")]
    CancelInProgress {
        /// The model being cancelled.
        model_id: String,
    },

    /// Download was cancelled by user.
    #[error("Download cancelled")]
    Cancelled,

    /// The transfer ended before the expected number of bytes arrived.
    #[error("Download interrupted at {bytes_downloaded} of {bytes_expected} bytes")]
    Interrupted {
        /// Bytes on disk when the transfer stopped.
        bytes_downloaded: u64,
        /// Bytes the server announced.
        bytes_expected: u64,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl DownloadError {
    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    ///
    /// This captures the error kind name and message for serialization.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn unknown_model(model_id: impl Into<String>) -> Self {
        Self::UnknownModel {
            model_id: model_id.into(),
        }
    }

    pub fn cancel_in_progress(model_id: impl Into<String>) -> Self {
        Self::CancelInProgress {
            model_id: model_id.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (a retry may resume).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Interrupted { .. } | Self::Io { .. }
        )
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::Network {
                message,
                status_code: Some(code),
            } => {
                format!("Network error (HTTP {code}): {message}")
            }
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::UnknownModel { model_id } => format!("Unknown model '{model_id}'."),
            Self::CancelInProgress { model_id } => {
                format!("'{model_id}' is still being cancelled. Try again in a moment.")
            }
            Self::Cancelled => "Download was cancelled.".to_string(),
            Self::Interrupted {
                bytes_downloaded, ..
            } => {
                format!("Download interrupted after {bytes_downloaded} bytes. You can resume it.")
            }
            Self::Other { message } => message.clone(),
        }
    }
}

/// Convenience result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DownloadError::from_io_error(&io_err);

        match err {
            DownloadError::Io { kind, message } => {
                assert_eq!(kind, "NotFound");
                assert!(message.contains("file not found"));
            }
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_error_serialization() {
        let err = DownloadError::network_with_status("timeout", 408);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("408"));
        assert!(json.contains("timeout"));

        let parsed: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(DownloadError::network("timeout").is_recoverable());
        assert!(
            DownloadError::Interrupted {
                bytes_downloaded: 100,
                bytes_expected: 200,
            }
            .is_recoverable()
        );
        assert!(!DownloadError::Cancelled.is_recoverable());
        assert!(!DownloadError::unknown_model("x").is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        let err = DownloadError::cancel_in_progress("gemma-1b");
        assert!(err.user_message().contains("gemma-1b"));
        assert!(!err.is_recoverable());
        assert!(DownloadError::Cancelled.is_cancelled());
    }
}
