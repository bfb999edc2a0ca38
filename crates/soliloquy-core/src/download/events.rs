//! Download events and progress snapshots.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle status of one model download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloading,
    Completed,
    Failed { error: String },
    Cancelled,
}

impl DownloadStatus {
    /// Whether the download has reached a final state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Downloading)
    }
}

/// Latest progress of a download, published on a watch channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Catalog id of the model being fetched.
    pub model_id: String,
    /// Bytes on disk, including any resumed prefix.
    pub downloaded: u64,
    /// Total bytes expected, 0 while unknown.
    pub total: u64,
    pub status: DownloadStatus,
}

impl DownloadProgress {
    pub fn started(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            downloaded: 0,
            total: 0,
            status: DownloadStatus::Downloading,
        }
    }

    /// Fraction in `[0, 1]`; completed downloads always report 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.status == DownloadStatus::Completed {
            return 1.0;
        }
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// Whole percent, rounded down.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }
}

/// Download lifecycle events, emitted for notification-style consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Transfer started (or resumed).
    Started {
        #[serde(rename = "modelId")]
        model_id: String,
        #[serde(rename = "displayName")]
        display_name: String,
    },
    /// Progress crossed the next notification watermark.
    Progress {
        #[serde(rename = "modelId")]
        model_id: String,
        percent: u8,
    },
    /// File is complete at its final path.
    Completed {
        #[serde(rename = "modelId")]
        model_id: String,
        path: PathBuf,
    },
    Failed {
        #[serde(rename = "modelId")]
        model_id: String,
        error: String,
    },
    /// Cancelled by the user; partial data has been removed.
    Cancelled {
        #[serde(rename = "modelId")]
        model_id: String,
    },
}

impl DownloadEvent {
    /// Model id the event refers to.
    pub fn model_id(&self) -> &str {
        match self {
            Self::Started { model_id, .. }
            | Self::Progress { model_id, .. }
            | Self::Completed { model_id, .. }
            | Self::Failed { model_id, .. }
            | Self::Cancelled { model_id } => model_id,
        }
    }
}
