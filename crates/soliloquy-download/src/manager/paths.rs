//! Destination path planning for downloads.

use std::path::{Path, PathBuf};

use soliloquy_core::download::DownloadError;
use soliloquy_core::paths::{model_file_path, partial_path};

/// Where a model's bytes go while downloading and once complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDestination {
    /// The final model file; its existence means "downloaded".
    pub final_path: PathBuf,
    /// The `.part` file the transfer writes into.
    pub partial_path: PathBuf,
    /// Remote validator (`ETag` or `Last-Modified`) the partial bytes came from.
    pub validator_path: PathBuf,
}

impl DownloadDestination {
    /// Plan the destination for `filename` inside `models_directory`.
    pub fn plan(models_directory: &Path, filename: &str) -> Result<Self, DownloadError> {
        let final_path = model_file_path(models_directory, filename)
            .map_err(|e| DownloadError::io("invalid_filename", e.to_string()))?;
        let partial_path = partial_path(&final_path);
        let mut validator_path = partial_path.clone().into_os_string();
        validator_path.push(".validator");
        Ok(Self {
            final_path,
            partial_path,
            validator_path: PathBuf::from(validator_path),
        })
    }

    /// Ensure the models directory exists.
    pub async fn ensure_dir(&self) -> Result<(), DownloadError> {
        if let Some(parent) = self.final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::from_io_error(&e))?;
        }
        Ok(())
    }

    /// Bytes already in the partial file (0 when absent).
    pub async fn resume_offset(&self) -> u64 {
        tokio::fs::metadata(&self.partial_path)
            .await
            .map_or(0, |meta| meta.len())
    }

    /// Validator recorded for the partial file, if any.
    pub async fn read_validator(&self) -> Option<String> {
        let raw = tokio::fs::read_to_string(&self.validator_path).await.ok()?;
        let validator = raw.trim();
        (!validator.is_empty()).then(|| validator.to_string())
    }

    /// Record (or forget) the validator the partial file is being written from.
    pub async fn store_validator(&self, validator: Option<&str>) -> Result<(), DownloadError> {
        match validator {
            Some(validator) => tokio::fs::write(&self.validator_path, validator)
                .await
                .map_err(|e| DownloadError::from_io_error(&e)),
            None => remove_if_present(&self.validator_path).await,
        }
    }

    /// Move the completed partial file onto the final name.
    pub async fn commit(&self) -> Result<(), DownloadError> {
        tokio::fs::rename(&self.partial_path, &self.final_path)
            .await
            .map_err(|e| DownloadError::from_io_error(&e))?;
        remove_if_present(&self.validator_path).await
    }

    /// Delete the partial file and its validator. Missing files are fine.
    pub async fn remove_partial(&self) -> Result<(), DownloadError> {
        remove_if_present(&self.partial_path).await?;
        remove_if_present(&self.validator_path).await
    }

    /// Delete the partial file and the committed model file.
    pub async fn remove_all(&self) -> Result<(), DownloadError> {
        self.remove_partial().await?;
        remove_if_present(&self.final_path).await
    }
}

async fn remove_if_present(path: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::from_io_error(&e)),
    }
}
