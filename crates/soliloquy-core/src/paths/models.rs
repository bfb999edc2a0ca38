//! Models directory layout.
//!
//! One file per downloaded model, named by its catalog filename, directly
//! under `<data root>/models`. In-flight transfers use a `.part` sibling.

use std::path::{Path, PathBuf};

use super::error::PathError;

/// Name of the models directory under the data root.
pub const MODELS_DIR_NAME: &str = "models";

/// Suffix appended to a model filename while its transfer is incomplete.
pub const PARTIAL_SUFFIX: &str = ".part";

/// `<data root>/models`.
pub fn models_dir(data_root: &Path) -> PathBuf {
    data_root.join(MODELS_DIR_NAME)
}

/// Full path of a model file, rejecting names that would leave the directory.
pub fn model_file_path(models_dir: &Path, filename: &str) -> Result<PathBuf, PathError> {
    let trimmed = filename.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
    {
        return Err(PathError::InvalidFilename(filename.to_string()));
    }
    Ok(models_dir.join(trimmed))
}

/// The `.part` path used while `final_path` is being downloaded.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
