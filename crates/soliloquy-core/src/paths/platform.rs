//! Data root resolution.

use std::env;
use std::path::{Path, PathBuf};

use super::error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "SOLILOQUY_DATA_DIR";

/// Application directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "soliloquy";

/// Where the data root came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRootSource {
    Explicit,
    EnvVar,
    Default,
}

/// Get the root directory for application data (database, models).
///
/// Resolution order:
/// 1. Explicit path provided by the caller
/// 2. `SOLILOQUY_DATA_DIR` environment variable
/// 3. Platform data directory (e.g. `~/.local/share/soliloquy`)
///
/// The directory is not created here; see [`super::ensure_directory`].
pub fn data_root(explicit: Option<&Path>) -> Result<PathBuf, PathError> {
    resolve_data_root(explicit, env::var(DATA_DIR_ENV).ok()).map(|(path, _)| path)
}

/// Pure resolver behind [`data_root`], taking the environment value as input.
pub fn resolve_data_root(
    explicit: Option<&Path>,
    env_value: Option<String>,
) -> Result<(PathBuf, DataRootSource), PathError> {
    if let Some(path) = explicit {
        let raw = path.to_string_lossy();
        return Ok((normalize_user_path(&raw)?, DataRootSource::Explicit));
    }

    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Ok((normalize_user_path(&value)?, DataRootSource::EnvVar));
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok((data_dir.join(APP_DIR_NAME), DataRootSource::Default))
}

/// Normalize a user-provided path, expanding `~` and making it absolute.
pub(super) fn normalize_user_path(raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let expanded = if trimmed == "~" {
        dirs::home_dir().ok_or(PathError::NoHomeDir)?
    } else if let Some(rest) = trimmed.strip_prefix("~/") {
        dirs::home_dir().ok_or(PathError::NoHomeDir)?.join(rest)
    } else {
        PathBuf::from(trimmed)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|e| PathError::CurrentDirError(e.to_string()))
    }
}
