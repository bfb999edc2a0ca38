//! Preferences service - appearance settings in the key-value store.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::ports::{KeyValueStore, StorageError};

pub const DARK_MODE_KEY: &str = "preferences.darkMode";
pub const SEED_COLOR_KEY: &str = "preferences.seedColor";

pub const DEFAULT_DARK_MODE: bool = true;
pub const DEFAULT_SEED_COLOR: &str = "#9E9E9E";

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Invalid seed color '{0}', expected #RRGGBB")]
    InvalidColor(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Snapshot of all preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub dark_mode: bool,
    pub seed_color: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: DEFAULT_DARK_MODE,
            seed_color: DEFAULT_SEED_COLOR.to_string(),
        }
    }
}

/// Reads and writes user preferences. Unreadable values fall back to
/// defaults.
pub struct PreferencesService {
    store: Arc<dyn KeyValueStore>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Preferences, PreferencesError> {
        Ok(Preferences {
            dark_mode: self.dark_mode().await?,
            seed_color: self.seed_color().await?,
        })
    }

    pub async fn dark_mode(&self) -> Result<bool, PreferencesError> {
        match self.store.get(DARK_MODE_KEY).await?.as_deref() {
            None => Ok(DEFAULT_DARK_MODE),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => {
                warn!(target: "soliloquy.preferences", value = %other, "Unreadable dark mode preference");
                Ok(DEFAULT_DARK_MODE)
            }
        }
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> Result<(), PreferencesError> {
        let value = if enabled { "true" } else { "false" };
        self.store.set(DARK_MODE_KEY, value).await?;
        Ok(())
    }

    /// Flip dark mode and return the new value.
    pub async fn toggle_dark_mode(&self) -> Result<bool, PreferencesError> {
        let enabled = !self.dark_mode().await?;
        self.set_dark_mode(enabled).await?;
        Ok(enabled)
    }

    pub async fn seed_color(&self) -> Result<String, PreferencesError> {
        match self.store.get(SEED_COLOR_KEY).await? {
            Some(color) if is_hex_color(&color) => Ok(color),
            Some(other) => {
                warn!(target: "soliloquy.preferences", value = %other, "Unreadable seed color preference");
                Ok(DEFAULT_SEED_COLOR.to_string())
            }
            None => Ok(DEFAULT_SEED_COLOR.to_string()),
        }
    }

    /// Store a `#RRGGBB` seed color, normalized to upper case.
    pub async fn set_seed_color(&self, color: &str) -> Result<(), PreferencesError> {
        let color = color.trim();
        if !is_hex_color(color) {
            return Err(PreferencesError::InvalidColor(color.to_string()));
        }
        self.store
            .set(SEED_COLOR_KEY, &color.to_ascii_uppercase())
            .await?;
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
