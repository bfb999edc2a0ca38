//! Database path resolution.

use std::path::{Path, PathBuf};

/// File name of the key-value database.
pub const DATABASE_FILE: &str = "soliloquy.db";

/// `<data root>/data/soliloquy.db`. The parent is created by the caller.
pub fn database_path(data_root: &Path) -> PathBuf {
    data_root.join("data").join(DATABASE_FILE)
}
