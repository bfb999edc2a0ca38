//! Path utilities for the data root, database and models directory.
//!
//! Returns `PathBuf` and `PathError`; nothing here prompts or logs.

mod database;
mod ensure;
mod error;
mod models;
mod platform;

pub use error::PathError;

pub use platform::{APP_DIR_NAME, DATA_DIR_ENV, DataRootSource, data_root, resolve_data_root};

pub use database::{DATABASE_FILE, database_path};

pub use models::{MODELS_DIR_NAME, PARTIAL_SUFFIX, model_file_path, models_dir, partial_path};

pub use ensure::{DirectoryCreationStrategy, ensure_directory, verify_writable};
