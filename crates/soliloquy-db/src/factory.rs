//! Composition helpers for wiring the `SQLite` store into `AppCore`.

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;

use soliloquy_core::config::AppConfig;
use soliloquy_core::{AppCore, CoreError, CorePorts, DownloadManagerPort, EngineLoader, KeyValueStore};
use soliloquy_core::{AppEventEmitter, WakeLockPort};

use crate::kv_store::SqliteKeyValueStore;
use crate::setup::setup_database;

/// Factory for `SQLite`-backed components. Construction only.
pub struct CoreFactory;

impl CoreFactory {
    /// Open the database at `db_path`, creating file and schema if needed.
    pub async fn open_store(db_path: &Path) -> anyhow::Result<Arc<SqliteKeyValueStore>> {
        let pool = setup_database(db_path).await?;
        tracing::debug!(target: "soliloquy.db", path = %db_path.display(), "Database opened");
        Ok(Arc::new(SqliteKeyValueStore::new(pool)))
    }

    /// Wrap an existing pool.
    pub fn build_store(pool: SqlitePool) -> Arc<dyn KeyValueStore> {
        Arc::new(SqliteKeyValueStore::new(pool))
    }

    /// Open the configured database and build a complete `AppCore`.
    pub async fn build_app_core(
        config: AppConfig,
        loader: Arc<dyn EngineLoader>,
        downloads: Arc<dyn DownloadManagerPort>,
        wake_lock: Arc<dyn WakeLockPort>,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> anyhow::Result<AppCore> {
        let db_path = config.database_path().map_err(CoreError::from)?;
        let store = Self::open_store(&db_path).await?;
        let ports = CorePorts {
            store,
            loader,
            downloads,
            wake_lock,
            emitter,
        };
        Ok(AppCore::new(config, ports)?)
    }
}
