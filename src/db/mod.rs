mod error;
pub mod repos;
#[cfg(feature = "database-sqlite")]
pub mod sqlite;

#[cfg(all(test, feature = "database-sqlite"))]
pub mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
///
/// Containers and volumes are exposed twice: once through their full repo
/// trait for the reclaimers, once as a bare [`HandleRepo`] for the handle
/// syncers. Both point at the same instance.
struct CachedRepos {
    containers: Arc<dyn ContainerRepo>,
    container_handles: Arc<dyn HandleRepo>,
    volumes: Arc<dyn VolumeRepo>,
    volume_handles: Arc<dyn HandleRepo>,
    resource_caches: Arc<dyn ResourceCacheLifecycleRepo>,
    versions: Arc<dyn VersionRepo>,
    pipelines: Arc<dyn PipelineRepo>,
    builds: Arc<dyn BuildRepo>,
    workers: Arc<dyn WorkerRepo>,
}

enum PoolStorage {
    #[cfg(feature = "database-sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(not(feature = "database-sqlite"))]
    _None(std::convert::Infallible),
}

/// Database pool plus the repositories built on top of it.
pub struct DbPool {
    inner: PoolStorage,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    #[cfg(feature = "database-sqlite")]
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let containers = Arc::new(sqlite::SqliteContainerRepo::new(pool.clone()));
        let volumes = Arc::new(sqlite::SqliteVolumeRepo::new(pool.clone()));

        let repos = CachedRepos {
            containers: containers.clone(),
            container_handles: containers,
            volumes: volumes.clone(),
            volume_handles: volumes,
            resource_caches: Arc::new(sqlite::SqliteResourceCacheLifecycleRepo::new(
                pool.clone(),
            )),
            versions: Arc::new(sqlite::SqliteVersionRepo::new(pool.clone())),
            pipelines: Arc::new(sqlite::SqlitePipelineRepo::new(pool.clone())),
            builds: Arc::new(sqlite::SqliteBuildRepo::new(pool.clone())),
            workers: Arc::new(sqlite::SqliteWorkerRepo::new(pool.clone())),
        };

        DbPool {
            inner: PoolStorage::Sqlite(pool),
            repos,
        }
    }

    /// Create a database pool from configuration
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::None => Err(DbError::NotConfigured),
            #[cfg(feature = "database-sqlite")]
            DatabaseConfig::Sqlite(cfg) => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .connect_with(
                        sqlx::sqlite::SqliteConnectOptions::new()
                            .filename(&cfg.path)
                            .create_if_missing(cfg.create_if_missing)
                            .foreign_keys(true)
                            .journal_mode(if cfg.wal_mode {
                                sqlx::sqlite::SqliteJournalMode::Wal
                            } else {
                                sqlx::sqlite::SqliteJournalMode::Delete
                            })
                            .busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                let db = Self::from_sqlite(pool);
                if cfg.run_migrations {
                    db.run_migrations().await?;
                }
                Ok(db)
            }
        }
    }

    /// Apply the embedded schema migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                sqlx::migrate!("./migrations_sqlx/sqlite").run(pool).await?;
                tracing::info!("SQLite migrations complete");
                Ok(())
            }
            #[cfg(not(feature = "database-sqlite"))]
            PoolStorage::_None(never) => match *never {},
        }
    }

    /// Close the underlying pool, waiting for checked-out connections.
    pub async fn close(&self) {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => pool.close().await,
            #[cfg(not(feature = "database-sqlite"))]
            PoolStorage::_None(never) => match *never {},
        }
    }

    pub fn containers(&self) -> Arc<dyn ContainerRepo> {
        self.repos.containers.clone()
    }

    pub fn container_handles(&self) -> Arc<dyn HandleRepo> {
        self.repos.container_handles.clone()
    }

    pub fn volumes(&self) -> Arc<dyn VolumeRepo> {
        self.repos.volumes.clone()
    }

    pub fn volume_handles(&self) -> Arc<dyn HandleRepo> {
        self.repos.volume_handles.clone()
    }

    pub fn resource_caches(&self) -> Arc<dyn ResourceCacheLifecycleRepo> {
        self.repos.resource_caches.clone()
    }

    pub fn versions(&self) -> Arc<dyn VersionRepo> {
        self.repos.versions.clone()
    }

    pub fn pipelines(&self) -> Arc<dyn PipelineRepo> {
        self.repos.pipelines.clone()
    }

    pub fn builds(&self) -> Arc<dyn BuildRepo> {
        self.repos.builds.clone()
    }

    pub fn workers(&self) -> Arc<dyn WorkerRepo> {
        self.repos.workers.clone()
    }
}
