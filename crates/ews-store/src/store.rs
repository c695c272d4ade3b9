//! The persistence seam used by ingestion, and its pooled `SQLite` backing.

use std::path::Path;

use ews_core::{Reading, StoredReading};
use ews_settings::DatabaseSettings;
use tracing::{debug, info};

use crate::connection::{self, ConnectionConfig, ConnectionPool};
use crate::errors::Result;
use crate::migrations;
use crate::repo::ReadingRepo;

/// Durable storage for readings.
///
/// Implementations are synchronous and must tolerate concurrent callers;
/// async code calls them from the blocking pool.
pub trait ReadingStore: Send + Sync + 'static {
    /// Persist a reading, returning it with its storage-assigned identity.
    fn persist(&self, reading: &Reading) -> Result<StoredReading>;
}

/// Pooled `SQLite` reading store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open (or create) the database described by `settings` and migrate it.
    pub fn open(settings: &DatabaseSettings) -> Result<Self> {
        Self::open_path(&settings.path, &ConnectionConfig::from(settings))
    }

    /// Open (or create) a database file and migrate it.
    pub fn open_path(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        let store = Self::from_pool(pool)?;
        info!(path = %path.display(), "reading store opened");
        Ok(store)
    }

    /// In-memory store (single connection), migrated.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    fn from_pool(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let applied = migrations::run_migrations(&conn)?;
        debug!(applied, "store migrations checked");
        drop(conn);
        Ok(Self { pool })
    }

    /// Number of stored readings.
    pub fn count(&self) -> Result<i64> {
        ReadingRepo::count(&*self.pool.get()?)
    }

    /// Most recently stored reading.
    pub fn latest(&self) -> Result<Option<StoredReading>> {
        ReadingRepo::latest(&*self.pool.get()?)
    }
}

impl ReadingStore for SqliteStore {
    fn persist(&self, reading: &Reading) -> Result<StoredReading> {
        let conn = self.pool.get()?;
        ReadingRepo::insert(&conn, reading)
    }
}
