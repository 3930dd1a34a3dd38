//! Redb database handle and configuration.

use std::path::Path;

use redb::backends::InMemoryBackend;
use redb::Database;

use crate::engine::{KvEngine, StorageResult};

use super::transaction::RedbTransaction;

/// Configuration options for the redb storage engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedbConfig {
    /// Maximum size of the database file in bytes.
    /// If not set, the database will grow as needed.
    pub max_size: Option<u64>,

    /// Cache size in bytes.
    /// If not set, uses redb's default.
    pub cache_size: Option<usize>,
}

impl RedbConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum database size.
    #[must_use]
    pub const fn max_size(mut self, size: u64) -> Self {
        self.max_size = Some(size);
        self
    }

    /// Set the cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }
}

/// Storage engine backed by redb, a pure-Rust embedded ordered KV store.
pub struct RedbEngine {
    /// The underlying redb database.
    db: Database,
}

impl RedbEngine {
    /// Open or create a database at the given path with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Backend`] if the database cannot be
    /// opened or created.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(path, RedbConfig::default())
    }

    /// Open or create a database at the given path with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Backend`] if the database cannot be
    /// opened or created.
    pub fn open_with_config(path: impl AsRef<Path>, config: RedbConfig) -> StorageResult<Self> {
        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }
        let db = builder.create(path.as_ref())?;
        Ok(Self { db })
    }

    /// Create an in-memory database for testing.
    ///
    /// The database is lost when the engine is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Backend`] if the backend cannot be
    /// initialised.
    pub fn in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Ok(Self { db })
    }

    /// Get the underlying redb database.
    ///
    /// This is primarily for advanced use cases and testing.
    #[must_use]
    pub const fn inner(&self) -> &Database {
        &self.db
    }
}

impl KvEngine for RedbEngine {
    type Txn<'a>
        = RedbTransaction
    where
        Self: 'a;

    fn begin_read(&self) -> StorageResult<Self::Txn<'_>> {
        Ok(RedbTransaction::new_read(self.db.begin_read()?))
    }

    fn begin_write(&self) -> StorageResult<Self::Txn<'_>> {
        Ok(RedbTransaction::new_write(self.db.begin_write()?))
    }
}
