//! Indexer configuration.

use stratadb_core::encoding::collation::DEFAULT_STRING_KEY_MAX_BYTES;

/// Default per-batch row budget for the online builder.
pub const DEFAULT_BUILD_BATCH_ROWS: usize = 1000;

/// Tunables recognised by the index subsystem.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Index every schema leaf instead of only `index: true` fields.
    pub index_all: bool,
    /// Collation-key truncation bound for string index values, in input bytes.
    pub string_key_max_bytes: usize,
    /// Row budget per online-build transaction, keeping each batch well under
    /// the KV engine's transaction size ceiling.
    pub build_batch_rows: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            index_all: false,
            string_key_max_bytes: DEFAULT_STRING_KEY_MAX_BYTES,
            build_batch_rows: DEFAULT_BUILD_BATCH_ROWS,
        }
    }
}

impl IndexerConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether every schema leaf is indexed.
    #[must_use]
    pub fn index_all(mut self, index_all: bool) -> Self {
        self.index_all = index_all;
        self
    }

    /// Set the string collation-key truncation bound.
    #[must_use]
    pub fn string_key_max_bytes(mut self, bytes: usize) -> Self {
        self.string_key_max_bytes = bytes;
        self
    }

    /// Set the online-build per-batch row budget.
    #[must_use]
    pub fn build_batch_rows(mut self, rows: usize) -> Self {
        self.build_batch_rows = rows;
        self
    }
}
