//! Index metadata, states, and the per-collection descriptor.

use serde::{Deserialize, Serialize};

use stratadb_core::encoding::sortable;
use stratadb_storage::KvTransaction;

use crate::config::IndexerConfig;
use crate::document::{CREATED_AT_FIELD, UPDATED_AT_FIELD};
use crate::error::{IndexError, IndexResult};
use crate::schema::CollectionSchema;

/// Lifecycle state of one index.
///
/// `Inactive -> Building -> Active` via the online builder; `Active ->
/// Deleted` on drop. Writes maintain every index that is not `Inactive`, so
/// a build observes a snapshot plus the concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    /// Declared but not populated; reads and writes ignore it.
    Inactive,
    /// Backfill in progress; writes maintain it, reads do not use it yet.
    Building,
    /// Fully populated and queryable.
    Active,
    /// Dropped; entries cleared.
    Deleted,
}

impl IndexState {
    /// Wire/API representation of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "INDEX INACTIVE",
            Self::Building => "INDEX BUILDING",
            Self::Active => "INDEX ACTIVE",
            Self::Deleted => "INDEX DELETED",
        }
    }

    /// Whether the write path maintains entries for this state.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Building | Self::Active)
    }
}

/// Metadata of one secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Stable id, embedded in every entry key.
    pub id: u32,
    /// Index name; by convention the top-level field it covers.
    pub name: String,
    /// Lifecycle state.
    pub state: IndexState,
    /// The leaf paths whose entries this index owns.
    pub fields: Vec<String>,
}

/// Persisted row/size counters for a collection's index subspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of live index entries.
    pub rows: i64,
    /// Stored bytes (keys plus values) of live entries.
    pub size: i64,
}

/// A collection's index subsystem descriptor: where its data, entries, and
/// metadata live, plus the per-field index list.
#[derive(Debug, Clone)]
pub struct CollectionIndexes {
    /// KV table holding primary documents.
    pub data_table: String,
    /// KV table holding index entries; also embedded in every entry key as
    /// the index-subspace identifier.
    pub index_table: String,
    /// KV table holding index metadata and counters.
    pub meta_table: String,
    /// The collection schema.
    pub schema: CollectionSchema,
    /// Per-field indexes, auto-timestamp indexes first.
    pub indexes: Vec<IndexMeta>,
}

impl CollectionIndexes {
    /// Derive the index list for a new collection.
    ///
    /// The two auto-timestamp indexes are always present and active. A
    /// top-level field gets an index when `index: true` or `index_all`; on a
    /// fresh collection those start `Active` since there is nothing to
    /// backfill.
    #[must_use]
    pub fn new(
        schema: CollectionSchema,
        data_table: impl Into<String>,
        index_table: impl Into<String>,
        meta_table: impl Into<String>,
        config: &IndexerConfig,
    ) -> Self {
        let mut indexes = vec![
            IndexMeta {
                id: 1,
                name: CREATED_AT_FIELD.to_owned(),
                state: IndexState::Active,
                fields: vec![CREATED_AT_FIELD.to_owned()],
            },
            IndexMeta {
                id: 2,
                name: UPDATED_AT_FIELD.to_owned(),
                state: IndexState::Active,
                fields: vec![UPDATED_AT_FIELD.to_owned()],
            },
        ];
        let mut next_id = 3;
        for field in &schema.fields {
            if config.index_all || field.index {
                indexes.push(IndexMeta {
                    id: next_id,
                    name: field.name.clone(),
                    state: IndexState::Active,
                    fields: CollectionSchema::leaf_paths(field),
                });
            }
            next_id += 1;
        }
        Self {
            data_table: data_table.into(),
            index_table: index_table.into(),
            meta_table: meta_table.into(),
            schema,
            indexes,
        }
    }

    /// Apply a schema revision. Newly indexed fields get an `Inactive` index
    /// awaiting an online build; existing indexes keep their state.
    pub fn apply_schema(&mut self, schema: CollectionSchema, config: &IndexerConfig) {
        let mut next_id = self.indexes.iter().map(|m| m.id).max().unwrap_or(2) + 1;
        for field in &schema.fields {
            if !(config.index_all || field.index) {
                continue;
            }
            if let Some(meta) = self.indexes.iter_mut().find(|m| m.name == field.name) {
                meta.fields = CollectionSchema::leaf_paths(field);
            } else {
                self.indexes.push(IndexMeta {
                    id: next_id,
                    name: field.name.clone(),
                    state: IndexState::Inactive,
                    fields: CollectionSchema::leaf_paths(field),
                });
                next_id += 1;
            }
        }
        self.schema = schema;
    }

    /// The index owning entries at a leaf path, if any is live.
    #[must_use]
    pub fn meta_for_path(&self, path: &str) -> Option<&IndexMeta> {
        let top = path.split('.').next().unwrap_or(path);
        self.indexes
            .iter()
            .find(|m| m.name == top && m.state != IndexState::Deleted)
    }

    /// Look up an index by name.
    #[must_use]
    pub fn meta_by_name(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|m| m.name == name)
    }

    /// Set the state of an index by id.
    pub fn set_state(&mut self, id: u32, state: IndexState) {
        if let Some(meta) = self.indexes.iter_mut().find(|m| m.id == id) {
            meta.state = state;
        }
    }

    /// Persist one index's metadata in the caller's transaction.
    ///
    /// # Errors
    ///
    /// Propagates storage and serialization failures.
    pub fn persist_meta<T: KvTransaction>(&self, txn: &mut T, meta: &IndexMeta) -> IndexResult<()> {
        let bytes = serde_json::to_vec(meta)
            .map_err(|e| IndexError::InvalidDocument(e.to_string()))?;
        txn.set(&self.meta_table, &meta_key(meta.id), &bytes)?;
        Ok(())
    }

    /// Persist the whole index list.
    ///
    /// # Errors
    ///
    /// Propagates storage and serialization failures.
    pub fn persist_all<T: KvTransaction>(&self, txn: &mut T) -> IndexResult<()> {
        for meta in &self.indexes {
            self.persist_meta(txn, meta)?;
        }
        Ok(())
    }

    /// Reload persisted index states, overriding the derived defaults.
    ///
    /// # Errors
    ///
    /// Propagates storage failures; malformed metadata is a
    /// [`IndexError::InvalidDocument`].
    pub fn load_states<T: KvTransaction>(&mut self, txn: &T) -> IndexResult<()> {
        for meta in &mut self.indexes {
            if let Some(bytes) = txn.get(&self.meta_table, &meta_key(meta.id))? {
                *meta = serde_json::from_slice(&bytes)
                    .map_err(|e| IndexError::InvalidDocument(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Read the persisted row/size counters.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn read_stats<T: KvTransaction>(&self, txn: &T) -> IndexResult<IndexStats> {
        match txn.get(&self.meta_table, &stats_key())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| IndexError::InvalidDocument(e.to_string())),
            None => Ok(IndexStats::default()),
        }
    }

    /// Write the row/size counters in the caller's transaction.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn write_stats<T: KvTransaction>(&self, txn: &mut T, stats: IndexStats) -> IndexResult<()> {
        let bytes = serde_json::to_vec(&stats)
            .map_err(|e| IndexError::InvalidDocument(e.to_string()))?;
        txn.set(&self.meta_table, &stats_key(), &bytes)?;
        Ok(())
    }
}

fn meta_key(id: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    sortable::encode_bytes_escaped(b"index", &mut key);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn stats_key() -> Vec<u8> {
    let mut key = Vec::with_capacity(8);
    sortable::encode_bytes_escaped(b"stats", &mut key);
    key
}
