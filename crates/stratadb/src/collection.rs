//! The collection handle: document writes, index maintenance, and reads.
//!
//! A [`Collection`] owns the wiring between the storage engine, the index
//! maintainer, and the query planner. Every document write runs in one
//! transaction that stores the document and applies the full index delta, so
//! a rollback leaves both sides untouched.

use serde_json::Value as JsonValue;
use tracing::debug;

use stratadb_core::encoding::keys;
use stratadb_index::builder::IndexBuilder;
use stratadb_index::document::Document;
use stratadb_index::maintainer::{IndexInfo, SecondaryIndexer};
use stratadb_index::metadata::{CollectionIndexes, IndexMeta, IndexState};
use stratadb_index::schema::CollectionSchema;
use stratadb_index::IndexerConfig;
use stratadb_query::planner::{parse_sort, QueryPlanner};
use stratadb_query::{execute, parse_filter, Explain, QueryPlan};
use stratadb_storage::{KvEngine, KvTransaction};

use crate::error::{DbError, DbResult};

/// A document collection with secondary indexes.
pub struct Collection<E: KvEngine> {
    engine: E,
    descriptor: CollectionIndexes,
    config: IndexerConfig,
}

impl<E: KvEngine> Collection<E> {
    /// Create a collection over an engine, persisting the derived index
    /// metadata.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn create(engine: E, schema: CollectionSchema, config: IndexerConfig) -> DbResult<Self> {
        let name = schema.name.clone();
        let descriptor = CollectionIndexes::new(
            schema,
            name.clone(),
            format!("sidx_{name}"),
            format!("meta_{name}"),
            &config,
        );
        let mut txn = engine.begin_write()?;
        descriptor.persist_all(&mut txn)?;
        txn.commit()?;
        Ok(Self { engine, descriptor, config })
    }

    /// The collection's index descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &CollectionIndexes {
        &self.descriptor
    }

    /// The current index list with states.
    #[must_use]
    pub fn indexes(&self) -> &[IndexMeta] {
        &self.descriptor.indexes
    }

    /// Apply a schema revision; newly indexed fields await an online build.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn update_schema(&mut self, schema: CollectionSchema) -> DbResult<()> {
        self.descriptor.apply_schema(schema, &self.config);
        let mut txn = self.engine.begin_write()?;
        self.descriptor.persist_all(&mut txn)?;
        txn.commit()?;
        Ok(())
    }

    /// Run the online builder over every index awaiting a build.
    ///
    /// # Errors
    ///
    /// Propagates build failures; see
    /// [`IndexBuilder::build_collection`].
    pub fn build_indexes(&mut self) -> DbResult<Vec<IndexMeta>> {
        let builder = IndexBuilder::new(&self.engine, self.config.clone());
        Ok(builder.build_collection(&mut self.descriptor)?)
    }

    /// Insert documents, stamping timestamps and maintaining every live
    /// index, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DuplicateKey`] if a primary key already exists;
    /// nothing is applied in that case.
    pub fn insert(&self, bodies: Vec<JsonValue>) -> DbResult<()> {
        let indexer = SecondaryIndexer::new(&self.descriptor, self.config.clone());
        let mut txn = self.engine.begin_write()?;
        for body in bodies {
            let doc = Document::new(body);
            let primary_key = doc.primary_key(&self.descriptor.schema)?;
            let data_key = keys::encode_primary_key(&primary_key)?;
            if txn.get(&self.descriptor.data_table, &data_key)?.is_some() {
                return Err(DbError::DuplicateKey(format!("{primary_key:?}")));
            }
            txn.set(&self.descriptor.data_table, &data_key, &doc.to_bytes()?)?;
            indexer.index(&mut txn, &doc, &primary_key)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Update every document matching `filter` by assigning the `$set`
    /// fields, re-deriving index entries from the delta.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidUpdate`] on a malformed update document.
    pub fn update_by_filter(&self, filter: &JsonValue, fields: &JsonValue) -> DbResult<usize> {
        let set = fields
            .get("$set")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| DbError::InvalidUpdate("expected {\"$set\": {...}}".into()))?;

        let plan = self.compile(filter, None)?;
        let indexer = SecondaryIndexer::new(&self.descriptor, self.config.clone());
        let mut txn = self.engine.begin_write()?;
        let rows = execute(&txn, &self.descriptor, &self.config, &plan)?;

        let mut modified = 0;
        for (primary_key, old_doc) in rows {
            let mut body = old_doc.body.clone();
            let object = body
                .as_object_mut()
                .ok_or_else(|| DbError::InvalidUpdate("document body is not an object".into()))?;
            for (key, value) in set {
                object.insert(key.clone(), value.clone());
            }
            let new_doc = old_doc.updated(body);
            let data_key = keys::encode_primary_key(&primary_key)?;
            txn.set(&self.descriptor.data_table, &data_key, &new_doc.to_bytes()?)?;
            indexer.update(&mut txn, &new_doc, &old_doc, &primary_key)?;
            modified += 1;
        }
        txn.commit()?;
        debug!(modified, "update by filter");
        Ok(modified)
    }

    /// Delete every document matching `filter`, clearing its index entries.
    ///
    /// # Errors
    ///
    /// Propagates storage and query failures.
    pub fn delete_by_filter(&self, filter: &JsonValue) -> DbResult<usize> {
        let plan = self.compile(filter, None)?;
        let indexer = SecondaryIndexer::new(&self.descriptor, self.config.clone());
        let mut txn = self.engine.begin_write()?;
        let rows = execute(&txn, &self.descriptor, &self.config, &plan)?;

        let mut deleted = 0;
        for (primary_key, old_doc) in rows {
            let data_key = keys::encode_primary_key(&primary_key)?;
            txn.clear(&self.descriptor.data_table, &data_key)?;
            indexer.delete(&mut txn, &old_doc, &primary_key)?;
            deleted += 1;
        }
        txn.commit()?;
        debug!(deleted, "delete by filter");
        Ok(deleted)
    }

    /// Read matching documents, in plan order.
    ///
    /// # Errors
    ///
    /// Propagates query failures.
    pub fn read(&self, filter: &JsonValue, sort: Option<&JsonValue>) -> DbResult<Vec<JsonValue>> {
        let plan = self.compile(filter, sort)?;
        let txn = self.engine.begin_read()?;
        let rows = execute(&txn, &self.descriptor, &self.config, &plan)?;
        Ok(rows.into_iter().map(|(_, doc)| doc.body).collect())
    }

    /// Explain how a query would execute, without touching storage.
    ///
    /// # Errors
    ///
    /// Propagates filter and sort parsing failures.
    pub fn explain(&self, filter: &JsonValue, sort: Option<&JsonValue>) -> DbResult<Explain> {
        Ok(self.compile(filter, sort)?.explain())
    }

    /// Drop one index by name, clearing its entries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::IndexNotFound`] for unknown names.
    pub fn delete_index(&mut self, name: &str) -> DbResult<()> {
        let meta = self
            .descriptor
            .meta_by_name(name)
            .cloned()
            .ok_or_else(|| DbError::IndexNotFound(name.to_owned()))?;
        let indexer = SecondaryIndexer::new(&self.descriptor, self.config.clone());
        let mut txn = self.engine.begin_write()?;
        indexer.delete_index(&mut txn, &meta)?;
        txn.commit()?;
        self.descriptor.set_state(meta.id, IndexState::Deleted);
        Ok(())
    }

    /// Read the index row/size counters.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn index_info(&self) -> DbResult<IndexInfo> {
        let indexer = SecondaryIndexer::new(&self.descriptor, self.config.clone());
        let txn = self.engine.begin_read()?;
        Ok(indexer.index_info(&txn)?)
    }

    fn compile(&self, filter: &JsonValue, sort: Option<&JsonValue>) -> DbResult<QueryPlan> {
        let filter = parse_filter(&self.descriptor.schema, filter)?;
        let sort = parse_sort(sort)?;
        let planner = QueryPlanner::new(&self.descriptor, &self.config);
        Ok(planner.plan(&filter, &sort)?)
    }
}
