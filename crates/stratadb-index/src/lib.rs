//! `StrataDB` Index
//!
//! Secondary index maintenance for schema-governed JSON documents over an
//! ordered transactional KV engine.
//!
//! # Overview
//!
//! - [`schema`] - typed field trees and the request-schema loader
//! - [`document`] - the stored envelope (body + auto-timestamps)
//! - [`walker`] - schema-guided projection of a document onto leaves
//! - [`keyset`] - key-set derivation and revision diffing
//! - [`maintainer`] - transactional entry maintenance with row/size counters
//! - [`builder`] - batched online index build with state transitions
//! - [`metadata`] - index metadata, states, and persistence
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stratadb_index::config::IndexerConfig;
//! use stratadb_index::document::Document;
//! use stratadb_index::maintainer::SecondaryIndexer;
//! use stratadb_index::metadata::CollectionIndexes;
//! use stratadb_index::schema::CollectionSchema;
//! use stratadb_storage::backends::RedbEngine;
//! use stratadb_storage::{KvEngine, KvTransaction};
//!
//! let schema = CollectionSchema::from_json(
//!     br#"{
//!         "title": "t1",
//!         "properties": {
//!             "id": {"type": "integer"},
//!             "age": {"type": "integer", "index": true}
//!         },
//!         "primary_key": ["id"]
//!     }"#,
//! )
//! .unwrap();
//!
//! let config = IndexerConfig::new();
//! let coll = CollectionIndexes::new(schema, "t1", "sidx1", "meta1", &config);
//! let indexer = SecondaryIndexer::new(&coll, config);
//!
//! let engine = RedbEngine::in_memory().unwrap();
//! let mut txn = engine.begin_write().unwrap();
//!
//! let doc = Document::new(json!({"id": 1, "age": 30}));
//! let pk = doc.primary_key(&coll.schema).unwrap();
//! indexer.index(&mut txn, &doc, &pk).unwrap();
//! txn.commit().unwrap();
//! ```

pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod keyset;
pub mod maintainer;
pub mod metadata;
pub mod schema;
pub mod walker;

pub use builder::IndexBuilder;
pub use config::IndexerConfig;
pub use document::Document;
pub use error::{IndexError, IndexResult};
pub use keyset::{build_key_set, build_update_set, IndexEntry, KeySet, UpdateSet};
pub use maintainer::{IndexInfo, SecondaryIndexer};
pub use metadata::{CollectionIndexes, IndexMeta, IndexState, IndexStats};
pub use schema::{CollectionSchema, FieldKind, FieldSchema, ScalarType};
pub use walker::{walk, DocumentLeaf, LeafValue, LeafWalker};
