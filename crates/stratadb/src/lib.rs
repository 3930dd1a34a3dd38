//! `StrataDB`
//!
//! Document collections with secondary indexes over an ordered transactional
//! KV engine.
//!
//! # Overview
//!
//! A collection stores schema-governed JSON documents in a primary data
//! subspace and maintains one secondary index per indexed field. Equality,
//! range, and sort queries over indexed fields run as KV range scans over
//! order-preserving index keys instead of collection scans.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stratadb::{Collection, IndexerConfig};
//! use stratadb_index::schema::CollectionSchema;
//! use stratadb_storage::backends::RedbEngine;
//!
//! let schema = CollectionSchema::from_json(
//!     br#"{
//!         "title": "users",
//!         "properties": {
//!             "id": {"type": "integer"},
//!             "age": {"type": "integer", "index": true}
//!         },
//!         "primary_key": ["id"]
//!     }"#,
//! )
//! .unwrap();
//!
//! let engine = RedbEngine::in_memory().unwrap();
//! let users = Collection::create(engine, schema, IndexerConfig::new()).unwrap();
//!
//! users
//!     .insert(vec![
//!         json!({"id": 1, "age": 30}),
//!         json!({"id": 2, "age": 25}),
//!     ])
//!     .unwrap();
//!
//! let adults = users.read(&json!({"age": {"$gte": 28}}), None).unwrap();
//! assert_eq!(adults.len(), 1);
//!
//! let explain = users.explain(&json!({"age": 30}), None).unwrap();
//! assert_eq!(explain.read_type, "secondary index");
//! ```

mod collection;
mod error;

pub use collection::Collection;
pub use error::{DbError, DbResult};

pub use stratadb_index::document::Document;
pub use stratadb_index::maintainer::IndexInfo;
pub use stratadb_index::metadata::{IndexMeta, IndexState};
pub use stratadb_index::schema::CollectionSchema;
pub use stratadb_index::IndexerConfig;
pub use stratadb_query::{Explain, SortKey, SortOrder};
