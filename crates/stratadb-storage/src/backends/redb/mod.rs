//! Redb storage backend.
//!
//! Storage backend implementation over redb, a pure-Rust embedded ordered
//! key-value store with ACID transactions. A single writer runs at a time;
//! readers observe consistent snapshots, which is the isolation level the
//! index maintenance layer assumes.
//!
//! Redb requires static table names, so all logical tables share one
//! physical table with name-prefixed keys; see [`tables`].
//!
//! # Example
//!
//! ```ignore
//! use stratadb_storage::backends::RedbEngine;
//! use stratadb_storage::{KvEngine, KvTransaction};
//!
//! let engine = RedbEngine::open("strata.redb")?;
//!
//! let mut tx = engine.begin_write()?;
//! tx.set("data", b"k", b"v")?;
//! tx.commit()?;
//! ```
//!
//! # In-memory databases
//!
//! Tests use a non-persistent variant:
//!
//! ```ignore
//! let engine = RedbEngine::in_memory()?;
//! ```

mod engine;
pub mod tables;
mod transaction;

pub use engine::{RedbConfig, RedbEngine};
pub use transaction::{RedbScan, RedbTransaction};
