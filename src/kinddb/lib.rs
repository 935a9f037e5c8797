//! # Kinddb Architecture
//!
//! Kinddb models typed entities on top of a dumb key-value store. Entities belong to a
//! *kind*, are addressed by hierarchical [`Key`]s, carry fields described by typed
//! [`Property`] declarations, and are found by [`Query`] objects that filter in memory.
//!
//! The store underneath knows nothing about any of this. It only has to answer three
//! questions: what is stored under this key, store this record under this key, and which
//! keys exist.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs)                                     │
//! │  - Inspects a configured store: keys, records, tokens       │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Datastore (datastore.rs)                                   │
//! │  - Explicit context: kind registry + store + id generator   │
//! │  - get / put / get_by_id / get_or_insert                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Model (key.rs, property.rs, schema.rs, entity.rs, query/)  │
//! │  - Keys, validation, expando fields, filter trees, scans    │
//! │  - No I/O of its own; every read/write goes through a store │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                           │
//! │  - KeyValueStore trait                                      │
//! │  - FileStore (persistent), MemoryStore (testing, scratch)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use kinddb::{Datastore, EntityOptions, ModelSchema, Node, Property, Query};
//!
//! let mut ds = Datastore::in_memory();
//! ds.register(
//!     ModelSchema::builder("Note")
//!         .property(Property::string("title").required())
//!         .property(Property::string("tags").repeated())
//!         .build()?,
//! );
//!
//! let mut note = ds.create("Note", EntityOptions::default(), [("title", "groceries")])?;
//! let key = note.put(&ds)?;
//! assert!(key.is_complete());
//!
//! let found = Query::new("Note")
//!     .filter([Node::equals("title", "groceries")])?
//!     .get(&ds)?;
//! assert_eq!(found.as_ref().and_then(|n| n.key()), Some(&key));
//! # Ok::<(), kinddb::KindError>(())
//! ```
//!
//! ## What Queries Do Not Do
//!
//! There are no indexes and no pushdown. A query walks every key the store returns and
//! evaluates its predicates against materialized entities. This is deliberate and keeps
//! the semantics independent of the store.
//!
//! ## Testing Strategy
//!
//! 1. **Model** modules carry unit tests next to the code, against [`MemoryStore`].
//! 2. **Integration** tests in `tests/` exercise whole flows: put/get, queries over
//!    several kinds, the file store, and the CLI binary.
//! 3. Fixtures live in `test_utils` (enabled by the `test_utils` feature).

pub mod config;
pub mod datastore;
pub mod entity;
pub mod error;
pub mod ids;
pub mod key;
pub mod property;
pub mod query;
pub mod schema;
pub mod store;
pub mod value;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::{BackendKind, IdStrategy, StoreConfig};
pub use datastore::Datastore;
pub use entity::{Entity, EntityOptions};
pub use error::{KindError, Result};
pub use ids::{HashedIds, IdGenerator, UuidIds};
pub use key::{Key, KeyId};
pub use property::{FieldAccess, ModelKey, Property, PropertyKind};
pub use query::{Direction, Node, Op, Order, Query, QueryIter};
pub use schema::{KindRegistry, ModelSchema};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use value::{Record, Value};
