//! # Key-Value Collaborators
//!
//! Entities are persisted through the [`KeyValueStore`] trait, which is deliberately small:
//!
//! - `get(key)`: the stored record, or `None`
//! - `put(key, record)`: write the record and return the key it was stored under
//! - `keys()`: every stored key
//!
//! Nothing above this layer indexes, plans or pushes filters down. Queries are a scan over
//! `keys()` plus a `get` per candidate.
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: insertion-ordered, in memory. `keys()` returns keys in the order they
//!   were first written; updates keep their original position.
//! - [`FileStore`]: the same ordering, persisted to a single JSON file. Every `put` rewrites
//!   the file atomically (temp file, then rename).
//!
//! Both use `RefCell` for interior mutability, so every trait method takes `&self`. The
//! crate is single-threaded; nothing here is `Sync`.
//!
//! ## Ordering Guarantees
//!
//! The trait itself promises no order for `keys()`. The two stores above document theirs,
//! and tests may rely on it.

use std::rc::Rc;

use crate::error::Result;
use crate::key::Key;
use crate::value::Record;

pub mod fs;
pub mod memory;

pub use fs::FileStore;
pub use memory::MemoryStore;

pub trait KeyValueStore {
    /// `Ok(None)` when nothing is stored under `key`. `Err` only on real failures.
    fn get(&self, key: &Key) -> Result<Option<Record>>;

    /// Write `record` under `key`, replacing any previous record.
    fn put(&self, key: &Key, record: Record) -> Result<Key>;

    fn keys(&self) -> Result<Vec<Key>>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn get(&self, key: &Key) -> Result<Option<Record>> {
        (**self).get(key)
    }

    fn put(&self, key: &Key, record: Record) -> Result<Key> {
        (**self).put(key, record)
    }

    fn keys(&self) -> Result<Vec<Key>> {
        (**self).keys()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &Key) -> Result<Option<Record>> {
        (**self).get(key)
    }

    fn put(&self, key: &Key, record: Record) -> Result<Key> {
        (**self).put(key, record)
    }

    fn keys(&self) -> Result<Vec<Key>> {
        (**self).keys()
    }
}
