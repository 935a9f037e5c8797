use std::cell::RefCell;
use std::collections::HashMap;
use tracing::trace;

use super::KeyValueStore;
use crate::error::{KindError, Result};
use crate::key::Key;
use crate::value::Record;

/// In-memory, insertion-ordered store.
///
/// Uses `RefCell` since the crate is single-threaded. This keeps the trait on `&self`
/// without paying for a lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<Vec<(Key, Record)>>,
    index: RefCell<HashMap<Key, usize>>,
    simulate_write_error: RefCell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<(Key, Record)>) -> Self {
        let store = Self::new();
        for (key, record) in entries {
            store.insert(key, record);
        }
        store
    }

    /// Make every subsequent `put` fail with a store error.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.borrow_mut() = simulate;
    }

    /// A snapshot of every entry in insertion order.
    pub fn entries(&self) -> Vec<(Key, Record)> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn insert(&self, key: Key, record: Record) {
        let mut index = self.index.borrow_mut();
        let mut entries = self.entries.borrow_mut();
        match index.get(&key) {
            Some(&pos) => entries[pos].1 = record,
            None => {
                index.insert(key.clone(), entries.len());
                entries.push((key, record));
            }
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &Key) -> Result<Option<Record>> {
        let index = self.index.borrow();
        let entries = self.entries.borrow();
        Ok(index.get(key).map(|&pos| entries[pos].1.clone()))
    }

    fn put(&self, key: &Key, record: Record) -> Result<Key> {
        if *self.simulate_write_error.borrow() {
            return Err(KindError::Store("Simulated write error".to_string()));
        }
        trace!(key = %key, fields = record.len(), "memory put");
        self.insert(key.clone(), record);
        Ok(key.clone())
    }

    fn keys(&self) -> Result<Vec<Key>> {
        Ok(self.entries.borrow().iter().map(|(k, _)| k.clone()).collect())
    }
}
