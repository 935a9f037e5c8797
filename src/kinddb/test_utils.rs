//! Fixtures shared by unit tests. Enabled for downstream tests with the `test_utils` feature.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::datastore::Datastore;
use crate::entity::{Entity, EntityOptions};
use crate::ids::{IdGenerator, UuidIds};
use crate::key::KeyId;
use crate::schema::ModelSchema;
use crate::store::MemoryStore;
use crate::value::Value;

/// Hands out a fixed sequence of ids, then falls back to UUIDs.
#[derive(Debug, Default)]
pub struct ScriptedIds {
    script: RefCell<VecDeque<KeyId>>,
    issued: RefCell<usize>,
}

impl ScriptedIds {
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<KeyId>,
    {
        Self {
            script: RefCell::new(ids.into_iter().map(Into::into).collect()),
            issued: RefCell::new(0),
        }
    }

    pub fn issued(&self) -> usize {
        *self.issued.borrow()
    }
}

impl IdGenerator for ScriptedIds {
    fn generate(&self) -> KeyId {
        *self.issued.borrow_mut() += 1;
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| UuidIds.generate())
    }
}

/// A datastore over an in-memory store the test keeps a handle to.
pub struct DatastoreFixture {
    pub ds: Datastore,
    pub store: Rc<MemoryStore>,
}

impl Default for DatastoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl DatastoreFixture {
    pub fn new() -> Self {
        let store = Rc::new(MemoryStore::new());
        Self {
            ds: Datastore::new(Rc::clone(&store)),
            store,
        }
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ds = self.ds.with_ids(ids);
        self
    }

    pub fn with_schema(mut self, schema: ModelSchema) -> Self {
        self.ds.register(schema);
        self
    }

    /// Persist one entity of `kind` with the given fields.
    pub fn with_entity<const N: usize>(self, kind: &str, fields: [(&str, Value); N]) -> Self {
        let mut entity = self
            .ds
            .create(kind, EntityOptions::default(), fields)
            .unwrap();
        self.ds.put(&mut entity).unwrap();
        self
    }

    pub fn entity(&self, kind: &str) -> Entity {
        Entity::new(self.ds.schema(kind).unwrap())
    }
}
