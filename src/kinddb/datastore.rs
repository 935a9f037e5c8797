//! The explicit context every entity and query operation runs against.
//!
//! A [`Datastore`] bundles the kind registry, the key-value collaborator and the id
//! generator. Build one at startup and pass it by reference; nothing in the crate keeps a
//! global default.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::{BackendKind, StoreConfig};
use crate::entity::{Entity, EntityOptions};
use crate::error::{KindError, Result};
use crate::ids::{IdGenerator, UuidIds};
use crate::key::{Key, KeyId};
use crate::property::FieldAccess;
use crate::query::Query;
use crate::schema::{KindRegistry, ModelSchema};
use crate::store::{FileStore, KeyValueStore, MemoryStore};
use crate::value::Value;

pub struct Datastore {
    registry: KindRegistry,
    store: Box<dyn KeyValueStore>,
    ids: Box<dyn IdGenerator>,
}

impl Datastore {
    /// A datastore over `store` generating UUID string ids.
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            registry: KindRegistry::new(),
            store: Box::new(store),
            ids: Box::new(UuidIds),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Build the collaborator and id strategy named by `config`. Relative data paths are
    /// resolved against `base_dir`.
    pub fn from_config(config: &StoreConfig, base_dir: &Path) -> Result<Self> {
        let store: Box<dyn KeyValueStore> = match config.backend {
            BackendKind::Memory => Box::new(MemoryStore::new()),
            BackendKind::File => Box::new(FileStore::open(config.data_path(base_dir))?),
        };
        debug!(backend = ?config.backend, ids = ?config.ids, "opened datastore");
        Ok(Self {
            registry: KindRegistry::new(),
            store,
            ids: config.ids.generator(),
        })
    }

    pub fn register(&mut self, schema: ModelSchema) -> Arc<ModelSchema> {
        self.registry.register(schema)
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn schema(&self, kind: &str) -> Result<Arc<ModelSchema>> {
        self.registry.require(kind)
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    /// A new, unsaved entity of a registered kind.
    pub fn create<I, S, V>(&self, kind: &str, options: EntityOptions, fields: I) -> Result<Entity>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        Entity::create(self.schema(kind)?, options, fields)
    }

    /// Reconstruct the entity stored under `key`.
    pub fn get(&self, key: &Key) -> Result<Entity> {
        self.try_get(key)?
            .ok_or_else(|| KindError::NotFound(key.clone()))
    }

    pub fn try_get(&self, key: &Key) -> Result<Option<Entity>> {
        let Some(record) = self.store.get(key)? else {
            return Ok(None);
        };
        let schema = self.schema(key.kind())?;
        let mut entity = Entity::with_options(Arc::clone(&schema), EntityOptions::key(key.clone()))?;
        for (name, value) in record {
            match schema.property_by_storage_name(&name) {
                Some(property) => property.set_value(&mut entity, Some(value))?,
                None if schema.is_expando() => entity.set_field(&name, value)?,
                None => {
                    return Err(KindError::validation(
                        name,
                        format!("stored field is not declared on kind {}", schema.kind()),
                    ))
                }
            }
        }
        Ok(Some(entity))
    }

    pub fn get_by_id(&self, kind: &str, id: impl Into<KeyId>, parent: Option<&Key>) -> Result<Entity> {
        let key = child_key(kind, id.into(), parent)?;
        self.get(&key)
    }

    /// The stored entity named `name`, or a fresh unsaved one with that key.
    pub fn get_or_insert(&self, kind: &str, name: &str, parent: Option<&Key>) -> Result<Entity> {
        let key = child_key(kind, KeyId::from(name), parent)?;
        match self.try_get(&key)? {
            Some(entity) => Ok(entity),
            None => Entity::with_options(self.schema(kind)?, EntityOptions::key(key)),
        }
    }

    pub fn put(&self, entity: &mut Entity) -> Result<Key> {
        entity.put(self)
    }

    pub fn keys(&self) -> Result<Vec<Key>> {
        self.store.keys()
    }

    pub fn query(&self, kind: &str) -> Query {
        Query::new(kind)
    }
}

fn child_key(kind: &str, id: KeyId, parent: Option<&Key>) -> Result<Key> {
    match parent {
        Some(parent) => Key::with_parent(parent, kind, Some(id)),
        None => Key::from_pairs(vec![(kind, Some(id))]),
    }
}
