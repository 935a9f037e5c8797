//! # Entities
//!
//! An [`Entity`] is one instance of a kind: an optional [`Key`] plus the validated values of
//! its properties, keyed by storage name. Its [`ModelSchema`] is shared with every other
//! entity of the kind.
//!
//! ## Field Access
//!
//! Fields are read and written by *code name* through [`Entity::get_field`],
//! [`Entity::set_field`] and [`Entity::delete_field`]. Every assignment is validated
//! immediately. The reserved name `__key__` addresses the entity's own key.
//!
//! Filters and orders address fields by *storage name* through [`Entity::value_of`].
//!
//! ## Expando Kinds
//!
//! When the schema is an expando schema, assigning to an undeclared name that does not
//! start with `_` registers a generic property on this instance only. The property is
//! repeated when the assigned value is a list or tuple, and is recreated on every such
//! assignment. Deleting a dynamic field removes both the property and its value. Deleting
//! a declared field of an expando kind is an internal error.
//!
//! ## Persisting
//!
//! [`Entity::put`] writes the entity through a [`Datastore`]:
//!
//! 1. An absent or incomplete key gets a generated id. Candidates already present in the
//!    store are discarded and a new one is drawn; any other store failure aborts the put.
//! 2. Every property's pre-put hook runs, in storage-name order.
//! 3. A required property without a value fails the put before anything is written.
//! 4. The record, including defaults, is written and the entity takes the stored key.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::datastore::Datastore;
use crate::error::{KindError, Result};
use crate::key::{Key, KeyId};
use crate::property::{FieldAccess, ModelKey, Property, KEY_PROPERTY_NAME};
use crate::schema::ModelSchema;
use crate::value::{Record, Value};

/// Identity options for [`Entity::create`]. `key` excludes `id` and `parent`.
#[derive(Debug, Clone, Default)]
pub struct EntityOptions {
    pub key: Option<Key>,
    pub id: Option<KeyId>,
    pub parent: Option<Key>,
}

impl EntityOptions {
    pub fn key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn id(id: impl Into<KeyId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn parent(parent: Key) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<KeyId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<ModelSchema>,
    key: Option<Key>,
    values: Record,
    dynamic: BTreeMap<String, Property>,
}

impl Entity {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self {
            schema,
            key: None,
            values: Record::new(),
            dynamic: BTreeMap::new(),
        }
    }

    pub fn with_options(schema: Arc<ModelSchema>, options: EntityOptions) -> Result<Self> {
        let mut entity = Self::new(schema);
        let EntityOptions { key, id, parent } = options;
        match (key, parent, id) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(KindError::Construction(
                    "an explicit key does not accept an id or a parent".to_string(),
                ))
            }
            (Some(key), None, None) => {
                ModelKey.set_value(&mut entity, Some(Value::Key(key)))?;
            }
            (None, Some(parent), id) => {
                entity.key = Some(Key::with_parent(&parent, entity.kind(), id)?);
            }
            (None, None, Some(id)) => {
                entity.key = Some(Key::from_pairs(vec![(entity.kind().to_string(), Some(id))])?);
            }
            (None, None, None) => {}
        }
        Ok(entity)
    }

    /// Build an entity and assign `fields` by code name.
    pub fn create<I, S, V>(schema: Arc<ModelSchema>, options: EntityOptions, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = Self::with_options(schema, options)?;
        for (name, value) in fields {
            entity.set_field(name.as_ref(), value)?;
        }
        Ok(entity)
    }

    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn id(&self) -> Option<&KeyId> {
        self.key.as_ref().and_then(Key::id)
    }

    pub(crate) fn replace_key(&mut self, key: Option<Key>) {
        self.key = key;
    }

    pub(crate) fn values(&self) -> &Record {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut Record {
        &mut self.values
    }

    /// A declared or dynamic property, by code name.
    pub fn property(&self, code_name: &str) -> Option<&Property> {
        self.schema
            .property(code_name)
            .or_else(|| self.dynamic.get(code_name))
    }

    /// Declared and dynamic properties in storage-name order.
    pub fn properties(&self) -> Vec<&Property> {
        let mut all: Vec<&Property> = self
            .schema
            .properties()
            .chain(self.dynamic.values())
            .collect();
        all.sort_by(|a, b| a.storage_name().cmp(b.storage_name()));
        all
    }

    pub fn has_field(&self, code_name: &str) -> bool {
        code_name == KEY_PROPERTY_NAME || self.property(code_name).is_some()
    }

    pub fn get_field(&self, code_name: &str) -> Result<Option<Value>> {
        if code_name == KEY_PROPERTY_NAME {
            return Ok(ModelKey.get_value(self));
        }
        match self.property(code_name) {
            Some(property) => Ok(property.get_value(self)),
            None => Err(self.unknown_field(code_name)),
        }
    }

    pub fn set_field(&mut self, code_name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if code_name == KEY_PROPERTY_NAME {
            return ModelKey.set_value(self, Some(value));
        }
        let schema = Arc::clone(&self.schema);
        if let Some(property) = schema.property(code_name) {
            return property.set_value(self, Some(value));
        }
        if !schema.is_expando() || code_name.starts_with('_') {
            return Err(self.unknown_field(code_name));
        }
        if schema.property_by_storage_name(code_name).is_some() {
            return Err(KindError::validation(
                code_name,
                format!("{} is the storage name of a declared property", code_name),
            ));
        }

        let mut property = Property::generic(code_name);
        if value.is_sequence() {
            property = property.repeated();
        }
        property.check()?;
        property.set_value(self, Some(value))?;
        self.dynamic.insert(code_name.to_string(), property);
        Ok(())
    }

    pub fn delete_field(&mut self, code_name: &str) -> Result<()> {
        if code_name == KEY_PROPERTY_NAME {
            ModelKey.delete_value(self);
            return Ok(());
        }
        if let Some(property) = self.dynamic.remove(code_name) {
            property.delete_value(self);
            return Ok(());
        }
        let schema = Arc::clone(&self.schema);
        match schema.property(code_name) {
            Some(_) if schema.is_expando() => Err(KindError::Internal(format!(
                "cannot delete declared property {} of expando kind {}",
                code_name,
                schema.kind()
            ))),
            Some(property) => {
                property.delete_value(self);
                Ok(())
            }
            None => Err(self.unknown_field(code_name)),
        }
    }

    /// The value filters and orders see for a storage name, defaults included.
    pub fn value_of(&self, storage_name: &str) -> Option<Value> {
        if let Some(property) = self.schema.property_by_storage_name(storage_name) {
            return property.get_value(self);
        }
        self.values.get(storage_name).cloned()
    }

    fn unknown_field(&self, code_name: &str) -> KindError {
        KindError::validation(
            code_name,
            format!("kind {} has no property named {}", self.kind(), code_name),
        )
    }

    /// Persist through `ds`, assigning an id first when the key is absent or incomplete.
    pub fn put(&mut self, ds: &Datastore) -> Result<Key> {
        let key = match &self.key {
            Some(key) if key.is_complete() => key.clone(),
            partial => {
                let base = match partial {
                    Some(key) => key.clone(),
                    None => Key::incomplete(self.kind())?,
                };
                loop {
                    let candidate = base.with_id(ds.ids().generate())?;
                    if ds.store().get(&candidate)?.is_none() {
                        break candidate;
                    }
                    debug!(key = %candidate, "generated id already in use, retrying");
                }
            }
        };

        // Hooks stamp a staged copy; `self` only changes once the write has succeeded.
        let mut staged = self.clone();
        let properties: Vec<Property> = staged.properties().into_iter().cloned().collect();
        let mut record = Record::new();
        for property in &properties {
            property.pre_put(&mut staged)?;
            match property.get_value(&staged) {
                Some(value) => {
                    record.insert(property.storage_name().to_string(), value);
                }
                None if property.is_required() => {
                    return Err(KindError::validation(
                        property.storage_name(),
                        "Entity has uninitialized properties",
                    ));
                }
                None => {}
            }
        }

        let stored = ds.store().put(&key, record)?;
        debug!(key = %stored, kind = self.kind(), "put entity");
        staged.key = Some(stored.clone());
        *self = staged;
        Ok(stored)
    }

    fn storage_names(&self) -> BTreeSet<&str> {
        self.schema
            .properties()
            .chain(self.dynamic.values())
            .map(Property::storage_name)
            .collect()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if self.kind() != other.kind() || self.key != other.key {
            return false;
        }
        let names = self.storage_names();
        if names != other.storage_names() {
            return false;
        }
        names
            .into_iter()
            .all(|name| self.value_of(name) == other.value_of(name))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<(&str, Value)> = self
            .properties()
            .into_iter()
            .filter(|p| p.has_value(self))
            .filter_map(|p| p.get_value(self).map(|v| (p.code_name(), v)))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        write!(f, "{}(", self.kind())?;
        let mut first = true;
        if let Some(key) = &self.key {
            write!(f, "key={}", key)?;
            first = false;
        }
        for (name, value) in fields {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        f.write_str(")")
    }
}
