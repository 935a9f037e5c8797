//! Kind schemas and the registry that maps kind names to them.
//!
//! A [`ModelSchema`] is the declared shape of one kind: its properties, indexed both by
//! storage name and by code name, and whether it accepts expando fields. Schemas are built
//! once, validated, and shared behind an `Arc` by every entity of the kind.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{KindError, Result};
use crate::property::{Property, KEY_PROPERTY_NAME};

#[derive(Debug, Clone)]
pub struct ModelSchema {
    kind: String,
    properties: BTreeMap<String, Property>,
    code_names: BTreeMap<String, String>,
    expando: bool,
}

impl ModelSchema {
    pub fn builder(kind: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            kind: kind.into(),
            properties: Vec::new(),
            expando: false,
        }
    }

    /// A schema that also accepts undeclared fields.
    pub fn expando(kind: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            kind: kind.into(),
            properties: Vec::new(),
            expando: true,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_expando(&self) -> bool {
        self.expando
    }

    /// Look up a declared property by code name.
    pub fn property(&self, code_name: &str) -> Option<&Property> {
        self.code_names
            .get(code_name)
            .and_then(|storage| self.properties.get(storage))
    }

    pub fn property_by_storage_name(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Declared properties in storage-name order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

pub struct SchemaBuilder {
    kind: String,
    properties: Vec<Property>,
    expando: bool,
}

impl SchemaBuilder {
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn build(self) -> Result<ModelSchema> {
        check_kind(&self.kind)?;
        let mut properties = BTreeMap::new();
        let mut code_names = BTreeMap::new();
        for property in self.properties {
            property.check()?;
            let storage = property.storage_name().to_string();
            if storage == KEY_PROPERTY_NAME {
                return Err(KindError::Construction(format!(
                    "{} is reserved for the entity key",
                    KEY_PROPERTY_NAME
                )));
            }
            if code_names.contains_key(property.code_name()) {
                return Err(KindError::Construction(format!(
                    "Kind {} declares {} twice",
                    self.kind,
                    property.code_name()
                )));
            }
            if properties.contains_key(&storage) {
                return Err(KindError::Construction(format!(
                    "Kind {} stores two properties under {}",
                    self.kind, storage
                )));
            }
            code_names.insert(property.code_name().to_string(), storage.clone());
            properties.insert(storage, property);
        }
        Ok(ModelSchema {
            kind: self.kind,
            properties,
            code_names,
            expando: self.expando,
        })
    }
}

/// Kind names are stored as UTF-8 and must not be empty or contain control characters.
pub fn check_kind(kind: &str) -> Result<()> {
    if kind.is_empty() {
        return Err(KindError::Construction("Kind must be non-empty".to_string()));
    }
    if kind.chars().any(char::is_control) {
        return Err(KindError::Construction(format!(
            "Kind {:?} contains control characters",
            kind
        )));
    }
    Ok(())
}

/// The set of kinds a datastore knows how to materialize.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, Arc<ModelSchema>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any previous schema for the same kind.
    pub fn register(&mut self, schema: ModelSchema) -> Arc<ModelSchema> {
        let schema = Arc::new(schema);
        let kind = schema.kind().to_string();
        if self.kinds.insert(kind.clone(), schema.clone()).is_some() {
            warn!(kind = %kind, "replacing registered schema");
        } else {
            debug!(kind = %kind, properties = schema.len(), "registered schema");
        }
        schema
    }

    pub fn get(&self, kind: &str) -> Option<Arc<ModelSchema>> {
        self.kinds.get(kind).cloned()
    }

    pub fn require(&self, kind: &str) -> Result<Arc<ModelSchema>> {
        self.get(kind)
            .ok_or_else(|| KindError::UnknownKind(kind.to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
