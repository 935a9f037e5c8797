//! # Property System
//!
//! A [`Property`] describes one named field of a kind: its value type, whether it is
//! required, repeated or defaulted, an optional closed set of choices and an optional
//! user validator. Schemas own their properties; entities store the validated values.
//!
//! ## Property Kinds
//!
//! | Kind | Accepts | Notes |
//! |------|---------|-------|
//! | `Generic` | anything | used for expando fields |
//! | `Text` | strings | |
//! | `String` | strings | at most 1000 characters |
//! | `Boolean` | booleans | |
//! | `Integer` | integers | |
//! | `Float` | floats, integers | integers are widened |
//! | `DateTime` | timestamps | optional auto-now stamping on persist |
//! | `Key` | complete keys | optionally restricted to one kind |
//!
//! ## Names
//!
//! Each property has a *code name* (the name callers use with `get_field`/`set_field`) and a
//! *storage name* (the key in the stored record and the name filters address). The storage
//! name defaults to the code name.
//!
//! ## Validation Order
//!
//! 1. Type check for the kind ([`Property::validate`])
//! 2. User validator, which may replace the value
//! 3. Choice membership
//!
//! Repeated properties run this per element. Required properties are only checked when an
//! entity is persisted.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{KindError, Result};
use crate::query::node::{Node, Op};
use crate::query::order::{Direction, Order};
use crate::value::Value;

pub const MAX_STRING_LENGTH: usize = 1000;

/// A user check or transform applied after the type check. Returning `Ok(Some(v))` replaces
/// the value with `v`.
pub type Validator = Arc<dyn Fn(&Property, Value) -> Result<Option<Value>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Generic,
    Text,
    String,
    Boolean,
    Integer,
    Float,
    DateTime { auto_now: bool, auto_now_add: bool },
    Key { kind: Option<String> },
}

#[derive(Clone)]
pub struct Property {
    code_name: String,
    name: String,
    kind: PropertyKind,
    required: bool,
    default: Option<Value>,
    repeated: bool,
    choices: Option<Vec<Value>>,
    validator: Option<Validator>,
    verbose_name: Option<String>,
}

impl Property {
    pub fn new(kind: PropertyKind, code_name: impl Into<String>) -> Self {
        let code_name = code_name.into();
        Self {
            name: code_name.clone(),
            code_name,
            kind,
            required: false,
            default: None,
            repeated: false,
            choices: None,
            validator: None,
            verbose_name: None,
        }
    }

    pub fn generic(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::Generic, code_name)
    }

    pub fn text(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::Text, code_name)
    }

    pub fn string(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::String, code_name)
    }

    pub fn boolean(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::Boolean, code_name)
    }

    pub fn integer(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::Integer, code_name)
    }

    pub fn float(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::Float, code_name)
    }

    pub fn datetime(code_name: impl Into<String>) -> Self {
        Self::new(
            PropertyKind::DateTime {
                auto_now: false,
                auto_now_add: false,
            },
            code_name,
        )
    }

    pub fn key(code_name: impl Into<String>) -> Self {
        Self::new(PropertyKind::Key { kind: None }, code_name)
    }

    // --- Declaration options ---

    /// Store the value under `name` instead of the code name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Property, Value) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    /// Stamp the current time on every persist. DateTime properties only.
    pub fn auto_now(mut self) -> Self {
        if let PropertyKind::DateTime { auto_now, .. } = &mut self.kind {
            *auto_now = true;
        }
        self
    }

    /// Stamp the current time on persist when no value is set. DateTime properties only.
    pub fn auto_now_add(mut self) -> Self {
        if let PropertyKind::DateTime { auto_now_add, .. } = &mut self.kind {
            *auto_now_add = true;
        }
        self
    }

    /// Only accept keys of this kind. Key properties only.
    pub fn key_kind(mut self, kind: impl Into<String>) -> Self {
        if let PropertyKind::Key { kind: k } = &mut self.kind {
            *k = Some(kind.into());
        }
        self
    }

    /// Check the declaration itself. Called when a schema is built.
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() || self.code_name.is_empty() {
            return Err(KindError::Construction(
                "Property names must be non-empty".to_string(),
            ));
        }
        if self.name.contains('.') {
            return Err(KindError::Construction(format!(
                "Name {:?} cannot contain period characters",
                self.name
            )));
        }
        let active = [self.repeated, self.required, self.default.is_some()]
            .iter()
            .filter(|flag| **flag)
            .count();
        if active > 1 {
            return Err(KindError::Construction(format!(
                "Property {}: repeated, required and default are mutually exclusive",
                self.name
            )));
        }
        if let PropertyKind::DateTime {
            auto_now,
            auto_now_add,
        } = self.kind
        {
            if self.repeated && (auto_now || auto_now_add) {
                return Err(KindError::Construction(format!(
                    "DateTime property {} cannot combine auto-now stamping with repeated",
                    self.name
                )));
            }
        }
        if let Some(default) = &self.default {
            self.do_validate(default.clone())?;
        }
        Ok(())
    }

    // --- Accessors ---

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    /// The storage name.
    pub fn storage_name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn choice_values(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn verbose(&self) -> Option<&str> {
        self.verbose_name.as_deref()
    }

    // --- Validation ---

    fn invalid(&self, message: impl Into<String>) -> KindError {
        KindError::validation(&self.name, message)
    }

    /// The type check for this property's kind.
    pub fn validate(&self, value: Value) -> Result<Value> {
        // JSON has no NaN or infinity, so such values could never be read back.
        if let Some(f) = first_non_finite(&value) {
            return Err(self.invalid(format!("expects a finite number, got {:?}", f)));
        }
        match (&self.kind, value) {
            (PropertyKind::Generic, v) => Ok(v),
            (PropertyKind::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (PropertyKind::String, Value::Text(s)) => {
                if s.chars().count() > MAX_STRING_LENGTH {
                    return Err(self.invalid(format!(
                        "value must be at most {} characters",
                        MAX_STRING_LENGTH
                    )));
                }
                Ok(Value::Text(s))
            }
            (PropertyKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (PropertyKind::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (PropertyKind::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (PropertyKind::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (PropertyKind::DateTime { .. }, Value::DateTime(dt)) => Ok(Value::DateTime(dt)),
            (PropertyKind::Key { kind }, Value::Key(key)) => {
                if !key.is_complete() {
                    return Err(self.invalid(format!("expects complete key, got {}", key)));
                }
                if let Some(kind) = kind {
                    if key.kind() != kind {
                        return Err(self.invalid(format!(
                            "expects key with kind {}, got {}",
                            kind, key
                        )));
                    }
                }
                Ok(Value::Key(key))
            }
            (kind, other) => Err(self.invalid(format!(
                "expects {}, got {} {}",
                expected_type(kind),
                other.type_name(),
                other
            ))),
        }
    }

    /// Type check, then the user validator, then choice membership.
    pub fn do_validate(&self, value: Value) -> Result<Value> {
        let mut value = self.validate(value)?;
        if let Some(validator) = &self.validator {
            if let Some(replaced) = validator(self, value.clone())? {
                value = replaced;
            }
        }
        if let Some(choices) = &self.choices {
            if !choices.contains(&value) {
                return Err(self.invalid(format!("value {} is not an allowed choice", value)));
            }
        }
        Ok(value)
    }

    // --- Filter and order builders ---

    fn comparison(&self, op: Op, value: Value) -> Result<Node> {
        let value = self.do_validate(value)?;
        Ok(Node::filter(self.name.clone(), op, value))
    }

    pub fn equals(&self, value: impl Into<Value>) -> Result<Node> {
        self.comparison(Op::Eq, value.into())
    }

    pub fn not_equals(&self, value: impl Into<Value>) -> Result<Node> {
        self.comparison(Op::Ne, value.into())
    }

    pub fn less_than(&self, value: impl Into<Value>) -> Result<Node> {
        self.comparison(Op::Lt, value.into())
    }

    pub fn less_equal(&self, value: impl Into<Value>) -> Result<Node> {
        self.comparison(Op::Le, value.into())
    }

    pub fn greater_than(&self, value: impl Into<Value>) -> Result<Node> {
        self.comparison(Op::Gt, value.into())
    }

    pub fn greater_equal(&self, value: impl Into<Value>) -> Result<Node> {
        self.comparison(Op::Ge, value.into())
    }

    pub fn ascending(&self) -> Order {
        Order::property(self.name.clone(), Direction::Ascending)
    }

    pub fn descending(&self) -> Order {
        Order::property(self.name.clone(), Direction::Descending)
    }
}

fn first_non_finite(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) if !f.is_finite() => Some(*f),
        Value::List(items) | Value::Tuple(items) => items.iter().find_map(first_non_finite),
        _ => None,
    }
}

fn expected_type(kind: &PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Generic => "any value",
        PropertyKind::Text | PropertyKind::String => "string",
        PropertyKind::Boolean => "boolean",
        PropertyKind::Integer => "integer",
        PropertyKind::Float => "float",
        PropertyKind::DateTime { .. } => "datetime",
        PropertyKind::Key { .. } => "key",
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("code_name", &self.code_name)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("repeated", &self.repeated)
            .field("choices", &self.choices)
            .field("validator", &self.validator.is_some())
            .field("verbose_name", &self.verbose_name)
            .finish()
    }
}

/// Uniform access to one field of an entity.
///
/// Declared and expando properties read and write the entity's value map; [`ModelKey`]
/// reads and writes the entity's own key instead.
pub trait FieldAccess {
    /// The stored value, or the declared default when unset.
    fn get_value(&self, entity: &Entity) -> Option<Value>;

    /// Validate and store. `None` clears singular fields.
    fn set_value(&self, entity: &mut Entity, value: Option<Value>) -> Result<()>;

    fn delete_value(&self, entity: &mut Entity);

    fn has_value(&self, entity: &Entity) -> bool;

    /// Runs before every persist.
    fn pre_put(&self, _entity: &mut Entity) -> Result<()> {
        Ok(())
    }
}

impl FieldAccess for Property {
    fn get_value(&self, entity: &Entity) -> Option<Value> {
        entity
            .values()
            .get(&self.name)
            .cloned()
            .or_else(|| self.default.clone())
    }

    fn set_value(&self, entity: &mut Entity, value: Option<Value>) -> Result<()> {
        if self.repeated {
            let validated = match value {
                Some(Value::List(items)) => Value::List(self.validate_all(items)?),
                Some(Value::Tuple(items)) => Value::Tuple(self.validate_all(items)?),
                Some(other) => {
                    return Err(self.invalid(format!("expected list or tuple, got {}", other)))
                }
                None => return Err(self.invalid("expected list or tuple, got nothing")),
            };
            entity.values_mut().insert(self.name.clone(), validated);
            return Ok(());
        }
        match value {
            Some(v) => {
                let v = self.do_validate(v)?;
                entity.values_mut().insert(self.name.clone(), v);
            }
            None => {
                entity.values_mut().remove(&self.name);
            }
        }
        Ok(())
    }

    fn delete_value(&self, entity: &mut Entity) {
        entity.values_mut().remove(&self.name);
    }

    fn has_value(&self, entity: &Entity) -> bool {
        entity.values().contains_key(&self.name)
    }

    fn pre_put(&self, entity: &mut Entity) -> Result<()> {
        if let PropertyKind::DateTime {
            auto_now,
            auto_now_add,
        } = self.kind
        {
            if auto_now || (auto_now_add && !self.has_value(entity)) {
                self.set_value(entity, Some(Value::DateTime(Utc::now())))?;
            }
        }
        Ok(())
    }
}

impl Property {
    fn validate_all(&self, items: Vec<Value>) -> Result<Vec<Value>> {
        items.into_iter().map(|v| self.do_validate(v)).collect()
    }
}

/// The pseudo-property backing an entity's identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelKey;

pub const KEY_PROPERTY_NAME: &str = "__key__";

impl FieldAccess for ModelKey {
    fn get_value(&self, entity: &Entity) -> Option<Value> {
        entity.key().cloned().map(Value::Key)
    }

    fn set_value(&self, entity: &mut Entity, value: Option<Value>) -> Result<()> {
        match value {
            None => entity.replace_key(None),
            Some(Value::Key(key)) => {
                if key.kind() != entity.kind() {
                    return Err(KindError::validation(
                        KEY_PROPERTY_NAME,
                        format!(
                            "expected key kind to be {}; received {}",
                            entity.kind(),
                            key.kind()
                        ),
                    ));
                }
                entity.replace_key(Some(key));
            }
            Some(other) => {
                return Err(KindError::validation(
                    KEY_PROPERTY_NAME,
                    format!("expected key, got {}", other.type_name()),
                ))
            }
        }
        Ok(())
    }

    fn delete_value(&self, entity: &mut Entity) {
        entity.replace_key(None);
    }

    fn has_value(&self, entity: &Entity) -> bool {
        entity.key().is_some()
    }
}
