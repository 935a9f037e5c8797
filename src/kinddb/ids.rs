//! Id generation for entities persisted with incomplete keys.
//!
//! Generators only propose candidates. Uniqueness is enforced by the caller, which probes
//! the store and asks again when the candidate is already taken.

use std::rc::Rc;
use uuid::Uuid;

use crate::key::KeyId;

pub trait IdGenerator {
    /// A fresh candidate id. Must never be an empty name or zero.
    fn generate(&self) -> KeyId;
}

impl<T: IdGenerator + ?Sized> IdGenerator for Rc<T> {
    fn generate(&self) -> KeyId {
        (**self).generate()
    }
}

/// String ids from random v4 UUIDs, in simple (unhyphenated) form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn generate(&self) -> KeyId {
        KeyId::Name(Uuid::new_v4().simple().to_string())
    }
}

/// Positive integer ids folded from a random UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedIds;

impl IdGenerator for HashedIds {
    fn generate(&self) -> KeyId {
        let bits = Uuid::new_v4().as_u128();
        let folded = ((bits >> 64) as u64) ^ (bits as u64);
        // top bit cleared keeps it positive
        let id = (folded >> 1) as i64;
        KeyId::Int(id.max(1))
    }
}
