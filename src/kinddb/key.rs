//! # Hierarchical Keys
//!
//! A [`Key`] addresses one entity as an ordered path of `(kind, id)` pairs. Every pair but the
//! last names an ancestor, so `Key(Author, 7, Post, "hello")` is the post `"hello"` owned by
//! author `7`.
//!
//! ## Invariants
//!
//! - A key has at least one pair.
//! - Kinds are non-empty strings.
//! - Ids are strings or integers. An empty string or a zero integer counts as "no id".
//! - Only the last pair may lack an id. A key whose last id is missing is *incomplete*;
//!   persisting an entity under an incomplete key assigns an id first.
//!
//! ## External Form
//!
//! [`Key::urlsafe`] produces a token that can sit in a URL path segment (base64 URL-safe
//! alphabet, no padding). [`Key::from_urlsafe`] accepts that token with or without padding
//! and always reproduces an equal key.
//!
//! Keys compare lexicographically over their pairs, with integer ids sorting before names.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::error::{KindError, Result};
use crate::value::Value;

const URLSAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The id half of a key pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyId {
    Int(i64),
    Name(String),
}

impl KeyId {
    /// Empty names and zero integers are not ids.
    fn normalize(self) -> Option<KeyId> {
        match self {
            KeyId::Name(ref s) if s.is_empty() => None,
            KeyId::Int(0) => None,
            id => Some(id),
        }
    }

    fn from_value(value: Value) -> Result<Option<KeyId>> {
        match value {
            Value::Text(s) => Ok(KeyId::Name(s).normalize()),
            Value::Integer(i) => Ok(KeyId::Int(i).normalize()),
            other => Err(KindError::Construction(format!(
                "Key id must be a string or an integer; received {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Int(i) => write!(f, "{}", i),
            KeyId::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        KeyId::Name(s.to_string())
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        KeyId::Name(s)
    }
}

impl From<i64> for KeyId {
    fn from(i: i64) -> Self {
        KeyId::Int(i)
    }
}

impl From<i32> for KeyId {
    fn from(i: i32) -> Self {
        KeyId::Int(i64::from(i))
    }
}

impl From<KeyId> for Value {
    fn from(id: KeyId) -> Self {
        match id {
            KeyId::Int(i) => Value::Integer(i),
            KeyId::Name(s) => Value::Text(s),
        }
    }
}

pub type KeyPair = (String, Option<KeyId>);

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<KeyPair>", into = "Vec<KeyPair>")]
pub struct Key {
    pairs: Vec<KeyPair>,
}

impl Key {
    /// A single-pair key.
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Result<Self> {
        Self::from_pairs(vec![(kind.into(), Some(id.into()))])
    }

    /// A single-pair key without an id.
    pub fn incomplete(kind: impl Into<String>) -> Result<Self> {
        Self::from_pairs(vec![(kind.into(), None)])
    }

    /// Extend `parent` with one more pair.
    pub fn with_parent(parent: &Key, kind: impl Into<String>, id: Option<KeyId>) -> Result<Self> {
        let mut pairs = parent.pairs.clone();
        pairs.push((kind.into(), id));
        Self::from_pairs(pairs)
    }

    pub fn from_pairs<I, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Option<KeyId>)>,
        K: Into<String>,
    {
        let pairs: Vec<KeyPair> = pairs
            .into_iter()
            .map(|(kind, id)| (kind.into(), id.and_then(KeyId::normalize)))
            .collect();
        validate_pairs(&pairs)?;
        Ok(Self { pairs })
    }

    /// Build a key from the interleaved `kind, id, kind, id, ...` form returned by
    /// [`Key::flat`]. `None` stands for an absent id.
    pub fn from_flat(parts: Vec<Option<Value>>) -> Result<Self> {
        if parts.len() % 2 != 0 {
            return Err(KindError::Construction(
                "Key must have an even number of flat arguments".to_string(),
            ));
        }
        let mut pairs = Vec::with_capacity(parts.len() / 2);
        let mut iter = parts.into_iter();
        while let (Some(kind), Some(id)) = (iter.next(), iter.next()) {
            let kind = match kind {
                Some(Value::Text(s)) => s,
                Some(other) => {
                    return Err(KindError::Construction(format!(
                        "Key kind must be a string; received {}",
                        other.type_name()
                    )))
                }
                None => {
                    return Err(KindError::Construction(
                        "Key kind must be a string; received nothing".to_string(),
                    ))
                }
            };
            let id = match id {
                Some(value) => KeyId::from_value(value)?,
                None => None,
            };
            pairs.push((kind, id));
        }
        Self::from_pairs(pairs)
    }

    pub fn from_urlsafe(token: &str) -> Result<Self> {
        let bytes = URLSAFE
            .decode(token.trim())
            .map_err(|e| KindError::Encoding(format!("invalid urlsafe key {:?}: {}", token, e)))?;
        let pairs: Vec<KeyPair> = serde_json::from_slice(&bytes)?;
        Self::from_pairs(pairs)
    }

    pub fn urlsafe(&self) -> String {
        let pairs: serde_json::Value = self
            .pairs
            .iter()
            .map(|(kind, id)| {
                let id = match id {
                    Some(KeyId::Int(i)) => serde_json::Value::from(*i),
                    Some(KeyId::Name(name)) => serde_json::Value::from(name.as_str()),
                    None => serde_json::Value::Null,
                };
                serde_json::Value::Array(vec![kind.as_str().into(), id])
            })
            .collect();
        URLSAFE.encode(pairs.to_string())
    }

    pub fn pairs(&self) -> &[KeyPair] {
        &self.pairs
    }

    /// Interleaved kinds and ids. Always twice as long as [`Key::pairs`].
    pub fn flat(&self) -> Vec<Option<Value>> {
        self.pairs
            .iter()
            .flat_map(|(kind, id)| [Some(Value::Text(kind.clone())), id.clone().map(Value::from)])
            .collect()
    }

    pub fn parent(&self) -> Option<Key> {
        if self.pairs.len() <= 1 {
            return None;
        }
        Some(Key {
            pairs: self.pairs[..self.pairs.len() - 1].to_vec(),
        })
    }

    pub fn kind(&self) -> &str {
        &self.last().0
    }

    pub fn id(&self) -> Option<&KeyId> {
        self.last().1.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.id().is_some()
    }

    /// True when `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        self.pairs.len() < other.pairs.len() && other.pairs.starts_with(&self.pairs)
    }

    /// Same path, with the last id replaced.
    pub fn with_id(&self, id: KeyId) -> Result<Key> {
        let mut pairs = self.pairs.clone();
        if let Some(last) = pairs.last_mut() {
            last.1 = Some(id);
        }
        Self::from_pairs(pairs)
    }

    /// Resolve this key to a typed entity.
    pub fn get(&self, ds: &Datastore) -> Result<Entity> {
        ds.get(self)
    }

    fn last(&self) -> &KeyPair {
        // Construction guarantees at least one pair.
        &self.pairs[self.pairs.len() - 1]
    }
}

fn validate_pairs(pairs: &[KeyPair]) -> Result<()> {
    if pairs.is_empty() {
        return Err(KindError::Construction(
            "Key must have at least one kind/id pair".to_string(),
        ));
    }
    for (i, (kind, id)) in pairs.iter().enumerate() {
        if kind.is_empty() {
            return Err(KindError::Construction(
                "Key kind must be a non-empty string".to_string(),
            ));
        }
        if id.is_none() && i + 1 < pairs.len() {
            return Err(KindError::Construction(format!(
                "Incomplete key entry for kind '{}' must be last",
                kind
            )));
        }
    }
    Ok(())
}

impl TryFrom<Vec<KeyPair>> for Key {
    type Error = KindError;

    fn try_from(pairs: Vec<KeyPair>) -> Result<Self> {
        Key::from_pairs(pairs)
    }
}

impl From<Key> for Vec<KeyPair> {
    fn from(key: Key) -> Self {
        key.pairs
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(")?;
        for (i, (kind, id)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match id {
                Some(id) => write!(f, "{}, {}", kind, id)?,
                None => write!(f, "{}, None", kind)?,
            }
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flat(parts: &[Option<Value>]) -> Result<Key> {
        Key::from_flat(parts.to_vec())
    }

    #[test]
    fn kind_and_id_come_from_last_pair() {
        let k = Key::new("ABC", "def").unwrap();
        assert_eq!(k.kind(), "ABC");
        assert_eq!(k.id(), Some(&KeyId::from("def")));
    }

    #[test]
    fn odd_flat_arguments_fail() {
        let err = flat(&[Some("A".into()), Some(1.into()), Some("B".into())]).unwrap_err();
        assert!(matches!(err, KindError::Construction(_)));
    }

    #[test]
    fn non_terminal_absent_id_fails() {
        let err = flat(&[Some("A".into()), None, Some("B".into()), Some(1.into())]).unwrap_err();
        assert!(matches!(err, KindError::Construction(_)));
    }

    #[test]
    fn disallowed_id_type_fails() {
        let err = flat(&[Some("A".into()), Some(Value::Float(1.5))]).unwrap_err();
        assert!(matches!(err, KindError::Construction(_)));
    }

    #[test]
    fn non_string_kind_fails() {
        let err = flat(&[Some(Value::Integer(3)), Some(1.into())]).unwrap_err();
        assert!(matches!(err, KindError::Construction(_)));
        assert!(Key::new("", 1).is_err());
    }

    #[test]
    fn empty_and_zero_ids_are_absent() {
        assert!(!Key::new("A", "").unwrap().is_complete());
        assert!(!Key::new("A", 0).unwrap().is_complete());
    }

    #[test]
    fn parent_of_single_pair_is_none() {
        assert!(Key::new("A", 1).unwrap().parent().is_none());
    }

    #[test]
    fn parent_drops_last_pair() {
        let parent = Key::new("A", 1).unwrap();
        let child = Key::with_parent(&parent, "B", Some("x".into())).unwrap();
        assert_eq!(child.parent(), Some(parent.clone()));
        assert!(parent.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&parent));
        assert!(!parent.is_ancestor_of(&parent));
    }

    #[test]
    fn with_parent_rejects_incomplete_parent() {
        let parent = Key::incomplete("A").unwrap();
        assert!(Key::with_parent(&parent, "B", Some(1.into())).is_err());
    }

    #[test]
    fn urlsafe_has_no_reserved_characters() {
        let k = Key::from_pairs(vec![("Some/Kind+", Some(KeyId::from("??>>id"))), ("B", None)])
            .unwrap();
        let token = k.urlsafe();
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
        assert_eq!(Key::from_urlsafe(&token).unwrap(), k);
    }

    #[test]
    fn urlsafe_accepts_padding() {
        let k = Key::new("Pad", "x").unwrap();
        let mut token = k.urlsafe();
        while token.len() % 4 != 0 {
            token.push('=');
        }
        assert_eq!(Key::from_urlsafe(&token).unwrap(), k);
    }

    #[test]
    fn urlsafe_rejects_garbage() {
        assert!(matches!(
            Key::from_urlsafe("!!!"),
            Err(KindError::Encoding(_))
        ));
        // Valid base64 of a JSON document that is not a pair list.
        let token = URLSAFE.encode(b"{}");
        assert!(Key::from_urlsafe(&token).is_err());
    }

    #[test]
    fn ordering_is_lexicographic_over_pairs() {
        let a1 = Key::new("A", 1).unwrap();
        let a2 = Key::new("A", 2).unwrap();
        let a_name = Key::new("A", "a").unwrap();
        let b1 = Key::new("B", 1).unwrap();
        let a1_child = Key::with_parent(&a1, "C", Some(1.into())).unwrap();
        assert!(a1 < a2);
        assert!(a2 < a_name);
        assert!(a_name < b1);
        assert!(a1 < a1_child);
    }

    #[test]
    fn display_shows_flat_form() {
        let parent = Key::new("A", 1).unwrap();
        let child = Key::with_parent(&parent, "B", None).unwrap();
        assert_eq!(child.to_string(), "Key(A, 1, B, None)");
    }

    fn arb_id() -> impl Strategy<Value = KeyId> {
        prop_oneof![
            (1i64..i64::MAX).prop_map(KeyId::Int),
            "[a-zA-Z0-9 _./+-]{1,12}".prop_map(KeyId::Name),
        ]
    }

    fn arb_key() -> impl Strategy<Value = Key> {
        (
            prop::collection::vec(("[A-Za-z]{1,8}", arb_id()), 1..5),
            any::<bool>(),
        )
            .prop_map(|(pairs, incomplete_tail)| {
                let mut pairs: Vec<KeyPair> =
                    pairs.into_iter().map(|(k, id)| (k, Some(id))).collect();
                if incomplete_tail {
                    if let Some(last) = pairs.last_mut() {
                        last.1 = None;
                    }
                }
                Key::from_pairs(pairs).unwrap()
            })
    }

    proptest! {
        #[test]
        fn urlsafe_round_trips(k in arb_key()) {
            prop_assert_eq!(Key::from_urlsafe(&k.urlsafe()).unwrap(), k);
        }

        #[test]
        fn flat_is_twice_pair_count(k in arb_key()) {
            prop_assert_eq!(k.flat().len(), 2 * k.pairs().len());
            prop_assert_eq!(Key::from_flat(k.flat()).unwrap(), k);
        }

        #[test]
        fn parent_flat_is_prefix(k in arb_key()) {
            if let Some(parent) = k.parent() {
                let flat = k.flat();
                prop_assert_eq!(parent.flat(), flat[..flat.len() - 2].to_vec());
            } else {
                prop_assert_eq!(k.pairs().len(), 1);
            }
        }
    }
}
