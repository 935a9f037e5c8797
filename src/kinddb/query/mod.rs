//! # Queries
//!
//! A [`Query`] is an immutable description of which entities to return: an optional kind,
//! an optional ancestor, an optional filter tree and optional sort orders. Builder methods
//! return new queries and never modify the receiver.
//!
//! ## Execution
//!
//! Execution is a linear scan. For every key the collaborator returns from `keys()`:
//!
//! 1. Skip it if an ancestor is set and the key's parent is not exactly that ancestor.
//! 2. Skip it if a kind is set and the key's kind differs.
//! 3. Resolve the entity and skip it unless the filter tree matches.
//! 4. Yield it, and stop once `limit` entities have been yielded.
//!
//! Results come back in scan order. Each call to [`Query::iter`] or [`Query::fetch`] starts
//! a fresh scan; nothing is cached between calls.
//!
//! ## Orders
//!
//! Order terms are recorded by [`Query::order`] but the scan does not apply them.
//! [`Query::fetch_ordered`] is the one entry point that sorts, and it has to materialize
//! every match before sorting.

pub mod node;
pub mod order;

use std::vec;
use tracing::trace;

use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::error::{KindError, Result};
use crate::key::Key;

pub use node::{FilterNode, Node, Op};
pub use order::{Direction, Order};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    kind: Option<String>,
    ancestor: Option<Key>,
    filters: Option<Node>,
    orders: Option<Order>,
}

impl Query {
    /// A query over one kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// A query over every kind.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict results to direct children of `ancestor`, which must be complete.
    pub fn with_ancestor(&self, ancestor: Key) -> Result<Self> {
        if !ancestor.is_complete() {
            return Err(KindError::Construction(format!(
                "ancestor cannot be an incomplete key: {}",
                ancestor
            )));
        }
        Ok(Self {
            ancestor: Some(ancestor),
            ..self.clone()
        })
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn ancestor(&self) -> Option<&Key> {
        self.ancestor.as_ref()
    }

    pub fn filters(&self) -> Option<&Node> {
        self.filters.as_ref()
    }

    pub fn orders(&self) -> Option<&Order> {
        self.orders.as_ref()
    }

    /// Conjoin `nodes` with the existing filter tree.
    pub fn filter<I>(&self, nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut preds: Vec<Node> = self.filters.iter().cloned().collect();
        let before = preds.len();
        preds.extend(nodes);
        if preds.len() == before {
            return Ok(self.clone());
        }
        Ok(Self {
            filters: Some(Node::and(preds)?),
            ..self.clone()
        })
    }

    /// Append sort terms. A property reference sorts ascending.
    pub fn order<I, O>(&self, terms: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Order>,
    {
        let orders = terms
            .into_iter()
            .map(Into::<Order>::into)
            .fold(self.orders.clone(), |acc, term| match acc {
                Some(existing) => Some(existing.then(term)),
                None => Some(term),
            });
        Self {
            orders,
            ..self.clone()
        }
    }

    /// A fresh scan over `ds`.
    pub fn iter<'a>(&self, ds: &'a Datastore) -> Result<QueryIter<'a>> {
        Ok(QueryIter {
            query: self.clone(),
            ds,
            keys: ds.keys()?.into_iter(),
            remaining: None,
            failed: false,
        })
    }

    /// Matches in scan order, at most `limit` of them.
    pub fn fetch(&self, ds: &Datastore, limit: Option<usize>) -> Result<Vec<Entity>> {
        let mut iter = self.iter(ds)?;
        iter.remaining = limit;
        iter.collect()
    }

    /// Every match sorted by the query's orders, then truncated to `limit`.
    pub fn fetch_ordered(&self, ds: &Datastore, limit: Option<usize>) -> Result<Vec<Entity>> {
        let mut results = self.fetch(ds, None)?;
        if let Some(order) = &self.orders {
            results.sort_by(|a, b| order.compare(a, b));
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    /// The first match in scan order.
    pub fn get(&self, ds: &Datastore) -> Result<Option<Entity>> {
        self.iter(ds)?.next().transpose()
    }

    pub fn count(&self, ds: &Datastore) -> Result<usize> {
        self.iter(ds)?.try_fold(0, |n, entity| entity.map(|_| n + 1))
    }

    fn admits_key(&self, key: &Key) -> bool {
        if let Some(ancestor) = &self.ancestor {
            if key.parent().as_ref() != Some(ancestor) {
                return false;
            }
        }
        match &self.kind {
            Some(kind) => key.kind() == kind,
            None => true,
        }
    }
}

/// Lazy scan produced by [`Query::iter`]. Stops after the first error.
pub struct QueryIter<'a> {
    query: Query,
    ds: &'a Datastore,
    keys: vec::IntoIter<Key>,
    remaining: Option<usize>,
    failed: bool,
}

impl QueryIter<'_> {
    /// Stop after `limit` matches.
    pub fn limit(mut self, limit: usize) -> Self {
        self.remaining = Some(limit);
        self
    }
}

impl Iterator for QueryIter<'_> {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == Some(0) {
            return None;
        }
        for key in self.keys.by_ref() {
            if !self.query.admits_key(&key) {
                continue;
            }
            trace!(key = %key, "query candidate");
            let entity = match self.ds.try_get(&key) {
                Ok(Some(entity)) => entity,
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            if let Some(filters) = &self.query.filters {
                if !filters.matches(&entity) {
                    continue;
                }
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Some(Ok(entity));
        }
        None
    }
}
