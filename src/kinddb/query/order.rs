//! Sort orders for query results.
//!
//! Order terms compose lexicographically: the first term decides unless it ties, then the
//! next, and so on. Entities missing the sorted field go last when ascending and first when
//! descending. Incomparable values tie.

use std::cmp::Ordering;

use crate::entity::Entity;
use crate::property::Property;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Property { name: String, direction: Direction },
    Composite(Vec<Order>),
}

impl Order {
    pub fn property(name: impl Into<String>, direction: Direction) -> Self {
        Order::Property {
            name: name.into(),
            direction,
        }
    }

    pub fn asc(name: impl Into<String>) -> Self {
        Self::property(name, Direction::Ascending)
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self::property(name, Direction::Descending)
    }

    /// Append `next` as a lower-priority term, flattening composites.
    pub fn then(self, next: Order) -> Order {
        let mut terms = self.into_terms();
        terms.extend(next.into_terms());
        if terms.len() == 1 {
            return terms.remove(0);
        }
        Order::Composite(terms)
    }

    pub fn reversed(&self) -> Order {
        match self {
            Order::Property { name, direction } => Order::Property {
                name: name.clone(),
                direction: match direction {
                    Direction::Ascending => Direction::Descending,
                    Direction::Descending => Direction::Ascending,
                },
            },
            Order::Composite(terms) => Order::Composite(terms.iter().map(Order::reversed).collect()),
        }
    }

    fn into_terms(self) -> Vec<Order> {
        match self {
            Order::Composite(terms) => terms,
            single => vec![single],
        }
    }

    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        match self {
            Order::Property { name, direction } => {
                let ord = match (a.value_of(name), b.value_of(name)) {
                    (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
            Order::Composite(terms) => terms
                .iter()
                .map(|term| term.compare(a, b))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal),
        }
    }
}

/// A bare property reference orders ascending.
impl From<&Property> for Order {
    fn from(property: &Property) -> Self {
        property.ascending()
    }
}
