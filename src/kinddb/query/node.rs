//! Filter expression trees.
//!
//! A [`Node`] is a boolean predicate over entities. Trees are normalized when they are
//! built, never when they are evaluated:
//!
//! - `a != v` becomes `Or(a < v, a > v)`
//! - an `Or` never directly contains another `Or`
//! - an `And` never directly contains an `Or`; the distributive law lifts the disjunction
//!   to the top, producing a disjunction of conjunctions
//! - `And`/`Or` of a single node is that node
//!
//! Clause order is deterministic. Inputs are visited left to right, and each disjunctive
//! input expands the current clause set by cartesian product with its children in order,
//! so `And(x, Or(a, b))` is `Or(And(x, a), And(x, b))`.

use std::cmp::Ordering;
use std::fmt;

use crate::entity::Entity;
use crate::error::{KindError, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// Incomparable operands never satisfy any operator.
    fn holds(self, left: &Value, right: &Value) -> bool {
        let Some(ord) = left.compare(right) else {
            return false;
        };
        match self {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single comparison of a stored field against a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    name: String,
    op: Op,
    value: Value,
}

impl FilterNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn eval(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
        match lookup(&self.name) {
            Some(stored) => stored
                .elements()
                .iter()
                .any(|element| self.op.holds(element, &self.value)),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Filter(FilterNode),
    And(Vec<Node>),
    Or(Vec<Node>),
    False,
}

impl Node {
    /// A comparison node. `Op::Ne` is desugared into a disjunction of `<` and `>`.
    pub fn filter(name: impl Into<String>, op: Op, value: impl Into<Value>) -> Node {
        let name = name.into();
        let value = value.into();
        if op == Op::Ne {
            return Node::Or(vec![
                Node::Filter(FilterNode {
                    name: name.clone(),
                    op: Op::Lt,
                    value: value.clone(),
                }),
                Node::Filter(FilterNode {
                    name,
                    op: Op::Gt,
                    value,
                }),
            ]);
        }
        Node::Filter(FilterNode { name, op, value })
    }

    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Node {
        Node::filter(name, Op::Eq, value)
    }

    pub fn not_equals(name: impl Into<String>, value: impl Into<Value>) -> Node {
        Node::filter(name, Op::Ne, value)
    }

    pub fn less_than(name: impl Into<String>, value: impl Into<Value>) -> Node {
        Node::filter(name, Op::Lt, value)
    }

    pub fn less_equal(name: impl Into<String>, value: impl Into<Value>) -> Node {
        Node::filter(name, Op::Le, value)
    }

    pub fn greater_than(name: impl Into<String>, value: impl Into<Value>) -> Node {
        Node::filter(name, Op::Gt, value)
    }

    pub fn greater_equal(name: impl Into<String>, value: impl Into<Value>) -> Node {
        Node::filter(name, Op::Ge, value)
    }

    /// Conjunction with the distributive law applied.
    pub fn and<I>(nodes: I) -> Result<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        match nodes.len() {
            0 => {
                return Err(KindError::Construction(
                    "a conjunction requires at least one node".to_string(),
                ))
            }
            1 => return nodes.remove(0).normalized(),
            _ => {}
        }

        let mut clauses: Vec<Vec<Node>> = vec![Vec::new()];
        for node in nodes {
            match node.normalized()? {
                Node::Or(disjuncts) => {
                    let mut expanded = Vec::with_capacity(clauses.len() * disjuncts.len());
                    for clause in &clauses {
                        for disjunct in &disjuncts {
                            let mut next = clause.clone();
                            next.push(disjunct.clone());
                            expanded.push(next);
                        }
                    }
                    clauses = expanded;
                }
                Node::And(conjuncts) => {
                    for clause in clauses.iter_mut() {
                        clause.extend(conjuncts.iter().cloned());
                    }
                }
                other => {
                    for clause in clauses.iter_mut() {
                        clause.push(other.clone());
                    }
                }
            }
        }

        if clauses.is_empty() {
            return Ok(Node::False);
        }
        if clauses.len() > 1 {
            let conjunctions = clauses
                .into_iter()
                .map(Node::and)
                .collect::<Result<Vec<_>>>()?;
            return Node::or(conjunctions);
        }
        let mut clause = clauses.remove(0);
        if clause.len() == 1 {
            return Ok(clause.remove(0));
        }
        Ok(Node::And(clause))
    }

    /// Disjunction with nested disjunctions flattened.
    pub fn or<I>(nodes: I) -> Result<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        match nodes.len() {
            0 => {
                return Err(KindError::Construction(
                    "a disjunction requires at least one node".to_string(),
                ))
            }
            1 => return nodes.remove(0).normalized(),
            _ => {}
        }
        let mut flat = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node.normalized()? {
                Node::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Ok(Node::Or(flat))
    }

    /// Re-run the builders over a node that may have been assembled by hand.
    fn normalized(self) -> Result<Node> {
        match self {
            Node::And(children) => Node::and(children),
            Node::Or(children) => Node::or(children),
            other => Ok(other),
        }
    }

    /// Nodes have equality but no order.
    pub fn try_cmp(&self, _other: &Node) -> Result<Ordering> {
        Err(KindError::Ordering)
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.eval(&|name| entity.value_of(name))
    }

    fn eval(&self, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
        match self {
            Node::Filter(filter) => filter.eval(lookup),
            Node::And(nodes) => nodes.iter().all(|n| n.eval(lookup)),
            Node::Or(nodes) => nodes.iter().any(|n| n.eval(lookup)),
            Node::False => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Filter(filter) => write!(f, "{} {} {}", filter.name, filter.op, filter.value),
            Node::And(nodes) => write_group(f, "AND", nodes),
            Node::Or(nodes) => write_group(f, "OR", nodes),
            Node::False => f.write_str("FALSE"),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, label: &str, nodes: &[Node]) -> fmt::Result {
    write!(f, "{}(", label)?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", node)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn eval(node: &Node, record: &Record) -> bool {
        node.eval(&|name| record.get(name).cloned())
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn not_equals_desugars() {
        assert_eq!(
            Node::not_equals("a", 5),
            Node::Or(vec![Node::less_than("a", 5), Node::greater_than("a", 5)])
        );
    }

    #[test]
    fn empty_groups_fail() {
        assert!(matches!(
            Node::and(Vec::new()),
            Err(KindError::Construction(_))
        ));
        assert!(Node::or(Vec::new()).is_err());
    }

    #[test]
    fn single_node_groups_degenerate() {
        let x = Node::equals("a", 1);
        assert_eq!(Node::and([x.clone()]).unwrap(), x);
        assert_eq!(Node::or([x.clone()]).unwrap(), x);
    }

    #[test]
    fn conjunction_distributes_over_disjunction() {
        let x = Node::equals("x", 1);
        let a = Node::equals("a", 1);
        let b = Node::equals("b", 1);
        let or = Node::or([a.clone(), b.clone()]).unwrap();
        let node = Node::and([x.clone(), or]).unwrap();
        assert_eq!(
            node,
            Node::Or(vec![
                Node::And(vec![x.clone(), a]),
                Node::And(vec![x, b]),
            ])
        );
    }

    #[test]
    fn two_disjunctions_expand_in_order() {
        let (x, y, a, b, z) = (
            Node::equals("x", 1),
            Node::equals("y", 1),
            Node::equals("a", 1),
            Node::equals("b", 1),
            Node::equals("z", 1),
        );
        let left = Node::or([x.clone(), y.clone()]).unwrap();
        let right = Node::or([a.clone(), b.clone()]).unwrap();
        let node = Node::and([left, right, z.clone()]).unwrap();
        assert_eq!(
            node,
            Node::Or(vec![
                Node::And(vec![x.clone(), a.clone(), z.clone()]),
                Node::And(vec![x, b.clone(), z.clone()]),
                Node::And(vec![y.clone(), a, z.clone()]),
                Node::And(vec![y, b, z]),
            ])
        );
    }

    #[test]
    fn nested_conjunctions_are_flattened() {
        let (a, b, c) = (
            Node::equals("a", 1),
            Node::equals("b", 1),
            Node::equals("c", 1),
        );
        let inner = Node::and([a.clone(), b.clone()]).unwrap();
        assert_eq!(
            Node::and([inner, c.clone()]).unwrap(),
            Node::And(vec![a, b, c])
        );
    }

    #[test]
    fn nested_disjunctions_are_flattened() {
        let (a, b, c) = (
            Node::equals("a", 1),
            Node::equals("b", 1),
            Node::equals("c", 1),
        );
        let inner = Node::or([a.clone(), b.clone()]).unwrap();
        assert_eq!(
            Node::or([inner, c.clone()]).unwrap(),
            Node::Or(vec![a, b, c])
        );
    }

    #[test]
    fn hand_built_groups_are_normalized() {
        let (x, a, b, z) = (
            Node::equals("x", 1),
            Node::equals("a", 1),
            Node::equals("b", 1),
            Node::equals("z", 1),
        );
        let raw = Node::And(vec![x.clone(), Node::Or(vec![a.clone(), b.clone()])]);

        assert_eq!(
            Node::and([raw.clone()]).unwrap(),
            Node::Or(vec![
                Node::And(vec![x.clone(), a.clone()]),
                Node::And(vec![x.clone(), b.clone()]),
            ])
        );
        assert_eq!(
            Node::and([raw.clone(), z.clone()]).unwrap(),
            Node::Or(vec![
                Node::And(vec![x.clone(), a, z.clone()]),
                Node::And(vec![x, b, z.clone()]),
            ])
        );
        assert!(matches!(
            Node::or([raw, z]).unwrap(),
            Node::Or(clauses) if clauses.len() == 3
        ));
    }

    #[test]
    fn ordering_nodes_fails() {
        let a = Node::equals("a", 1);
        assert!(matches!(a.try_cmp(&Node::False), Err(KindError::Ordering)));
    }

    #[test]
    fn filter_matches_any_element() {
        let r = record(&[("tags", Value::list(["x", "y"]))]);
        assert!(eval(&Node::equals("tags", "y"), &r));
        assert!(!eval(&Node::equals("tags", "z"), &r));
        assert!(eval(&Node::greater_than("tags", "x"), &r));
    }

    #[test]
    fn absent_and_incomparable_fields_never_match() {
        let r = record(&[("a", Value::from("1"))]);
        assert!(!eval(&Node::equals("missing", 1), &r));
        assert!(!eval(&Node::less_than("a", 5), &r));
        assert!(!eval(&Node::not_equals("a", 5), &r));
    }

    #[test]
    fn not_equals_matches_like_lt_or_gt() {
        for stored in 0..5 {
            let r = record(&[("n", Value::Integer(stored))]);
            let ne = Node::not_equals("n", 2);
            let either = Node::or([Node::less_than("n", 2), Node::greater_than("n", 2)]).unwrap();
            assert_eq!(eval(&ne, &r), eval(&either, &r));
            assert_eq!(eval(&ne, &r), stored != 2);
        }
    }

    #[test]
    fn false_never_matches() {
        assert!(!eval(&Node::False, &Record::new()));
    }

    #[test]
    fn inclusive_operators() {
        let r = record(&[("n", Value::Integer(3))]);
        assert!(eval(&Node::less_equal("n", 3), &r));
        assert!(eval(&Node::greater_equal("n", 3.0), &r));
        assert!(!eval(&Node::less_equal("n", 2), &r));
    }

    #[test]
    fn display_is_readable() {
        let node = Node::and([Node::equals("a", "x"), Node::greater_than("n", 1)]).unwrap();
        assert_eq!(node.to_string(), "AND(a = \"x\", n > 1)");
    }
}
