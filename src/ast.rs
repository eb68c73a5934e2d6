use std::fmt::{self, Display, Formatter};

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

/// One node of a query tree.
///
/// Queries arrive from clients as JSON arrays in prefix notation: the head of
/// a `Terms` list is an operator name, the tail its operands. Leaves are
/// literals. `["and", ["=", "type", "Class"], ["=", "title", "apache"]]`
/// deserializes directly into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
#[serde(untagged)]
pub enum Node {
    Literal(Literal),
    Terms(Vec<Node>),
}

/// A scalar query operand, doubling as a bound SQL parameter.
///
/// Integers and floats are kept apart so that parameters bind with the type
/// the client wrote. Fact values are stored as text and get stringified at
/// the comparison site, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Node {
    /// `false` and `null` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Node::Literal(literal) => literal.is_truthy(),
            Node::Terms(_) => true,
        }
    }
}

impl Literal {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Literal::Null | Literal::Boolean(false))
    }
}

impl Display for Node {
    /// Renders the node as compact JSON, the form clients wrote it in.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
    }
}

impl Display for Literal {
    /// The storage form: strings render bare, without quotes.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::String(s) => f.write_str(s),
        }
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Node::Literal(literal)
    }
}

impl From<Vec<Node>> for Node {
    fn from(terms: Vec<Node>) -> Self {
        Node::Terms(terms)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<f64> for Literal {
    fn from(x: f64) -> Self {
        Literal::Float(x)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Literal(s.into())
    }
}
