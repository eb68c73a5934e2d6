pub use anyhow::Result;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// A compilation failure.
///
/// Every failure the compiler can produce is a [Reason] plus an optional help
/// text. Nothing is recoverable inside the compiler; errors propagate to the
/// caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub reason: Reason,
    pub help: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    /// A term where an operator application was expected, an empty term, or a
    /// combinator with no operands.
    MalformedQuery(String),
    /// The operator is not part of the query language. Carries the full
    /// offending term so the caller can see both.
    UnknownOperator { op: String, term: String },
    /// The operator exists in the language but the active dialect forbids it.
    UnsupportedInDialect { op: String, dialect: String },
    /// Wrong number of operands to a fixed-arity operator.
    Arity {
        op: String,
        expected: usize,
        found: usize,
    },
    /// The path does not name a queryable field for this dataset and
    /// operator. `queryable` is kept alphabetically sorted.
    UnqueryableField {
        field: String,
        dataset: String,
        queryable: Vec<String>,
    },
    /// `project` given a non-select child, or `in-result` given a
    /// non-`project` child.
    BadSubquery(String),
    /// A value with the wrong type, e.g. a non-numeric operand to a fact
    /// inequality.
    TypeMismatch(String),
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error { reason, help: None }
    }

    pub fn with_help<S: Into<String>>(mut self, help: S) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl Reason {
    pub fn message(&self) -> String {
        match self {
            Reason::MalformedQuery(text) => text.clone(),
            Reason::UnknownOperator { op, term } => {
                format!("unknown operator '{op}' in term {term}")
            }
            Reason::UnsupportedInDialect { op, dialect } => {
                format!("'{op}' is not supported in {dialect} queries")
            }
            Reason::Arity {
                op,
                expected,
                found,
            } => format!("'{op}' expects {expected} operands, but found {found}"),
            Reason::UnqueryableField {
                field,
                dataset,
                queryable,
            } => format!(
                "'{field}' is not a queryable object for {dataset}; acceptable fields are {}",
                queryable.join(", ")
            ),
            Reason::BadSubquery(text) => text.clone(),
            Reason::TypeMismatch(text) => text.clone(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason.message())?;
        if let Some(help) = &self.help {
            write!(f, "\nhelp: {help}")?;
        }
        Ok(())
    }
}

// Needed for anyhow
impl StdError for Error {}

pub trait WithErrorInfo {
    fn with_help<S: Into<String>>(self, help: S) -> Self;
}

impl<T> WithErrorInfo for Result<T, Error> {
    fn with_help<S: Into<String>>(self, help: S) -> Self {
        self.map_err(|e| e.with_help(help))
    }
}
