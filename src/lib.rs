//! Compiler from structured queries to parameterized SQL, for a store of
//! configuration-management *resources* (catalog-applied objects keyed by
//! node certificate name) and *facts* (key/value observations per node).
//!
//! Queries are JSON trees in prefix notation. Compiling one has two stages:
//! - [parse] — build a query AST from a JSON string.
//! - [resource_query_to_sql] / [fact_query_to_sql] — compile the AST into a
//!   `SELECT` statement plus its bound parameters, against the operator
//!   table for the requested API [Version].
//!
//! ```
//! use factql::{compile_resource, Version};
//!
//! let query = r#"["and", ["=", "type", "Class"], ["=", "title", "apache"]]"#;
//! let compiled = compile_resource(query, Version::V2)?;
//! assert!(compiled.sql.starts_with("SELECT"));
//! assert_eq!(compiled.params.len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod ast;
mod error;
mod sql;

pub use ast::{Literal, Node};
pub use error::{Error, Reason, Result, WithErrorInfo};
pub use sql::{
    fact_query_to_sql, fact_query_to_sql_with, resource_query_to_sql, resource_query_to_sql_with,
    Database, DbAdapter, Fragment, Hsqldb, JoinTag, Postgres, SqlQuery, Version,
};

/// Parse a JSON document into a query AST.
pub fn parse(json: &str) -> Result<Node> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize a query AST back to JSON.
pub fn to_json(query: &Node) -> Result<String> {
    Ok(serde_json::to_string(query)?)
}

/// Parse and compile a resource query in one step.
pub fn compile_resource(json: &str, version: Version) -> Result<SqlQuery> {
    Ok(resource_query_to_sql(version, &parse(json)?)?)
}

/// Parse and compile a fact query in one step.
pub fn compile_facts(json: &str, version: Version) -> Result<SqlQuery> {
    Ok(fact_query_to_sql(version, &parse(json)?)?)
}
