//! Compilation of query trees into parameterized SQL.
//!
//! Operators compile to [Fragment]s — partial `WHERE` expressions carrying
//! the extra join tables and bound parameters they need — which the boolean
//! operators combine and a per-dataset finalizer wraps into a complete
//! `SELECT`. The `select-*` operators are the exception: they produce a
//! finalized [SqlQuery] that only `project` may consume, which is what makes
//! a cross-dataset semi-join (`in-result` over `project` over `select-*`)
//! well-formed by construction.
//!
//! Everything user-controlled travels in the parameter vector; the only
//! strings interpolated into SQL are column names drawn from enumerated
//! whitelists.

mod compile;
mod db;
mod dialect;
mod fragment;

pub use db::{Database, DbAdapter, Hsqldb, Postgres};
pub use dialect::Version;
pub use fragment::{Fragment, JoinTag, SqlQuery};

use crate::ast::Node;
use crate::error::{Error, Reason, WithErrorInfo};
use compile::Context;
use dialect::OpTable;

/// Compile a resource query against the default (PostgreSQL) database.
pub fn resource_query_to_sql(version: Version, query: &Node) -> Result<SqlQuery, Error> {
    resource_query_to_sql_with(&Postgres, version, query)
}

pub fn resource_query_to_sql_with(
    db: &dyn DbAdapter,
    version: Version,
    query: &Node,
) -> Result<SqlQuery, Error> {
    let table = match version {
        Version::V1 => OpTable::ResourceV1,
        Version::V2 => OpTable::ResourceV2,
    };
    compile::finalize_query(&Context { db }, table, query)
}

/// Compile a fact query against the default (PostgreSQL) database.
pub fn fact_query_to_sql(version: Version, query: &Node) -> Result<SqlQuery, Error> {
    fact_query_to_sql_with(&Postgres, version, query)
}

pub fn fact_query_to_sql_with(
    db: &dyn DbAdapter,
    version: Version,
    query: &Node,
) -> Result<SqlQuery, Error> {
    match version {
        Version::V1 => Err(Error::new(Reason::UnsupportedInDialect {
            op: "facts".to_string(),
            dialect: version.to_string(),
        }))
        .with_help("fact queries were introduced in the v2 API"),
        Version::V2 => compile::finalize_query(&Context { db }, OpTable::FactV2, query),
    }
}
