//! Query dialects.
//!
//! A dialect is an operator table: it decides which operators a query may
//! use and which compiler each one resolves to. There are three tables —
//! v1 and v2 resource queries, and v2 fact queries. The subquery operators
//! cross-reference the tables (`select-facts` inside a v2 resource query
//! compiles its argument against the fact table, and vice versa), which is
//! the only way to mix datasets in one query.

use std::str::FromStr;

/// The query API version a client is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Version {
    #[strum(serialize = "v1")]
    V1,
    #[strum(serialize = "v2")]
    V2,
}

/// The dataset a query runs against. Selects the base table, the selectable
/// columns, and the join vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub(crate) enum Kind {
    #[strum(serialize = "resources")]
    Resource,
    #[strum(serialize = "facts")]
    Fact,
}

impl Kind {
    /// Columns a subquery may project and an `in-result` may test against.
    /// The resource order is also the finalizer's `SELECT` column order.
    pub fn selectable_columns(&self) -> &'static [&'static str] {
        match self {
            Kind::Resource => &[
                "certname",
                "catalog",
                "resource",
                "type",
                "title",
                "tags",
                "exported",
                "sourcefile",
                "sourceline",
            ],
            Kind::Fact => &["certname", "name", "value"],
        }
    }
}

/// One of the three operator tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub(crate) enum OpTable {
    #[strum(serialize = "v1 resource")]
    ResourceV1,
    #[strum(serialize = "v2 resource")]
    ResourceV2,
    #[strum(serialize = "v2 fact")]
    FactV2,
}

impl OpTable {
    pub fn kind(&self) -> Kind {
        match self {
            OpTable::ResourceV1 | OpTable::ResourceV2 => Kind::Resource,
            OpTable::FactV2 => Kind::Fact,
        }
    }
}

/// Every operator the query language knows, across all dialects. Operator
/// names match case-insensitively; whether a given table accepts one is
/// decided at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum Op {
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = "~")]
    Match,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">=")]
    GreaterEq,
    #[strum(serialize = "<=")]
    LessEq,
    And,
    Or,
    Not,
    Project,
    #[strum(serialize = "in-result")]
    InResult,
    #[strum(serialize = "select-resources")]
    SelectResources,
    #[strum(serialize = "select-facts")]
    SelectFacts,
}

impl Op {
    pub fn parse(name: &str) -> Option<Op> {
        Op::from_str(name).ok()
    }
}
