use enum_as_inner::EnumAsInner;

use crate::ast::Literal;

/// A partial `WHERE` expression with everything it needs to be spliced into a
/// full statement: the extra tables it joins against and the values bound to
/// its `?` placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub where_clause: String,
    pub joins: Vec<JoinTag>,
    pub params: Vec<Literal>,
}

/// Symbolic name of an extra table a fragment needs in the final `FROM`
/// clause. Resolved to SQL per dataset kind by the finalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTag {
    Certnames,
}

impl Fragment {
    pub(crate) fn expr(where_clause: impl Into<String>) -> Self {
        Fragment {
            where_clause: where_clause.into(),
            joins: Vec::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn with_param(mut self, param: Literal) -> Self {
        self.params.push(param);
        self
    }

    pub(crate) fn with_join(mut self, tag: JoinTag) -> Self {
        merge_joins(&mut self.joins, [tag]);
        self
    }
}

/// Appends `extra` to `joins`, keeping first-appearance order and dropping
/// duplicates.
pub(crate) fn merge_joins(joins: &mut Vec<JoinTag>, extra: impl IntoIterator<Item = JoinTag>) {
    for tag in extra {
        if !joins.contains(&tag) {
            joins.push(tag);
        }
    }
}

/// A finalized `SELECT` statement and its bound parameters.
///
/// Deliberately a different type from [Fragment]: a finalized select is only
/// ever consumed whole, by the caller or by `project`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Literal>,
}

/// The two shapes a compiled term can take. Most operators produce fragments;
/// the `select-*` operators produce finalized selects.
#[derive(Debug, Clone, EnumAsInner)]
pub(crate) enum Compiled {
    Fragment(Fragment),
    Select(SqlQuery),
}
