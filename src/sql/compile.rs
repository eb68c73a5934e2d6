//! The tree walker and the operator compilers.
//!
//! `compile_term` resolves one operator application against an operator
//! table and hands the operands to the matching compiler. Almost every
//! compiler returns a [Fragment]; the `select-*` operators instead finalize
//! a whole sub-`SELECT`, and `project` is the only consumer allowed to
//! splice one back into a fragment.

use itertools::Itertools;

use super::db::DbAdapter;
use super::dialect::{Kind, Op, OpTable};
use super::fragment::{merge_joins, Compiled, Fragment, JoinTag, SqlQuery};
use crate::ast::{Literal, Node};
use crate::error::{Error, Reason};

pub(crate) struct Context<'a> {
    pub db: &'a dyn DbAdapter,
}

/// Bare-string columns accepted by resource equality besides the special
/// `tag` and `certname` paths. `tags` takes this scalar comparison path;
/// the array form is reached through the `tag` field.
const RESOURCE_EQ_COLUMNS: &[&str] = &[
    "catalog",
    "resource",
    "type",
    "title",
    "tags",
    "exported",
    "sourcefile",
    "sourceline",
];

/// Bare-string columns accepted by resource regex matching.
const RESOURCE_MATCH_COLUMNS: &[&str] = &[
    "catalog",
    "resource",
    "type",
    "title",
    "exported",
    "sourcefile",
    "sourceline",
];

const RESOURCE_PARAM_SUBSELECT: &str = "catalog_resources.resource IN \
     (SELECT rp.resource FROM resource_params rp WHERE rp.name = ? AND rp.value = ?)";

/// Compile one operator application. The head of `node` names the operator;
/// names match case-insensitively. The shape of the result depends on the
/// operator: see [Compiled].
pub(crate) fn compile_term(ctx: &Context, table: OpTable, node: &Node) -> Result<Compiled, Error> {
    let terms = node.as_terms().ok_or_else(|| {
        Error::new(Reason::MalformedQuery(format!(
            "expected an operator application, but found {node}"
        )))
    })?;
    let (head, args) = terms
        .split_first()
        .ok_or_else(|| Error::new(Reason::MalformedQuery("expected a non-empty term".to_string())))?;
    let name = as_field(head).ok_or_else(|| {
        Error::new(Reason::MalformedQuery(format!(
            "expected an operator name, but found {head}"
        )))
    })?;
    let op = Op::parse(name).ok_or_else(|| {
        Error::new(Reason::UnknownOperator {
            op: name.to_lowercase(),
            term: node.to_string(),
        })
    })?;
    dispatch(ctx, table, op, args, node)
}

fn dispatch(
    ctx: &Context,
    table: OpTable,
    op: Op,
    args: &[Node],
    node: &Node,
) -> Result<Compiled, Error> {
    use OpTable::*;

    match (table, op) {
        (_, Op::And) => combine(ctx, table, Op::And, " AND ", args).map(Compiled::Fragment),
        (_, Op::Or) => combine(ctx, table, Op::Or, " OR ", args).map(Compiled::Fragment),
        (_, Op::Not) => negate(ctx, table, args).map(Compiled::Fragment),

        (ResourceV1 | ResourceV2, Op::Equal) => {
            resource_eq(ctx, table, args).map(Compiled::Fragment)
        }
        (FactV2, Op::Equal) => fact_eq(ctx, args).map(Compiled::Fragment),

        (ResourceV2, Op::Match) => resource_match(ctx, args).map(Compiled::Fragment),
        (FactV2, Op::Match) => fact_match(ctx, args).map(Compiled::Fragment),

        (FactV2, Op::Greater | Op::Less | Op::GreaterEq | Op::LessEq) => {
            fact_inequality(ctx, op, args).map(Compiled::Fragment)
        }

        // v1 predates the subquery operators
        (ResourceV1, Op::Project | Op::InResult | Op::SelectResources | Op::SelectFacts) => {
            Err(Error::new(Reason::UnsupportedInDialect {
                op: op.as_ref().to_string(),
                dialect: table.to_string(),
            }))
        }

        (ResourceV2 | FactV2, Op::Project) => project(ctx, table, args).map(Compiled::Fragment),
        (ResourceV2, Op::InResult) => {
            in_result(ctx, table, Kind::Resource, args).map(Compiled::Fragment)
        }
        (FactV2, Op::InResult) => in_result(ctx, table, Kind::Fact, args).map(Compiled::Fragment),

        // the cross-dialect references: a select always compiles its body
        // against its own dataset's v2 table, whatever table it appears in
        (ResourceV2 | FactV2, Op::SelectResources) => {
            let subquery = one_arg(Op::SelectResources, args)?;
            finalize_query(ctx, ResourceV2, subquery).map(Compiled::Select)
        }
        (ResourceV2 | FactV2, Op::SelectFacts) => {
            let subquery = one_arg(Op::SelectFacts, args)?;
            finalize_query(ctx, FactV2, subquery).map(Compiled::Select)
        }

        (ResourceV1, Op::Match)
        | (ResourceV1 | ResourceV2, Op::Greater | Op::Less | Op::GreaterEq | Op::LessEq) => {
            Err(Error::new(Reason::UnknownOperator {
                op: op.as_ref().to_string(),
                term: node.to_string(),
            }))
        }
    }
}

/// Compile the root of a query and wrap it into the dataset's `SELECT`.
pub(crate) fn finalize_query(
    ctx: &Context,
    table: OpTable,
    query: &Node,
) -> Result<SqlQuery, Error> {
    let fragment = fragment_of(compile_term(ctx, table, query)?)?;
    let kind = table.kind();
    let joins = fragment.joins.iter().map(|tag| join_sql(kind, *tag)).join(" ");
    let sql = match kind {
        Kind::Resource => format!(
            "SELECT {} FROM catalog_resources JOIN certname_catalogs USING(catalog) {joins} WHERE {}",
            kind.selectable_columns().iter().join(", "),
            fragment.where_clause
        ),
        Kind::Fact => format!(
            "SELECT {} FROM certname_facts {joins} WHERE {}",
            kind.selectable_columns()
                .iter()
                .map(|col| format!("certname_facts.{col}"))
                .join(", "),
            fragment.where_clause
        ),
    };
    Ok(SqlQuery {
        sql,
        params: fragment.params,
    })
}

fn join_sql(kind: Kind, tag: JoinTag) -> &'static str {
    match (kind, tag) {
        (Kind::Resource, JoinTag::Certnames) => {
            "INNER JOIN certnames ON certname_catalogs.certname = certnames.name"
        }
        (Kind::Fact, JoinTag::Certnames) => {
            "INNER JOIN certnames ON certname_facts.certname = certnames.name"
        }
    }
}

/// `and` / `or`: parenthesize every child clause, concatenate parameters in
/// argument order, union joins preserving first appearance.
fn combine(
    ctx: &Context,
    table: OpTable,
    op: Op,
    joiner: &str,
    terms: &[Node],
) -> Result<Fragment, Error> {
    if terms.is_empty() {
        return Err(Error::new(Reason::MalformedQuery(format!(
            "{} requires at least one term",
            op.as_ref()
        ))));
    }
    let children = terms
        .iter()
        .map(|term| compile_term(ctx, table, term).and_then(fragment_of))
        .collect::<Result<Vec<_>, _>>()?;

    let where_clause = children
        .iter()
        .map(|child| format!("({})", child.where_clause))
        .join(joiner);
    let mut joins = Vec::new();
    let mut params = Vec::new();
    for child in children {
        merge_joins(&mut joins, child.joins);
        params.extend(child.params);
    }
    Ok(Fragment {
        where_clause,
        joins,
        params,
    })
}

/// `not` lowers to `NOT (or ...)`, which gives it De Morgan semantics over
/// multiple terms for free.
fn negate(ctx: &Context, table: OpTable, terms: &[Node]) -> Result<Fragment, Error> {
    if terms.is_empty() {
        return Err(Error::new(Reason::MalformedQuery(
            "not requires at least one term".to_string(),
        )));
    }
    let inner = combine(ctx, table, Op::Or, " OR ", terms)?;
    Ok(Fragment {
        where_clause: format!("NOT ({})", inner.where_clause),
        joins: inner.joins,
        params: inner.params,
    })
}

fn resource_eq(ctx: &Context, table: OpTable, args: &[Node]) -> Result<Fragment, Error> {
    let (path, value) = two_args(Op::Equal, args)?;
    let v1 = table == OpTable::ResourceV1;

    // v1 reaches the certname column through ["node", "name"] only
    let rewritten: Node;
    let path = if v1 && is_path(path, &["node", "name"]) {
        rewritten = "certname".into();
        &rewritten
    } else {
        path
    };

    if let Some(field) = as_field(path) {
        return match field {
            "tag" => {
                // tags are canonicalized lowercase in storage
                let candidate = match literal(value)? {
                    Literal::String(s) => Literal::String(s.to_lowercase()),
                    other => other.clone(),
                };
                Ok(Fragment::expr(ctx.db.array_contains("catalog_resources.tags"))
                    .with_param(candidate))
            }
            "certname" if !v1 => Ok(Fragment::expr("certname_catalogs.certname = ?")
                .with_param(literal(value)?.clone())),
            col if RESOURCE_EQ_COLUMNS.contains(&col) => {
                Ok(Fragment::expr(format!("catalog_resources.{col} = ?"))
                    .with_param(literal(value)?.clone()))
            }
            other => Err(unqueryable(other, "resources", resource_eq_fields(v1))),
        };
    }
    if is_path(path, &["node", "active"]) {
        let clause = if value.is_truthy() {
            "certnames.deactivated IS NULL"
        } else {
            "certnames.deactivated IS NOT NULL"
        };
        return Ok(Fragment::expr(clause).with_join(JoinTag::Certnames));
    }
    if let Some(name) = parameter_name(path) {
        return Ok(Fragment::expr(RESOURCE_PARAM_SUBSELECT)
            .with_param(Literal::String(name.to_string()))
            .with_param(ctx.db.serialize(value)));
    }
    Err(unqueryable(
        &field_label(path),
        "resources",
        resource_eq_fields(v1),
    ))
}

fn resource_match(ctx: &Context, args: &[Node]) -> Result<Fragment, Error> {
    let (path, pattern) = two_args(Op::Match, args)?;
    let pattern = literal(pattern)?.clone();
    match as_field(path) {
        Some("tag") => Ok(Fragment::expr(
            ctx.db.regexp_array_match("catalog_resources", "tags"),
        )
        .with_param(pattern)),
        Some("certname") => Ok(Fragment::expr(
            ctx.db.regexp_match("certname_catalogs.certname"),
        )
        .with_param(pattern)),
        Some(col) if RESOURCE_MATCH_COLUMNS.contains(&col) => Ok(Fragment::expr(
            ctx.db.regexp_match(&format!("catalog_resources.{col}")),
        )
        .with_param(pattern)),
        _ => Err(unqueryable(
            &field_label(path),
            "resources",
            resource_match_fields(),
        )),
    }
}

fn fact_eq(ctx: &Context, args: &[Node]) -> Result<Fragment, Error> {
    let (path, value) = two_args(Op::Equal, args)?;
    match as_field(path) {
        Some("name") => {
            Ok(Fragment::expr("certname_facts.name = ?").with_param(literal(value)?.clone()))
        }
        // fact values are stored as strings
        Some("value") => Ok(Fragment::expr("certname_facts.value = ?")
            .with_param(Literal::String(literal(value)?.to_string()))),
        Some("certname") => {
            Ok(Fragment::expr("certname_facts.certname = ?").with_param(literal(value)?.clone()))
        }
        _ if is_path(path, &["node", "active"]) => {
            let clause = if value.is_truthy() {
                "certnames.deactivated IS NULL"
            } else {
                "certnames.deactivated IS NOT NULL"
            };
            Ok(Fragment::expr(clause).with_join(JoinTag::Certnames))
        }
        _ => Err(unqueryable(
            &field_label(path),
            "facts",
            Kind::Fact.selectable_columns().to_vec(),
        )),
    }
}

fn fact_match(ctx: &Context, args: &[Node]) -> Result<Fragment, Error> {
    let (path, pattern) = two_args(Op::Match, args)?;
    let pattern = literal(pattern)?.clone();
    match as_field(path) {
        Some(col) if Kind::Fact.selectable_columns().contains(&col) => Ok(Fragment::expr(
            ctx.db.regexp_match(&format!("certname_facts.{col}")),
        )
        .with_param(pattern)),
        _ => Err(unqueryable(
            &field_label(path),
            "facts",
            Kind::Fact.selectable_columns().to_vec(),
        )),
    }
}

fn fact_inequality(ctx: &Context, op: Op, args: &[Node]) -> Result<Fragment, Error> {
    let (path, value) = two_args(op, args)?;
    if as_field(path) != Some("value") {
        return Err(unqueryable(&field_label(path), "facts", vec!["value"]));
    }
    let raw = match value {
        Node::Literal(literal) => literal.to_string(),
        other => other.to_string(),
    };
    match ctx.db.parse_number(&raw) {
        Some(number) => Ok(Fragment::expr(format!(
            "{} {} ?",
            ctx.db.numeric_cast("certname_facts.value"),
            op.as_ref()
        ))
        .with_param(Literal::Float(number))),
        None => Err(Error::new(Reason::TypeMismatch(format!(
            "Value {raw} must be a number for {} comparison",
            op.as_ref()
        )))),
    }
}

/// `project` pulls one column out of a finalized select, turning it back
/// into a fragment whose clause is column-bearing rather than boolean.
fn project(ctx: &Context, table: OpTable, args: &[Node]) -> Result<Fragment, Error> {
    let (field, subquery) = two_args(Op::Project, args)?;

    let kind = match head_op(subquery) {
        Some(Op::SelectResources) => Kind::Resource,
        Some(Op::SelectFacts) => Kind::Fact,
        _ => {
            return Err(Error::new(Reason::BadSubquery(format!(
                "the argument to 'project' must be a select operator, but found {subquery}"
            ))))
        }
    };
    let field = selectable_field(field, kind)?;

    match compile_term(ctx, table, subquery)? {
        Compiled::Select(select) => Ok(Fragment {
            where_clause: format!("SELECT r1.{field} FROM ({}) r1", select.sql),
            joins: Vec::new(),
            params: select.params,
        }),
        Compiled::Fragment(_) => unreachable!("select operators always finalize"),
    }
}

/// `<field> IN (<projection>)` over the dataset currently being compiled.
fn in_result(ctx: &Context, table: OpTable, kind: Kind, args: &[Node]) -> Result<Fragment, Error> {
    let (field, subquery) = two_args(Op::InResult, args)?;
    let field = selectable_field(field, kind)?;

    if head_op(subquery) != Some(Op::Project) {
        return Err(Error::new(Reason::BadSubquery(format!(
            "the argument to 'in-result' must be a 'project' subquery, but found {subquery}"
        ))));
    }
    match compile_term(ctx, table, subquery)? {
        Compiled::Fragment(projection) => Ok(Fragment {
            where_clause: format!("{field} IN ({})", projection.where_clause),
            joins: projection.joins,
            params: projection.params,
        }),
        Compiled::Select(_) => unreachable!("'project' compiles to a fragment"),
    }
}

fn fragment_of(compiled: Compiled) -> Result<Fragment, Error> {
    match compiled {
        Compiled::Fragment(fragment) => Ok(fragment),
        Compiled::Select(_) => Err(Error::new(Reason::MalformedQuery(
            "select subqueries are only valid as the argument to 'project'".to_string(),
        ))),
    }
}

fn two_args<'a>(op: Op, args: &'a [Node]) -> Result<(&'a Node, &'a Node), Error> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(Error::new(Reason::Arity {
            op: op.as_ref().to_string(),
            expected: 2,
            found: args.len(),
        })),
    }
}

fn one_arg<'a>(op: Op, args: &'a [Node]) -> Result<&'a Node, Error> {
    match args {
        [sub] => Ok(sub),
        _ => Err(Error::new(Reason::Arity {
            op: op.as_ref().to_string(),
            expected: 1,
            found: args.len(),
        })),
    }
}

fn literal<'a>(node: &'a Node) -> Result<&'a Literal, Error> {
    node.as_literal().ok_or_else(|| {
        Error::new(Reason::MalformedQuery(format!(
            "expected a literal operand, but found {node}"
        )))
    })
}

fn as_field(node: &Node) -> Option<&str> {
    node.as_literal()
        .and_then(|literal| literal.as_string())
        .map(String::as_str)
}

fn is_path(node: &Node, parts: &[&str]) -> bool {
    match node.as_terms() {
        Some(terms) => {
            terms.len() == parts.len()
                && terms
                    .iter()
                    .zip(parts)
                    .all(|(term, part)| as_field(term) == Some(part))
        }
        None => false,
    }
}

fn parameter_name(node: &Node) -> Option<&str> {
    match node.as_terms()?.as_slice() {
        [namespace, name] if as_field(namespace) == Some("parameter") => as_field(name),
        _ => None,
    }
}

fn head_op(node: &Node) -> Option<Op> {
    node.as_terms()?.first().and_then(as_field).and_then(Op::parse)
}

fn selectable_field<'a>(node: &'a Node, kind: Kind) -> Result<&'a str, Error> {
    match as_field(node) {
        Some(field) if kind.selectable_columns().contains(&field) => Ok(field),
        _ => Err(unqueryable(
            &field_label(node),
            &kind.to_string(),
            kind.selectable_columns().to_vec(),
        )),
    }
}

/// How a path reads in an error message: bare fields verbatim, two-element
/// paths dotted, anything else as the JSON the client sent.
fn field_label(node: &Node) -> String {
    match node {
        Node::Literal(Literal::String(s)) => s.clone(),
        Node::Terms(terms) if terms.iter().all(|term| as_field(term).is_some()) => {
            terms.iter().filter_map(as_field).join(".")
        }
        other => other.to_string(),
    }
}

fn resource_eq_fields(v1: bool) -> Vec<&'static str> {
    let mut fields = vec!["tag"];
    if !v1 {
        fields.push("certname");
    }
    fields.extend(RESOURCE_EQ_COLUMNS);
    fields
}

fn resource_match_fields() -> Vec<&'static str> {
    let mut fields = vec!["tag", "certname"];
    fields.extend(RESOURCE_MATCH_COLUMNS);
    fields
}

fn unqueryable(field: &str, dataset: &str, mut queryable: Vec<&'static str>) -> Error {
    queryable.sort_unstable();
    Error::new(Reason::UnqueryableField {
        field: field.to_string(),
        dataset: dataset.to_string(),
        queryable: queryable.into_iter().map(str::to_string).collect(),
    })
}
