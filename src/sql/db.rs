//! Database-specific SQL shapes.
//!
//! The compiler itself never evaluates a regex or coerces a value; it only
//! decides where those operations appear in the generated SQL. The concrete
//! spelling differs per database, so each one is a small method on
//! [DbAdapter]. Defaults are the PostgreSQL forms; other databases override
//! what they must.

use crate::ast::{Literal, Node};

pub trait DbAdapter {
    /// Expression coercing `column` to a numeric value, NULL when the value
    /// does not parse.
    fn numeric_cast(&self, column: &str) -> String {
        format!("CAST({column} AS FLOAT)")
    }

    /// Regex match of `column` against one bound pattern. Exactly one `?`.
    fn regexp_match(&self, column: &str) -> String {
        format!("{column} ~ ?")
    }

    /// Regex match against any element of an array-typed column. Exactly one
    /// `?`.
    fn regexp_array_match(&self, table: &str, column: &str) -> String {
        format!("EXISTS(SELECT 1 FROM UNNEST({table}.{column}) AS elt WHERE elt ~ ?)")
    }

    /// Membership test against an array-typed column, binding the candidate
    /// as one `?`.
    fn array_contains(&self, column: &str) -> String {
        format!("? = ANY({column})")
    }

    /// Turns an arbitrary operand into a single bindable scalar. Strings pass
    /// through; anything else binds as its JSON text, which is the form
    /// structured resource parameters are stored in.
    fn serialize(&self, value: &Node) -> Literal {
        match value {
            Node::Literal(Literal::String(s)) => Literal::String(s.clone()),
            other => Literal::String(other.to_string()),
        }
    }

    /// Lenient numeric parse of a stored fact value.
    fn parse_number(&self, raw: &str) -> Option<f64> {
        raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

/// The databases the store runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Database {
    #[strum(serialize = "postgres")]
    Postgres,
    #[strum(serialize = "hsqldb")]
    Hsqldb,
}

impl Database {
    pub fn handler(&self) -> Box<dyn DbAdapter> {
        match self {
            Database::Postgres => Box::new(Postgres),
            Database::Hsqldb => Box::new(Hsqldb),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::Postgres
    }
}

pub struct Postgres;

impl DbAdapter for Postgres {}

/// The embedded database used by standalone installations. No native regex
/// operator and no `= ANY(...)`, so the shapes route through functions.
pub struct Hsqldb;

impl DbAdapter for Hsqldb {
    fn numeric_cast(&self, column: &str) -> String {
        format!("CAST({column} AS NUMERIC)")
    }

    fn regexp_match(&self, column: &str) -> String {
        format!("REGEXP_SUBSTRING({column}, ?) IS NOT NULL")
    }

    fn regexp_array_match(&self, table: &str, column: &str) -> String {
        format!(
            "EXISTS(SELECT 1 FROM UNNEST({table}.{column}) AS elt WHERE REGEXP_SUBSTRING(elt, ?) IS NOT NULL)"
        )
    }

    fn array_contains(&self, column: &str) -> String {
        format!("? IN (UNNEST({column}))")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_postgres_shapes() {
        let db = Database::Postgres.handler();
        assert_eq!(db.regexp_match("certname_facts.value"), "certname_facts.value ~ ?");
        assert_eq!(
            db.numeric_cast("certname_facts.value"),
            "CAST(certname_facts.value AS FLOAT)"
        );
        assert_eq!(
            db.array_contains("catalog_resources.tags"),
            "? = ANY(catalog_resources.tags)"
        );
    }

    #[test]
    fn test_hsqldb_shapes() {
        let db = "hsqldb".parse::<Database>().unwrap().handler();
        assert_eq!(
            db.regexp_match("certname_facts.value"),
            "REGEXP_SUBSTRING(certname_facts.value, ?) IS NOT NULL"
        );
        assert_eq!(
            db.array_contains("catalog_resources.tags"),
            "? IN (UNNEST(catalog_resources.tags))"
        );
    }

    #[test]
    fn test_serialize_passes_strings_through() {
        let db = Postgres;
        assert_eq!(db.serialize(&"file".into()), Literal::from("file"));
        assert_eq!(
            db.serialize(&Node::Literal(Literal::Integer(2))),
            Literal::from("2")
        );
        assert_eq!(
            db.serialize(&Node::Terms(vec!["a".into(), "b".into()])),
            Literal::from(r#"["a","b"]"#)
        );
    }

    #[test]
    fn test_parse_number_is_lenient_but_finite() {
        let db = Postgres;
        assert_eq!(db.parse_number(" 0.3 "), Some(0.3));
        assert_eq!(db.parse_number("4"), Some(4.0));
        assert_eq!(db.parse_number("warp"), None);
        assert_eq!(db.parse_number("NaN"), None);
    }
}
