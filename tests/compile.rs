//! End-to-end compilation scenarios: JSON in, SQL + params out.

use insta::assert_snapshot;

use factql::{
    compile_facts, compile_resource, fact_query_to_sql, fact_query_to_sql_with, parse,
    resource_query_to_sql, Hsqldb, Literal, SqlQuery, Version,
};

fn resources(json: &str) -> SqlQuery {
    compile_resource(json, Version::V2).unwrap()
}

fn facts(json: &str) -> SqlQuery {
    compile_facts(json, Version::V2).unwrap()
}

#[test]
fn fact_equality_on_name() {
    let compiled = facts(r#"["=", "name", "ipaddress"]"#);
    assert_snapshot!(compiled.sql, @"SELECT certname_facts.certname, certname_facts.name, certname_facts.value FROM certname_facts  WHERE certname_facts.name = ?");
    assert_eq!(compiled.params, vec![Literal::from("ipaddress")]);
}

#[test]
fn fact_path_syntax_is_not_a_field() {
    let error = compile_facts(r#"["=", ["fact", "name"], "ipaddress"]"#, Version::V2).unwrap_err();
    assert_snapshot!(error.to_string(), @"'fact.name' is not a queryable object for facts; acceptable fields are certname, name, value");
}

#[test]
fn resource_equality_on_type() {
    let compiled = resources(r#"["=", "type", "Class"]"#);
    assert_snapshot!(compiled.sql, @"SELECT certname, catalog, resource, type, title, tags, exported, sourcefile, sourceline FROM catalog_resources JOIN certname_catalogs USING(catalog)  WHERE catalog_resources.type = ?");
    assert_eq!(compiled.params, vec![Literal::from("Class")]);
}

#[test]
fn resource_conjunction() {
    let compiled = resources(r#"["and", ["=", "type", "Class"], ["=", "title", "apache"]]"#);
    assert_snapshot!(compiled.sql, @"SELECT certname, catalog, resource, type, title, tags, exported, sourcefile, sourceline FROM catalog_resources JOIN certname_catalogs USING(catalog)  WHERE (catalog_resources.type = ?) AND (catalog_resources.title = ?)");
    assert_eq!(
        compiled.params,
        vec![Literal::from("Class"), Literal::from("apache")]
    );
}

#[test]
fn node_active_joins_certnames() {
    let compiled = resources(r#"["=", ["node", "active"], true]"#);
    assert_snapshot!(compiled.sql, @"SELECT certname, catalog, resource, type, title, tags, exported, sourcefile, sourceline FROM catalog_resources JOIN certname_catalogs USING(catalog) INNER JOIN certnames ON certname_catalogs.certname = certnames.name WHERE certnames.deactivated IS NULL");
    assert!(compiled.params.is_empty());

    let deactivated = resources(r#"["=", ["node", "active"], false]"#);
    assert!(deactivated.sql.contains("certnames.deactivated IS NOT NULL"));
}

#[test]
fn fact_query_semi_joined_to_resources() {
    let compiled = facts(
        r#"["and", ["=", "name", "ipaddress"],
                   ["in-result", "certname",
                     ["project", "certname",
                       ["select-resources",
                         ["and", ["=", "type", "Class"], ["=", "title", "apache"]]]]]]"#,
    );
    assert_snapshot!(compiled.sql, @"SELECT certname_facts.certname, certname_facts.name, certname_facts.value FROM certname_facts  WHERE (certname_facts.name = ?) AND (certname IN (SELECT r1.certname FROM (SELECT certname, catalog, resource, type, title, tags, exported, sourcefile, sourceline FROM catalog_resources JOIN certname_catalogs USING(catalog)  WHERE (catalog_resources.type = ?) AND (catalog_resources.title = ?)) r1))");
    assert_eq!(
        compiled.params,
        vec![
            Literal::from("ipaddress"),
            Literal::from("Class"),
            Literal::from("apache"),
        ]
    );
    assert_eq!(compiled.sql.matches('?').count(), compiled.params.len());
}

#[test]
fn resource_query_semi_joined_to_facts() {
    let compiled = resources(
        r#"["and", ["=", "type", "Class"],
                   ["in-result", "certname",
                     ["project", "certname",
                       ["select-facts",
                         ["and", ["=", "name", "operatingsystem"], ["=", "value", "Debian"]]]]]]"#,
    );
    assert_snapshot!(compiled.sql, @"SELECT certname, catalog, resource, type, title, tags, exported, sourcefile, sourceline FROM catalog_resources JOIN certname_catalogs USING(catalog)  WHERE (catalog_resources.type = ?) AND (certname IN (SELECT r1.certname FROM (SELECT certname_facts.certname, certname_facts.name, certname_facts.value FROM certname_facts  WHERE (certname_facts.name = ?) AND (certname_facts.value = ?)) r1))");
    assert_eq!(
        compiled.params,
        vec![
            Literal::from("Class"),
            Literal::from("operatingsystem"),
            Literal::from("Debian"),
        ]
    );
}

#[test]
fn fact_inequality_binds_a_number() {
    let compiled = facts(r#"[">", "value", "0.3"]"#);
    assert_snapshot!(compiled.sql, @"SELECT certname_facts.certname, certname_facts.name, certname_facts.value FROM certname_facts  WHERE CAST(certname_facts.value AS FLOAT) > ?");
    assert_eq!(compiled.params, vec![Literal::Float(0.3)]);
}

#[test]
fn v1_certname_goes_through_node_name() {
    let error = compile_resource(r#"["=", "certname", "x"]"#, Version::V1).unwrap_err();
    assert_snapshot!(error.to_string(), @"'certname' is not a queryable object for resources; acceptable fields are catalog, exported, resource, sourcefile, sourceline, tag, tags, title, type");

    let compiled = compile_resource(r#"["=", ["node", "name"], "x"]"#, Version::V1).unwrap();
    assert_snapshot!(compiled.sql, @"SELECT certname, catalog, resource, type, title, tags, exported, sourcefile, sourceline FROM catalog_resources JOIN certname_catalogs USING(catalog)  WHERE certname_catalogs.certname = ?");
    assert_eq!(compiled.params, vec![Literal::from("x")]);
}

#[test]
fn v1_has_no_subquery_operators() {
    let query = r#"["project", "certname", ["select-resources", ["=", "type", "Class"]]]"#;
    let error = compile_resource(query, Version::V1).unwrap_err();
    assert_snapshot!(error.to_string(), @"'project' is not supported in v1 resource queries");
}

#[test]
fn v1_has_no_fact_queries() {
    let error = compile_facts(r#"["=", "name", "ipaddress"]"#, Version::V1).unwrap_err();
    assert_snapshot!(error.to_string(), @r###"
    'facts' is not supported in v1 queries
    help: fact queries were introduced in the v2 API
    "###);
}

#[test]
fn operator_casing_is_ignored_end_to_end() {
    let lower = resources(r#"["and", ["=", "type", "Class"], ["=", "title", "apache"]]"#);
    let upper = resources(r#"["AND", ["=", "type", "Class"], ["=", "title", "apache"]]"#);
    assert_eq!(lower, upper);
}

#[test]
fn regex_shapes_follow_the_database_adapter() {
    let query = parse(r#"["~", "value", "^10"]"#).unwrap();

    let postgres = fact_query_to_sql(Version::V2, &query).unwrap();
    assert_snapshot!(postgres.sql, @"SELECT certname_facts.certname, certname_facts.name, certname_facts.value FROM certname_facts  WHERE certname_facts.value ~ ?");

    let hsqldb = fact_query_to_sql_with(&Hsqldb, Version::V2, &query).unwrap();
    assert_snapshot!(hsqldb.sql, @"SELECT certname_facts.certname, certname_facts.name, certname_facts.value FROM certname_facts  WHERE REGEXP_SUBSTRING(certname_facts.value, ?) IS NOT NULL");
    assert_eq!(hsqldb.params, vec![Literal::from("^10")]);
}

#[test]
fn root_must_be_an_operator_application() {
    let error = resource_query_to_sql(Version::V2, &parse("\"certname\"").unwrap()).unwrap_err();
    assert_snapshot!(error.to_string(), @r#"expected an operator application, but found "certname""#);
}
