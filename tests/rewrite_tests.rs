// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sqlgenie::{
    ast::{Ast, SqlDialect},
    catalog::Catalog,
    engine,
    rewrite::{self, Rewrite, RewriteStatus},
    rules::RuleSet
};

const SCHEMA: &str = r#"
    CREATE TABLE users (id INT PRIMARY KEY, name TEXT, email TEXT);
    CREATE TABLE orders (id INT PRIMARY KEY, user_id INT, total INT);
"#;

fn catalog() -> Catalog {
    Catalog::parse(SCHEMA, SqlDialect::Generic).unwrap()
}

fn run(sql: &str, catalog: Option<&Catalog>) -> Rewrite {
    let ast = Ast::parse(sql, SqlDialect::Generic).unwrap();
    let findings = engine::analyze(&ast, &RuleSet::default());
    rewrite::rewrite(&ast, &findings, catalog)
}

#[test]
fn test_no_hints_returns_source_verbatim() {
    let sql = "SELECT  a.x\nFROM a ,  b -- keep me\n";
    let result = run(sql, None);
    assert_eq!(result.sql, sql);
    assert!(result.plan.is_empty());
}

#[test]
fn test_wildcard_without_catalog_is_advisory() {
    let result = run("SELECT * FROM orders", None);
    assert_eq!(result.sql, "SELECT * FROM orders");
    assert!(result.plan.statuses.iter().all(|s| *s == RewriteStatus::Advisory));
}

#[test]
fn test_wildcard_unknown_table_is_advisory() {
    let catalog = catalog();
    let result = run("SELECT * FROM products WHERE id = 1", Some(&catalog));
    assert_eq!(result.sql, "SELECT * FROM products WHERE id = 1");
}

#[test]
fn test_wildcard_expansion() {
    let catalog = catalog();
    let result = run("SELECT * FROM orders WHERE id = 1", Some(&catalog));
    assert_eq!(result.sql, "SELECT id, user_id, total FROM orders WHERE id = 1");
}

#[test]
fn test_qualified_wildcard_uses_alias() {
    let catalog = catalog();
    let result = run("SELECT u.* FROM users u WHERE u.id = 1", Some(&catalog));
    assert_eq!(result.sql, "SELECT u.id, u.name, u.email FROM users u WHERE u.id = 1");
}

#[test]
fn test_wildcard_over_join_prefixes_columns() {
    let catalog = catalog();
    let result = run(
        "SELECT * FROM users u JOIN orders o ON o.user_id = u.id WHERE u.id = 1",
        Some(&catalog)
    );
    assert_eq!(
        result.sql,
        "SELECT u.id, u.name, u.email, o.id, o.user_id, o.total \
         FROM users u JOIN orders o ON o.user_id = u.id WHERE u.id = 1"
    );
}

#[test]
fn test_distinct_and_wildcard_edits_combine() {
    let catalog = catalog();
    let ast = Ast::parse("SELECT DISTINCT * FROM users", SqlDialect::Generic).unwrap();
    let rules = RuleSet::all(Some(std::sync::Arc::new(catalog.clone())));
    let findings = engine::analyze(&ast, &rules);
    let result = rewrite::rewrite(&ast, &findings, Some(&catalog));
    assert_eq!(result.sql, "SELECT id, name, email FROM users");
    assert_eq!(result.plan.edits.len(), 2);
}

#[test]
fn test_year_predicate_rewrite() {
    let result = run("SELECT id FROM orders WHERE YEAR(created_at) = 2024", None);
    assert_eq!(
        result.sql,
        "SELECT id FROM orders WHERE (created_at >= '2024-01-01' AND created_at < '2025-01-01')"
    );
}

#[test]
fn test_or_chain_rewrite_keeps_surroundings() {
    let result = run(
        "SELECT id FROM orders\nWHERE status = 'a' OR status = 'b' OR status = 'c'\nLIMIT 5",
        None
    );
    assert_eq!(
        result.sql,
        "SELECT id FROM orders\nWHERE status IN ('a', 'b', 'c')\nLIMIT 5"
    );
}

#[test]
fn test_rewrite_is_pure() {
    let catalog = catalog();
    let sql = "SELECT * FROM users WHERE YEAR(created_at) = 2023";
    let first = run(sql, Some(&catalog));
    let second = run(sql, Some(&catalog));
    assert_eq!(first, second);
}

#[test]
fn test_rewrite_is_idempotent() {
    let catalog = catalog();
    for sql in [
        "SELECT * FROM users WHERE id = 1",
        "SELECT id FROM orders WHERE YEAR(created_at) = 2024",
        "SELECT id FROM orders WHERE status = 'a' OR status = 'b' OR status = 'c'",
        "SELECT DISTINCT status FROM orders WHERE total > 1 GROUP BY status"
    ] {
        let once = run(sql, Some(&catalog));
        let twice = run(&once.sql, Some(&catalog));
        assert_eq!(twice.sql, once.sql, "{sql}");
        assert!(twice.plan.is_empty(), "{sql}");
    }
}

#[test]
fn test_rewritten_sql_parses() {
    let catalog = catalog();
    for sql in [
        "SELECT DISTINCT * FROM users",
        "SELECT o.* FROM orders o WHERE YEAR(o.created_at) = 1999",
        "SELECT id FROM t WHERE (a = 1 OR a = 2 OR a = 3) AND b = 2"
    ] {
        let result = run(sql, Some(&catalog));
        assert!(
            Ast::parse(&result.sql, SqlDialect::Generic).is_ok(),
            "{sql} -> {}",
            result.sql
        );
    }
}
