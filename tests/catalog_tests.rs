// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sqlgenie::{ast::SqlDialect, catalog::Catalog};

fn parse(sql: &str) -> Catalog {
    Catalog::parse(sql, SqlDialect::Generic).unwrap()
}

#[test]
fn test_parse_simple_table() {
    let catalog = parse("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(255))");
    assert_eq!(catalog.tables.len(), 1);
    let users = catalog.table("users").unwrap();
    assert_eq!(users.columns.len(), 2);
    assert_eq!(users.columns[0].name, "id");
    assert!(users.columns[0].is_primary);
    assert_eq!(users.columns[1].data_type, "VARCHAR(255)");
}

#[test]
fn test_parse_multiple_tables() {
    let catalog = parse(
        r#"
        CREATE TABLE users (id INT PRIMARY KEY);
        CREATE TABLE orders (id INT PRIMARY KEY, user_id INT);
    "#
    );
    assert_eq!(catalog.tables.len(), 2);
    assert!(catalog.table("users").is_some());
    assert!(catalog.table("orders").is_some());
}

#[test]
fn test_lookup_is_case_insensitive() {
    let catalog = parse("CREATE TABLE Users (Id INT PRIMARY KEY)");
    assert!(catalog.table("USERS").is_some());
    assert!(catalog.table("users").unwrap().column("id").is_some());
}

#[test]
fn test_lookup_falls_back_to_unqualified_name() {
    let catalog = parse("CREATE TABLE users (id INT)");
    assert!(catalog.table("public.users").is_some());
    assert!(catalog.table("public.orders").is_none());
}

#[test]
fn test_parse_not_null() {
    let catalog = parse("CREATE TABLE users (id INT NOT NULL, name VARCHAR(255))");
    let users = catalog.table("users").unwrap();
    assert!(!users.columns[0].is_nullable);
    assert!(users.columns[1].is_nullable);
}

#[test]
fn test_parse_index() {
    let catalog = parse(
        r#"
        CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(255));
        CREATE INDEX idx_email ON users(email);
    "#
    );
    let users = catalog.table("users").unwrap();
    assert_eq!(users.indexes.len(), 1);
    assert_eq!(users.indexes[0].name, "idx_email");
    assert_eq!(users.indexes[0].columns, ["email"]);
    assert!(!users.indexes[0].is_unique);
    assert!(!catalog.is_unique_key("users", &["email"]));
}

#[test]
fn test_parse_unique_index() {
    let catalog = parse(
        r#"
        CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(255));
        CREATE UNIQUE INDEX idx_email ON users(email);
    "#
    );
    let users = catalog.table("users").unwrap();
    assert!(users.indexes[0].is_unique);
    assert!(catalog.is_unique_key("users", &["email", "id"]));
}

#[test]
fn test_index_on_unknown_table_ignored() {
    let catalog = parse("CREATE INDEX idx ON missing(col)");
    assert!(catalog.is_empty());
}

#[test]
fn test_composite_primary_key() {
    let catalog = parse(
        "CREATE TABLE items (order_id INT, line INT, sku TEXT, PRIMARY KEY (order_id, line))"
    );
    assert!(catalog.is_unique_key("items", &["order_id", "line", "sku"]));
    assert!(!catalog.is_unique_key("items", &["order_id", "sku"]));
}

#[test]
fn test_unique_column_constraint() {
    let catalog = parse("CREATE TABLE users (id INT, email TEXT NOT NULL UNIQUE)");
    let users = catalog.table("users").unwrap();
    assert!(users.has_unique_key());
    assert!(users.column("email").unwrap().is_unique);
    assert!(catalog.is_unique_key("users", &["EMAIL"]));
}

#[test]
fn test_nullable_unique_column_is_not_a_row_key() {
    let catalog = parse("CREATE TABLE users (id INT, email TEXT UNIQUE)");
    let users = catalog.table("users").unwrap();
    assert!(users.column("email").unwrap().is_unique);
    assert!(!users.has_unique_key());
    assert!(!catalog.is_unique_key("users", &["email"]));
}

#[test]
fn test_primary_key_constraint_columns_are_not_null() {
    let catalog =
        parse("CREATE TABLE items (order_id INT, line INT, PRIMARY KEY (order_id, line))");
    let items = catalog.table("items").unwrap();
    assert!(items.columns.iter().all(|c| !c.is_nullable));
    assert!(items.has_unique_key());
}

#[test]
fn test_table_without_keys() {
    let catalog = parse("CREATE TABLE events (kind TEXT, payload TEXT)");
    assert!(!catalog.table("events").unwrap().has_unique_key());
    assert!(!catalog.is_unique_key("events", &["kind", "payload"]));
    assert!(!catalog.is_unique_key("nope", &["kind"]));
}

#[test]
fn test_other_statements_ignored() {
    let catalog = parse("CREATE TABLE t (id INT); INSERT INTO t VALUES (1); DROP TABLE x;");
    assert_eq!(catalog.tables.len(), 1);
}

#[test]
fn test_column_order_preserved() {
    let catalog = parse("CREATE TABLE t (z INT, a INT, m INT)");
    let names: Vec<_> = catalog.table("t").unwrap().column_names().collect();
    assert_eq!(names, ["z", "a", "m"]);
}

#[test]
fn test_invalid_ddl_reports_position() {
    let err = Catalog::parse("CREATE TABLE (", SqlDialect::Generic).unwrap_err();
    assert!(!err.message.is_empty());
}
