use std::{collections::HashSet, sync::Arc};

use sqlgenie::{
    ast::{Ast, SqlDialect},
    catalog::Catalog,
    engine,
    rules::{Finding, RewriteHint, RuleCategory, RuleSet, Severity}
};

fn findings(sql: &str) -> Vec<Finding> {
    let ast = Ast::parse(sql, SqlDialect::Generic).unwrap();
    engine::analyze(&ast, &RuleSet::default())
}

fn analyze_query(sql: &str) -> Vec<String> {
    findings(sql).iter().map(|f| f.rule_id.to_string()).collect()
}

fn analyze_with_schema(sql: &str, schema_sql: &str) -> Vec<String> {
    let ast = Ast::parse(sql, SqlDialect::Generic).unwrap();
    let catalog = Catalog::parse(schema_sql, SqlDialect::Generic).unwrap();
    let rules = RuleSet::all(Some(Arc::new(catalog)));
    engine::analyze(&ast, &rules)
        .iter()
        .map(|f| f.rule_id.to_string())
        .collect()
}

fn finding_text<'a>(sql: &'a str, rule_id: &str) -> &'a str {
    let found = findings(sql);
    let finding = found
        .iter()
        .find(|f| f.rule_id == rule_id)
        .unwrap_or_else(|| panic!("{rule_id} not reported for {sql}"));
    finding.span.slice(sql).unwrap()
}

const USERS: &str = "CREATE TABLE users (id INT PRIMARY KEY, name TEXT, email TEXT);";

#[test]
fn test_builtin_rule_metadata() {
    let rules = RuleSet::default();
    assert_eq!(rules.len(), 11);

    let ids: HashSet<_> = rules.ids().collect();
    assert_eq!(ids.len(), rules.len(), "rule ids must be unique");
    for id in &ids {
        assert!(
            id.chars().all(|c| c.is_ascii_lowercase() || c == '-'),
            "{id} is not kebab-case"
        );
    }

    let severity_of = |id: &str| {
        rules
            .rules()
            .iter()
            .map(|r| r.info())
            .find(|info| info.id == id)
            .map(|info| info.severity)
            .unwrap()
    };
    assert_eq!(severity_of("missing-where"), Severity::Critical);
    assert_eq!(severity_of("implicit-cross-join"), Severity::Critical);
    assert_eq!(severity_of("select-star"), Severity::Warning);
    assert_eq!(severity_of("or-to-in"), Severity::Info);
    assert_eq!(severity_of("union-without-all"), Severity::Info);
}

#[test]
fn test_rule_categories() {
    let rules = RuleSet::default();
    let category_of = |id: &str| {
        rules
            .rules()
            .iter()
            .map(|r| r.info())
            .find(|info| info.id == id)
            .map(|info| info.category)
            .unwrap()
    };
    assert_eq!(category_of("not-in-subquery"), RuleCategory::Correctness);
    assert_eq!(category_of("large-offset"), RuleCategory::Performance);
    assert_eq!(category_of("redundant-distinct"), RuleCategory::Style);
}

#[test]
fn test_select_star() {
    let violations = analyze_query("SELECT * FROM users WHERE id = 1");
    assert!(violations.contains(&"select-star".to_string()));
    assert_eq!(finding_text("SELECT * FROM users WHERE id = 1", "select-star"), "*");
}

#[test]
fn test_explicit_columns_ok() {
    let violations = analyze_query("SELECT id, name FROM users WHERE id = 1");
    assert!(!violations.contains(&"select-star".to_string()));
}

#[test]
fn test_select_star_hint_filters_sources_by_qualifier() {
    let found = findings("SELECT u.* FROM users u JOIN orders o ON o.user_id = u.id");
    let hint = found
        .iter()
        .find(|f| f.rule_id == "select-star")
        .and_then(|f| f.rewrite_hint.clone())
        .unwrap();
    match hint {
        RewriteHint::ExpandWildcard {
            qualifier,
            sources,
            ..
        } => {
            assert_eq!(qualifier.as_deref(), Some("u"));
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].table.as_deref(), Some("users"));
        }
        other => panic!("unexpected hint {other:?}")
    }
}

#[test]
fn test_redundant_distinct_with_group_by() {
    let sql = "SELECT DISTINCT status FROM orders WHERE total > 0 GROUP BY status";
    let violations = analyze_query(sql);
    assert!(violations.contains(&"redundant-distinct".to_string()));
    assert_eq!(finding_text(sql, "redundant-distinct"), "DISTINCT");
}

#[test]
fn test_distinct_without_key_ok() {
    let violations = analyze_query("SELECT DISTINCT name FROM users WHERE id > 1");
    assert!(!violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_redundant_distinct_with_primary_key() {
    let violations =
        analyze_with_schema("SELECT DISTINCT id, name FROM users WHERE id > 1", USERS);
    assert!(violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_distinct_without_primary_key_column_ok() {
    let violations = analyze_with_schema("SELECT DISTINCT name FROM users WHERE id > 1", USERS);
    assert!(!violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_distinct_with_group_by_on_other_relation_ok() {
    let violations = analyze_query(
        "SELECT DISTINCT a.id FROM a JOIN b ON a.k = b.k WHERE a.z = 1 GROUP BY a.id, b.id"
    );
    assert!(!violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_redundant_distinct_with_qualified_group_by() {
    let violations = analyze_query(
        "SELECT DISTINCT a.id, b.id FROM a JOIN b ON a.k = b.k WHERE a.z = 1 GROUP BY a.id, b.id"
    );
    assert!(violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_distinct_over_nullable_unique_column_ok() {
    let schema = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT UNIQUE);";
    let violations = analyze_with_schema("SELECT DISTINCT email FROM users WHERE id > 1", schema);
    assert!(!violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_redundant_distinct_over_not_null_unique_column() {
    let schema = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT NOT NULL UNIQUE);";
    let violations = analyze_with_schema("SELECT DISTINCT email FROM users WHERE id > 1", schema);
    assert!(violations.contains(&"redundant-distinct".to_string()));
}

#[test]
fn test_distinct_on_is_not_redundant() {
    let ast = Ast::parse(
        "SELECT DISTINCT ON (id) id, name FROM users WHERE id > 1",
        SqlDialect::PostgreSQL
    )
    .unwrap();
    let found = engine::analyze(&ast, &RuleSet::default());
    assert!(!found.iter().any(|f| f.rule_id == "redundant-distinct"));
}

#[test]
fn test_or_chain() {
    let sql = "SELECT id FROM orders WHERE status = 'a' OR status = 'b' OR status = 'c'";
    let found = findings(sql);
    let finding = found.iter().find(|f| f.rule_id == "or-to-in").unwrap();
    assert_eq!(
        finding.span.slice(sql),
        Some("status = 'a' OR status = 'b' OR status = 'c'")
    );
    assert_eq!(found.iter().filter(|f| f.rule_id == "or-to-in").count(), 1);
    assert!(matches!(
        &finding.rewrite_hint,
        Some(RewriteHint::Replace { replacement, .. }) if replacement == "status IN ('a', 'b', 'c')"
    ));
}

#[test]
fn test_short_or_chain_ok() {
    let violations = analyze_query("SELECT id FROM orders WHERE status = 'a' OR status = 'b'");
    assert!(!violations.contains(&"or-to-in".to_string()));
}

#[test]
fn test_or_on_different_columns_ok() {
    let violations =
        analyze_query("SELECT id FROM orders WHERE status = 'a' OR kind = 'b' OR status = 'c'");
    assert!(!violations.contains(&"or-to-in".to_string()));
}

#[test]
fn test_select_without_where() {
    let violations = analyze_query("SELECT id FROM users");
    assert!(violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_select_with_where() {
    let violations = analyze_query("SELECT id FROM users WHERE active = true");
    assert!(!violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_select_with_limit_ok() {
    let violations = analyze_query("SELECT id FROM users LIMIT 10");
    assert!(!violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_aggregate_only_select_ok() {
    let violations = analyze_query("SELECT COUNT(*) FROM users");
    assert!(!violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_select_without_from_ok() {
    assert!(analyze_query("SELECT 1").is_empty());
}

#[test]
fn test_subquery_without_where_not_reported() {
    let violations =
        analyze_query("SELECT id FROM users WHERE id IN (SELECT user_id FROM orders)");
    assert!(!violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_delete_without_where() {
    let violations = analyze_query("DELETE FROM users");
    assert_eq!(violations, ["missing-where"]);
}

#[test]
fn test_delete_with_where() {
    let violations = analyze_query("DELETE FROM users WHERE id = 1");
    assert!(violations.is_empty());
}

#[test]
fn test_update_without_where() {
    let violations = analyze_query("UPDATE users SET active = false");
    assert!(violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_implicit_cross_join() {
    let violations = analyze_query("SELECT a.id FROM a, b WHERE a.x = 1");
    assert!(violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_comma_join_with_predicate_ok() {
    let violations = analyze_query("SELECT a.id FROM a, b WHERE a.id = b.a_id");
    assert!(!violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_comma_join_with_aliases_ok() {
    let violations =
        analyze_query("SELECT u.id FROM users u, orders o WHERE o.user_id = u.id AND u.id > 1");
    assert!(!violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_three_tables_one_disconnected() {
    let sql = "SELECT a.id FROM a, b, c WHERE a.id = b.a_id";
    let found = findings(sql);
    let finding = found
        .iter()
        .find(|f| f.rule_id == "implicit-cross-join")
        .unwrap();
    assert!(finding.message.contains("a + b / c"));
    assert_eq!(finding.span.slice(sql), Some("a, b, c"));
}

#[test]
fn test_explicit_cross_join_ok() {
    let violations = analyze_query("SELECT a.id FROM a CROSS JOIN b WHERE a.x = 1");
    assert!(!violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_join_without_condition() {
    let violations = analyze_query("SELECT a.id FROM a JOIN b WHERE a.x = 1");
    assert!(violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_join_on_constant_condition() {
    let sql = "SELECT a.id FROM a JOIN b ON 1 = 1 WHERE a.x = 1";
    assert_eq!(finding_text(sql, "implicit-cross-join"), "a JOIN b ON 1 = 1");
}

#[test]
fn test_join_on_one_sided_condition() {
    let violations = analyze_query("SELECT a.id FROM a JOIN b ON a.flag = 1 WHERE a.x = 1");
    assert!(violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_join_related_through_where_ok() {
    let violations = analyze_query("SELECT a.id FROM a JOIN b ON a.flag = 1 WHERE a.id = b.a_id");
    assert!(!violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_third_join_unrelated() {
    let sql =
        "SELECT a.id FROM a JOIN b ON a.id = b.a_id LEFT JOIN c ON c.kind = 'x' WHERE a.x = 1";
    let found = findings(sql);
    let finding = found
        .iter()
        .find(|f| f.rule_id == "implicit-cross-join")
        .unwrap();
    assert!(finding.message.contains("a + b / c"));
}

#[test]
fn test_join_using_ok() {
    let violations = analyze_query("SELECT a.id FROM a JOIN b USING (id) WHERE a.x = 1");
    assert!(!violations.contains(&"implicit-cross-join".to_string()));
}

#[test]
fn test_missing_where_in_derived_table() {
    let sql = "SELECT x.a FROM (SELECT a FROM u) x WHERE x.a = 1";
    assert_eq!(finding_text(sql, "missing-where"), "u");
}

#[test]
fn test_missing_where_in_joined_derived_table() {
    let sql = "SELECT x.a FROM t JOIN (SELECT a FROM u) x ON x.a = t.a WHERE t.id = 1";
    assert_eq!(finding_text(sql, "missing-where"), "u");
}

#[test]
fn test_subquery_in_join_condition_not_a_scan() {
    let violations = analyze_query(
        "SELECT t.a FROM t JOIN u ON u.id = t.id AND u.id IN (SELECT id FROM v) WHERE t.id = 1"
    );
    assert!(!violations.contains(&"missing-where".to_string()));
}

#[test]
fn test_year_function_on_column() {
    let sql = "SELECT id FROM orders WHERE YEAR(created_at) = 2024";
    assert_eq!(finding_text(sql, "non-sargable-predicate"), "YEAR(created_at)");
    let found = findings(sql);
    let finding = found
        .iter()
        .find(|f| f.rule_id == "non-sargable-predicate")
        .unwrap();
    assert!(matches!(
        &finding.rewrite_hint,
        Some(RewriteHint::Replace { replacement, .. })
            if replacement == "(created_at >= '2024-01-01' AND created_at < '2025-01-01')"
    ));
}

#[test]
fn test_lower_function_without_rewrite() {
    let found = findings("SELECT id FROM users WHERE LOWER(email) = 'a@b.c'");
    let finding = found
        .iter()
        .find(|f| f.rule_id == "non-sargable-predicate")
        .unwrap();
    assert!(finding.message.contains("LOWER"));
    assert!(finding.rewrite_hint.is_none());
}

#[test]
fn test_arithmetic_on_column() {
    let violations = analyze_query("SELECT id FROM orders WHERE total * 2 > 100");
    assert!(violations.contains(&"non-sargable-predicate".to_string()));
}

#[test]
fn test_function_on_constant_side_ok() {
    let violations = analyze_query("SELECT id FROM orders WHERE created_at > NOW()");
    assert!(!violations.contains(&"non-sargable-predicate".to_string()));
}

#[test]
fn test_function_in_projection_ok() {
    let violations = analyze_query("SELECT UPPER(name) FROM users WHERE id = 1");
    assert!(!violations.contains(&"non-sargable-predicate".to_string()));
}

#[test]
fn test_leading_wildcard() {
    let sql = "SELECT id FROM users WHERE name LIKE '%test'";
    assert_eq!(finding_text(sql, "leading-wildcard"), "name LIKE '%test'");
}

#[test]
fn test_trailing_wildcard_ok() {
    let violations = analyze_query("SELECT id FROM users WHERE name LIKE 'test%'");
    assert!(!violations.contains(&"leading-wildcard".to_string()));
}

#[test]
fn test_large_offset() {
    let sql = "SELECT id FROM users ORDER BY id LIMIT 10 OFFSET 5000";
    assert_eq!(finding_text(sql, "large-offset"), "5000");
}

#[test]
fn test_small_offset_ok() {
    let violations = analyze_query("SELECT id FROM users ORDER BY id LIMIT 10 OFFSET 1000");
    assert!(!violations.contains(&"large-offset".to_string()));
}

#[test]
fn test_not_in_subquery() {
    let violations = analyze_query(
        "SELECT id FROM users WHERE id NOT IN (SELECT user_id FROM banned WHERE reason = 'x')"
    );
    assert!(violations.contains(&"not-in-subquery".to_string()));
}

#[test]
fn test_not_in_list_ok() {
    let violations = analyze_query("SELECT id FROM users WHERE id NOT IN (1, 2, 3)");
    assert!(!violations.contains(&"not-in-subquery".to_string()));
}

#[test]
fn test_in_subquery_ok() {
    let violations = analyze_query(
        "SELECT id FROM users WHERE id IN (SELECT user_id FROM banned WHERE reason = 'x')"
    );
    assert!(!violations.contains(&"not-in-subquery".to_string()));
}

#[test]
fn test_union_without_all() {
    let sql = "SELECT id FROM a WHERE x = 1 UNION SELECT id FROM b WHERE y = 2";
    assert_eq!(finding_text(sql, "union-without-all"), "UNION");
}

#[test]
fn test_union_all_ok() {
    let violations =
        analyze_query("SELECT id FROM a WHERE x = 1 UNION ALL SELECT id FROM b WHERE y = 2");
    assert!(!violations.contains(&"union-without-all".to_string()));
}

#[test]
fn test_scalar_subquery() {
    let violations = analyze_query(
        "SELECT id, (SELECT COUNT(*) FROM orders WHERE orders.user_id = users.id) FROM users \
         WHERE id = 1"
    );
    assert!(violations.contains(&"scalar-subquery".to_string()));
}

#[test]
fn test_subquery_in_where_not_scalar() {
    let violations =
        analyze_query("SELECT id FROM users WHERE id IN (SELECT user_id FROM orders)");
    assert!(!violations.contains(&"scalar-subquery".to_string()));
}

#[test]
fn test_clean_query_has_no_findings() {
    let violations =
        analyze_query("SELECT id, name FROM users WHERE id = 1 AND created_at > '2024-01-01'");
    assert!(violations.is_empty(), "unexpected findings: {violations:?}");
}
