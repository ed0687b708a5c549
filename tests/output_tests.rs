// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sqlgenie::{
    analyzer::{Analyzer, StatementOutcome},
    ast::{Span, SqlDialect},
    catalog::Catalog,
    error::AnalyzerError,
    output::{
        OutputFormat, OutputOptions, StatementReport, Summary, format_results, format_rule_list
    },
    rules::RuleSet
};

fn reports(sql: &str) -> Vec<StatementReport> {
    let outcomes = Analyzer::default().analyze_script(sql).unwrap();
    StatementReport::from_outcomes(sql, outcomes)
}

fn options(format: OutputFormat) -> OutputOptions {
    OutputOptions {
        format,
        colored: false,
        verbose: false
    }
}

#[test]
fn test_text_output_lists_findings() {
    let output = format_results(&reports("SELECT * FROM orders"), &options(OutputFormat::Text));
    assert!(output.starts_with("=== SQL Anti-Pattern Analysis ==="));
    assert!(output.contains("Statement #1:"));
    assert!(output.contains("2 suggestion(s) found"));
    assert!(output.contains("[WARN] select-star at 1:8"));
    assert!(output.contains("[CRITICAL] missing-where at 1:15"));
    assert!(!output.contains("Optimized SQL:"));
    assert!(!output.contains("Summary:"));
}

#[test]
fn test_text_output_clean_query() {
    let output = format_results(
        &reports("SELECT id FROM users WHERE id = 1"),
        &options(OutputFormat::Text)
    );
    assert!(output.contains("No anti-patterns found"));
}

#[test]
fn test_text_output_shows_rewrite() {
    let sql = "SELECT id FROM orders WHERE YEAR(created_at) = 2024";
    let output = format_results(&reports(sql), &options(OutputFormat::Text));
    assert!(output.contains("(rewrite applied)"));
    assert!(output.contains("Optimized SQL:"));
    assert!(output.contains("created_at >= '2024-01-01'"));
}

#[test]
fn test_verbose_always_prints_optimized_sql() {
    let opts = OutputOptions {
        verbose: true,
        ..options(OutputFormat::Text)
    };
    let output = format_results(&reports("SELECT * FROM orders"), &opts);
    assert!(output.contains("Optimized SQL:"));
}

#[test]
fn test_text_output_parse_failure() {
    let output = format_results(
        &reports("SELECT 1;\nSELECT FROM WHERE"),
        &options(OutputFormat::Text)
    );
    assert!(output.contains("Statement #2:"));
    assert!(output.contains("Could not parse your SQL at line 1"));
    assert!(output.contains("Summary: 2 statement(s), 1 failed"));
}

#[test]
fn test_text_output_rejected_input() {
    let sql = "SELECT 100";
    let outcomes = vec![StatementOutcome {
        span:   Span::new(0, sql.len()),
        result: Err(AnalyzerError::QueryTooLong {
            length: 10,
            max:    5
        })
    }];
    let output = format_results(
        &StatementReport::from_outcomes(sql, outcomes),
        &options(OutputFormat::Text)
    );
    assert!(output.contains("Rejected: query is 10 characters long"));
}

#[test]
fn test_colored_output_differs() {
    let report = reports("SELECT * FROM orders");
    let plain = format_results(&report, &options(OutputFormat::Text));
    colored::control::set_override(true);
    let colored = format_results(
        &report,
        &OutputOptions {
            colored: true,
            ..options(OutputFormat::Text)
        }
    );
    colored::control::unset_override();
    assert_ne!(plain, colored);
    assert!(colored.contains("\u{1b}["));
}

#[test]
fn test_colored_rule_list_stays_aligned() {
    let rules = RuleSet::default();
    colored::control::set_override(true);
    let text = format_rule_list(
        &rules,
        &OutputOptions {
            colored: true,
            ..options(OutputFormat::Text)
        }
    );
    colored::control::unset_override();
    let plain = format_rule_list(&rules, &options(OutputFormat::Text));
    assert!(text.contains("\u{1b}["));
    assert_eq!(strip_ansi(&text), plain);
}

fn strip_ansi(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            chars.by_ref().find(|&c| c == 'm');
        } else {
            out.push(c);
        }
    }
    out
}

#[test]
fn test_json_output() {
    let output = format_results(
        &reports("SELECT * FROM orders; SELECT FROM WHERE"),
        &options(OutputFormat::Json)
    );
    let json: serde_json::Value = serde_json::from_str(&output).unwrap();

    let first = &json["statements"][0];
    assert_eq!(first["index"], 1);
    assert_eq!(first["status"], "analyzed");
    assert_eq!(first["original_sql"], "SELECT * FROM orders");
    assert_eq!(first["findings"][0]["rule_id"], "select-star");
    assert_eq!(first["findings"][1]["severity"], "critical");

    let second = &json["statements"][1];
    assert_eq!(second["status"], "failed");
    assert_eq!(second["reason"], "parse");
    assert!(second["position"]["line"].is_number());

    assert_eq!(json["summary"]["statements"], 2);
    assert_eq!(json["summary"]["failed"], 1);
    assert_eq!(json["summary"]["critical"], 1);
}

#[test]
fn test_yaml_output() {
    let output = format_results(&reports("SELECT * FROM orders"), &options(OutputFormat::Yaml));
    let yaml: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();
    assert_eq!(yaml["statements"][0]["findings"][0]["rule_id"].as_str(), Some("select-star"));
    assert_eq!(yaml["summary"]["warnings"].as_u64(), Some(1));
}

#[test]
fn test_summary_counts() {
    let catalog = Catalog::parse(
        "CREATE TABLE users (id INT PRIMARY KEY, name TEXT)",
        SqlDialect::Generic
    )
    .unwrap();
    let analyzer = Analyzer::default().with_catalog(catalog);
    let sql = "SELECT DISTINCT id FROM users; SELECT id FROM users WHERE id = 1; \
               SELECT FROM WHERE";
    let outcomes = analyzer.analyze_script(sql).unwrap();
    let summary = Summary::of(&StatementReport::from_outcomes(sql, outcomes));
    assert_eq!(summary.statements, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rewritten, 1);
    assert_eq!(summary.critical, 1);
    assert_eq!(summary.info, 1);
    assert_eq!(summary.findings(), 2);
}

#[test]
fn test_report_locations_are_script_offsets() {
    let sql = "SELECT 1;  SELECT 2";
    let reports = reports(sql);
    assert_eq!(reports[1].location.start, 11);
    assert_eq!(reports[1].location.end, sql.len());
}

#[test]
fn test_rule_list_formats() {
    let rules = RuleSet::default();
    let text = format_rule_list(&rules, &options(OutputFormat::Text));
    assert_eq!(text.lines().count(), rules.len());
    assert!(text.contains("implicit-cross-join"));

    let json: serde_json::Value =
        serde_json::from_str(&format_rule_list(&rules, &options(OutputFormat::Json))).unwrap();
    assert_eq!(json.as_array().unwrap().len(), rules.len());
    assert_eq!(json[0]["id"], "select-star");
    assert_eq!(json[0]["severity"], "warning");
    assert_eq!(json[0]["category"], "Style");
}
