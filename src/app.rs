//! Application logic for the sqlgenie CLI.
//!
//! This module contains the core application logic separated from the main
//! entry point to enable testing.

use std::{
    fs::read_to_string,
    io::{self, Read}
};

use crate::{
    analyzer::Analyzer,
    ast::SqlDialect,
    catalog::Catalog,
    cli::{Dialect, Format, SeverityArg},
    config::Config,
    error::{AnalyzerError, AppResult, file_read_error, schema_parse_error},
    output::{
        OutputFormat, OutputOptions, StatementReport, format_results, format_rule_list
    },
    rules::{RuleSet, Severity}
};

/// Exit code when some input could not be analyzed.
pub const EXIT_FAILURE: i32 = 3;

/// Parameters for the analyze command
#[derive(Debug, Clone)]
pub struct AnalyzeParams {
    /// Queries file, or "-" for stdin
    pub queries_path:     Option<String>,
    /// Inline SQL; wins over `queries_path`
    pub sql:              Option<String>,
    pub schema_path:      Option<String>,
    pub dialect:          Option<Dialect>,
    pub output_format:    Format,
    pub rules:            Option<Vec<String>>,
    pub disable:          Vec<String>,
    pub min_severity:     Option<SeverityArg>,
    pub max_query_length: Option<usize>,
    pub verbose:          bool,
    pub no_color:         bool
}

impl Default for AnalyzeParams {
    fn default() -> Self {
        Self {
            queries_path:     None,
            sql:              None,
            schema_path:      None,
            dialect:          None,
            output_format:    Format::Text,
            rules:            None,
            disable:          Vec::new(),
            min_severity:     None,
            max_query_length: None,
            verbose:          false,
            no_color:         true
        }
    }
}

/// Rendered output and the process exit code
#[derive(Debug, Clone)]
pub struct AnalyzeResult {
    pub exit_code: i32,
    pub output:    String
}

/// Convert CLI dialect to internal SqlDialect
pub fn convert_dialect(dialect: Dialect) -> SqlDialect {
    match dialect {
        Dialect::Generic => SqlDialect::Generic,
        Dialect::Mysql => SqlDialect::MySQL,
        Dialect::Postgresql => SqlDialect::PostgreSQL,
        Dialect::Sqlite => SqlDialect::SQLite,
        Dialect::Clickhouse => SqlDialect::ClickHouse
    }
}

/// Convert CLI format to internal OutputFormat
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

pub fn convert_severity(severity: SeverityArg) -> Severity {
    match severity {
        SeverityArg::Info => Severity::Info,
        SeverityArg::Warning => Severity::Warning,
        SeverityArg::Critical => Severity::Critical
    }
}

/// Calculate exit code from the reported findings
///
/// - `0` - no findings, or informational only
/// - `1` - at least one warning
/// - `2` - at least one critical finding
/// - `3` - at least one statement could not be analyzed
pub fn calculate_exit_code(reports: &[StatementReport]) -> i32 {
    if reports.iter().any(StatementReport::is_failed) {
        return EXIT_FAILURE;
    }
    let highest = reports
        .iter()
        .flat_map(StatementReport::findings)
        .map(|f| f.severity)
        .max();
    match highest {
        Some(Severity::Critical) => 2,
        Some(Severity::Warning) => 1,
        Some(Severity::Info) | None => 0
    }
}

/// Read queries from file or stdin
pub fn read_queries_input(path: &str) -> AppResult<String> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(path, e))
    }
}

/// Create output options from parameters
pub fn create_output_options(format: Format, no_color: bool, verbose: bool) -> OutputOptions {
    OutputOptions {
        format: convert_format(format),
        colored: !no_color,
        verbose
    }
}

/// Layer command-line flags over the loaded configuration
pub fn apply_cli_overrides(mut config: Config, params: &AnalyzeParams) -> Config {
    if let Some(dialect) = params.dialect {
        config.analyzer.dialect = convert_dialect(dialect);
    }
    if let Some(max) = params.max_query_length {
        config.analyzer.max_query_length = max;
    }
    if let Some(severity) = params.min_severity {
        config.rules.min_severity = convert_severity(severity);
    }
    if let Some(rules) = &params.rules {
        config.rules.enabled = Some(rules.clone());
    }
    config.rules.disabled.extend(params.disable.iter().cloned());
    config
}

fn load_catalog(path: &str, dialect: SqlDialect) -> AppResult<Catalog> {
    let ddl = read_to_string(path).map_err(|e| file_read_error(path, e))?;
    Catalog::parse(&ddl, dialect).map_err(|e| schema_parse_error(&e))
}

/// Run the analyze command
pub fn run_analyze(params: AnalyzeParams, config: Config) -> AppResult<AnalyzeResult> {
    let sql = match (&params.sql, &params.queries_path) {
        (Some(sql), _) => sql.clone(),
        (None, Some(path)) => read_queries_input(path)?,
        (None, None) => return Err(AnalyzerError::EmptyQuery.into())
    };
    let config = apply_cli_overrides(config, &params);
    let catalog = params
        .schema_path
        .as_deref()
        .map(|path| load_catalog(path, config.analyzer.dialect))
        .transpose()?;
    let analyzer = Analyzer::from_config(&config, catalog)?;

    let outcomes = analyzer.analyze_script(&sql)?;
    if outcomes.is_empty() {
        return Err(AnalyzerError::EmptyQuery.into());
    }
    let reports = StatementReport::from_outcomes(&sql, outcomes);
    let output_opts = create_output_options(params.output_format, params.no_color, params.verbose);
    Ok(AnalyzeResult {
        exit_code: calculate_exit_code(&reports),
        output:    format_results(&reports, &output_opts)
    })
}

/// Run the rules command
pub fn run_rules(format: Format) -> String {
    let opts = create_output_options(format, true, false);
    format_rule_list(&RuleSet::default(), &opts)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn params(sql: &str) -> AnalyzeParams {
        AnalyzeParams {
            sql: Some(sql.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_convert_dialect() {
        assert_eq!(convert_dialect(Dialect::Generic), SqlDialect::Generic);
        assert_eq!(convert_dialect(Dialect::Mysql), SqlDialect::MySQL);
        assert_eq!(convert_dialect(Dialect::Postgresql), SqlDialect::PostgreSQL);
        assert_eq!(convert_dialect(Dialect::Sqlite), SqlDialect::SQLite);
        assert_eq!(convert_dialect(Dialect::Clickhouse), SqlDialect::ClickHouse);
    }

    #[test]
    fn test_convert_format() {
        assert_eq!(convert_format(Format::Text), OutputFormat::Text);
        assert_eq!(convert_format(Format::Json), OutputFormat::Json);
        assert_eq!(convert_format(Format::Yaml), OutputFormat::Yaml);
    }

    #[test]
    fn test_exit_code_clean_query() {
        let result = run_analyze(params("SELECT id FROM users WHERE id = 1"), Config::default())
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("No anti-patterns found"));
    }

    #[test]
    fn test_exit_code_warning() {
        let result =
            run_analyze(params("SELECT * FROM users WHERE id = 1"), Config::default()).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_exit_code_critical() {
        let result = run_analyze(params("DELETE FROM users"), Config::default()).unwrap();
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn test_exit_code_parse_failure() {
        let result = run_analyze(params("SELECT FROM WHERE"), Config::default()).unwrap();
        assert_eq!(result.exit_code, EXIT_FAILURE);
        assert!(result.output.contains("Could not parse your SQL"));
    }

    #[test]
    fn test_min_severity_filters_exit_code() {
        let mut p = params("SELECT * FROM users WHERE id = 1");
        p.min_severity = Some(SeverityArg::Critical);
        let result = run_analyze(p, Config::default()).unwrap();
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut p = params("SELECT 1");
        p.dialect = Some(Dialect::Postgresql);
        p.max_query_length = Some(10);
        p.rules = Some(vec!["select-star".into()]);
        p.disable = vec!["or-to-in".into()];
        let config = apply_cli_overrides(Config::default(), &p);
        assert_eq!(config.analyzer.dialect, SqlDialect::PostgreSQL);
        assert_eq!(config.analyzer.max_query_length, 10);
        assert_eq!(config.rules.enabled, Some(vec!["select-star".to_string()]));
        assert_eq!(config.rules.disabled, ["or-to-in"]);
    }

    #[test]
    fn test_unknown_rule_is_error() {
        let mut p = params("SELECT 1");
        p.rules = Some(vec!["nope".into()]);
        assert!(run_analyze(p, Config::default()).is_err());
    }

    #[test]
    fn test_schema_enables_wildcard_expansion() {
        let mut schema = NamedTempFile::new().unwrap();
        writeln!(schema, "CREATE TABLE users (id INT PRIMARY KEY, name TEXT);").unwrap();
        let mut p = params("SELECT * FROM users WHERE id = 1");
        p.schema_path = Some(schema.path().to_string_lossy().into_owned());
        let result = run_analyze(p, Config::default()).unwrap();
        assert!(result.output.contains("SELECT id, name FROM users WHERE id = 1"));
    }

    #[test]
    fn test_read_queries_missing_file() {
        assert!(read_queries_input("/nonexistent/queries.sql").is_err());
    }

    #[test]
    fn test_run_rules_lists_every_rule() {
        let listing = run_rules(Format::Text);
        for id in RuleSet::default().ids() {
            assert!(listing.contains(id), "missing {id}");
        }
    }
}
