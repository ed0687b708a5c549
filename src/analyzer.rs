//! End-to-end analysis of one query or a script.
//!
//! ```text
//! SQL ─▶ limits ─▶ Ast::parse ─▶ engine::analyze ─▶ rewrite ─▶ re-parse ─▶ AnalysisResult
//!                                                      │
//!                                                  suggest::format
//! ```
//!
//! ```
//! use sqlgenie::{
//!     analyzer::Analyzer,
//!     ast::SqlDialect,
//!     catalog::Catalog,
//!     rewrite::RewriteStatus
//! };
//!
//! let catalog = Catalog::parse(
//!     "CREATE TABLE users (id INT PRIMARY KEY, name TEXT)",
//!     SqlDialect::Generic
//! )
//! .unwrap();
//! let analyzer = Analyzer::default().with_catalog(catalog);
//!
//! let result = analyzer.analyze("SELECT DISTINCT id FROM users").unwrap();
//! assert_eq!(result.optimized_sql, "SELECT id FROM users");
//!
//! let distinct = result
//!     .findings
//!     .iter()
//!     .find(|f| f.rule_id == "redundant-distinct")
//!     .unwrap();
//! assert_eq!(distinct.rewrite, RewriteStatus::Applied);
//! ```

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    ast::{Ast, Span, SqlDialect, split_statements},
    catalog::Catalog,
    config::{Config, DEFAULT_MAX_QUERY_LENGTH},
    engine,
    error::{AnalyzerError, InvariantViolation},
    rewrite::{self, RewriteStatus},
    rules::{RuleSet, Severity},
    suggest
};

/// Request-independent settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Inputs longer than this many characters are rejected unparsed
    pub max_query_length: usize,
    /// Findings below this are computed but left out of the result
    pub min_severity:     Severity,
    pub dialect:          SqlDialect
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            min_severity:     Severity::Info,
            dialect:          SqlDialect::Generic
        }
    }
}

/// Byte range of a finding in the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub start: usize,
    pub end:   usize
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end:   span.end
        }
    }
}

/// One reported finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub rule_id:  &'static str,
    pub severity: Severity,
    /// Formatted suggestion text
    pub message:  String,
    pub location: Location,
    pub rewrite:  RewriteStatus
}

/// Outcome of analyzing one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub original_sql:  String,
    /// Equals `original_sql` when no edit was applied
    pub optimized_sql: String,
    pub findings:      Vec<Suggestion>
}

impl AnalysisResult {
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn is_rewritten(&self) -> bool {
        self.optimized_sql != self.original_sql
    }
}

/// Outcome of one statement of a script.
#[derive(Debug)]
pub struct StatementOutcome {
    /// Range of the statement in the script
    pub span:   Span,
    pub result: Result<AnalysisResult, AnalyzerError>
}

/// Immutable analyzer: rules, optional catalog and limits.
///
/// Shareable across threads; every call is independent.
#[derive(Debug, Default)]
pub struct Analyzer {
    rules:   RuleSet,
    catalog: Option<Arc<Catalog>>,
    options: AnalyzerOptions
}

impl Analyzer {
    pub fn new(rules: RuleSet, catalog: Option<Arc<Catalog>>, options: AnalyzerOptions) -> Self {
        Self {
            rules,
            catalog,
            options
        }
    }

    /// Build from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] for unknown rule ids or a
    /// zero length limit.
    pub fn from_config(config: &Config, catalog: Option<Catalog>) -> Result<Self, AnalyzerError> {
        if config.analyzer.max_query_length == 0 {
            return Err(AnalyzerError::configuration(
                "max_query_length must be greater than zero"
            ));
        }
        let catalog = catalog.map(Arc::new);
        let rules = RuleSet::from_config(&config.rules, catalog.clone())?;
        Ok(Self::new(
            rules,
            catalog,
            AnalyzerOptions {
                max_query_length: config.analyzer.max_query_length,
                min_severity:     config.rules.min_severity,
                dialect:          config.analyzer.dialect
            }
        ))
    }

    /// Attach table metadata; rebuilds the default rule set around it.
    pub fn with_catalog(self, catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            rules: RuleSet::all(Some(catalog.clone())),
            catalog: Some(catalog),
            options: self.options
        }
    }

    pub fn with_options(mut self, options: AnalyzerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Analyze a single statement.
    ///
    /// # Errors
    ///
    /// - [`AnalyzerError::EmptyQuery`] for blank input
    /// - [`AnalyzerError::QueryTooLong`] above `max_query_length` characters
    /// - [`AnalyzerError::Parse`] when the text is not exactly one valid
    ///   statement; no rule runs in that case
    pub fn analyze(&self, sql: &str) -> Result<AnalysisResult, AnalyzerError> {
        if sql.trim().is_empty() {
            return Err(AnalyzerError::EmptyQuery);
        }
        self.check_length(sql)?;

        let ast = Ast::parse(sql, self.options.dialect)?;
        let findings = engine::analyze(&ast, &self.rules);
        let mut rewritten = rewrite::rewrite(&ast, &findings, self.catalog.as_deref());

        if !rewritten.plan.is_empty()
            && let Err(e) = Ast::parse(&rewritten.sql, self.options.dialect)
        {
            InvariantViolation::RewriteUnparseable {
                message: e.message
            }
            .report();
            rewritten.plan.discard();
            rewritten.sql = sql.to_string();
        }

        let findings: Vec<Suggestion> = findings
            .iter()
            .zip(&rewritten.plan.statuses)
            .filter(|(finding, _)| finding.severity >= self.options.min_severity)
            .map(|(finding, status)| Suggestion {
                rule_id:  finding.rule_id,
                severity: finding.severity,
                message:  suggest::format(finding),
                location: finding.span.into(),
                rewrite:  *status
            })
            .collect();

        tracing::debug!(
            findings = findings.len(),
            edits = rewritten.plan.edits.len(),
            "query analyzed"
        );
        Ok(AnalysisResult {
            original_sql: sql.to_string(),
            optimized_sql: rewritten.sql,
            findings
        })
    }

    fn check_length(&self, sql: &str) -> Result<(), AnalyzerError> {
        let length = sql.chars().count();
        if length > self.options.max_query_length {
            return Err(AnalyzerError::QueryTooLong {
                length,
                max: self.options.max_query_length
            });
        }
        Ok(())
    }

    /// Split a script on top-level semicolons and analyze every statement.
    ///
    /// Statements run in parallel; results keep script order. A statement
    /// that fails does not stop the others.
    ///
    /// # Errors
    ///
    /// - [`AnalyzerError::QueryTooLong`] when the whole script exceeds
    ///   `max_query_length` characters; nothing is tokenized then
    /// - [`AnalyzerError::Parse`] when the script cannot be tokenized
    pub fn analyze_script(&self, sql: &str) -> Result<Vec<StatementOutcome>, AnalyzerError> {
        self.check_length(sql)?;
        let spans = split_statements(sql, self.options.dialect)?;
        Ok(spans
            .par_iter()
            .map(|span| StatementOutcome {
                span:   *span,
                result: self.analyze(span.slice(sql).unwrap_or_default())
            })
            .collect())
    }
}
