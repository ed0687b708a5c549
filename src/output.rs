//! Rendering analysis results as text, JSON or YAML.

use colored::Colorize;
use serde::Serialize;

use crate::{
    analyzer::{AnalysisResult, Location, StatementOutcome, Suggestion},
    ast::SourceMap,
    error::{AnalyzerError, SourcePosition},
    rewrite::RewriteStatus,
    rules::{RuleSet, Severity}
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    /// Also print the rewritten query when nothing changed
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Result of one statement of the input, ready for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct StatementReport {
    /// 1-based position in the input
    pub index:    usize,
    /// Byte range of the statement in the input
    pub location: Location,
    #[serde(flatten)]
    pub outcome:  Outcome
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Analyzed(AnalysisResult),
    Failed {
        sql:      String,
        reason:   FailureReason,
        error:    String,
        /// Where parsing stopped, relative to the statement
        position: Option<SourcePosition>
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Not valid SQL
    Parse,
    /// Rejected before parsing (empty, too long)
    Input
}

impl StatementReport {
    /// Convert analyzer outcomes, keeping input order.
    pub fn from_outcomes(source: &str, outcomes: Vec<StatementOutcome>) -> Vec<Self> {
        outcomes
            .into_iter()
            .enumerate()
            .map(|(idx, outcome)| Self::new(idx + 1, source, outcome))
            .collect()
    }

    fn new(index: usize, source: &str, outcome: StatementOutcome) -> Self {
        let outcome_kind = match outcome.result {
            Ok(result) => Outcome::Analyzed(result),
            Err(err) => Outcome::Failed {
                sql:      outcome.span.slice(source).unwrap_or_default().to_string(),
                reason:   match err {
                    AnalyzerError::Parse(_) => FailureReason::Parse,
                    _ => FailureReason::Input
                },
                position: err.as_parse_error().and_then(|e| e.position),
                error:    failure_message(&err)
            }
        };
        Self {
            index,
            location: outcome.span.into(),
            outcome: outcome_kind
        }
    }

    pub fn findings(&self) -> &[Suggestion] {
        match &self.outcome {
            Outcome::Analyzed(result) => &result.findings,
            Outcome::Failed {
                ..
            } => &[]
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

fn failure_message(err: &AnalyzerError) -> String {
    match err {
        AnalyzerError::Parse(e) => e.message.clone(),
        other => other.to_string()
    }
}

/// Counts over all statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub statements: usize,
    pub failed:     usize,
    pub rewritten:  usize,
    pub critical:   usize,
    pub warnings:   usize,
    pub info:       usize
}

impl Summary {
    pub fn of(reports: &[StatementReport]) -> Self {
        let mut summary = Self {
            statements: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match &report.outcome {
                Outcome::Failed {
                    ..
                } => summary.failed += 1,
                Outcome::Analyzed(result) if result.is_rewritten() => summary.rewritten += 1,
                Outcome::Analyzed(_) => {}
            }
            for finding in report.findings() {
                match finding.severity {
                    Severity::Critical => summary.critical += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Info => summary.info += 1
                }
            }
        }
        summary
    }

    pub fn findings(&self) -> usize {
        self.critical + self.warnings + self.info
    }
}

#[derive(Serialize)]
struct Document<'a> {
    statements: &'a [StatementReport],
    summary:    Summary
}

/// Format every statement report based on output options
pub fn format_results(reports: &[StatementReport], opts: &OutputOptions) -> String {
    let document = Document {
        statements: reports,
        summary:    Summary::of(reports)
    };
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(&document).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(&document).unwrap_or_default(),
        OutputFormat::Text => format_text(reports, &document.summary, opts)
    }
}

fn paint(
    text: &str,
    opts: &OutputOptions,
    style: impl Fn(&str) -> colored::ColoredString
) -> String {
    if opts.colored {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

fn severity_label(severity: Severity, opts: &OutputOptions) -> String {
    let label = format!("[{}]", severity);
    match severity {
        Severity::Critical => paint(&label, opts, |s| s.red().bold()),
        Severity::Warning => paint(&label, opts, |s| s.yellow().bold()),
        Severity::Info => paint(&label, opts, |s| s.blue())
    }
}

fn format_text(reports: &[StatementReport], summary: &Summary, opts: &OutputOptions) -> String {
    let mut out = paint("=== SQL Anti-Pattern Analysis ===", opts, |s| s.bold());
    out.push_str("\n\n");

    for report in reports {
        let header = format!("Statement #{}:", report.index);
        out.push_str(&paint(&header, opts, |s| s.cyan().bold()));
        out.push('\n');
        match &report.outcome {
            Outcome::Failed {
                sql,
                reason,
                error,
                position
            } => {
                out.push_str(&format!("  {}\n", sql.trim()));
                let location = position
                    .map(|p| format!(" at line {}, column {}", p.line, p.column))
                    .unwrap_or_default();
                let line = match reason {
                    FailureReason::Parse => {
                        format!("  Could not parse your SQL{}: {}", location, error)
                    }
                    FailureReason::Input => format!("  Rejected: {}", error)
                };
                out.push_str(&paint(&line, opts, |s| s.red()));
                out.push('\n');
            }
            Outcome::Analyzed(result) => format_analyzed(&mut out, result, opts)
        }
        out.push('\n');
    }

    if reports.len() > 1 {
        out.push_str(&format!(
            "Summary: {} statement(s), {} failed, {} critical, {} warning(s), {} info\n",
            summary.statements, summary.failed, summary.critical, summary.warnings, summary.info
        ));
    }
    out
}

fn format_analyzed(out: &mut String, result: &AnalysisResult, opts: &OutputOptions) {
    out.push_str(&format!("  {}\n", result.original_sql.trim()));
    if result.findings.is_empty() {
        out.push_str(&paint("  No anti-patterns found", opts, |s| s.green()));
        out.push('\n');
        return;
    }
    out.push_str(&format!("  {} suggestion(s) found\n", result.findings.len()));

    let map = SourceMap::new(&result.original_sql);
    for finding in &result.findings {
        let position = map
            .position_of(finding.location.start)
            .map(|p| format!("{}:{}", p.line, p.column))
            .unwrap_or_else(|| finding.location.start.to_string());
        out.push_str(&format!(
            "  {} {} at {}\n    {}\n",
            severity_label(finding.severity, opts),
            finding.rule_id,
            position,
            finding.message
        ));
        match finding.rewrite {
            RewriteStatus::Applied => out.push_str("    (rewrite applied)\n"),
            RewriteStatus::NotApplied => {
                out.push_str("    (rewrite not applied: conflicts with a stronger edit)\n")
            }
            RewriteStatus::Advisory => {}
        }
    }

    if result.is_rewritten() || opts.verbose {
        out.push_str(&paint("  Optimized SQL:", opts, |s| s.green().bold()));
        out.push_str(&format!("\n    {}\n", result.optimized_sql.trim()));
    }
}

/// Table of the rules in `rules` for `sqlgenie rules`
pub fn format_rule_list(rules: &RuleSet, opts: &OutputOptions) -> String {
    #[derive(Serialize)]
    struct RuleEntry {
        id:       &'static str,
        name:     &'static str,
        severity: Severity,
        category: String
    }

    let entries: Vec<RuleEntry> = rules
        .rules()
        .iter()
        .map(|rule| {
            let info = rule.info();
            RuleEntry {
                id:       info.id,
                name:     info.name,
                severity: info.severity,
                category: info.category.to_string()
            }
        })
        .collect();

    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(&entries).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(&entries).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = String::new();
            for entry in &entries {
                out.push_str(&format!(
                    "{} {:<10} {:<12} {}\n",
                    paint(&format!("{:<24}", entry.id), opts, |s| s.bold()),
                    entry.severity.to_string(),
                    entry.category,
                    entry.name
                ));
            }
            out
        }
    }
}
