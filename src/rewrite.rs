//! Span-based rewrite generation.
//!
//! Findings that carry a [`RewriteHint`] become candidate edits against the
//! original text. Candidates that overlap are resolved by severity; the
//! survivors are applied in one left-to-right pass that copies untouched
//! text verbatim. The tree itself is never modified.
//!
//! ```
//! use sqlgenie::{
//!     ast::{Ast, SqlDialect},
//!     catalog::Catalog,
//!     engine, rewrite,
//!     rules::RuleSet
//! };
//!
//! let catalog = Catalog::parse(
//!     "CREATE TABLE orders (id INT PRIMARY KEY, total INT)",
//!     SqlDialect::Generic
//! )
//! .unwrap();
//! let ast = Ast::parse("SELECT * FROM orders LIMIT 10", SqlDialect::Generic).unwrap();
//! let findings = engine::analyze(&ast, &RuleSet::default());
//!
//! let result = rewrite::rewrite(&ast, &findings, Some(&catalog));
//! assert_eq!(result.sql, "SELECT id, total FROM orders LIMIT 10");
//! ```

use serde::Serialize;

use crate::{
    ast::{Ast, Span, TableBinding},
    catalog::Catalog,
    error::InvariantViolation,
    rules::{Finding, RewriteHint}
};

/// What happened to a finding's rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteStatus {
    /// The edit is part of the rewritten text
    Applied,
    /// An edit was possible but lost to an overlapping, stronger one
    NotApplied,
    /// No edit proposed or possible; the finding is advice only
    Advisory
}

/// One replacement of a source range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub span:        Span,
    pub replacement: String,
    pub rule_id:     &'static str,
    /// Index of the originating finding
    pub finding:     usize
}

/// Accepted edits plus the fate of every finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewritePlan {
    /// Non-overlapping, ordered by start
    pub edits:    Vec<Edit>,
    /// Indexed like the input findings
    pub statuses: Vec<RewriteStatus>
}

impl RewritePlan {
    /// Apply the edits to `source` in a single pass.
    ///
    /// Edits that do not cut `source` on character boundaries are skipped;
    /// plans built by [`plan`] for the same source never contain any.
    pub fn apply(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        for edit in &self.edits {
            let (Some(head), Some(_)) = (
                source.get(cursor..edit.span.start),
                edit.span.slice(source)
            ) else {
                continue;
            };
            out.push_str(head);
            out.push_str(&edit.replacement);
            cursor = edit.span.end;
        }
        out.push_str(source.get(cursor..).unwrap_or_default());
        out
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Mark everything advisory, e.g. after the rewritten text was rejected.
    pub fn discard(&mut self) {
        self.edits.clear();
        self.statuses.fill(RewriteStatus::Advisory);
    }
}

/// Rewritten text and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rewrite {
    pub plan: RewritePlan,
    pub sql:  String
}

/// Build the plan and apply it.
///
/// Pure: the same `(ast, findings, catalog)` always yields the same text.
/// Without edits the result equals the source verbatim.
pub fn rewrite(ast: &Ast, findings: &[Finding], catalog: Option<&Catalog>) -> Rewrite {
    let plan = plan(ast, findings, catalog);
    let sql = plan.apply(ast.source());
    Rewrite {
        plan,
        sql
    }
}

/// Compute candidate edits and resolve overlaps.
///
/// Among overlapping candidates the higher severity wins, then the earlier
/// start, then the lower rule id.
pub fn plan(ast: &Ast, findings: &[Finding], catalog: Option<&Catalog>) -> RewritePlan {
    let source = ast.source();
    let mut statuses = vec![RewriteStatus::Advisory; findings.len()];

    let mut candidates: Vec<Edit> = findings
        .iter()
        .enumerate()
        .filter_map(|(idx, finding)| {
            let hint = finding.rewrite_hint.as_ref()?;
            let replacement = candidate_text(ast, hint, catalog)?;
            let edit = Edit {
                span: hint.span(),
                replacement,
                rule_id: finding.rule_id,
                finding: idx
            };
            if edit.span.fits(source) {
                return Some(edit);
            }
            InvariantViolation::InvalidEdit {
                rule_id: edit.rule_id,
                span:    edit.span,
                len:     source.len()
            }
            .report();
            None
        })
        .collect();

    candidates.sort_by(|a, b| {
        let (fa, fb) = (&findings[a.finding], &findings[b.finding]);
        fb.severity
            .cmp(&fa.severity)
            .then_with(|| a.span.start.cmp(&b.span.start))
            .then_with(|| a.rule_id.cmp(b.rule_id))
            .then_with(|| a.finding.cmp(&b.finding))
    });

    let mut edits: Vec<Edit> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Some(winner) = edits.iter().find(|e| e.span.overlaps(&candidate.span)) {
            tracing::debug!(
                rule = candidate.rule_id,
                span = %candidate.span,
                kept = winner.rule_id,
                "edit overlaps a stronger edit, not applied"
            );
            statuses[candidate.finding] = RewriteStatus::NotApplied;
            continue;
        }
        statuses[candidate.finding] = RewriteStatus::Applied;
        edits.push(candidate);
    }
    edits.sort_by_key(|e| e.span.start);

    RewritePlan {
        edits,
        statuses
    }
}

fn candidate_text(ast: &Ast, hint: &RewriteHint, catalog: Option<&Catalog>) -> Option<String> {
    match hint {
        RewriteHint::RemoveDistinct {
            ..
        } => Some(String::new()),
        RewriteHint::Replace {
            replacement, ..
        } => Some(replacement.clone()),
        RewriteHint::ExpandWildcard {
            span,
            qualifier,
            sources
        } => {
            if !ast.text(*span).ends_with('*') {
                return None;
            }
            expand_wildcard(catalog?, qualifier.is_some(), sources)
        }
    }
}

/// Explicit column list for a wildcard, or `None` when any source table is
/// missing from the catalog.
fn expand_wildcard(
    catalog: &Catalog,
    qualified: bool,
    sources: &[TableBinding]
) -> Option<String> {
    let prefix = qualified || sources.len() > 1;
    let mut columns = Vec::new();
    for source in sources {
        let table = catalog.table(source.table.as_deref()?)?;
        let reference = source.reference_name()?;
        if table.columns.is_empty() {
            return None;
        }
        columns.extend(table.column_names().map(|column| {
            if prefix {
                format!("{}.{}", reference, column)
            } else {
                column.to_string()
            }
        }));
    }
    (!columns.is_empty()).then(|| columns.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::SqlDialect, rules::Severity};

    fn finding(rule_id: &'static str, severity: Severity, span: Span, text: &str) -> Finding {
        Finding {
            rule_id,
            severity,
            span,
            message: String::new(),
            rewrite_hint: Some(RewriteHint::Replace {
                span,
                replacement: text.to_string()
            })
        }
    }

    fn parse(sql: &str) -> Ast {
        Ast::parse(sql, SqlDialect::Generic).unwrap()
    }

    #[test]
    fn applies_edits_left_to_right() {
        let ast = parse("SELECT a, b FROM t");
        let findings = vec![
            finding("r2", Severity::Info, Span::new(10, 11), "bb"),
            finding("r1", Severity::Info, Span::new(7, 8), "aa"),
        ];
        let result = rewrite(&ast, &findings, None);
        assert_eq!(result.sql, "SELECT aa, bb FROM t");
        assert_eq!(result.plan.edits[0].rule_id, "r1");
        assert_eq!(result.plan.statuses, [RewriteStatus::Applied; 2]);
    }

    #[test]
    fn overlap_keeps_higher_severity() {
        let ast = parse("SELECT a FROM t");
        let findings = vec![
            finding("low", Severity::Info, Span::new(7, 8), "x"),
            finding("high", Severity::Critical, Span::new(7, 15), "y"),
        ];
        let result = rewrite(&ast, &findings, None);
        assert_eq!(result.sql, "SELECT y");
        assert_eq!(
            result.plan.statuses,
            [RewriteStatus::NotApplied, RewriteStatus::Applied]
        );
    }

    #[test]
    fn overlap_tie_prefers_earlier_start_then_rule_id() {
        let ast = parse("SELECT abc FROM t");
        let findings = vec![
            finding("b-rule", Severity::Warning, Span::new(8, 10), "x"),
            finding("z-rule", Severity::Warning, Span::new(7, 9), "y"),
            finding("a-rule", Severity::Warning, Span::new(7, 9), "z"),
        ];
        let plan = plan(&ast, &findings, None);
        assert_eq!(plan.edits.len(), 1);
        assert_eq!(plan.edits[0].rule_id, "a-rule");
    }

    #[test]
    fn adjacent_edits_do_not_conflict() {
        let ast = parse("SELECT ab FROM t");
        let findings = vec![
            finding("r1", Severity::Info, Span::new(7, 8), "1"),
            finding("r2", Severity::Info, Span::new(8, 9), "2"),
        ];
        assert_eq!(rewrite(&ast, &findings, None).sql, "SELECT 12 FROM t");
    }

    #[test]
    fn invalid_edits_are_dropped() {
        let ast = parse("SELECT 'é' FROM t");
        let findings = vec![
            finding("split", Severity::Critical, Span::new(8, 9), "x"),
            finding("outside", Severity::Critical, Span::new(5, 500), "x"),
        ];
        let result = rewrite(&ast, &findings, None);
        assert_eq!(result.sql, ast.source());
        assert_eq!(result.plan.statuses, [RewriteStatus::Advisory; 2]);
    }

    #[test]
    fn findings_without_hints_stay_advisory() {
        let ast = parse("SELECT a FROM t");
        let mut plain = finding("r", Severity::Info, Span::new(7, 8), "x");
        plain.rewrite_hint = None;
        let result = rewrite(&ast, &[plain], None);
        assert!(result.plan.is_empty());
        assert_eq!(result.sql, "SELECT a FROM t");
        assert_eq!(result.plan.statuses, [RewriteStatus::Advisory]);
    }

    #[test]
    fn discard_clears_edits() {
        let ast = parse("SELECT a FROM t");
        let mut plan = plan(
            &ast,
            &[finding("r", Severity::Info, Span::new(7, 8), "b")],
            None
        );
        plan.discard();
        assert!(plan.is_empty());
        assert_eq!(plan.statuses, [RewriteStatus::Advisory]);
        assert_eq!(plan.apply(ast.source()), "SELECT a FROM t");
    }
}
