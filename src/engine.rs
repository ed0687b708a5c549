//! Rule engine.
//!
//! One depth-first traversal of the tree; every rule runs on the nodes of
//! the kinds it declared. Node evaluation is spread over the [`rayon`] pool
//! and collected in traversal order, then sorted by
//! `(span.start, severity desc, rule_id)` so the result does not depend on
//! rule registration order or scheduling.
//!
//! ```
//! use sqlgenie::{
//!     ast::{Ast, SqlDialect},
//!     engine,
//!     rules::{RuleSet, Severity}
//! };
//!
//! let ast = Ast::parse("SELECT * FROM orders", SqlDialect::Generic).unwrap();
//! let findings = engine::analyze(&ast, &RuleSet::default());
//!
//! let ids: Vec<_> = findings.iter().map(|f| f.rule_id).collect();
//! assert_eq!(ids, ["select-star", "missing-where"]);
//! assert_eq!(findings[1].severity, Severity::Critical);
//! ```

use rayon::prelude::*;

use crate::{
    ast::{Ast, Visit},
    error::InvariantViolation,
    rules::{Finding, RuleSet}
};

/// Run `rules` over `ast`.
///
/// Holds no state between calls; concurrent calls on different trees are
/// independent.
pub fn analyze(ast: &Ast, rules: &RuleSet) -> Vec<Finding> {
    let visits: Vec<Visit<'_>> = ast.walk().collect();
    let source = ast.source();

    let mut findings: Vec<Finding> = visits
        .par_iter()
        .flat_map_iter(|visit| {
            rules
                .rules()
                .iter()
                .filter(|rule| rule.applies_to(visit.kind()))
                .flat_map(move |rule| rule.evaluate(visit))
        })
        .filter(|finding| {
            if finding.span.fits(source) {
                return true;
            }
            InvariantViolation::FindingOutOfBounds {
                rule_id: finding.rule_id,
                span:    finding.span,
                len:     source.len()
            }
            .report();
            false
        })
        .collect();

    sort_findings(&mut findings);
    tracing::debug!(
        nodes = visits.len(),
        rules = rules.len(),
        findings = findings.len(),
        "analysis finished"
    );
    findings
}

/// Stable sort by `(span.start, severity desc, rule_id)`.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| b.severity.cmp(&a.severity))
            .then_with(|| a.rule_id.cmp(b.rule_id))
    });
}
