//! Human-readable suggestion text.
//!
//! Each rule id maps to a fixed title and a piece of advice; the finding's
//! own message supplies the detail. Unknown ids fall back to a generic
//! template, so formatting never fails.

use crate::rules::Finding;

/// Message template for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub title:  &'static str,
    pub advice: &'static str
}

const FALLBACK: Template = Template {
    title:  "Possible anti-pattern",
    advice: "Review this part of the query."
};

/// Template registered for `rule_id`.
pub fn template(rule_id: &str) -> Option<Template> {
    let (title, advice) = match rule_id {
        "select-star" => (
            "Avoid SELECT *",
            "List the columns you need so the query reads less data and keeps working when \
             the table changes."
        ),
        "redundant-distinct" => (
            "Redundant DISTINCT",
            "Drop DISTINCT; the rows are already unique and deduplication costs a sort or hash."
        ),
        "missing-where" => (
            "Unfiltered scan",
            "Add a WHERE clause or a LIMIT unless reading or changing every row is intended."
        ),
        "implicit-cross-join" => (
            "Implicit cross join",
            "Join the tables with an explicit JOIN ... ON condition; without one every row is \
             paired with every other row."
        ),
        "non-sargable-predicate" => (
            "Non-sargable predicate",
            "Compare the bare column against a transformed constant or range so an index can \
             be used."
        ),
        "leading-wildcard" => (
            "Leading wildcard",
            "Anchor the pattern at the start or use a full-text index."
        ),
        "or-to-in" => ("OR chain", "Combine the equality checks into a single IN list."),
        "large-offset" => (
            "Large OFFSET",
            "Use keyset pagination (WHERE id > last_seen ORDER BY id LIMIT n)."
        ),
        "not-in-subquery" => (
            "NOT IN with subquery",
            "Use NOT EXISTS, which handles NULLs the way most people expect."
        ),
        "union-without-all" => (
            "UNION without ALL",
            "Use UNION ALL when duplicates are impossible or acceptable."
        ),
        "scalar-subquery" => (
            "Scalar subquery",
            "Rewrite the subquery as a JOIN so it is evaluated once."
        ),
        _ => return None
    };
    Some(Template {
        title,
        advice
    })
}

/// `"{title}: {message}. {advice}"`.
///
/// ```
/// use sqlgenie::{
///     ast::Span,
///     rules::{Finding, Severity},
///     suggest
/// };
///
/// let finding = Finding {
///     rule_id:      "large-offset",
///     severity:     Severity::Warning,
///     span:         Span::new(30, 35),
///     message:      "OFFSET 50000 skips rows by reading them".into(),
///     rewrite_hint: None
/// };
///
/// assert!(suggest::format(&finding).starts_with("Large OFFSET: OFFSET 50000"));
/// ```
pub fn format(finding: &Finding) -> String {
    let template = template(finding.rule_id).unwrap_or(FALLBACK);
    let detail = finding.message.trim().trim_end_matches('.');
    if detail.is_empty() {
        format!("{}. {}", template.title, template.advice)
    } else {
        format!("{}: {}. {}", template.title, detail, template.advice)
    }
}
