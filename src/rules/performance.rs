use super::{Finding, RewriteHint, Rule, RuleCategory, RuleInfo, Severity};
use crate::ast::{
    Clause, CompareOp, DmlKind, Expr, FunctionCall, LiteralKind, Node, NodeKind, PredicateKind,
    SetOperator, Span, TableRef, Visit
};

/// Full scan: `FROM` without `WHERE` or `LIMIT`, or `UPDATE`/`DELETE`
/// without `WHERE`
pub struct MissingWhere;

impl Rule for MissingWhere {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "missing-where",
            name:       "Missing WHERE clause",
            severity:   Severity::Critical,
            category:   RuleCategory::Performance,
            applies_to: &[NodeKind::Select, NodeKind::Dml]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        let info = self.info();
        match visit.node {
            Node::Select(select) => {
                // Selects nested in predicates or the select list are driven
                // by the outer query.
                if !matches!(visit.clause, Clause::Statement | Clause::With | Clause::From)
                    || select.from.is_empty()
                    || select.has_where_clause()
                    || select.is_bounded()
                    || select.is_aggregate_only()
                {
                    return vec![];
                }
                let span = from_span(&select.from);
                vec![info.finding(
                    span,
                    format!(
                        "reads every row of {} without a WHERE clause or LIMIT",
                        table_list(&select.from)
                    )
                )]
            }
            Node::Dml(dml) if dml.selection.is_none() => {
                let verb = match dml.kind {
                    DmlKind::Update => "updates",
                    DmlKind::Delete => "deletes"
                };
                vec![info.finding(
                    dml.span,
                    format!(
                        "{} without WHERE {} every row of {}",
                        dml.kind.as_str(),
                        verb,
                        table_list(&dml.tables)
                    )
                )]
            }
            _ => vec![]
        }
    }
}

/// Column wrapped in a function or arithmetic inside a filter
pub struct NonSargablePredicate;

impl Rule for NonSargablePredicate {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "non-sargable-predicate",
            name:       "Function on filtered column",
            severity:   Severity::Warning,
            category:   RuleCategory::Performance,
            applies_to: &[NodeKind::Predicate]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        if !matches!(visit.clause, Clause::Where | Clause::Join) {
            return vec![];
        }
        let Node::Expr(Expr::Predicate(predicate)) = visit.node else {
            return vec![];
        };
        let info = self.info();
        let operands: Vec<&Expr> = match &predicate.kind {
            PredicateKind::Compare {
                left,
                right,
                ..
            } => vec![left, right],
            PredicateKind::Like {
                expr, ..
            }
            | PredicateKind::InList {
                expr, ..
            }
            | PredicateKind::Between {
                expr, ..
            } => vec![expr],
            _ => vec![]
        };
        let Some(wrapped) = operands.into_iter().find(|e| wraps_column(e)) else {
            return vec![];
        };
        let description = match wrapped.unnested() {
            Expr::Function(f) => format!("{}(...)", f.base_name()),
            _ => "an expression".to_string()
        };
        let finding = info.finding(
            wrapped.span(),
            format!("column is wrapped in {} so an index on it cannot be used", description)
        );
        match year_range_rewrite(&predicate.kind) {
            Some(replacement) => vec![finding.with_hint(RewriteHint::Replace {
                span: predicate.span,
                replacement
            })],
            None => vec![finding]
        }
    }
}

fn wraps_column(expr: &Expr) -> bool {
    match expr.unnested() {
        Expr::Function(f) => !f.is_aggregate() && f.args.iter().any(Expr::references_columns),
        Expr::Arithmetic {
            ..
        } => expr.references_columns(),
        _ => false
    }
}

/// `YEAR(col) = 2024` → `(col >= '2024-01-01' AND col < '2025-01-01')`
fn year_range_rewrite(kind: &PredicateKind) -> Option<String> {
    let PredicateKind::Compare {
        op: CompareOp::Eq,
        left,
        right
    } = kind
    else {
        return None;
    };
    let (call, year) = match (left.unnested(), right.unnested()) {
        (Expr::Function(f), Expr::Literal(l)) | (Expr::Literal(l), Expr::Function(f)) => (f, l),
        _ => return None
    };
    let column = year_argument(call)?;
    if year.kind != LiteralKind::Number {
        return None;
    }
    let year = year.as_integer().filter(|y| (1..9999).contains(y))?;
    Some(format!(
        "({col} >= '{from:04}-01-01' AND {col} < '{to:04}-01-01')",
        col = column,
        from = year,
        to = year + 1
    ))
}

fn year_argument(call: &FunctionCall) -> Option<&str> {
    if call.base_name() != "YEAR" || call.args.len() != 1 {
        return None;
    }
    call.args[0].as_column().map(|c| c.text.as_str())
}

/// `LIKE '%...'` cannot use a b-tree index
pub struct LeadingWildcard;

impl Rule for LeadingWildcard {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "leading-wildcard",
            name:       "Leading wildcard in LIKE",
            severity:   Severity::Warning,
            category:   RuleCategory::Performance,
            applies_to: &[NodeKind::Predicate]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        let Node::Expr(Expr::Predicate(predicate)) = visit.node else {
            return vec![];
        };
        let PredicateKind::Like {
            pattern, ..
        } = &predicate.kind
        else {
            return vec![];
        };
        match pattern.as_literal() {
            Some(lit) if lit.kind == LiteralKind::String && lit.value.starts_with('%') => {
                vec![self.info().finding(
                    predicate.span,
                    format!("pattern {} starts with a wildcard", lit.text)
                )]
            }
            _ => vec![]
        }
    }
}

const LARGE_OFFSET: i64 = 1000;

/// Large `OFFSET` still reads and discards every skipped row
pub struct LargeOffset;

impl Rule for LargeOffset {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "large-offset",
            name:       "Large OFFSET",
            severity:   Severity::Warning,
            category:   RuleCategory::Performance,
            applies_to: &[NodeKind::Literal]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        if visit.clause != Clause::Offset
            || !matches!(visit.parent, Some(Node::Select(_) | Node::Query(_)))
        {
            return vec![];
        }
        let Node::Expr(Expr::Literal(lit)) = visit.node else {
            return vec![];
        };
        match lit.as_integer() {
            Some(offset) if offset > LARGE_OFFSET => vec![self.info().finding(
                lit.span,
                format!("OFFSET {} skips rows by reading them", offset)
            )],
            _ => vec![]
        }
    }
}

/// Subquery evaluated per output row
pub struct ScalarSubquery;

impl Rule for ScalarSubquery {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "scalar-subquery",
            name:       "Scalar subquery in SELECT",
            severity:   Severity::Warning,
            category:   RuleCategory::Performance,
            applies_to: &[NodeKind::Subquery]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        if visit.clause != Clause::Projection {
            return vec![];
        }
        let Node::Expr(Expr::Subquery(subquery)) = visit.node else {
            return vec![];
        };
        vec![self.info().finding(
            subquery.span,
            "subquery in the select list may run once per returned row"
        )]
    }
}

/// `UNION` sorts to remove duplicates
pub struct UnionWithoutAll;

impl Rule for UnionWithoutAll {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "union-without-all",
            name:       "UNION without ALL",
            severity:   Severity::Info,
            category:   RuleCategory::Performance,
            applies_to: &[NodeKind::SetOperation]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        match visit.node {
            Node::SetOperation(op) if op.op == SetOperator::Union && !op.all => {
                vec![self.info().finding(
                    op.keyword,
                    "UNION removes duplicates, which needs a sort or hash of both inputs"
                )]
            }
            _ => vec![]
        }
    }
}

fn from_span(tables: &[TableRef]) -> Span {
    tables
        .iter()
        .map(TableRef::full_span)
        .reduce(|a, b| a.join(b))
        .unwrap_or_default()
}

fn table_list(tables: &[TableRef]) -> String {
    let names: Vec<&str> = tables
        .iter()
        .map(|t| t.table_name().or(t.alias.as_deref()).unwrap_or("(subquery)"))
        .collect();
    names.join(", ")
}
