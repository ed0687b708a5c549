use std::sync::Arc;

use smallvec::SmallVec;

use super::{Finding, RewriteHint, Rule, RuleCategory, RuleInfo, Severity};
use crate::{
    ast::{
        Column, CompareOp, Expr, LogicalOp, Node, NodeKind, PredicateKind, SelectItem,
        SelectStatement, TableBinding, TableSource, Visit, last_segment
    },
    catalog::Catalog
};

/// `*` / `t.*` in the select list
pub struct SelectStar;

impl Rule for SelectStar {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "select-star",
            name:       "SELECT * usage",
            severity:   Severity::Warning,
            category:   RuleCategory::Style,
            applies_to: &[NodeKind::SelectItem]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        let Node::SelectItem(SelectItem::Wildcard {
            span,
            qualifier
        }) = visit.node
        else {
            return vec![];
        };
        let info = self.info();
        let target = qualifier
            .as_ref()
            .map_or_else(|| "every table in FROM".to_string(), |q| q.to_string());
        let finding = info.finding(
            *span,
            format!("wildcard reads every column of {}", target)
        );
        let Some(Node::Select(select)) = visit.parent else {
            return vec![finding];
        };
        let sources: SmallVec<[_; 4]> = select
            .table_bindings()
            .into_iter()
            .filter(|b| match qualifier {
                Some(q) => b
                    .reference_name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(q)),
                None => true
            })
            .collect();
        if sources.is_empty() {
            return vec![finding];
        }
        vec![finding.with_hint(RewriteHint::ExpandWildcard {
            span: *span,
            qualifier: qualifier.clone(),
            sources
        })]
    }
}

/// `DISTINCT` over rows that are already unique
pub struct RedundantDistinct {
    catalog: Option<Arc<Catalog>>
}

impl RedundantDistinct {
    pub fn new(catalog: Option<Arc<Catalog>>) -> Self {
        Self {
            catalog
        }
    }

    fn groups_are_projected(select: &SelectStatement) -> bool {
        if select.group_by.is_empty() {
            return false;
        }
        let bindings = select.table_bindings();
        let projected = projected_columns(select);
        select.group_by.iter().all(|expr| {
            expr.as_column().is_some_and(|col| {
                let owner = binding_of(&bindings, col);
                owner.is_some()
                    && projected.iter().any(|p| {
                        p.name.eq_ignore_ascii_case(&col.name) && binding_of(&bindings, p) == owner
                    })
            })
        })
    }

    fn covers_unique_key(&self, select: &SelectStatement) -> bool {
        let Some(catalog) = &self.catalog else {
            return false;
        };
        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return false;
        }
        let TableSource::Named {
            name
        } = &select.from[0].source
        else {
            return false;
        };
        let Some(table) = catalog.table(name) else {
            return false;
        };
        if select.is_select_star() {
            return table.has_unique_key();
        }
        let projected = projected_columns(select);
        let columns: Vec<&str> = projected.iter().map(|c| c.name.as_str()).collect();
        catalog.is_unique_key(name, &columns)
    }
}

impl Rule for RedundantDistinct {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "redundant-distinct",
            name:       "Redundant DISTINCT",
            severity:   Severity::Info,
            category:   RuleCategory::Style,
            applies_to: &[NodeKind::Select]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        let Node::Select(select) = visit.node else {
            return vec![];
        };
        let Some(distinct) = select.distinct.as_ref().filter(|d| !d.on) else {
            return vec![];
        };
        let reason = if Self::groups_are_projected(select) {
            "GROUP BY already makes every row unique"
        } else if self.covers_unique_key(select) {
            "the selected columns include a unique key"
        } else {
            return vec![];
        };
        let finding = self
            .info()
            .finding(distinct.span, format!("DISTINCT is redundant: {}", reason));
        match distinct.removal {
            Some(span) => vec![finding.with_hint(RewriteHint::RemoveDistinct {
                span
            })],
            None => vec![finding]
        }
    }
}

/// Plain column names in the select list, aliases ignored.
fn projected_columns(select: &SelectStatement) -> SmallVec<[&Column; 8]> {
    select
        .projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::Expr {
                expr, ..
            } => expr.as_column(),
            SelectItem::Wildcard {
                ..
            } => None
        })
        .collect()
}

/// Binding a column belongs to; unqualified columns resolve only when a
/// single relation is in scope.
fn binding_of(bindings: &[TableBinding], column: &Column) -> Option<usize> {
    match column.qualifier.as_deref() {
        Some(qualifier) => {
            let qualifier = last_segment(qualifier);
            bindings.iter().position(|b| {
                b.reference_name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(qualifier))
            })
        }
        None if bindings.len() == 1 => Some(0),
        None => None
    }
}

const MIN_OR_BRANCHES: usize = 3;

/// `a = 1 OR a = 2 OR a = 3` is clearer and often faster as `IN`
pub struct OrToIn;

impl Rule for OrToIn {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "or-to-in",
            name:       "OR chain instead of IN",
            severity:   Severity::Info,
            category:   RuleCategory::Style,
            applies_to: &[NodeKind::Logical]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        let Node::Expr(Expr::Logical(logical)) = visit.node else {
            return vec![];
        };
        let operands = &logical.operands;
        if logical.op != LogicalOp::Or || operands.len() < MIN_OR_BRANCHES {
            return vec![];
        }
        let mut column: Option<&str> = None;
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            let Some((col, value)) = equality_branch(operand) else {
                return vec![];
            };
            match column {
                Some(c) if !c.eq_ignore_ascii_case(col) => return vec![],
                _ => column = Some(col)
            }
            values.push(value);
        }
        let Some(column) = column else {
            return vec![];
        };
        let finding = self.info().finding(
            logical.span,
            format!("{} OR-ed equality checks on {}", operands.len(), column)
        );
        vec![finding.with_hint(RewriteHint::Replace {
            span:        logical.span,
            replacement: format!("{} IN ({})", column, values.join(", "))
        })]
    }
}

/// `col = literal` (either side) → `(col text, literal text)`
fn equality_branch(expr: &Expr) -> Option<(&str, &str)> {
    let Expr::Predicate(predicate) = expr.unnested() else {
        return None;
    };
    let PredicateKind::Compare {
        op: CompareOp::Eq,
        left,
        right
    } = &predicate.kind
    else {
        return None;
    };
    match (left.as_column(), right.as_literal(), right.as_column(), left.as_literal()) {
        (Some(col), Some(lit), ..) | (_, _, Some(col), Some(lit)) => {
            Some((col.text.as_str(), lit.text.as_str()))
        }
        _ => None
    }
}
