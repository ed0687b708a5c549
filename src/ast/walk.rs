//! Read-only depth-first traversal.

use serde::Serialize;
use smallvec::SmallVec;

use super::{
    node::{
        DmlStatement, Expr, JoinClause, JoinConstraint, QueryExpr, SelectItem, SelectStatement,
        SetExpr, SetOperation, Statement, TableRef, TableSource
    },
    span::Span
};

/// Coarse node category rules declare interest in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Statement,
    Query,
    Select,
    SetOperation,
    SelectItem,
    TableRef,
    JoinClause,
    Column,
    Literal,
    Function,
    Predicate,
    Logical,
    Subquery,
    /// `NOT`, arithmetic, parentheses and anything not modeled further
    Expression,
    Dml
}

/// Clause of the enclosing statement a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Statement,
    With,
    Projection,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset
}

/// Borrowed reference to any node of the tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Statement(&'a Statement),
    Query(&'a QueryExpr),
    Select(&'a SelectStatement),
    SetOperation(&'a SetOperation),
    SelectItem(&'a SelectItem),
    Table(&'a TableRef),
    Join(&'a JoinClause),
    Expr(&'a Expr),
    Dml(&'a DmlStatement)
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Statement(_) => NodeKind::Statement,
            Self::Query(_) => NodeKind::Query,
            Self::Select(_) => NodeKind::Select,
            Self::SetOperation(_) => NodeKind::SetOperation,
            Self::SelectItem(_) => NodeKind::SelectItem,
            Self::Table(_) => NodeKind::TableRef,
            Self::Join(_) => NodeKind::JoinClause,
            Self::Dml(_) => NodeKind::Dml,
            Self::Expr(expr) => match expr {
                Expr::Column(_) => NodeKind::Column,
                Expr::Literal(_) => NodeKind::Literal,
                Expr::Function(_) => NodeKind::Function,
                Expr::Predicate(_) => NodeKind::Predicate,
                Expr::Logical(_) => NodeKind::Logical,
                Expr::Subquery(_) => NodeKind::Subquery,
                Expr::Not {
                    ..
                }
                | Expr::Arithmetic {
                    ..
                }
                | Expr::Nested {
                    ..
                }
                | Expr::Other {
                    ..
                } => NodeKind::Expression
            }
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Statement(s) => s.span(),
            Self::Query(q) => q.span,
            Self::Select(s) => s.span,
            Self::SetOperation(op) => op.span,
            Self::SelectItem(item) => item.span(),
            Self::Table(t) => t.span,
            Self::Join(j) => j.span,
            Self::Expr(e) => e.span(),
            Self::Dml(d) => d.span
        }
    }

    fn children(&self, clause: Clause) -> SmallVec<[(Node<'a>, Clause); 8]> {
        let mut out: SmallVec<[(Node<'a>, Clause); 8]> = SmallVec::new();
        match *self {
            Self::Statement(statement) => match statement {
                Statement::Query(q) => out.push((Node::Query(q), Clause::Statement)),
                Statement::Dml(d) => out.push((Node::Dml(d), Clause::Statement)),
                Statement::Other {
                    ..
                } => {}
            },
            Self::Query(query) => {
                out.extend(query.ctes.iter().map(|cte| (Node::Query(cte), Clause::With)));
                push_set_expr(&query.body, clause, &mut out);
                push_exprs(&query.order_by, Clause::OrderBy, &mut out);
                push_exprs(&query.limit, Clause::Limit, &mut out);
                push_exprs(&query.offset, Clause::Offset, &mut out);
            }
            Self::SetOperation(op) => {
                push_set_expr(&op.left, clause, &mut out);
                push_set_expr(&op.right, clause, &mut out);
            }
            Self::Select(select) => {
                out.extend(
                    select
                        .projection
                        .iter()
                        .map(|item| (Node::SelectItem(item), Clause::Projection))
                );
                out.extend(select.from.iter().map(|t| (Node::Table(t), Clause::From)));
                push_exprs(&select.selection, Clause::Where, &mut out);
                push_exprs(&select.group_by, Clause::GroupBy, &mut out);
                push_exprs(&select.having, Clause::Having, &mut out);
                push_exprs(&select.order_by, Clause::OrderBy, &mut out);
                push_exprs(&select.limit, Clause::Limit, &mut out);
                push_exprs(&select.offset, Clause::Offset, &mut out);
            }
            Self::SelectItem(item) => {
                if let SelectItem::Expr {
                    expr, ..
                } = item
                {
                    out.push((Node::Expr(expr), clause));
                }
            }
            Self::Table(table) => {
                match &table.source {
                    TableSource::Derived(query) => out.push((Node::Query(query), clause)),
                    TableSource::Nested(inner) => out.push((Node::Table(inner), clause)),
                    TableSource::Named {
                        ..
                    }
                    | TableSource::Other => {}
                }
                out.extend(table.joins.iter().map(|j| (Node::Join(j), Clause::Join)));
            }
            Self::Join(join) => {
                out.push((Node::Table(&join.relation), Clause::From));
                if let JoinConstraint::On(expr) = &join.constraint {
                    out.push((Node::Expr(expr), Clause::Join));
                }
            }
            Self::Expr(expr) => {
                out.extend(expr.children().into_iter().map(|e| (Node::Expr(e), clause)));
                if let Some(subquery) = expr.subquery() {
                    out.push((Node::Query(&subquery.query), clause));
                }
            }
            Self::Dml(dml) => {
                out.extend(dml.tables.iter().map(|t| (Node::Table(t), Clause::From)));
                push_exprs(&dml.selection, Clause::Where, &mut out);
            }
        }
        out
    }
}

fn push_set_expr<'a>(
    body: &'a SetExpr,
    clause: Clause,
    out: &mut SmallVec<[(Node<'a>, Clause); 8]>
) {
    match body {
        SetExpr::Select(select) => out.push((Node::Select(select), clause)),
        SetExpr::SetOperation(op) => out.push((Node::SetOperation(op), clause)),
        SetExpr::Query(query) => out.push((Node::Query(query), clause)),
        SetExpr::Values {
            ..
        }
        | SetExpr::Other {
            ..
        } => {}
    }
}

fn push_exprs<'a>(
    exprs: impl IntoIterator<Item = &'a Expr>,
    clause: Clause,
    out: &mut SmallVec<[(Node<'a>, Clause); 8]>
) {
    out.extend(exprs.into_iter().map(|e| (Node::Expr(e), clause)));
}

/// One step of a traversal.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub node:   Node<'a>,
    pub clause: Clause,
    pub depth:  usize,
    pub parent: Option<Node<'a>>
}

impl Visit<'_> {
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn span(&self) -> Span {
        self.node.span()
    }
}

/// Lazy depth-first pre-order iterator over a statement.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<Visit<'a>>
}

impl<'a> Walk<'a> {
    pub fn new(statement: &'a Statement) -> Self {
        Self {
            stack: vec![Visit {
                node:   Node::Statement(statement),
                clause: Clause::Statement,
                depth:  0,
                parent: None
            }]
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let visit = self.stack.pop()?;
        let children = visit.node.children(visit.clause);
        self.stack
            .extend(children.into_iter().rev().map(|(node, clause)| Visit {
                node,
                clause,
                depth: visit.depth + 1,
                parent: Some(visit.node)
            }));
        Some(visit)
    }
}
