//! Closed set of node types produced by lowering.

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::Serialize;
use smallvec::SmallVec;

use super::span::Span;

/// Function names treated as aggregates when not used as window functions.
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "ARRAY_AGG",
    "STRING_AGG",
    "GROUP_CONCAT",
    "LISTAGG",
    "BOOL_AND",
    "BOOL_OR",
    "EVERY",
    "STDDEV",
    "STDDEV_POP",
    "STDDEV_SAMP",
    "VARIANCE",
    "VAR_POP",
    "VAR_SAMP",
    "JSON_AGG",
    "JSONB_AGG",
    "BIT_AND",
    "BIT_OR",
    "ANY_VALUE"
];

/// Top-level statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Query(QueryExpr),
    Dml(DmlStatement),
    /// Any other statement kind; carried so rules can ignore it explicitly.
    Other {
        keyword: CompactString,
        span:    Span
    }
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Self::Query(q) => q.span,
            Self::Dml(d) => d.span,
            Self::Other {
                span, ..
            } => *span
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DmlKind {
    Update,
    Delete
}

impl DmlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Delete => "DELETE"
        }
    }
}

/// `UPDATE ... [WHERE ...]` or `DELETE FROM ... [WHERE ...]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DmlStatement {
    pub span:      Span,
    pub kind:      DmlKind,
    pub tables:    Vec<TableRef>,
    pub selection: Option<Expr>
}

/// A query: set expression body plus the clauses that apply to its result.
///
/// When the body is a single `SELECT`, `ORDER BY`, `LIMIT` and `OFFSET` are
/// moved onto that select and are empty here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryExpr {
    pub span:     Span,
    /// Bodies of `WITH` common table expressions
    pub ctes:     Vec<QueryExpr>,
    pub body:     SetExpr,
    pub order_by: Vec<Expr>,
    pub limit:    Option<Expr>,
    pub offset:   Option<Expr>
}

impl QueryExpr {
    pub fn as_select(&self) -> Option<&SelectStatement> {
        match &self.body {
            SetExpr::Select(select) => Some(select),
            _ => None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SetExpr {
    Select(Box<SelectStatement>),
    SetOperation(Box<SetOperation>),
    /// Parenthesized query used as a set operand
    Query(Box<QueryExpr>),
    Values {
        span: Span
    },
    Other {
        span: Span
    }
}

impl SetExpr {
    pub fn span(&self) -> Span {
        match self {
            Self::Select(s) => s.span,
            Self::SetOperation(op) => op.span,
            Self::Query(q) => q.span,
            Self::Values {
                span
            }
            | Self::Other {
                span
            } => *span
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except
}

impl SetOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetOperation {
    pub span:    Span,
    /// Span of the operator keyword itself
    pub keyword: Span,
    pub op:      SetOperator,
    pub all:     bool,
    pub left:    SetExpr,
    pub right:   SetExpr
}

/// `DISTINCT` / `DISTINCT ON (...)` marker of a select.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistinctClause {
    pub span:    Span,
    /// Range to delete to drop the keyword, including trailing blanks
    pub removal: Option<Span>,
    pub on:      bool
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectStatement {
    pub span:              Span,
    pub distinct:          Option<DistinctClause>,
    pub projection:        Vec<SelectItem>,
    pub from:              Vec<TableRef>,
    pub selection:         Option<Expr>,
    pub group_by:          Vec<Expr>,
    pub having:            Option<Expr>,
    pub order_by:          Vec<Expr>,
    pub limit:             Option<Expr>,
    pub offset:            Option<Expr>,
    /// Part of a set operation whose enclosing query carries a `LIMIT`
    pub limited_by_parent: bool
}

impl SelectStatement {
    /// Projection contains `*` or `t.*`.
    pub fn is_select_star(&self) -> bool {
        self.projection
            .iter()
            .any(|item| matches!(item, SelectItem::Wildcard { .. }))
    }

    pub fn has_where_clause(&self) -> bool {
        self.selection.is_some()
    }

    /// Number of explicit `JOIN` clauses, nested joins included.
    pub fn join_count(&self) -> usize {
        self.from.iter().map(TableRef::join_count).sum()
    }

    /// Columns referenced by `WHERE` and `ON` predicates, in first-seen order.
    pub fn predicate_columns(&self) -> IndexSet<CompactString> {
        let mut columns = IndexSet::new();
        if let Some(selection) = &self.selection {
            selection.collect_columns(&mut columns);
        }
        for table in &self.from {
            table.collect_join_columns(&mut columns);
        }
        columns
    }

    /// Every projected expression is an aggregate (or a constant) and there is
    /// no `GROUP BY`, so the query returns a single row.
    pub fn is_aggregate_only(&self) -> bool {
        if !self.group_by.is_empty() || self.projection.is_empty() {
            return false;
        }
        let mut has_aggregate = false;
        for item in &self.projection {
            match item {
                SelectItem::Wildcard {
                    ..
                } => return false,
                SelectItem::Expr {
                    expr, ..
                } => {
                    if expr.contains_aggregate() {
                        has_aggregate = true;
                    } else if expr.references_columns() {
                        return false;
                    }
                }
            }
        }
        has_aggregate
    }

    /// Tables and derived tables visible in `FROM`, joins included.
    pub fn table_bindings(&self) -> SmallVec<[TableBinding; 4]> {
        let mut bindings = SmallVec::new();
        for table in &self.from {
            table.collect_bindings(&mut bindings);
        }
        bindings
    }

    /// Row count is capped by `LIMIT` here or on the enclosing set operation.
    pub fn is_bounded(&self) -> bool {
        self.limit.is_some() || self.limited_by_parent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SelectItem {
    Wildcard {
        span:      Span,
        qualifier: Option<CompactString>
    },
    Expr {
        span:  Span,
        expr:  Expr,
        alias: Option<CompactString>
    }
}

impl SelectItem {
    pub fn span(&self) -> Span {
        match self {
            Self::Wildcard {
                span, ..
            }
            | Self::Expr {
                span, ..
            } => *span
        }
    }
}

/// A table binding as seen from the select that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableBinding {
    /// Table name as written; `None` for derived tables
    pub table: Option<CompactString>,
    pub alias: Option<CompactString>,
    pub span:  Span
}

impl TableBinding {
    /// Name other clauses use to refer to this binding.
    pub fn reference_name(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .or_else(|| self.table.as_deref().map(last_segment))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TableSource {
    Named { name: CompactString },
    Derived(Box<QueryExpr>),
    /// Parenthesized join tree
    Nested(Box<TableRef>),
    Other
}

/// One `FROM` item: a relation plus the joins hanging off it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRef {
    /// Span of the relation itself, joins excluded
    pub span:   Span,
    pub source: TableSource,
    pub alias:  Option<CompactString>,
    pub joins:  Vec<JoinClause>
}

impl TableRef {
    /// Relation plus all of its joins.
    pub fn full_span(&self) -> Span {
        self.joins
            .iter()
            .fold(self.span, |span, join| span.join(join.span))
    }

    pub fn table_name(&self) -> Option<&str> {
        match &self.source {
            TableSource::Named {
                name
            } => Some(name),
            _ => None
        }
    }

    fn join_count(&self) -> usize {
        let nested = match &self.source {
            TableSource::Nested(inner) => inner.join_count(),
            _ => 0
        };
        nested
            + self
                .joins
                .iter()
                .map(|j| 1 + j.relation.join_count())
                .sum::<usize>()
    }

    fn collect_join_columns(&self, out: &mut IndexSet<CompactString>) {
        if let TableSource::Nested(inner) = &self.source {
            inner.collect_join_columns(out);
        }
        for join in &self.joins {
            if let JoinConstraint::On(expr) = &join.constraint {
                expr.collect_columns(out);
            }
            join.relation.collect_join_columns(out);
        }
    }

    fn collect_bindings(&self, out: &mut SmallVec<[TableBinding; 4]>) {
        match &self.source {
            TableSource::Named {
                name
            } => out.push(TableBinding {
                table: Some(name.clone()),
                alias: self.alias.clone(),
                span:  self.span
            }),
            TableSource::Derived(_) | TableSource::Other => out.push(TableBinding {
                table: None,
                alias: self.alias.clone(),
                span:  self.span
            }),
            TableSource::Nested(inner) => inner.collect_bindings(out)
        }
        for join in &self.joins {
            join.relation.collect_bindings(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Other
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JoinConstraint {
    On(Expr),
    Using(SmallVec<[CompactString; 4]>),
    Natural,
    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinClause {
    /// From the first join keyword to the end of the constraint
    pub span:       Span,
    pub kind:       JoinKind,
    pub relation:   TableRef,
    pub constraint: JoinConstraint
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub span:      Span,
    pub qualifier: Option<CompactString>,
    pub name:      CompactString,
    /// Source text, e.g. `o.created_at`
    pub text:      CompactString
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiteralKind {
    Number,
    String,
    Boolean,
    Null,
    Other
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Literal {
    pub span:  Span,
    pub kind:  LiteralKind,
    /// Unquoted value for strings, digits for numbers
    pub value: CompactString,
    /// Source text including quotes
    pub text:  CompactString
}

impl Literal {
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            LiteralKind::Number => self.value.parse().ok(),
            _ => None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub span:         Span,
    pub name:         CompactString,
    pub args:         Vec<Expr>,
    /// `COUNT(*)`-style argument
    pub wildcard_arg: bool,
    pub is_window:    bool
}

impl FunctionCall {
    /// Last segment of the name, upper-cased.
    pub fn base_name(&self) -> CompactString {
        last_segment(&self.name).to_uppercase().into()
    }

    pub fn is_aggregate(&self) -> bool {
        !self.is_window && AGGREGATE_FUNCTIONS.contains(&self.base_name().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">="
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PredicateKind {
    Compare {
        op:    CompareOp,
        left:  Expr,
        right: Expr
    },
    Like {
        negated: bool,
        expr:    Expr,
        pattern: Expr
    },
    InList {
        negated: bool,
        expr:    Expr,
        list:    Vec<Expr>
    },
    InSubquery {
        negated:  bool,
        expr:     Expr,
        subquery: SubqueryExpr
    },
    Between {
        negated: bool,
        expr:    Expr,
        low:     Expr,
        high:    Expr
    },
    IsNull {
        negated: bool,
        expr:    Expr
    },
    Exists {
        negated:  bool,
        subquery: SubqueryExpr
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub span: Span,
    pub kind: PredicateKind
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or
}

/// A whole chain of one operator: `a OR b OR c` is a single node with three
/// operands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Logical {
    pub span:     Span,
    pub op:       LogicalOp,
    /// Left to right, at least two
    pub operands: Vec<Expr>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubqueryExpr {
    /// Includes the surrounding parentheses
    pub span:  Span,
    pub query: Box<QueryExpr>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Column(Column),
    Literal(Literal),
    Function(FunctionCall),
    Predicate(Box<Predicate>),
    Logical(Box<Logical>),
    Not {
        span: Span,
        expr: Box<Expr>
    },
    /// Chain of arithmetic or concatenation operators, flattened
    Arithmetic {
        span:     Span,
        operands: Vec<Expr>
    },
    Subquery(SubqueryExpr),
    Nested {
        span: Span,
        expr: Box<Expr>
    },
    /// Anything else; children are kept so traversal still reaches them
    Other {
        span:     Span,
        children: Vec<Expr>
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::Column(c) => c.span,
            Self::Literal(l) => l.span,
            Self::Function(f) => f.span,
            Self::Predicate(p) => p.span,
            Self::Logical(l) => l.span,
            Self::Subquery(s) => s.span,
            Self::Not {
                span, ..
            }
            | Self::Arithmetic {
                span, ..
            }
            | Self::Nested {
                span, ..
            }
            | Self::Other {
                span, ..
            } => *span
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unnested(&self) -> &Expr {
        match self {
            Self::Nested {
                expr, ..
            } => expr.unnested(),
            other => other
        }
    }

    pub fn as_column(&self) -> Option<&Column> {
        match self.unnested() {
            Self::Column(c) => Some(c),
            _ => None
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self.unnested() {
            Self::Literal(l) => Some(l),
            _ => None
        }
    }

    /// Direct expression children, subqueries excluded.
    pub fn children(&self) -> SmallVec<[&Expr; 4]> {
        let mut out: SmallVec<[&Expr; 4]> = SmallVec::new();
        match self {
            Self::Column(_) | Self::Literal(_) | Self::Subquery(_) => {}
            Self::Function(f) => out.extend(f.args.iter()),
            Self::Predicate(p) => match &p.kind {
                PredicateKind::Compare {
                    left,
                    right,
                    ..
                } => out.extend([left, right]),
                PredicateKind::Like {
                    expr,
                    pattern,
                    ..
                } => out.extend([expr, pattern]),
                PredicateKind::InList {
                    expr,
                    list,
                    ..
                } => {
                    out.push(expr);
                    out.extend(list.iter());
                }
                PredicateKind::InSubquery {
                    expr, ..
                }
                | PredicateKind::IsNull {
                    expr, ..
                } => out.push(expr),
                PredicateKind::Between {
                    expr,
                    low,
                    high,
                    ..
                } => out.extend([expr, low, high]),
                PredicateKind::Exists {
                    ..
                } => {}
            },
            Self::Logical(l) => out.extend(l.operands.iter()),
            Self::Not {
                expr, ..
            }
            | Self::Nested {
                expr, ..
            } => out.push(expr),
            Self::Arithmetic {
                operands, ..
            } => out.extend(operands.iter()),
            Self::Other {
                children, ..
            } => out.extend(children.iter())
        }
        out
    }

    /// Subquery directly owned by this node, if any.
    pub fn subquery(&self) -> Option<&SubqueryExpr> {
        match self {
            Self::Subquery(s) => Some(s),
            Self::Predicate(p) => match &p.kind {
                PredicateKind::InSubquery {
                    subquery, ..
                }
                | PredicateKind::Exists {
                    subquery, ..
                } => Some(subquery),
                _ => None
            },
            _ => None
        }
    }

    /// This expression and everything below it in pre-order, subqueries
    /// excluded. Iterative, so chain length does not grow the call stack.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack = SmallVec::new();
        stack.push(self);
        Descendants {
            stack
        }
    }

    /// Collect column references, not descending into subqueries.
    pub fn collect_columns(&self, out: &mut IndexSet<CompactString>) {
        for expr in self.descendants() {
            if let Self::Column(c) = expr {
                out.insert(c.text.clone());
            }
        }
    }

    pub fn references_columns(&self) -> bool {
        self.descendants().any(|e| matches!(e, Self::Column(_)))
    }

    pub fn contains_aggregate(&self) -> bool {
        self.descendants()
            .any(|e| matches!(e, Self::Function(f) if f.is_aggregate()))
    }
}

/// Pre-order iterator returned by [`Expr::descendants`].
pub struct Descendants<'a> {
    stack: SmallVec<[&'a Expr; 16]>
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let expr = self.stack.pop()?;
        self.stack.extend(expr.children().into_iter().rev());
        Some(expr)
    }
}

/// `schema.table` → `table`
pub(crate) fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
