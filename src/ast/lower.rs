//! Lowering of `sqlparser` statements into the closed node set.
//!
//! sqlparser only spans identifiers and a few tokens precisely, so keyword
//! and parenthesis boundaries are recovered from the token stream. Whenever a
//! span cannot be resolved the statement span is used instead, which keeps
//! every span inside the source.
//!
//! Chains of one operator (`a OR b OR c`, `a + b + c`) are lowered into a
//! single n-ary node without recursing along the chain, and spans of queries,
//! selects and derived tables are assembled from their lowered parts. Both
//! keep the call stack flat no matter how long a predicate is. Genuine
//! nesting is capped at [`MAX_EXPR_DEPTH`].

use std::cell::Cell;

use compact_str::CompactString;
use sqlparser::{
    ast::{self as sql, Spanned},
    keywords::Keyword
};

use super::{
    node::{
        Column, CompareOp, DistinctClause, DmlKind, DmlStatement, Expr, FunctionCall, JoinClause,
        JoinConstraint, JoinKind, Literal, LiteralKind, Logical, LogicalOp, Predicate,
        PredicateKind, QueryExpr, SelectItem, SelectStatement, SetExpr, SetOperation, SetOperator,
        Statement, SubqueryExpr, TableRef, TableSource
    },
    span::{SourceMap, Span, TokenStream}
};

const JOIN_KEYWORDS: &[Keyword] = &[
    Keyword::JOIN,
    Keyword::INNER,
    Keyword::LEFT,
    Keyword::RIGHT,
    Keyword::FULL,
    Keyword::OUTER,
    Keyword::CROSS,
    Keyword::NATURAL
];

const SET_KEYWORDS: &[Keyword] = &[
    Keyword::UNION,
    Keyword::INTERSECT,
    Keyword::EXCEPT,
    Keyword::MINUS
];

/// Deepest expression nesting lowered before the statement is rejected.
pub const MAX_EXPR_DEPTH: usize = 128;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Chain {
    And,
    Or,
    Arithmetic
}

fn chain_of(op: &sql::BinaryOperator) -> Option<Chain> {
    use sql::BinaryOperator as Op;

    match op {
        Op::And => Some(Chain::And),
        Op::Or => Some(Chain::Or),
        Op::Plus | Op::Minus | Op::Multiply | Op::Divide | Op::Modulo | Op::StringConcat => {
            Some(Chain::Arithmetic)
        }
        _ => None
    }
}

pub struct Lowerer<'m, 's> {
    map:      &'m SourceMap<'s>,
    tokens:   &'m TokenStream,
    whole:    Span,
    depth:    Cell<usize>,
    too_deep: Cell<bool>
}

impl<'m, 's> Lowerer<'m, 's> {
    pub fn new(map: &'m SourceMap<'s>, tokens: &'m TokenStream) -> Self {
        let whole = tokens
            .statement_spans()
            .first()
            .copied()
            .unwrap_or(Span::new(0, map.len()));
        Self {
            map,
            tokens,
            whole,
            depth: Cell::new(0),
            too_deep: Cell::new(false)
        }
    }

    /// Some expression nested deeper than [`MAX_EXPR_DEPTH`]; the lowered
    /// tree is incomplete.
    pub fn exceeded_depth(&self) -> bool {
        self.too_deep.get()
    }

    fn locate(&self, node: &impl Spanned) -> Option<Span> {
        self.map.span(node.span())
    }

    fn text(&self, span: Span) -> CompactString {
        span.slice(self.map.text()).unwrap_or_default().into()
    }

    pub fn lower_statement(&self, statement: &sql::Statement) -> Statement {
        match statement {
            sql::Statement::Query(query) => {
                let mut lowered = self.lower_query(query);
                lowered.span = self.whole;
                Statement::Query(lowered)
            }
            sql::Statement::Delete(delete) => {
                let tables = match &delete.from {
                    sql::FromTable::WithFromKeyword(items)
                    | sql::FromTable::WithoutKeyword(items) => items
                };
                Statement::Dml(DmlStatement {
                    span:      self.whole,
                    kind:      DmlKind::Delete,
                    tables:    tables
                        .iter()
                        .map(|t| self.lower_table_with_joins(t))
                        .collect(),
                    selection: delete.selection.as_ref().map(|e| self.lower_expr(e))
                })
            }
            sql::Statement::Update(update) => Statement::Dml(DmlStatement {
                span:      self.whole,
                kind:      DmlKind::Update,
                tables:    vec![self.lower_table_with_joins(&update.table)],
                selection: update.selection.as_ref().map(|e| self.lower_expr(e))
            }),
            _ => Statement::Other {
                keyword: self.tokens.leading_word().unwrap_or_default().into(),
                span:    self.whole
            }
        }
    }

    fn lower_query(&self, query: &sql::Query) -> QueryExpr {
        let ctes = query
            .with
            .iter()
            .flat_map(|w| &w.cte_tables)
            .map(|cte| self.lower_query(&cte.query))
            .collect();
        let mut order_by = Vec::new();
        if let Some(clause) = &query.order_by
            && let sql::OrderByKind::Expressions(exprs) = &clause.kind
        {
            order_by = exprs.iter().map(|o| self.lower_expr(&o.expr)).collect();
        }
        let (limit, offset) = match &query.limit_clause {
            Some(sql::LimitClause::LimitOffset {
                limit,
                offset,
                ..
            }) => (
                limit.as_ref().map(|e| self.lower_expr(e)),
                offset.as_ref().map(|o| self.lower_expr(&o.value))
            ),
            Some(sql::LimitClause::OffsetCommaLimit {
                offset,
                limit,
                ..
            }) => (Some(self.lower_expr(limit)), Some(self.lower_expr(offset))),
            None => (None, None)
        };
        let mut body = self.lower_set_expr(&query.body);
        let mut span = body.span();
        if let Some(with) = &query.with
            && let Some(keyword) = self.map.span(with.with_token.0.span)
        {
            span = span.join(keyword);
        }
        for expr in order_by.iter().chain(&limit).chain(&offset) {
            span = span.join(expr.span());
        }
        if let SetExpr::Select(select) = &mut body {
            for expr in order_by.iter().chain(&limit).chain(&offset) {
                select.span = select.span.join(expr.span());
            }
            select.order_by = order_by;
            select.limit = limit;
            select.offset = offset;
            return QueryExpr {
                span,
                ctes,
                body,
                order_by: Vec::new(),
                limit: None,
                offset: None
            };
        }
        if limit.is_some() {
            mark_limited(&mut body);
        }
        QueryExpr {
            span,
            ctes,
            body,
            order_by,
            limit,
            offset
        }
    }

    fn lower_set_expr(&self, set_expr: &sql::SetExpr) -> SetExpr {
        match set_expr {
            sql::SetExpr::Select(select) => SetExpr::Select(Box::new(self.lower_select(select))),
            sql::SetExpr::Query(query) => {
                let mut lowered = self.lower_query(query);
                lowered.span = self.tokens.widen_to_parens(lowered.span);
                SetExpr::Query(Box::new(lowered))
            }
            sql::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
                ..
            } => {
                let left = self.lower_set_expr(left);
                let right = self.lower_set_expr(right);
                let gap_start = left.span().end;
                let between = Span::new(gap_start, right.span().start.max(gap_start));
                let keyword = self
                    .tokens
                    .find_keyword(between, SET_KEYWORDS)
                    .unwrap_or(between);
                let op = match op {
                    sql::SetOperator::Union => SetOperator::Union,
                    sql::SetOperator::Intersect => SetOperator::Intersect,
                    _ => SetOperator::Except
                };
                SetExpr::SetOperation(Box::new(SetOperation {
                    span: left.span().join(right.span()),
                    keyword,
                    op,
                    all: matches!(
                        set_quantifier,
                        sql::SetQuantifier::All | sql::SetQuantifier::AllByName
                    ),
                    left,
                    right
                }))
            }
            sql::SetExpr::Values(_) => SetExpr::Values {
                span: self.locate(set_expr).unwrap_or(self.whole)
            },
            _ => SetExpr::Other {
                span: self.locate(set_expr).unwrap_or(self.whole)
            }
        }
    }

    fn lower_select(&self, select: &sql::Select) -> SelectStatement {
        let keyword = self.map.span(select.select_token.0.span);
        let start = keyword.unwrap_or(self.whole);
        let after_select = keyword.map_or(start.start, |kw| kw.end);
        let distinct = match &select.distinct {
            Some(sql::Distinct::Distinct) => {
                let kw = self.tokens.keyword_after(after_select, Keyword::DISTINCT);
                Some(DistinctClause {
                    span:    kw.unwrap_or(start),
                    removal: kw.map(|kw| Span::new(kw.start, self.tokens.blank_end(kw.end))),
                    on:      false
                })
            }
            Some(sql::Distinct::On(_)) => {
                let kw = self.tokens.keyword_after(after_select, Keyword::DISTINCT);
                let clause = kw.and_then(|kw| {
                    self.tokens
                        .paren_group_end(kw.end)
                        .map(|end| Span::new(kw.start, end))
                });
                Some(DistinctClause {
                    span:    clause.or(kw).unwrap_or(start),
                    removal: None,
                    on:      true
                })
            }
            _ => None
        };
        let group_by = match &select.group_by {
            sql::GroupByExpr::Expressions(exprs, _) => {
                exprs.iter().map(|e| self.lower_expr(e)).collect()
            }
            _ => Vec::new()
        };
        let projection: Vec<SelectItem> = select
            .projection
            .iter()
            .map(|item| self.lower_select_item(item, start))
            .collect();
        let from: Vec<TableRef> = select
            .from
            .iter()
            .map(|t| self.lower_table_with_joins(t))
            .collect();
        let selection = select.selection.as_ref().map(|e| self.lower_expr(e));
        let having = select.having.as_ref().map(|e| self.lower_expr(e));
        let span = projection
            .iter()
            .map(SelectItem::span)
            .chain(from.iter().map(TableRef::full_span))
            .chain(selection.iter().map(Expr::span))
            .chain(group_by.iter().map(Expr::span))
            .chain(having.iter().map(Expr::span))
            .chain(distinct.iter().map(|d| d.span))
            .fold(start, Span::join);
        SelectStatement {
            span,
            distinct,
            projection,
            from,
            selection,
            group_by,
            having,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            limited_by_parent: false
        }
    }

    fn lower_select_item(&self, item: &sql::SelectItem, fallback: Span) -> SelectItem {
        match item {
            sql::SelectItem::UnnamedExpr(expr) => {
                let expr = self.lower_expr(expr);
                SelectItem::Expr {
                    span: expr.span(),
                    expr,
                    alias: None
                }
            }
            sql::SelectItem::ExprWithAlias {
                expr,
                alias
            } => {
                let expr = self.lower_expr(expr);
                let span = self
                    .map
                    .span(alias.span)
                    .map_or(expr.span(), |a| expr.span().join(a));
                SelectItem::Expr {
                    span,
                    expr,
                    alias: Some(alias.value.as_str().into())
                }
            }
            sql::SelectItem::Wildcard(_) => SelectItem::Wildcard {
                span:      self.locate(item).unwrap_or(fallback),
                qualifier: None
            },
            sql::SelectItem::QualifiedWildcard(..) => {
                let written = item.to_string();
                let qualifier = written.split(".*").next().unwrap_or_default();
                SelectItem::Wildcard {
                    span:      self.locate(item).unwrap_or(fallback),
                    qualifier: Some(strip_quotes(qualifier))
                }
            }
            #[allow(unreachable_patterns)]
            _ => {
                let span = self.locate(item).unwrap_or(fallback);
                SelectItem::Expr {
                    span,
                    expr: Expr::Other {
                        span,
                        children: Vec::new()
                    },
                    alias: None
                }
            }
        }
    }

    fn lower_table_with_joins(&self, table: &sql::TableWithJoins) -> TableRef {
        let mut lowered = self.lower_factor(&table.relation);
        lowered.joins = table.joins.iter().map(|j| self.lower_join(j)).collect();
        lowered
    }

    fn lower_factor(&self, factor: &sql::TableFactor) -> TableRef {
        let (span, source, alias) = match factor {
            sql::TableFactor::Table {
                name,
                alias,
                ..
            } => (
                self.locate(factor).unwrap_or(self.whole),
                TableSource::Named {
                    name: strip_quotes(&name.to_string())
                },
                alias_name(alias)
            ),
            sql::TableFactor::Derived {
                subquery,
                alias,
                ..
            } => {
                let query = self.lower_query(subquery);
                let span = self.with_alias(self.tokens.widen_to_parens(query.span), alias);
                (span, TableSource::Derived(Box::new(query)), alias_name(alias))
            }
            sql::TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                let inner = self.lower_table_with_joins(table_with_joins);
                let span = self.with_alias(self.tokens.widen_to_parens(inner.full_span()), alias);
                (span, TableSource::Nested(Box::new(inner)), alias_name(alias))
            }
            _ => (
                self.locate(factor).unwrap_or(self.whole),
                TableSource::Other,
                None
            )
        };
        TableRef {
            span,
            source,
            alias,
            joins: Vec::new()
        }
    }

    fn with_alias(&self, span: Span, alias: &Option<sql::TableAlias>) -> Span {
        alias
            .as_ref()
            .and_then(|a| self.map.span(a.name.span))
            .map_or(span, |a| span.join(a))
    }

    fn lower_join(&self, join: &sql::Join) -> JoinClause {
        let relation = self.lower_factor(&join.relation);
        let (kind, constraint) = match &join.join_operator {
            sql::JoinOperator::Join(c) | sql::JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
            sql::JoinOperator::Left(c) | sql::JoinOperator::LeftOuter(c) => {
                (JoinKind::Left, Some(c))
            }
            sql::JoinOperator::Right(c) | sql::JoinOperator::RightOuter(c) => {
                (JoinKind::Right, Some(c))
            }
            sql::JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
            sql::JoinOperator::CrossJoin(c) => (JoinKind::Cross, Some(c)),
            _ => (JoinKind::Other, None)
        };
        let constraint = match constraint {
            Some(sql::JoinConstraint::On(expr)) => JoinConstraint::On(self.lower_expr(expr)),
            Some(sql::JoinConstraint::Using(names)) => {
                JoinConstraint::Using(names.iter().map(|n| strip_quotes(&n.to_string())).collect())
            }
            Some(sql::JoinConstraint::Natural) => JoinConstraint::Natural,
            Some(sql::JoinConstraint::None) | None => JoinConstraint::None
        };
        let end = match &constraint {
            JoinConstraint::On(expr) => expr.span().end,
            JoinConstraint::Using(_) => self
                .tokens
                .paren_group_end(relation.span.end)
                .unwrap_or(relation.span.end),
            JoinConstraint::Natural | JoinConstraint::None => relation.span.end
        };
        let mut start = relation.span.start;
        while let Some((_, lexeme)) = self.tokens.prev_significant(start)
            && JOIN_KEYWORDS.iter().any(|&k| lexeme.is_keyword(k))
        {
            start = lexeme.span.start;
        }
        JoinClause {
            span: Span::new(start, end.max(relation.span.end)),
            kind,
            relation,
            constraint
        }
    }

    fn lower_subquery(&self, query: &sql::Query) -> SubqueryExpr {
        let query = self.lower_query(query);
        SubqueryExpr {
            span:  self.tokens.widen_to_parens(query.span),
            query: Box::new(query)
        }
    }

    fn lower_expr(&self, expr: &sql::Expr) -> Expr {
        let depth = self.depth.get();
        if depth >= MAX_EXPR_DEPTH {
            self.too_deep.set(true);
            return Expr::Other {
                span:     self.whole,
                children: Vec::new()
            };
        }
        self.depth.set(depth + 1);
        let lowered = self.lower_expr_at(expr);
        self.depth.set(depth);
        lowered
    }

    fn lower_expr_at(&self, expr: &sql::Expr) -> Expr {
        // sqlparser computes node spans recursively; only ask when needed.
        let located = || self.locate(expr);
        match expr {
            sql::Expr::Identifier(ident) => {
                let span = self
                    .map
                    .span(ident.span)
                    .or_else(located)
                    .unwrap_or(self.whole);
                Expr::Column(Column {
                    span,
                    qualifier: None,
                    name: ident.value.as_str().into(),
                    text: self.text(span)
                })
            }
            sql::Expr::CompoundIdentifier(idents) => {
                let first = idents.first().and_then(|i| self.map.span(i.span));
                let last = idents.last().and_then(|i| self.map.span(i.span));
                let span = match (first, last) {
                    (Some(first), Some(last)) => first.join(last),
                    _ => located().unwrap_or(self.whole)
                };
                let qualifier = idents
                    .len()
                    .checked_sub(2)
                    .and_then(|idx| idents.get(idx))
                    .map(|i| i.value.as_str().into());
                Expr::Column(Column {
                    span,
                    qualifier,
                    name: idents
                        .last()
                        .map(|i| i.value.as_str())
                        .unwrap_or_default()
                        .into(),
                    text: self.text(span)
                })
            }
            sql::Expr::Value(value) => self.lower_value(value),
            sql::Expr::BinaryOp {
                left,
                op,
                right
            } => self.lower_binary(left, op, right),
            sql::Expr::UnaryOp {
                op,
                expr
            } => {
                let inner = self.lower_expr(expr);
                let span = self.tokens.extend_back(inner.span());
                match op {
                    sql::UnaryOperator::Not => Expr::Not {
                        span,
                        expr: Box::new(inner)
                    },
                    _ => Expr::Other {
                        span,
                        children: vec![inner]
                    }
                }
            }
            sql::Expr::Nested(inner) => {
                let inner = self.lower_expr(inner);
                Expr::Nested {
                    span: self.tokens.widen_to_parens(inner.span()),
                    expr: Box::new(inner)
                }
            }
            sql::Expr::Like {
                negated,
                expr,
                pattern,
                ..
            }
            | sql::Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => {
                let expr = self.lower_expr(expr);
                let pattern = self.lower_expr(pattern);
                predicate(
                    expr.span().join(pattern.span()),
                    PredicateKind::Like {
                        negated: *negated,
                        expr,
                        pattern
                    }
                )
            }
            sql::Expr::InList {
                expr,
                list,
                negated,
                ..
            } => {
                let expr = self.lower_expr(expr);
                let list: Vec<Expr> = list.iter().map(|e| self.lower_expr(e)).collect();
                let fallback = list.iter().fold(expr.span(), |s, e| s.join(e.span()));
                let span = self
                    .tokens
                    .paren_group_end(expr.span().end)
                    .map_or(fallback, |end| Span::new(expr.span().start, end));
                predicate(
                    span,
                    PredicateKind::InList {
                        negated: *negated,
                        expr,
                        list
                    }
                )
            }
            sql::Expr::InSubquery {
                expr,
                subquery,
                negated,
                ..
            } => {
                let expr = self.lower_expr(expr);
                let subquery = self.lower_subquery(subquery);
                predicate(
                    expr.span().join(subquery.span),
                    PredicateKind::InSubquery {
                        negated: *negated,
                        expr,
                        subquery
                    }
                )
            }
            sql::Expr::Between {
                expr,
                negated,
                low,
                high,
                ..
            } => {
                let expr = self.lower_expr(expr);
                let low = self.lower_expr(low);
                let high = self.lower_expr(high);
                predicate(
                    expr.span().join(high.span()),
                    PredicateKind::Between {
                        negated: *negated,
                        expr,
                        low,
                        high
                    }
                )
            }
            sql::Expr::IsNull(inner) | sql::Expr::IsNotNull(inner) => {
                let inner = self.lower_expr(inner);
                let end = self.tokens.keyword_run_end(
                    inner.span().end,
                    &[Keyword::IS, Keyword::NOT, Keyword::NULL]
                );
                predicate(
                    Span::new(inner.span().start, end),
                    PredicateKind::IsNull {
                        negated: matches!(expr, sql::Expr::IsNotNull(_)),
                        expr:    inner
                    }
                )
            }
            sql::Expr::Exists {
                subquery,
                negated,
                ..
            } => {
                let subquery = self.lower_subquery(subquery);
                let mut span = self.tokens.extend_back(subquery.span);
                if *negated {
                    span = self.tokens.extend_back(span);
                }
                predicate(
                    span,
                    PredicateKind::Exists {
                        negated: *negated,
                        subquery
                    }
                )
            }
            sql::Expr::Subquery(query) => Expr::Subquery(self.lower_subquery(query)),
            sql::Expr::Function(function) => self.lower_function(function, located),
            sql::Expr::Cast {
                expr: inner, ..
            } => self.lower_wrapper("CAST", &["CAST", "TRY_CAST", "SAFE_CAST"], inner, located),
            sql::Expr::Extract {
                expr: inner, ..
            } => self.lower_wrapper("EXTRACT", &["EXTRACT"], inner, located),
            sql::Expr::Substring {
                expr: inner, ..
            } => self.lower_wrapper("SUBSTRING", &["SUBSTRING", "SUBSTR"], inner, located),
            sql::Expr::Trim {
                expr: inner, ..
            } => self.lower_wrapper("TRIM", &["TRIM"], inner, located),
            sql::Expr::Ceil {
                expr: inner, ..
            } => self.lower_wrapper("CEIL", &["CEIL", "CEILING"], inner, located),
            sql::Expr::Floor {
                expr: inner, ..
            } => self.lower_wrapper("FLOOR", &["FLOOR"], inner, located),
            sql::Expr::Case {
                case_token,
                end_token,
                operand,
                conditions,
                else_result
            } => {
                let mut children = Vec::new();
                if let Some(operand) = operand {
                    children.push(self.lower_expr(operand));
                }
                for when in conditions {
                    children.push(self.lower_expr(&when.condition));
                    children.push(self.lower_expr(&when.result));
                }
                if let Some(else_result) = else_result {
                    children.push(self.lower_expr(else_result));
                }
                let keywords = self
                    .map
                    .span(case_token.0.span)
                    .zip(self.map.span(end_token.0.span))
                    .map(|(case, end)| case.join(end));
                let span = keywords.unwrap_or_else(|| {
                    children
                        .iter()
                        .map(Expr::span)
                        .reduce(Span::join)
                        .unwrap_or(self.whole)
                });
                Expr::Other {
                    span,
                    children
                }
            }
            _ => Expr::Other {
                span:     located().unwrap_or(self.whole),
                children: Vec::new()
            }
        }
    }

    fn lower_value(&self, value: &sql::ValueWithSpan) -> Expr {
        let span = self.map.span(value.span).unwrap_or(self.whole);
        let (kind, raw): (LiteralKind, CompactString) = match &value.value {
            sql::Value::Number(n, _) => (LiteralKind::Number, n.to_string().into()),
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => {
                (LiteralKind::String, s.as_str().into())
            }
            sql::Value::Boolean(b) => (LiteralKind::Boolean, b.to_string().into()),
            sql::Value::Null => (LiteralKind::Null, "NULL".into()),
            other => (LiteralKind::Other, other.to_string().into())
        };
        Expr::Literal(Literal {
            span,
            kind,
            value: raw,
            text: self.text(span)
        })
    }

    fn lower_binary(&self, left: &sql::Expr, op: &sql::BinaryOperator, right: &sql::Expr) -> Expr {
        use sql::BinaryOperator as Op;

        if let Some(chain) = chain_of(op) {
            return self.lower_chain(chain, left, right);
        }
        let left = self.lower_expr(left);
        let right = self.lower_expr(right);
        let span = left.span().join(right.span());
        let compare = match op {
            Op::Eq => Some(CompareOp::Eq),
            Op::NotEq => Some(CompareOp::NotEq),
            Op::Lt => Some(CompareOp::Lt),
            Op::LtEq => Some(CompareOp::LtEq),
            Op::Gt => Some(CompareOp::Gt),
            Op::GtEq => Some(CompareOp::GtEq),
            _ => None
        };
        if let Some(op) = compare {
            return predicate(
                span,
                PredicateKind::Compare {
                    op,
                    left,
                    right
                }
            );
        }
        Expr::Other {
            span,
            children: vec![left, right]
        }
    }

    /// Walks down the left spine of a run of one operator family, then
    /// lowers the operands left to right.
    fn lower_chain(&self, chain: Chain, left: &sql::Expr, right: &sql::Expr) -> Expr {
        let mut tail = vec![right];
        let mut head = left;
        while let sql::Expr::BinaryOp {
            left,
            op,
            right
        } = head
            && chain_of(op) == Some(chain)
        {
            tail.push(right.as_ref());
            head = left.as_ref();
        }
        let operands: Vec<Expr> = std::iter::once(head)
            .chain(tail.into_iter().rev())
            .map(|e| self.lower_expr(e))
            .collect();
        let span = operands
            .iter()
            .map(Expr::span)
            .reduce(Span::join)
            .unwrap_or(self.whole);
        match chain {
            Chain::And => Expr::Logical(Box::new(Logical {
                span,
                op: LogicalOp::And,
                operands
            })),
            Chain::Or => Expr::Logical(Box::new(Logical {
                span,
                op: LogicalOp::Or,
                operands
            })),
            Chain::Arithmetic => Expr::Arithmetic {
                span,
                operands
            }
        }
    }

    fn lower_function(
        &self,
        function: &sql::Function,
        located: impl FnOnce() -> Option<Span>
    ) -> Expr {
        let mut args = Vec::new();
        let mut wildcard_arg = false;
        let mut has_parens = true;
        match &function.args {
            sql::FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg = match arg {
                        sql::FunctionArg::Unnamed(arg) => arg,
                        sql::FunctionArg::Named {
                            arg, ..
                        } => arg,
                        _ => continue
                    };
                    match arg {
                        sql::FunctionArgExpr::Expr(e) => args.push(self.lower_expr(e)),
                        _ => wildcard_arg = true
                    }
                }
            }
            sql::FunctionArguments::Subquery(query) => {
                args.push(Expr::Subquery(self.lower_subquery(query)));
            }
            sql::FunctionArguments::None => has_parens = false
        }
        let name_span = self.locate(&function.name);
        let span = match name_span {
            Some(name) if has_parens => self
                .tokens
                .paren_group_end(name.end)
                .map_or(name, |end| Span::new(name.start, end)),
            Some(name) => name,
            None => located().unwrap_or(self.whole)
        };
        Expr::Function(FunctionCall {
            span,
            name: strip_quotes(&function.name.to_string()),
            args,
            wildcard_arg,
            is_window: function.over.is_some()
        })
    }

    /// Special syntax forms (`CAST`, `EXTRACT`, ...) lowered as one-argument
    /// function calls.
    fn lower_wrapper(
        &self,
        name: &str,
        spellings: &[&str],
        inner: &sql::Expr,
        located: impl FnOnce() -> Option<Span>
    ) -> Expr {
        let arg = self.lower_expr(inner);
        let span = self
            .tokens
            .call_around(arg.span(), spellings)
            .or_else(located)
            .map_or(arg.span(), |s| s.join(arg.span()));
        Expr::Function(FunctionCall {
            span,
            name: name.into(),
            args: vec![arg],
            wildcard_arg: false,
            is_window: false
        })
    }
}

fn predicate(span: Span, kind: PredicateKind) -> Expr {
    Expr::Predicate(Box::new(Predicate {
        span,
        kind
    }))
}

fn mark_limited(body: &mut SetExpr) {
    match body {
        SetExpr::Select(select) => select.limited_by_parent = true,
        SetExpr::SetOperation(op) => {
            mark_limited(&mut op.left);
            mark_limited(&mut op.right);
        }
        SetExpr::Query(query) => mark_limited(&mut query.body),
        SetExpr::Values {
            ..
        }
        | SetExpr::Other {
            ..
        } => {}
    }
}

fn alias_name(alias: &Option<sql::TableAlias>) -> Option<CompactString> {
    alias.as_ref().map(|a| a.name.value.as_str().into())
}

fn strip_quotes(name: &str) -> CompactString {
    name.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect()
}
