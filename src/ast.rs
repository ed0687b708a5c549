//! Normalized SQL syntax tree.
//!
//! SQL text is tokenized and parsed by [`sqlparser`], then lowered into a
//! small closed set of node types that carry byte-offset [`Span`]s into the
//! original text. The tree is immutable once built: rewrites produce new text
//! from span edits and never touch the nodes.
//!
//! ```
//! use sqlgenie::ast::{Ast, NodeKind, SqlDialect};
//!
//! let ast = Ast::parse("SELECT * FROM orders", SqlDialect::Generic).unwrap();
//! let select = ast.selects().next().unwrap();
//!
//! assert!(select.is_select_star());
//! assert!(!select.has_where_clause());
//! assert_eq!(ast.walk().filter(|v| v.kind() == NodeKind::TableRef).count(), 1);
//! ```

mod lower;
mod node;
mod span;
mod walk;

use lower::Lowerer;
pub use lower::MAX_EXPR_DEPTH;
pub(crate) use node::last_segment;
pub use node::{
    Column, CompareOp, Descendants, DistinctClause, DmlKind, DmlStatement, Expr, FunctionCall,
    JoinClause, JoinConstraint, JoinKind, Literal, LiteralKind, Logical, LogicalOp, Predicate,
    PredicateKind, QueryExpr, SelectItem, SelectStatement, SetExpr, SetOperation, SetOperator,
    Statement, SubqueryExpr, TableBinding, TableRef, TableSource
};
use serde::{Deserialize, Serialize};
pub use span::{Lexeme, SourceMap, Span, TokenStream};
use sqlparser::{
    dialect::{
        ClickHouseDialect, Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect
    },
    parser::Parser
};
pub use walk::{Clause, Node, NodeKind, Visit, Walk};

use crate::error::ParseError;

/// SQL dialect for parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    Generic,
    MySQL,
    PostgreSQL,
    SQLite,
    ClickHouse
}

impl SqlDialect {
    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {}),
            Self::SQLite => Box::new(SQLiteDialect {}),
            Self::ClickHouse => Box::new(ClickHouseDialect {})
        }
    }
}

/// A parsed, normalized single SQL statement together with its source text.
#[derive(Debug, Clone)]
pub struct Ast {
    source:    String,
    dialect:   SqlDialect,
    statement: Statement
}

impl Ast {
    /// Parse exactly one statement.
    ///
    /// A trailing semicolon is accepted. Anything the parser rejects is
    /// returned as a [`ParseError`] carrying the position of the offending
    /// token when sqlparser reports one.
    pub fn parse(sql: &str, dialect: SqlDialect) -> Result<Self, ParseError> {
        let map = SourceMap::new(sql);
        let parser_dialect = dialect.into_parser_dialect();
        let tokens = TokenStream::tokenize(sql, parser_dialect.as_ref(), &map)?;
        let mut statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
            .map_err(|e| ParseError::from_parser_message(e.to_string(), &map))?;
        if statements.len() != 1 {
            let position = tokens
                .statement_spans()
                .get(1)
                .and_then(|span| map.position_of(span.start));
            return Err(ParseError::at(
                format!("expected exactly one statement, found {}", statements.len()),
                position
            ));
        }
        let parsed = statements.remove(0);
        let lowerer = Lowerer::new(&map, &tokens);
        let statement = lowerer.lower_statement(&parsed);
        if lowerer.exceeded_depth() {
            return Err(ParseError::at(
                format!("expression nesting exceeds {} levels", MAX_EXPR_DEPTH),
                map.position_of(statement.span().start)
            ));
        }
        if let Some(err) = empty_projection(&statement, &tokens, &map) {
            return Err(err);
        }
        Ok(Self {
            source: sql.to_string(),
            dialect,
            statement
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Depth-first pre-order traversal over every node.
    ///
    /// The iterator is lazy and finite; call `walk` again to restart.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(&self.statement)
    }

    /// Every `SELECT` block in traversal order, subqueries included.
    pub fn selects(&self) -> impl Iterator<Item = &SelectStatement> + '_ {
        self.walk().filter_map(|visit| match visit.node {
            Node::Select(select) => Some(select),
            _ => None
        })
    }

    /// Source text covered by `span`, or an empty string if it is invalid.
    pub fn text(&self, span: Span) -> &str {
        span.slice(&self.source).unwrap_or_default()
    }
}

/// sqlparser accepts `SELECT FROM t` with an empty select list (and
/// `SELECT FROM WHERE` with a table named `WHERE`). Neither is a query.
fn empty_projection(
    statement: &Statement,
    tokens: &TokenStream,
    map: &SourceMap<'_>
) -> Option<ParseError> {
    Walk::new(statement).find_map(|visit| {
        let Node::Select(select) = visit.node else {
            return None;
        };
        if !select.projection.is_empty() {
            return None;
        }
        let after = match &select.distinct {
            Some(distinct) => distinct.span.end,
            None => tokens
                .next_significant(select.span.start)
                .map_or(select.span.start, |(_, keyword)| keyword.span.end)
        };
        let (found, position) = match tokens.next_significant(after) {
            Some((_, lexeme)) => (lexeme.token.to_string(), map.position_of(lexeme.span.start)),
            None => ("EOF".to_string(), map.position_of(map.len()))
        };
        Some(ParseError::at(
            format!("Expected: a select item, found: {}", found),
            position
        ))
    })
}

/// Split a script into the source ranges of its statements.
///
/// Splits on top-level semicolons using the tokenizer, so semicolons inside
/// string literals or comments are ignored. Empty statements are skipped.
pub fn split_statements(sql: &str, dialect: SqlDialect) -> Result<Vec<Span>, ParseError> {
    let map = SourceMap::new(sql);
    let parser_dialect = dialect.into_parser_dialect();
    let tokens = TokenStream::tokenize(sql, parser_dialect.as_ref(), &map)?;
    Ok(tokens.statement_spans())
}
