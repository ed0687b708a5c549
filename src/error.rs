//! Error types for the analyzer.
//!
//! The core reports failures through [`AnalyzerError`]. Only parse failures,
//! oversized or empty input and configuration problems abort an analysis;
//! defects inside a single rule or edit are reported as
//! [`InvariantViolation`]s, logged and dropped so the rest of the analysis
//! survives.
//!
//! Binaries work with [`AppResult`] and convert through the
//! `From<AnalyzerError> for AppError` bridge.

use std::sync::LazyLock;

pub use masterror::{AppError, AppResult};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::ast::{SourceMap, Span};

/// Line/column position inside the analyzed text.
///
/// `line` and `column` are 1-based, `offset` is a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    pub line:   usize,
    pub column: usize,
    pub offset: usize
}

/// Input is not valid SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// Parser message, verbatim
    pub message:  String,
    /// Position of the first offending token when the parser reports one
    pub position: Option<SourcePosition>
}

impl ParseError {
    /// Build from a raw parser message, resolving `Line: X, Column: Y`
    /// against the source text.
    pub fn from_parser_message(message: impl Into<String>, source: &SourceMap<'_>) -> Self {
        let message = message.into();
        let position = extract_position(&message).map(|(line, column)| SourcePosition {
            line,
            column,
            offset: source.offset_of(line, column).unwrap_or(source.len())
        });
        Self {
            message,
            position
        }
    }

    pub fn at(message: impl Into<String>, position: Option<SourcePosition>) -> Self {
        Self {
            message: message.into(),
            position
        }
    }
}

/// Errors surfaced to callers of the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("could not parse SQL: {0}")]
    Parse(#[from] ParseError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("SQL query cannot be empty")]
    EmptyQuery,
    #[error("query is {length} characters long, maximum allowed is {max}")]
    QueryTooLong { length: usize, max: usize }
}

impl AnalyzerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns the parse error when this is a parse failure.
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None
        }
    }
}

/// Programming defects detected while analyzing.
///
/// Never returned to callers: the finding or edit that triggered it is
/// dropped and the violation is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("rule {rule_id} reported span {span} outside source of length {len}")]
    FindingOutOfBounds {
        rule_id: &'static str,
        span:    Span,
        len:     usize
    },
    #[error("edit from rule {rule_id} at {span} is not a valid range of source of length {len}")]
    InvalidEdit {
        rule_id: &'static str,
        span:    Span,
        len:     usize
    },
    #[error("rewritten query no longer parses: {message}")]
    RewriteUnparseable { message: String }
}

impl InvariantViolation {
    /// Log the violation; callers drop the offending item afterwards.
    pub fn report(&self) {
        tracing::warn!(violation = %self, "internal invariant violation, item dropped");
    }
}

impl From<AnalyzerError> for AppError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::Parse(e) => query_parse_error(&e),
            AnalyzerError::Configuration(msg) => config_error(msg),
            other => AppError::bad_request(other.to_string())
        }
    }
}

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create schema parse error with optional position info
pub fn schema_parse_error(err: &ParseError) -> AppError {
    AppError::bad_request(format_sql_error("Schema parse error", err))
}

/// Create query parse error with optional position info
pub fn query_parse_error(err: &ParseError) -> AppError {
    AppError::bad_request(format_sql_error("Query parse error", err))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, err: &ParseError) -> String {
    if let Some(pos) = err.position {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, err.message
        )
    } else {
        format!("{}:\n  {}", prefix, err.message)
    }
}

static POSITION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Line:\s*(\d+),\s*Column:?\s*(\d+)").ok());

/// Pull `(line, column)` out of a sqlparser message.
///
/// Both `Line: 1, Column: 8` and the older `Line: 1, Column 8` are accepted;
/// the last occurrence wins since sqlparser appends the position.
pub fn extract_position(message: &str) -> Option<(usize, usize)> {
    let pattern = POSITION_PATTERN.as_ref()?;
    let caps = pattern.captures_iter(message).last()?;
    let line = caps.get(1)?.as_str().parse().ok()?;
    let column = caps.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}
