//! Type definitions for the rule system.
//!
//! - [`Severity`] - finding severity levels (Info, Warning, Critical)
//! - [`RuleCategory`] - rule categories (Performance, Correctness, Style)
//! - [`Finding`] - one match of a rule, anchored to a source span
//! - [`RewriteHint`] - what a finding would change if rewritten

use std::{fmt, str::FromStr};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ast::{NodeKind, Span, TableBinding};

/// Severity level of a finding.
///
/// Ordered from lowest to highest for sorting and thresholds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational suggestion, does not affect exit code
    #[default]
    Info,
    /// Likely performance problem (exit code 1)
    Warning,
    /// Query that is almost certainly wrong or dangerous (exit code 2)
    Critical
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Critical => write!(f, "CRITICAL")
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_severity(s).ok_or_else(|| format!("unknown severity '{}'", s))
    }
}

/// Parse severity string to enum
pub fn parse_severity(s: &str) -> Option<Severity> {
    match s.trim().to_lowercase().as_str() {
        "critical" | "error" => Some(Severity::Critical),
        "warning" | "warn" => Some(Severity::Warning),
        "info" => Some(Severity::Info),
        _ => None
    }
}

/// Category of a rule for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleCategory {
    /// Patterns that defeat indexes or force extra work
    Performance,
    /// Patterns that usually change the result in unintended ways
    Correctness,
    /// Patterns that hurt clarity or robustness
    Style
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Performance => write!(f, "Performance"),
            Self::Correctness => write!(f, "Correctness"),
            Self::Style => write!(f, "Style")
        }
    }
}

/// Metadata about a rule for identification and configuration.
#[derive(Debug, Clone)]
pub struct RuleInfo {
    /// Stable kebab-case identifier (e.g. "select-star")
    pub id:         &'static str,
    /// Human-readable rule name
    pub name:       &'static str,
    pub severity:   Severity,
    pub category:   RuleCategory,
    /// Node kinds the engine hands to this rule
    pub applies_to: &'static [NodeKind]
}

impl RuleInfo {
    /// Finding of this rule without a rewrite.
    pub fn finding(&self, span: Span, message: impl Into<String>) -> Finding {
        Finding {
            rule_id: self.id,
            severity: self.severity,
            span,
            message: message.into(),
            rewrite_hint: None
        }
    }
}

/// Edit a finding proposes; turned into concrete text by the rewriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewriteHint {
    /// Delete the `DISTINCT` keyword (and following blanks)
    RemoveDistinct { span: Span },
    /// Replace `*` / `t.*` with explicit columns from the catalog
    ExpandWildcard {
        span:      Span,
        qualifier: Option<CompactString>,
        sources:   SmallVec<[TableBinding; 4]>
    },
    /// Replace a range with fixed text
    Replace {
        span:        Span,
        replacement: String
    }
}

impl RewriteHint {
    pub fn span(&self) -> Span {
        match self {
            Self::RemoveDistinct {
                span
            }
            | Self::ExpandWildcard {
                span, ..
            }
            | Self::Replace {
                span, ..
            } => *span
        }
    }
}

/// One match of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id:      &'static str,
    pub severity:     Severity,
    /// Source range the finding points at
    pub span:         Span,
    /// Detail sentence, filled into the suggestion template
    pub message:      String,
    pub rewrite_hint: Option<RewriteHint>
}

impl Finding {
    pub fn with_hint(mut self, hint: RewriteHint) -> Self {
        self.rewrite_hint = Some(hint);
        self
    }
}
