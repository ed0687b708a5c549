//! Anti-pattern rules and the rule registry.
//!
//! A rule is a pure matcher over one node of the normalized tree. The engine
//! hands it every node whose [`NodeKind`] the rule declares in
//! [`RuleInfo::applies_to`], together with the clause the node sits in and
//! its parent. Rules never see each other's output, so they can run in any
//! order and in parallel.
//!
//! # Built-in Rules
//!
//! | id | severity | category |
//! |----|----------|----------|
//! | `select-star` | Warning | Style |
//! | `redundant-distinct` | Info | Style |
//! | `or-to-in` | Info | Style |
//! | `missing-where` | Critical | Performance |
//! | `non-sargable-predicate` | Warning | Performance |
//! | `leading-wildcard` | Warning | Performance |
//! | `large-offset` | Warning | Performance |
//! | `scalar-subquery` | Warning | Performance |
//! | `union-without-all` | Info | Performance |
//! | `implicit-cross-join` | Critical | Correctness |
//! | `not-in-subquery` | Warning | Correctness |
//!
//! # Configuration
//!
//! ```toml
//! [rules]
//! enabled = ["select-star", "missing-where"]
//! disabled = ["or-to-in"]
//! min_severity = "warning"
//! ```
//!
//! # Implementing Custom Rules
//!
//! ```
//! use sqlgenie::{
//!     ast::{Clause, Node, NodeKind, Visit},
//!     rules::{Finding, Rule, RuleCategory, RuleInfo, Severity}
//! };
//!
//! pub struct NoHaving;
//!
//! impl Rule for NoHaving {
//!     fn info(&self) -> RuleInfo {
//!         RuleInfo {
//!             id:         "no-having",
//!             name:       "HAVING clause",
//!             severity:   Severity::Info,
//!             category:   RuleCategory::Style,
//!             applies_to: &[NodeKind::Predicate]
//!         }
//!     }
//!
//!     fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
//!         match (visit.clause, visit.node) {
//!             (Clause::Having, Node::Expr(expr)) => {
//!                 vec![self.info().finding(expr.span(), "filter in HAVING")]
//!             }
//!             _ => vec![]
//!         }
//!     }
//! }
//! ```

mod correctness;
mod performance;
mod style;
mod types;

use std::sync::Arc;

pub use types::{Finding, RewriteHint, RuleCategory, RuleInfo, Severity, parse_severity};

use crate::{
    ast::{NodeKind, Visit},
    catalog::Catalog,
    config::RulesConfig,
    error::AnalyzerError
};

/// A single anti-pattern matcher.
///
/// Implementations must be deterministic and total: any node, including
/// kinds the rule did not ask for, yields a (possibly empty) list of
/// findings. They must be `Send + Sync` for parallel evaluation.
pub trait Rule: Send + Sync {
    /// Returns metadata about this rule.
    fn info(&self) -> RuleInfo;

    /// Inspects one visited node.
    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding>;

    /// Whether the engine should call [`Rule::evaluate`] for `kind`.
    fn applies_to(&self, kind: NodeKind) -> bool {
        self.info().applies_to.contains(&kind)
    }
}

/// Every built-in rule, in documentation order.
///
/// `catalog` feeds the rules that can use table metadata
/// (`redundant-distinct`).
pub fn builtin_rules(catalog: Option<Arc<Catalog>>) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(style::SelectStar),
        Box::new(style::RedundantDistinct::new(catalog)),
        Box::new(style::OrToIn),
        Box::new(performance::MissingWhere),
        Box::new(performance::NonSargablePredicate),
        Box::new(performance::LeadingWildcard),
        Box::new(performance::LargeOffset),
        Box::new(performance::ScalarSubquery),
        Box::new(performance::UnionWithoutAll),
        Box::new(correctness::ImplicitCrossJoin),
        Box::new(correctness::NotInSubquery),
    ]
}

/// Immutable set of enabled rules.
///
/// Built once from configuration and shared by reference with every
/// analysis.
///
/// # Example
///
/// ```
/// use sqlgenie::{config::RulesConfig, rules::RuleSet};
///
/// let config = RulesConfig {
///     disabled: vec!["or-to-in".into()],
///     ..Default::default()
/// };
///
/// let rules = RuleSet::from_config(&config, None).unwrap();
/// assert!(!rules.ids().any(|id| id == "or-to-in"));
/// assert!(rules.ids().any(|id| id == "select-star"));
///
/// let unknown = RulesConfig {
///     disabled: vec!["no-such-rule".into()],
///     ..Default::default()
/// };
/// assert!(RuleSet::from_config(&unknown, None).is_err());
/// ```
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::all(None)
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl RuleSet {
    /// Every built-in rule enabled.
    pub fn all(catalog: Option<Arc<Catalog>>) -> Self {
        Self::with_rules(builtin_rules(catalog))
    }

    /// Wrap an explicit rule list.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules
        }
    }

    /// Select built-in rules per configuration.
    ///
    /// `enabled` restricts the set (default: all), `disabled` removes from
    /// it. Ids are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Configuration`] naming the first rule id that
    /// matches no built-in rule.
    pub fn from_config(
        config: &RulesConfig,
        catalog: Option<Arc<Catalog>>
    ) -> Result<Self, AnalyzerError> {
        let all = builtin_rules(catalog);
        let known: Vec<&'static str> = all.iter().map(|r| r.info().id).collect();
        let requested = config.enabled.iter().flatten().chain(&config.disabled);
        if let Some(unknown) =
            requested.into_iter().find(|id| !known.iter().any(|k| k.eq_ignore_ascii_case(id)))
        {
            return Err(AnalyzerError::configuration(format!(
                "unknown rule id '{}' (known: {})",
                unknown,
                known.join(", ")
            )));
        }
        let rules: Vec<Box<dyn Rule>> = all
            .into_iter()
            .filter(|rule| {
                let id = rule.info().id;
                let enabled = config
                    .enabled
                    .as_ref()
                    .is_none_or(|list| list.iter().any(|e| e.eq_ignore_ascii_case(id)));
                enabled && !config.disabled.iter().any(|d| d.eq_ignore_ascii_case(id))
            })
            .collect();
        tracing::debug!(rules = rules.len(), "rule set built");
        Ok(Self::with_rules(rules))
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.info().id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
