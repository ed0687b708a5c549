use super::{Finding, Rule, RuleCategory, RuleInfo, Severity};
use crate::ast::{
    Column, Expr, JoinConstraint, JoinKind, Node, NodeKind, PredicateKind, SelectStatement,
    TableRef, TableSource, Visit, last_segment
};

/// Relations combined without a join predicate, whether listed with commas
/// or joined `ON` a condition that never relates the two sides
pub struct ImplicitCrossJoin;

impl Rule for ImplicitCrossJoin {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "implicit-cross-join",
            name:       "Implicit cross join",
            severity:   Severity::Critical,
            category:   RuleCategory::Correctness,
            applies_to: &[NodeKind::Select]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        let Node::Select(select) = visit.node else {
            return vec![];
        };
        let groups = disconnected_groups(select);
        if groups.len() < 2 {
            return vec![];
        }
        let span = select
            .from
            .iter()
            .map(TableRef::full_span)
            .reduce(|a, b| a.join(b))
            .unwrap_or(select.span);
        let described: Vec<String> = groups.iter().map(|g| g.join(" + ")).collect();
        vec![self.info().finding(
            span,
            format!(
                "relations {} are not related by any join predicate",
                described.join(" / ")
            )
        )]
    }
}

/// One relation in `FROM`, joined ones included.
struct Relation {
    label: String,
    /// Lower-cased name columns qualify it with
    name:  Option<String>
}

/// Relations of a select plus the pairs already related by the join syntax.
#[derive(Default)]
struct JoinGraph<'a> {
    relations:   Vec<Relation>,
    links:       Vec<(usize, usize)>,
    comparisons: Vec<(&'a Column, &'a Column)>
}

impl<'a> JoinGraph<'a> {
    /// Adds `table` and its joins; returns the index its joins hang off.
    fn add(&mut self, table: &'a TableRef) -> usize {
        let root = match &table.source {
            TableSource::Nested(inner) => self.add(inner),
            _ => {
                let idx = self.relations.len();
                let name = table.alias.as_deref().or(table.table_name());
                self.relations.push(Relation {
                    label: name.map_or_else(|| format!("#{}", idx + 1), str::to_string),
                    name:  name.map(|n| last_segment(n).to_lowercase())
                });
                idx
            }
        };
        for join in &table.joins {
            let joined = self.add(&join.relation);
            match &join.constraint {
                JoinConstraint::On(expr) => column_comparisons(expr, &mut self.comparisons),
                JoinConstraint::Using(_) | JoinConstraint::Natural => {
                    self.links.push((root, joined))
                }
                // CROSS JOIN and dialect-specific operators are deliberate.
                JoinConstraint::None if matches!(join.kind, JoinKind::Cross | JoinKind::Other) => {
                    self.links.push((root, joined))
                }
                JoinConstraint::None => {}
            }
        }
        root
    }

    fn resolve(&self, column: &Column) -> Option<usize> {
        let qualifier = last_segment(column.qualifier.as_deref()?).to_lowercase();
        self.relations
            .iter()
            .position(|r| r.name.as_deref() == Some(qualifier.as_str()))
    }
}

/// Groups of relation labels that no predicate connects; one group means
/// everything is connected.
fn disconnected_groups(select: &SelectStatement) -> Vec<Vec<String>> {
    let mut graph = JoinGraph::default();
    for table in &select.from {
        graph.add(table);
    }
    if let Some(selection) = &select.selection {
        column_comparisons(selection, &mut graph.comparisons);
    }
    if graph.relations.len() < 2 {
        return vec![];
    }

    let mut parent: Vec<usize> = (0..graph.relations.len()).collect();
    let mut links = graph.links.clone();
    for (left, right) in &graph.comparisons {
        let (Some(l), Some(r)) = (graph.resolve(left), graph.resolve(right)) else {
            // Unqualified or outer columns may belong to any relation.
            return vec![graph.relations.into_iter().map(|r| r.label).collect()];
        };
        links.push((l, r));
    }
    for (l, r) in links {
        let (root_l, root_r) = (find(&mut parent, l), find(&mut parent, r));
        if root_l != root_r {
            parent[root_r] = root_l;
        }
    }

    let mut groups: Vec<(usize, Vec<String>)> = Vec::new();
    for idx in 0..graph.relations.len() {
        let root = find(&mut parent, idx);
        let label = graph.relations[idx].label.clone();
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(label),
            None => groups.push((root, vec![label]))
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

fn find(parent: &mut [usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        parent[idx] = parent[parent[idx]];
        idx = parent[idx];
    }
    idx
}

/// Column-to-column comparisons, not descending into subqueries.
fn column_comparisons<'a>(expr: &'a Expr, out: &mut Vec<(&'a Column, &'a Column)>) {
    for expr in expr.descendants() {
        if let Expr::Predicate(predicate) = expr
            && let PredicateKind::Compare {
                left,
                right,
                ..
            } = &predicate.kind
            && let (Some(l), Some(r)) = (left.as_column(), right.as_column())
        {
            out.push((l, r));
        }
    }
}

/// `x NOT IN (SELECT ...)` is empty as soon as the subquery yields a NULL
pub struct NotInSubquery;

impl Rule for NotInSubquery {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:         "not-in-subquery",
            name:       "NOT IN with subquery",
            severity:   Severity::Warning,
            category:   RuleCategory::Correctness,
            applies_to: &[NodeKind::Predicate]
        }
    }

    fn evaluate(&self, visit: &Visit<'_>) -> Vec<Finding> {
        match visit.node {
            Node::Expr(Expr::Predicate(predicate))
                if matches!(
                    predicate.kind,
                    PredicateKind::InSubquery {
                        negated: true,
                        ..
                    }
                ) =>
            {
                vec![self.info().finding(
                    predicate.span,
                    "NOT IN returns no rows if the subquery yields any NULL"
                )]
            }
            _ => vec![]
        }
    }
}
