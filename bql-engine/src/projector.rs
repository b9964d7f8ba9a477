//! Result projector (§4.9). Turns bindings plus a `RETURN` list into an
//! ordered sequence of result rows.
//!
//! `RETURN v` yields the full node record; `RETURN v.name` / `RETURN
//! v.id` yields the single field. When more than one variable is
//! projected, rows are the cartesian product of their candidate sets
//! *unless* a relationship bound them, in which case rows come from the
//! traversal's recorded edges (§4.9) — joined pairwise, in the order
//! the `RETURN` list first mentions each variable. BQL patterns are
//! linear chains (no path-variable binding, a Non-goal per §1), so
//! pairwise joining of each newly introduced variable against the
//! row built so far is sufficient; it does not attempt to reconstruct
//! a full multi-hop path when two returned variables are separated by
//! an intermediate hop neither side names.

use crate::ast::{Pattern, PatternElement, ReturnItem};
use crate::bindings::Bindings;
use bql_api::{NodeId, NodeRecord};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedValue {
    Node(NodeRecord),
    Name(String),
    Id(NodeId),
}

pub fn project(
    patterns: &[&Pattern],
    bindings: &Bindings,
    items: &[ReturnItem],
) -> Vec<Vec<ProjectedValue>> {
    let mut order: Vec<&str> = Vec::new();
    for item in items {
        let var = match item {
            ReturnItem::Node(v) => v.as_str(),
            ReturnItem::Field(v, _) => v.as_str(),
        };
        if !order.contains(&var) {
            order.push(var);
        }
    }

    if order.is_empty() {
        return Vec::new();
    }

    let mut rows: Vec<HashMap<&str, NodeRecord>> = bindings
        .candidates(order[0])
        .iter()
        .map(|n| {
            let mut row = HashMap::new();
            row.insert(order[0], n.clone());
            row
        })
        .collect();

    for &var in &order[1..] {
        rows = extend_rows(patterns, bindings, rows, var);
    }

    rows.into_iter()
        .map(|row| items.iter().map(|item| project_item(item, &row)).collect())
        .collect()
}

fn extend_rows<'a>(
    patterns: &[&Pattern],
    bindings: &Bindings,
    rows: Vec<HashMap<&'a str, NodeRecord>>,
    var: &'a str,
) -> Vec<HashMap<&'a str, NodeRecord>> {
    let candidates = bindings.candidates(var);
    let pair_edges = bindings.pair_edges(var);

    if pair_edges.is_empty() || !adjacent_to_any_bound(patterns, &rows, var) {
        // No relationship binds this variable to anything already in
        // the row: fall back to the cartesian product (§4.9).
        let mut out = Vec::with_capacity(rows.len() * candidates.len().max(1));
        for row in &rows {
            for node in candidates {
                let mut next = row.clone();
                next.insert(var, node.clone());
                out.push(next);
            }
        }
        return out;
    }

    let mut out = Vec::new();
    for row in &rows {
        for edge in pair_edges {
            if row.values().any(|n| n.id == edge.source_id) {
                if let Some(target) = candidates.iter().find(|n| n.id == edge.target_id) {
                    let mut next = row.clone();
                    next.insert(var, target.clone());
                    out.push(next);
                }
            }
        }
    }
    out
}

/// Whether `var` is the target end of a relationship pattern whose
/// source node is already present in some row — i.e. whether the
/// traversal's recorded edges are a meaningful join key here, rather
/// than two independently-resolved variables that merely share a query.
fn adjacent_to_any_bound(
    patterns: &[&Pattern],
    rows: &[HashMap<&str, NodeRecord>],
    var: &str,
) -> bool {
    if rows.is_empty() {
        return false;
    }
    let bound_vars: std::collections::HashSet<&str> = rows[0].keys().copied().collect();

    for pattern in patterns {
        let mut prev_var: Option<&str> = None;
        for element in &pattern.elements {
            match element {
                PatternElement::Node(n) => {
                    if n.variable == var {
                        if let Some(p) = prev_var {
                            if bound_vars.contains(p) {
                                return true;
                            }
                        }
                    }
                    prev_var = Some(n.variable.as_str());
                }
                PatternElement::Relationship(_) => {}
            }
        }
    }
    false
}

fn project_item(item: &ReturnItem, row: &HashMap<&str, NodeRecord>) -> ProjectedValue {
    match item {
        ReturnItem::Node(var) => ProjectedValue::Node(row[var.as_str()].clone()),
        ReturnItem::Field(var, field) => {
            let node = &row[var.as_str()];
            match field.as_str() {
                "id" => ProjectedValue::Id(node.id),
                "name" => ProjectedValue::Name(node.name.clone()),
                other => ProjectedValue::Name(match other {
                    "label" => node.label.clone().unwrap_or_default(),
                    "foregroundColor" => node.foreground_color.clone().unwrap_or_default(),
                    "backgroundColor" => node.background_color.clone().unwrap_or_default(),
                    _ => String::new(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{HopBound, NodePattern, RelationSet, RelationshipPattern};
    use crate::bindings::Edge;
    use bql_api::Relation;

    fn node(id: NodeId, name: &str) -> NodeRecord {
        NodeRecord {
            id,
            name: name.to_string(),
            type_id: None,
            label: None,
            foreground_color: None,
            background_color: None,
            kind: "Thought".to_string(),
        }
    }

    #[test]
    fn single_variable_projects_every_candidate() {
        let mut bindings = Bindings::new();
        bindings.set_candidates("n", vec![node(1, "A"), node(2, "B")]);
        let items = vec![ReturnItem::Field("n".into(), "name".into())];
        let rows = project(&[], &bindings, &items);
        assert_eq!(
            rows,
            vec![
                vec![ProjectedValue::Name("A".into())],
                vec![ProjectedValue::Name("B".into())],
            ]
        );
    }

    #[test]
    fn full_node_record_is_returned_for_bare_variable() {
        let mut bindings = Bindings::new();
        bindings.set_candidates("n", vec![node(1, "A")]);
        let items = vec![ReturnItem::Node("n".into())];
        let rows = project(&[], &bindings, &items);
        assert_eq!(rows, vec![vec![ProjectedValue::Node(node(1, "A"))]]);
    }

    #[test]
    fn relationship_bound_variables_join_through_recorded_edges_not_cartesian() {
        let mut bindings = Bindings::new();
        bindings.set_candidates("n", vec![node(1, "A"), node(2, "Z")]);
        bindings.set_candidates("m", vec![node(10, "A-child"), node(20, "Z-child")]);
        bindings.push_pair_edge(
            "m",
            Edge { source_id: 1, relation: Relation::Child, target_id: 10, edge_id: None },
        );
        bindings.push_pair_edge(
            "m",
            Edge { source_id: 2, relation: Relation::Child, target_id: 20, edge_id: None },
        );

        let pattern = Pattern {
            elements: vec![
                PatternElement::Node(NodePattern { variable: "n".into(), type_label: None, name_constraint: None }),
                PatternElement::Relationship(RelationshipPattern {
                    variable: None,
                    relation_set: RelationSet::Single(Relation::Child),
                    hop_min: 1,
                    hop_max: HopBound::Fixed(1),
                }),
                PatternElement::Node(NodePattern { variable: "m".into(), type_label: None, name_constraint: None }),
            ],
        };

        let items = vec![ReturnItem::Node("n".into()), ReturnItem::Node("m".into())];
        let rows = project(&[&pattern], &bindings, &items);

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![ProjectedValue::Node(node(1, "A")), ProjectedValue::Node(node(10, "A-child"))]
        );
        assert_eq!(
            rows[1],
            vec![ProjectedValue::Node(node(2, "Z")), ProjectedValue::Node(node(20, "Z-child"))]
        );
    }

    #[test]
    fn unconnected_variables_form_cartesian_product() {
        let mut bindings = Bindings::new();
        bindings.set_candidates("n", vec![node(1, "A"), node(2, "B")]);
        bindings.set_candidates("m", vec![node(10, "X"), node(20, "Y")]);

        let items = vec![ReturnItem::Node("n".into()), ReturnItem::Node("m".into())];
        let rows = project(&[], &bindings, &items);
        assert_eq!(rows.len(), 4);
    }
}
