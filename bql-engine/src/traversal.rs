//! Traversal executor (§4.6). Walks one pattern's relationship chain
//! left to right, a breadth-first search per source node per hop,
//! expanding the relation-set and respecting the hop range.

use crate::ast::{HopBound, NodePattern, Pattern, PatternElement, RelationshipPattern, WhereExpr};
use crate::bindings::{Bindings, Edge};
use crate::error::{Error, ServiceErrorStage};
use crate::evaluator;
use bql_api::{GraphService, NodeId, NodeRecord};
use std::collections::{HashMap, HashSet};

pub fn traverse_pattern<G: GraphService>(
    graph: &G,
    pattern: &Pattern,
    where_clause: Option<&WhereExpr>,
    bindings: &mut Bindings,
) -> Result<(), Error> {
    let mut source_var: Option<String> = None;
    let mut pending_rel: Option<&RelationshipPattern> = None;

    for element in &pattern.elements {
        match element {
            PatternElement::Node(node) => {
                if let (Some(src), Some(rel)) = (&source_var, pending_rel) {
                    run_hop(graph, src, rel, node, where_clause, bindings)?;
                }
                source_var = Some(node.variable.clone());
                pending_rel = None;
            }
            PatternElement::Relationship(rel) => {
                pending_rel = Some(rel);
            }
        }
    }
    Ok(())
}

fn run_hop<G: GraphService>(
    graph: &G,
    source_var: &str,
    rel: &RelationshipPattern,
    target: &NodePattern,
    where_clause: Option<&WhereExpr>,
    bindings: &mut Bindings,
) -> Result<(), Error> {
    let relations = rel.relation_set.expand();
    // The validator rejects `HopBound::Unbounded` before the planner
    // ever runs, so by the time traversal executes every relationship
    // pattern carries a concrete upper bound.
    let hop_max = match rel.hop_max {
        HopBound::Fixed(m) => m,
        HopBound::Unbounded => unreachable!("unbounded hop specifiers are rejected by the validator"),
    };

    let sources: Vec<NodeRecord> = bindings.candidates(source_var).to_vec();

    let mut reached: HashMap<NodeId, NodeRecord> = HashMap::new();
    // More than one entry per target is possible: distinct source nodes
    // (or distinct paths from the same source, across hop depths) can
    // each reach the same target. The Open Question in §9 resolves this
    // by deduplicating the *candidate set* by node id (done above via
    // `reached`) while preserving each distinct reaching edge here, so
    // the result projector can still produce one row per traversed path.
    let mut reaching_edges: HashMap<NodeId, Vec<Edge>> = HashMap::new();

    for source in &sources {
        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(source.id);
        let mut frontier = vec![source.id];

        for depth in 1..=hop_max {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for &node_id in &frontier {
                let neighbors = graph.neighborhood(node_id, &relations).map_err(|e| Error::ServiceError {
                    stage: ServiceErrorStage::PreMutation,
                    source: e,
                })?;
                for neighbor in neighbors {
                    if visited.contains(&neighbor.node.id) {
                        continue;
                    }
                    visited.insert(neighbor.node.id);
                    next_frontier.push(neighbor.node.id);

                    if depth >= rel.hop_min {
                        reached.entry(neighbor.node.id).or_insert_with(|| neighbor.node.clone());
                        reaching_edges.entry(neighbor.node.id).or_default().push(Edge {
                            source_id: node_id,
                            relation: neighbor.relation,
                            target_id: neighbor.node.id,
                            edge_id: neighbor.edge_id,
                        });
                    }
                }
            }
            frontier = next_frontier;
        }
    }

    let mut target_nodes: Vec<NodeRecord> = reached.into_values().collect();

    // The target variable may also carry its own independent constraint
    // (e.g. `(m {name: "B"})`), already resolved before traversal ran —
    // in that case the pattern only matches nodes that are both that
    // constraint's candidates and reachable from the source (§4.6).
    if bindings.has_candidates(&target.variable) {
        let already_resolved: HashSet<NodeId> = bindings
            .candidates(&target.variable)
            .iter()
            .map(|n| n.id)
            .collect();
        target_nodes.retain(|n| already_resolved.contains(&n.id));
    }

    if let Some(where_clause) = where_clause {
        target_nodes.retain(|n| evaluator::matches_variable(where_clause, &target.variable, n));
    }

    for node in &target_nodes {
        if let Some(edges) = reaching_edges.get(&node.id) {
            for edge in edges {
                bindings.push_pair_edge(target.variable.clone(), *edge);
                if let Some(rel_var) = &rel.variable {
                    bindings.push_edge(rel_var.clone(), *edge);
                }
            }
        }
    }

    bindings.set_candidates(target.variable.clone(), target_nodes);
    Ok(())
}
