//! Bindings (§3): the result of planning and traversal — a mapping
//! from each pattern variable to an ordered, deduplicated candidate
//! set, plus any edges recorded under a relation-variable during
//! traversal.

use bql_api::{NodeId, NodeRecord, Relation};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source_id: NodeId,
    pub relation: Relation,
    pub target_id: NodeId,
    pub edge_id: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    candidates: HashMap<String, Vec<NodeRecord>>,
    edges: HashMap<String, Vec<Edge>>,
    /// Every edge the traversal executor followed into a target
    /// variable, keyed by that variable's name regardless of whether
    /// the relationship pattern itself carried a variable. The result
    /// projector (§4.9) uses this to join adjacent RETURN variables
    /// through the traversal rather than falling back to a cartesian
    /// product.
    pair_edges: HashMap<String, Vec<Edge>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&self, variable: &str) -> &[NodeRecord] {
        self.candidates.get(variable).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_candidates(&mut self, variable: impl Into<String>, nodes: Vec<NodeRecord>) {
        self.candidates.insert(variable.into(), dedupe_by_id(nodes));
    }

    pub fn has_candidates(&self, variable: &str) -> bool {
        self.candidates.contains_key(variable)
    }

    pub fn edges(&self, relation_variable: &str) -> &[Edge] {
        self.edges.get(relation_variable).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push_edge(&mut self, relation_variable: String, edge: Edge) {
        self.edges.entry(relation_variable).or_default().push(edge);
    }

    pub fn pair_edges(&self, target_variable: &str) -> &[Edge] {
        self.pair_edges.get(target_variable).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push_pair_edge(&mut self, target_variable: String, edge: Edge) {
        self.pair_edges.entry(target_variable).or_default().push(edge);
    }
}

/// Candidate sets are deduplicated by node ID (§4.5); first occurrence
/// wins, preserving resolution order.
fn dedupe_by_id(nodes: Vec<NodeRecord>) -> Vec<NodeRecord> {
    let mut seen = std::collections::HashSet::new();
    nodes
        .into_iter()
        .filter(|n| seen.insert(n.id))
        .collect()
}
