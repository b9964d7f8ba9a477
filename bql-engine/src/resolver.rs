//! Node resolver (§4.5). Turns a [`VariablePlan`](crate::planner::VariablePlan)
//! into an ordered, deduplicated candidate list by making exactly the
//! graph-service calls its strategy calls for.

use crate::error::Error;
use crate::planner::{NameFilter, ResolutionStrategy, VariablePlan};
use bql_api::{GraphService, NodeId, NodeRecord};

pub fn resolve<G: GraphService>(
    graph: &G,
    plan: &VariablePlan,
    active_graph_id: NodeId,
) -> Result<Vec<NodeRecord>, Error> {
    let candidates = match &plan.strategy {
        ResolutionStrategy::ExactName(name) => {
            resolve_exact(graph, name, active_graph_id)?
        }
        ResolutionStrategy::FullTextSearch { query, filter } => {
            resolve_full_text(graph, query, *filter, active_graph_id)?
        }
        ResolutionStrategy::SimilarityFallback(name) => {
            resolve_similarity(graph, name, active_graph_id)?
        }
        ResolutionStrategy::TypeOnly(type_label) => {
            return resolve_type_only(graph, type_label, active_graph_id);
        }
        ResolutionStrategy::Deferred => Vec::new(),
    };

    match &plan.type_label {
        Some(type_label) if !candidates.is_empty() => {
            apply_type_filter(graph, candidates, type_label, active_graph_id)
        }
        _ => Ok(candidates),
    }
}

fn resolve_exact<G: GraphService>(
    graph: &G,
    name: &str,
    active_graph_id: NodeId,
) -> Result<Vec<NodeRecord>, Error> {
    let found = graph
        .get_by_name(name, active_graph_id)
        .map_err(|e| Error::ServiceError {
            stage: crate::error::ServiceErrorStage::PreMutation,
            source: e,
        })?;
    Ok(found.into_iter().collect())
}

fn resolve_full_text<G: GraphService>(
    graph: &G,
    query: &str,
    filter: NameFilter,
    active_graph_id: NodeId,
) -> Result<Vec<NodeRecord>, Error> {
    let hits = graph
        .search(query, active_graph_id)
        .map_err(|e| Error::ServiceError {
            stage: crate::error::ServiceErrorStage::PreMutation,
            source: e,
        })?;
    Ok(hits
        .into_iter()
        .filter(|n| filter.apply(&n.name, query))
        .collect())
}

/// `=~` (§4.4, §4.5): exact match first; if none, fall back to
/// full-text search and rank the hits by name similarity to the
/// literal, most similar first, ties broken by the order the search
/// returned them in (a stable sort preserves this).
fn resolve_similarity<G: GraphService>(
    graph: &G,
    name: &str,
    active_graph_id: NodeId,
) -> Result<Vec<NodeRecord>, Error> {
    let exact = resolve_exact(graph, name, active_graph_id)?;
    if !exact.is_empty() {
        return Ok(exact);
    }

    let mut hits = graph
        .search(name, active_graph_id)
        .map_err(|e| Error::ServiceError {
            stage: crate::error::ServiceErrorStage::PreMutation,
            source: e,
        })?;
    hits.sort_by(|a, b| {
        let score_a = strsim::normalized_levenshtein(&a.name, name);
        let score_b = strsim::normalized_levenshtein(&b.name, name);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(hits)
}

/// `(n:TypeName)` with no other constraint (§4.4, §9): resolves to the
/// type node itself, never to its instances — expanding a bare type
/// label to every node of that type would surface an uber-node.
fn resolve_type_only<G: GraphService>(
    graph: &G,
    type_label: &str,
    active_graph_id: NodeId,
) -> Result<Vec<NodeRecord>, Error> {
    let types = graph
        .list_types(active_graph_id)
        .map_err(|e| Error::ServiceError {
            stage: crate::error::ServiceErrorStage::PreMutation,
            source: e,
        })?;
    match types.into_iter().find(|t| t.name == type_label) {
        Some(t) => Ok(vec![NodeRecord {
            id: t.id,
            name: t.name,
            type_id: None,
            label: None,
            foreground_color: None,
            background_color: None,
            kind: "Type".to_string(),
        }]),
        None => Err(Error::resolution(
            type_label,
            "referenced type label does not exist",
        )),
    }
}

/// §4.5 step 1: drop candidates whose `type_id` doesn't match the
/// labeled type's id. Only applied when there is at least one
/// candidate to filter; the caller already checks this.
fn apply_type_filter<G: GraphService>(
    graph: &G,
    candidates: Vec<NodeRecord>,
    type_label: &str,
    active_graph_id: NodeId,
) -> Result<Vec<NodeRecord>, Error> {
    let types = graph
        .list_types(active_graph_id)
        .map_err(|e| Error::ServiceError {
            stage: crate::error::ServiceErrorStage::PreMutation,
            source: e,
        })?;
    let type_id = types
        .into_iter()
        .find(|t| t.name == type_label)
        .map(|t| t.id)
        .ok_or_else(|| Error::resolution(type_label, "referenced type label does not exist"))?;

    Ok(candidates
        .into_iter()
        .filter(|n| n.type_id == Some(type_id))
        .collect())
}
