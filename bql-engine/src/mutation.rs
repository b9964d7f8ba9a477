//! Mutation executor (§4.8): CREATE, SET, MERGE, DELETE against a
//! [`WriteableGraph`]. Caps (SET ≤ 10 targets, DELETE ≤ 5) are refused
//! outright — the engine never applies a partial batch.

use crate::ast::*;
use crate::bindings::Bindings;
use crate::error::{Cap, Error, ServiceErrorStage};
use bql_api::{GraphService, NewNode, NodeId, NodeRecord, PropertyValue, Relation, WriteableGraph};
use std::collections::HashMap;

pub const SET_BATCH_CAP: usize = 10;
pub const DELETE_BATCH_CAP: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct MutationReport {
    pub created: Vec<NodeId>,
    pub updated: Vec<NodeId>,
    pub deleted: Vec<NodeId>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeletePreview {
    pub would_delete_nodes: Vec<NodeId>,
    pub would_delete_edges: Vec<NodeId>,
}

fn service_error(stage: ServiceErrorStage) -> impl Fn(bql_api::Error) -> Error {
    move |source| Error::ServiceError { stage, source }
}

fn resolve_type_id<G: GraphService + ?Sized>(
    graph: &G,
    type_label: Option<&str>,
    active_graph_id: NodeId,
) -> Result<Option<NodeId>, Error> {
    let Some(type_label) = type_label else {
        return Ok(None);
    };
    let types = graph
        .list_types(active_graph_id)
        .map_err(service_error(ServiceErrorStage::PreMutation))?;
    types
        .into_iter()
        .find(|t| t.name == type_label)
        .map(|t| Some(t.id))
        .ok_or_else(|| Error::resolution(type_label, "referenced type label does not exist"))
}

/// `CREATE` (§4.8): endpoints with an existing binding are reused,
/// unbound node patterns are created fresh, and edges are created
/// between them in the order the pattern names them.
pub fn execute_create<G: GraphService + WriteableGraph>(
    graph: &mut G,
    patterns: &[Pattern],
    active_graph_id: NodeId,
    bindings: &mut Bindings,
    report: &mut MutationReport,
) -> Result<(), Error> {
    for pattern in patterns {
        let mut node_ids: HashMap<&str, NodeId> = HashMap::new();
        let mut under_constrained = false;

        for node in pattern.nodes() {
            // A variable already subject to resolution (even a MATCH
            // that came back empty) refers to an existing node; it is
            // never created fresh. Only a variable with no binding at
            // all is a genuinely new node pattern (§8 scenario 6).
            if bindings.has_candidates(&node.variable) {
                match bindings.candidates(&node.variable).first() {
                    Some(existing) => {
                        node_ids.insert(node.variable.as_str(), existing.id);
                    }
                    None => {
                        report.warnings.push(format!(
                            "under-constrained endpoint `{}`: referenced variable resolved to no node",
                            node.variable
                        ));
                        under_constrained = true;
                    }
                }
                continue;
            }

            let type_id = resolve_type_id(graph, node.type_label.as_deref(), active_graph_id)?;
            let name = node.name_constraint.clone().unwrap_or_default();
            let new_id = graph
                .create_node(NewNode {
                    name: name.clone(),
                    type_id,
                    ..Default::default()
                })
                .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
            report.created.push(new_id);
            // Bound so a later RETURN/SET in the same query can see
            // the node this pattern just created, the same way an
            // already-matched endpoint is visible.
            bindings.set_candidates(
                node.variable.clone(),
                vec![NodeRecord {
                    id: new_id,
                    name,
                    type_id,
                    label: None,
                    foreground_color: None,
                    background_color: None,
                    kind: "Thought".to_string(),
                }],
            );
            node_ids.insert(node.variable.as_str(), new_id);
        }

        if under_constrained {
            // No edge in this pattern is created on a missing endpoint
            // (§8 scenario 6): the whole pattern is skipped, not just
            // the missing side.
            continue;
        }

        let mut prev: Option<&str> = None;
        let mut pending_relation: Option<Relation> = None;
        for element in &pattern.elements {
            match element {
                PatternElement::Node(node) => {
                    if let (Some(src), Some(relation)) = (prev, pending_relation) {
                        let &source_id = node_ids.get(src).expect("pattern variable resolved above");
                        let &target_id = node_ids
                            .get(node.variable.as_str())
                            .expect("pattern variable resolved above");
                        graph
                            .create_edge(source_id, relation, target_id)
                            .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
                    }
                    prev = Some(node.variable.as_str());
                    pending_relation = None;
                }
                PatternElement::Relationship(rel) => {
                    pending_relation = match &rel.relation_set {
                        RelationSet::Single(r) => Some(*r),
                        // The parser rejects wildcard/union relations in
                        // write patterns before planning is reached.
                        _ => unreachable!("write patterns only carry a single relation"),
                    };
                }
            }
        }
    }
    Ok(())
}

/// `SET` (§4.8): every matched node of every targeted variable is
/// touched, capped at 10 distinct nodes per query (§3 invariant 5). All
/// SET items for one variable apply atomically from the caller's
/// perspective — an error aborts the remaining items for that
/// variable, but earlier variables' SETs already issued stand.
pub fn execute_set<G: GraphService + WriteableGraph>(
    graph: &mut G,
    items: &[SetItem],
    active_graph_id: NodeId,
    bindings: &Bindings,
    report: &mut MutationReport,
) -> Result<(), Error> {
    let targets: std::collections::HashSet<NodeId> = items
        .iter()
        .flat_map(|item| bindings.candidates(item.variable()).iter().map(|n| n.id))
        .collect();
    if targets.len() > SET_BATCH_CAP {
        return Err(Error::LimitExceeded {
            cap: Cap::SetBatch,
            cap_value: SET_BATCH_CAP,
            observed: targets.len(),
        });
    }

    let mut by_variable: Vec<(&str, Vec<&SetItem>)> = Vec::new();
    for item in items {
        match by_variable.iter_mut().find(|(v, _)| *v == item.variable()) {
            Some((_, group)) => group.push(item),
            None => by_variable.push((item.variable(), vec![item])),
        }
    }

    for (variable, group) in by_variable {
        for node in bindings.candidates(variable) {
            let node_id = node.id;
            for item in &group {
                match item {
                    SetItem::PropertyAssign { property, value, .. } => {
                        let property_value = value.clone().map(PropertyValue::String);
                        graph
                            .update_node(node_id, *property, property_value)
                            .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
                    }
                    SetItem::TypeAssign { type_label, .. } => {
                        let type_id = resolve_type_id(graph, Some(type_label), active_graph_id)?
                            .expect("resolve_type_id errors rather than returning None for Some(label)");
                        graph
                            .update_type(node_id, type_id)
                            .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
                    }
                }
                report.updated.push(node_id);
            }
        }
    }
    Ok(())
}

/// `MERGE` (§4.8): strict exact-name lookup constrained by type if
/// given; found → matched (`ON MATCH SET`), not found → create as
/// `CREATE` would (`ON CREATE SET`). Multiple matches take the first
/// and record a warning rather than erroring.
pub fn execute_merge<G: GraphService + WriteableGraph>(
    graph: &mut G,
    merge: &MergePart,
    active_graph_id: NodeId,
    bindings: &mut Bindings,
    report: &mut MutationReport,
) -> Result<(), Error> {
    for pattern in &merge.patterns {
        for node in pattern.nodes() {
            let candidates = bindings.candidates(&node.variable);
            if candidates.len() > 1 {
                report.warnings.push(format!(
                    "MERGE matched {} candidates for `{}`; using the first",
                    candidates.len(),
                    node.variable
                ));
            }

            if let Some(existing) = candidates.first().cloned() {
                bindings.set_candidates(node.variable.clone(), vec![existing.clone()]);
                apply_set_items(graph, &merge.on_match, &node.variable, existing.id, active_graph_id, report)?;
            } else {
                let type_id = resolve_type_id(graph, node.type_label.as_deref(), active_graph_id)?;
                let new_id = graph
                    .create_node(NewNode {
                        name: node.name_constraint.clone().unwrap_or_default(),
                        type_id,
                        ..Default::default()
                    })
                    .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
                report.created.push(new_id);
                bindings.set_candidates(
                    node.variable.clone(),
                    vec![NodeRecord {
                        id: new_id,
                        name: node.name_constraint.clone().unwrap_or_default(),
                        type_id,
                        label: None,
                        foreground_color: None,
                        background_color: None,
                        kind: "Thought".to_string(),
                    }],
                );
                apply_set_items(graph, &merge.on_create, &node.variable, new_id, active_graph_id, report)?;
            }
        }
    }
    Ok(())
}

fn apply_set_items<G: GraphService + WriteableGraph>(
    graph: &mut G,
    items: &[SetItem],
    variable: &str,
    node_id: NodeId,
    active_graph_id: NodeId,
    report: &mut MutationReport,
) -> Result<(), Error> {
    for item in items.iter().filter(|i| i.variable() == variable) {
        match item {
            SetItem::PropertyAssign { property, value, .. } => {
                let property_value = value.clone().map(PropertyValue::String);
                graph
                    .update_node(node_id, *property, property_value)
                    .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
            }
            SetItem::TypeAssign { type_label, .. } => {
                let type_id = resolve_type_id(graph, Some(type_label), active_graph_id)?
                    .expect("resolve_type_id errors rather than returning None for Some(label)");
                graph
                    .update_type(node_id, type_id)
                    .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
            }
        }
        report.updated.push(node_id);
    }
    Ok(())
}

/// `DELETE` (§4.8): the preview (default) and the confirmed execution
/// must compute the identical target set — `preview` is simply `plan`
/// without the final write calls.
pub fn preview_delete(delete: &DeletePart, bindings: &Bindings) -> Result<DeletePreview, Error> {
    let plan = plan_delete(delete, bindings)?;
    Ok(DeletePreview {
        would_delete_nodes: plan.node_ids,
        would_delete_edges: plan.edge_ids,
    })
}

pub fn execute_delete<G: WriteableGraph>(
    graph: &mut G,
    delete: &DeletePart,
    bindings: &Bindings,
    report: &mut MutationReport,
) -> Result<(), Error> {
    let plan = plan_delete(delete, bindings)?;

    for edge_id in &plan.edge_ids {
        graph
            .delete_edge(*edge_id)
            .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
    }
    for node_id in &plan.node_ids {
        graph
            .delete_node(*node_id)
            .map_err(service_error(ServiceErrorStage::PartiallyApplied))?;
        report.deleted.push(*node_id);
    }
    Ok(())
}

struct DeletePlan {
    node_ids: Vec<NodeId>,
    edge_ids: Vec<NodeId>,
}

fn plan_delete(delete: &DeletePart, bindings: &Bindings) -> Result<DeletePlan, Error> {
    let mut node_ids = Vec::new();
    let mut edge_ids = Vec::new();

    for variable in &delete.variables {
        if bindings.has_candidates(variable) {
            node_ids.extend(bindings.candidates(variable).iter().map(|n| n.id));
            continue;
        }
        // A relationship variable: its recorded edges are the delete
        // targets, not a node set.
        edge_ids.extend(bindings.edges(variable).iter().filter_map(|e| e.edge_id));
    }

    if node_ids.len() > DELETE_BATCH_CAP {
        return Err(Error::LimitExceeded {
            cap: Cap::DeleteBatch,
            cap_value: DELETE_BATCH_CAP,
            observed: node_ids.len(),
        });
    }

    Ok(DeletePlan { node_ids, edge_ids })
}
