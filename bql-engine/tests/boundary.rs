use bql_api::{GraphService, NewNode, Neighbor, NodeId, NodeProperty, NodeRecord, PropertyValue, Relation, TypeRecord, WriteableGraph};
use bql_engine::error::{Cap, Error};
use bql_engine::{Engine, EngineResult, ExecuteOptions};
use std::collections::HashMap;

#[derive(Default)]
struct FakeGraph {
    next_id: NodeId,
    nodes: HashMap<NodeId, NodeRecord>,
    by_name: HashMap<String, NodeId>,
    types: Vec<TypeRecord>,
    children: HashMap<NodeId, Vec<(Relation, NodeId, NodeId)>>,
}

impl FakeGraph {
    fn insert(&mut self, name: &str) -> NodeId {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(
            id,
            NodeRecord {
                id,
                name: name.to_string(),
                type_id: None,
                label: None,
                foreground_color: None,
                background_color: None,
                kind: "Thought".to_string(),
            },
        );
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn link(&mut self, parent: NodeId, relation: Relation, child: NodeId) {
        self.next_id += 1;
        let edge_id = self.next_id;
        self.children.entry(parent).or_default().push((relation, edge_id, child));
    }
}

impl GraphService for FakeGraph {
    fn get_by_name(&self, name: &str, _active_graph_id: NodeId) -> bql_api::Result<Option<NodeRecord>> {
        Ok(self.by_name.get(name).and_then(|id| self.nodes.get(id)).cloned())
    }
    fn search(&self, query_text: &str, _active_graph_id: NodeId) -> bql_api::Result<Vec<NodeRecord>> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.name.to_lowercase().contains(&query_text.to_lowercase()))
            .cloned()
            .collect())
    }
    fn list_types(&self, _active_graph_id: NodeId) -> bql_api::Result<Vec<TypeRecord>> {
        Ok(self.types.clone())
    }
    fn neighborhood(&self, node_id: NodeId, relations: &[Relation]) -> bql_api::Result<Vec<Neighbor>> {
        Ok(self
            .children
            .get(&node_id)
            .into_iter()
            .flatten()
            .filter(|(rel, _, _)| relations.contains(rel))
            .filter_map(|(rel, edge_id, child)| {
                self.nodes.get(child).map(|n| Neighbor {
                    relation: *rel,
                    edge_id: Some(*edge_id),
                    node: n.clone(),
                })
            })
            .collect())
    }
}

impl WriteableGraph for FakeGraph {
    fn create_node(&mut self, node: NewNode) -> bql_api::Result<NodeId> {
        Ok(self.insert(&node.name))
    }
    fn create_edge(&mut self, source_id: NodeId, relation: Relation, target_id: NodeId) -> bql_api::Result<NodeId> {
        self.link(source_id, relation, target_id);
        Ok(self.next_id)
    }
    fn update_node(&mut self, node_id: NodeId, property: NodeProperty, value: Option<PropertyValue>) -> bql_api::Result<()> {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            let value = value.and_then(|v| v.as_str().map(str::to_string));
            match property {
                NodeProperty::Name => node.name = value.unwrap_or_default(),
                NodeProperty::Label => node.label = value,
                NodeProperty::ForegroundColor => node.foreground_color = value,
                NodeProperty::BackgroundColor => node.background_color = value,
            }
        }
        Ok(())
    }
    fn update_type(&mut self, node_id: NodeId, type_id: NodeId) -> bql_api::Result<()> {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.type_id = Some(type_id);
        }
        Ok(())
    }
    fn delete_node(&mut self, node_id: NodeId) -> bql_api::Result<()> {
        self.nodes.remove(&node_id);
        Ok(())
    }
    fn delete_edge(&mut self, _edge_id: NodeId) -> bql_api::Result<()> {
        Ok(())
    }
}

#[test]
fn sole_is_null_atom_is_rejected_as_semantic_error() {
    let mut graph = FakeGraph::default();
    let engine = Engine::default();
    let err = engine
        .execute(r#"MATCH (n) WHERE n.label IS NULL RETURN n"#, &mut graph, ExecuteOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::SemanticError { .. }));
}

#[test]
fn hop_upper_bound_above_five_is_rejected() {
    let mut graph = FakeGraph::default();
    graph.insert("A");
    let engine = Engine::default();
    let err = engine
        .execute(
            r#"MATCH (n {name: "A"})-[:CHILD*1..6]->(m) RETURN m"#,
            &mut graph,
            ExecuteOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::SemanticError { .. }));
}

#[test]
fn wildcard_relation_set_is_accepted_for_reads_but_rejected_for_writes() {
    let mut graph = FakeGraph::default();
    let a = graph.insert("A");
    let b = graph.insert("B");
    graph.link(a, Relation::Child, b);
    let engine = Engine::default();

    let ok = engine.execute(
        r#"MATCH (n {name: "A"})-[:CHILD|JUMP]->(m) CREATE (m)-[:CHILD]->(x {name: "Y"})"#,
        &mut graph,
        ExecuteOptions::default(),
    );
    assert!(ok.is_ok());
    let new_node = graph.nodes.values().find(|n| n.name == "Y").expect("Y was created");
    let linked_from_b = graph
        .children
        .get(&b)
        .into_iter()
        .flatten()
        .any(|(rel, _, child)| *rel == Relation::Child && *child == new_node.id);
    assert!(linked_from_b, "Y should be linked as a CHILD of the resolved node B");

    let mut graph2 = FakeGraph::default();
    let rejected = engine.execute(
        r#"MATCH (n {name: "A"}) CREATE (n)-[:CHILD|JUMP]->(m {name: "Y"})"#,
        &mut graph2,
        ExecuteOptions::default(),
    );
    assert!(rejected.is_err());
    assert!(matches!(rejected.unwrap_err(), Error::ParseError { .. } | Error::SemanticError { .. }));
}

#[test]
fn delete_with_confirm_false_issues_zero_delete_calls() {
    let mut graph = FakeGraph::default();
    graph.insert("Old");
    let engine = Engine::default();
    let result = engine
        .execute(r#"MATCH (n {name: "Old"}) DELETE n"#, &mut graph, ExecuteOptions { confirm: false, active_graph_id: 0 })
        .unwrap();
    assert!(matches!(result, EngineResult::DeletePreview(_)));
    assert_eq!(graph.nodes.len(), 1);
}

#[test]
fn set_over_ten_candidates_is_refused_with_zero_updates() {
    let mut graph = FakeGraph::default();
    for i in 0..12 {
        graph.insert(&format!("Item{i}"));
    }
    let engine = Engine::default();
    let err = engine
        .execute(
            r#"MATCH (n) WHERE n.name CONTAINS "Item" SET n.label = "tagged""#,
            &mut graph,
            ExecuteOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::LimitExceeded { cap: Cap::SetBatch, .. }));
    assert!(graph.nodes.values().all(|n| n.label.is_none()));
}

#[test]
fn delete_over_five_candidates_is_refused_with_zero_deletes() {
    let mut graph = FakeGraph::default();
    for i in 0..6 {
        graph.insert(&format!("Row{i}"));
    }
    let engine = Engine::default();
    let err = engine
        .execute(
            r#"MATCH (n) WHERE n.name CONTAINS "Row" DELETE n"#,
            &mut graph,
            ExecuteOptions { confirm: true, active_graph_id: 0 },
        )
        .unwrap_err();
    assert!(matches!(err, Error::LimitExceeded { cap: Cap::DeleteBatch, .. }));
    assert_eq!(graph.nodes.len(), 6);
}

#[test]
fn cross_variable_or_is_rejected() {
    let mut graph = FakeGraph::default();
    let engine = Engine::default();
    let err = engine
        .execute(
            r#"MATCH (n {name: "A"})-[:CHILD]->(m) WHERE n.name CONTAINS "X" OR m.name CONTAINS "Y" RETURN n"#,
            &mut graph,
            ExecuteOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::SemanticError { .. }));
}
