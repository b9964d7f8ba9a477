//! BrainQuery (BQL) engine — lexer, parser, semantic validator, planner,
//! node resolver, traversal executor, predicate evaluator, mutation
//! executor, and result projector for a Cypher-subset query language
//! over an associative knowledge graph (§1–§4).
//!
//! [`Engine::execute`] is the single entry point (§6): it parses,
//! validates, plans, resolves, traverses, optionally mutates, and
//! projects a query string against a caller-supplied [`GraphService`] /
//! [`WriteableGraph`] pair in one call.

pub mod ast;
pub mod bindings;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod mutation;
pub mod parser;
pub mod planner;
pub mod projector;
pub mod resolver;
pub mod traversal;
pub mod validator;

use ast::{HopBound, PatternElement, Query};
use bindings::Bindings;
use bql_api::{GraphService, NodeId, WriteableGraph};
use error::{Cap, Error, Result};
use mutation::{DeletePreview, MutationReport};
use planner::ResolutionStrategy;
use tracing::{debug, instrument, warn};

pub use mutation::{DELETE_BATCH_CAP, SET_BATCH_CAP};

/// Resource caps the engine enforces (§5). The absolute ceilings from
/// the spec — hop upper bound 5, SET batch 10, DELETE batch 5 — are
/// always enforced regardless of configuration; `EngineLimits` lets a
/// caller *tighten* them further (e.g. an agent-facing deployment that
/// wants a stricter DELETE batch than the protocol maximum). It cannot
/// loosen them past the hard-coded ceiling.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    pub max_hop: u32,
    pub max_set_batch: usize,
    pub max_delete_batch: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_hop: 5,
            max_set_batch: SET_BATCH_CAP,
            max_delete_batch: DELETE_BATCH_CAP,
        }
    }
}

/// Per-call inputs the engine interface names beyond the query text
/// itself (§6): the `confirm` safety interlock for DELETE, and the
/// graph the query runs against.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    pub confirm: bool,
    pub active_graph_id: NodeId,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { confirm: false, active_graph_id: 0 }
    }
}

/// The outcome of one `execute` call (§6). `Error` is not a variant
/// here: failures are carried through the `Result` the call returns,
/// per the error taxonomy's own design note that `ConfirmRequired`,
/// `NotFound`, and `Ambiguous` are ordinary values, not errors.
#[derive(Debug, Clone)]
pub enum EngineResult {
    Rows(Vec<Vec<projector::ProjectedValue>>),
    Mutation(MutationReport),
    DeletePreview(DeletePreview),
    /// A query with no RETURN/DELETE and no mutation producing a report
    /// (a bare MATCH, for instance) — nothing to hand back.
    Empty,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Engine {
    limits: EngineLimits,
}

impl Engine {
    pub fn new(limits: EngineLimits) -> Self {
        Self { limits }
    }

    /// Parse, validate, plan, resolve, traverse, mutate, and project one
    /// BQL query (§6). All suspension points are inside `graph`'s calls;
    /// everything else here runs synchronously in memory (§5).
    #[instrument(skip(self, query, graph), fields(query_len = query.len(), confirm = options.confirm))]
    pub fn execute<G>(&self, query: &str, graph: &mut G, options: ExecuteOptions) -> Result<EngineResult>
    where
        G: GraphService + WriteableGraph,
    {
        let ast = parser::Parser::parse(query)?;
        validator::validate(&ast)?;
        self.check_hop_limit(&ast)?;

        let plan = planner::plan(&ast)?;
        let mut bindings = Bindings::new();

        self.resolve_driven_variables(graph, &plan, options.active_graph_id, &mut bindings)?;
        self.filter_driven_variables(&ast, &mut bindings);
        self.run_traversals(graph, &ast, &mut bindings)?;

        debug!(
            bound_variables = plan.variables.len(),
            "query bound"
        );

        if let Some(delete) = ast.delete() {
            return self.run_delete(delete, graph, &bindings, options);
        }

        let mut report = MutationReport::default();
        self.run_write(&ast, graph, options.active_graph_id, &mut bindings, &mut report)?;
        self.run_set(&ast, graph, options.active_graph_id, &bindings, &mut report)?;

        if !report.warnings.is_empty() {
            for warning in &report.warnings {
                warn!(warning, "mutation executor warning");
            }
        }

        if let Some(return_part) = ast.return_part() {
            let patterns = ast.all_patterns();
            let rows = projector::project(&patterns, &bindings, &return_part.items);
            return Ok(EngineResult::Rows(rows));
        }

        if report.created.is_empty() && report.updated.is_empty() && report.deleted.is_empty() {
            Ok(EngineResult::Empty)
        } else {
            Ok(EngineResult::Mutation(report))
        }
    }

    fn check_hop_limit(&self, query: &Query) -> Result<()> {
        for pattern in query.all_patterns() {
            for element in &pattern.elements {
                if let PatternElement::Relationship(rel) = element {
                    if let HopBound::Fixed(max) = rel.hop_max {
                        if max > self.limits.max_hop {
                            return Err(Error::LimitExceeded {
                                cap: Cap::HopUpperBound,
                                cap_value: self.limits.max_hop as usize,
                                observed: max as usize,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_driven_variables<G: GraphService>(
        &self,
        graph: &G,
        plan: &planner::Plan,
        active_graph_id: NodeId,
        bindings: &mut Bindings,
    ) -> Result<()> {
        for (variable, vplan) in &plan.variables {
            if matches!(vplan.strategy, ResolutionStrategy::Deferred) {
                continue;
            }
            let nodes = resolver::resolve(graph, vplan, active_graph_id)?;
            bindings.set_candidates(variable.clone(), nodes);
        }
        Ok(())
    }

    /// Applies the full WHERE tree to every variable that was resolved
    /// directly (not via traversal) so that post-filter atoms sharing a
    /// clause with the driving atom — `IS NULL`, a second `CONTAINS`,
    /// etc — take effect before traversal or mutation sees the set.
    fn filter_driven_variables(&self, ast: &Query, bindings: &mut Bindings) {
        let Some(where_clause) = ast.where_clause() else {
            return;
        };
        let variables: Vec<String> = ast
            .all_patterns()
            .iter()
            .flat_map(|p| p.nodes())
            .map(|n| n.variable.clone())
            .collect();
        for variable in variables {
            if !bindings.has_candidates(&variable) {
                continue;
            }
            let filtered: Vec<_> = bindings
                .candidates(&variable)
                .iter()
                .filter(|n| evaluator::matches_variable(where_clause, &variable, n))
                .cloned()
                .collect();
            bindings.set_candidates(variable, filtered);
        }
    }

    /// Traverses MATCH and MERGE patterns only. CREATE patterns are
    /// never traversed: a node that appears only inside a CREATE does
    /// not exist yet, and walking its pattern would otherwise set its
    /// candidate list to empty via the traversal executor itself,
    /// tripping `Bindings::has_candidates` the same way a premature
    /// resolver call would.
    fn run_traversals<G: GraphService>(&self, graph: &G, ast: &Query, bindings: &mut Bindings) -> Result<()> {
        let where_clause = ast.where_clause();
        let mut patterns = Vec::new();
        if let Some(mc) = ast.match_clause() {
            patterns.extend(mc.patterns.iter());
        }
        if let Some(merge) = ast.merge() {
            patterns.extend(merge.patterns.iter());
        }
        for pattern in patterns {
            traversal::traverse_pattern(graph, pattern, where_clause, bindings)?;
        }
        Ok(())
    }

    fn run_write<G: GraphService + WriteableGraph>(
        &self,
        ast: &Query,
        graph: &mut G,
        active_graph_id: NodeId,
        bindings: &mut Bindings,
        report: &mut MutationReport,
    ) -> Result<()> {
        let create_patterns = ast.create_patterns();
        if !create_patterns.is_empty() {
            mutation::execute_create(graph, create_patterns, active_graph_id, bindings, report)?;
        }
        if let Some(merge) = ast.merge() {
            mutation::execute_merge(graph, merge, active_graph_id, bindings, report)?;
        }
        Ok(())
    }

    fn run_set<G: GraphService + WriteableGraph>(
        &self,
        ast: &Query,
        graph: &mut G,
        active_graph_id: NodeId,
        bindings: &Bindings,
        report: &mut MutationReport,
    ) -> Result<()> {
        let Some(set_clause) = ast.set_clause() else {
            return Ok(());
        };
        let targets: std::collections::HashSet<NodeId> = set_clause
            .items
            .iter()
            .flat_map(|item| bindings.candidates(item.variable()).iter().map(|n| n.id))
            .collect();
        if targets.len() > self.limits.max_set_batch {
            return Err(Error::LimitExceeded {
                cap: Cap::SetBatch,
                cap_value: self.limits.max_set_batch,
                observed: targets.len(),
            });
        }
        mutation::execute_set(graph, &set_clause.items, active_graph_id, bindings, report)
    }

    fn run_delete<G: GraphService + WriteableGraph>(
        &self,
        delete: &ast::DeletePart,
        graph: &mut G,
        bindings: &Bindings,
        options: ExecuteOptions,
    ) -> Result<EngineResult> {
        let node_count = delete
            .variables
            .iter()
            .filter(|v| bindings.has_candidates(v))
            .map(|v| bindings.candidates(v).len())
            .sum::<usize>();
        if node_count > self.limits.max_delete_batch {
            return Err(Error::LimitExceeded {
                cap: Cap::DeleteBatch,
                cap_value: self.limits.max_delete_batch,
                observed: node_count,
            });
        }

        if !options.confirm {
            let preview = mutation::preview_delete(delete, bindings)?;
            debug!(
                would_delete_nodes = preview.would_delete_nodes.len(),
                would_delete_edges = preview.would_delete_edges.len(),
                "DELETE preview (confirm not set)"
            );
            return Ok(EngineResult::DeletePreview(preview));
        }

        let mut report = MutationReport::default();
        mutation::execute_delete(graph, delete, bindings, &mut report)?;
        Ok(EngineResult::Mutation(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bql_api::{NewNode, Neighbor, NodeProperty, NodeRecord, PropertyValue, Relation, TypeRecord};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeGraph {
        next_id: NodeId,
        nodes: HashMap<NodeId, NodeRecord>,
        by_name: HashMap<String, NodeId>,
        types: Vec<TypeRecord>,
        children: HashMap<NodeId, Vec<(Relation, NodeId, NodeId)>>,
        deleted_nodes: Vec<NodeId>,
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
            let id = self.insert(&node.name);
            Ok(id)
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
            self.deleted_nodes.push(node_id);
            Ok(())
        }
        fn delete_edge(&mut self, _edge_id: NodeId) -> bql_api::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn create_then_match_round_trips() {
        let mut graph = FakeGraph::default();
        let engine = Engine::default();
        let opts = ExecuteOptions { confirm: false, active_graph_id: 0 };

        engine.execute(r#"CREATE (n {name: "X"})"#, &mut graph, opts).unwrap();
        let result = engine
            .execute(r#"MATCH (n {name: "X"}) RETURN n.id"#, &mut graph, opts)
            .unwrap();
        match result {
            EngineResult::Rows(rows) => assert_eq!(rows.len(), 1),
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn delete_without_confirm_previews_and_issues_no_mutation() {
        let mut graph = FakeGraph::default();
        graph.insert("Old");
        let engine = Engine::default();
        let opts = ExecuteOptions { confirm: false, active_graph_id: 0 };

        let result = engine
            .execute(r#"MATCH (n {name: "Old"}) DELETE n"#, &mut graph, opts)
            .unwrap();
        match result {
            EngineResult::DeletePreview(preview) => assert_eq!(preview.would_delete_nodes.len(), 1),
            other => panic!("expected DeletePreview, got {other:?}"),
        }
        assert!(graph.deleted_nodes.is_empty());
    }

    #[test]
    fn delete_with_confirm_executes_and_subsequent_match_is_empty() {
        let mut graph = FakeGraph::default();
        graph.insert("Old");
        let engine = Engine::default();

        let confirm_opts = ExecuteOptions { confirm: true, active_graph_id: 0 };
        engine
            .execute(r#"MATCH (n {name: "Old"}) DELETE n"#, &mut graph, confirm_opts)
            .unwrap();

        let no_confirm = ExecuteOptions { confirm: false, active_graph_id: 0 };
        let result = engine
            .execute(r#"MATCH (n {name: "Old"}) RETURN n.id"#, &mut graph, no_confirm)
            .unwrap();
        match result {
            EngineResult::Rows(rows) => assert!(rows.is_empty()),
            other => panic!("expected empty Rows, got {other:?}"),
        }
    }

    #[test]
    fn merge_creates_once_then_matches_on_second_call() {
        let mut graph = FakeGraph::default();
        let engine = Engine::default();
        let opts = ExecuteOptions { confirm: false, active_graph_id: 0 };

        let first = engine
            .execute(
                r#"MERGE (p {name: "Weekly"}) ON CREATE SET p.label = "new" ON MATCH SET p.label = "old""#,
                &mut graph,
                opts,
            )
            .unwrap();
        match first {
            EngineResult::Mutation(report) => {
                assert_eq!(report.created.len(), 1);
                assert!(report.warnings.is_empty());
            }
            other => panic!("expected Mutation, got {other:?}"),
        }

        let second = engine
            .execute(
                r#"MERGE (p {name: "Weekly"}) ON CREATE SET p.label = "new" ON MATCH SET p.label = "old""#,
                &mut graph,
                opts,
            )
            .unwrap();
        match second {
            EngineResult::Mutation(report) => {
                assert_eq!(report.created.len(), 0);
                assert_eq!(report.updated.len(), 1);
            }
            other => panic!("expected Mutation, got {other:?}"),
        }
    }

    #[test]
    fn traversal_returns_children_in_stable_order() {
        let mut graph = FakeGraph::default();
        let projects = graph.insert("Projects");
        let a = graph.insert("A");
        let b = graph.insert("B");
        graph.link(projects, Relation::Child, a);
        graph.link(projects, Relation::Child, b);

        let engine = Engine::default();
        let opts = ExecuteOptions { confirm: false, active_graph_id: 0 };
        let result = engine
            .execute(
                r#"MATCH (n {name: "Projects"})-[:CHILD]->(m) RETURN m.name"#,
                &mut graph,
                opts,
            )
            .unwrap();
        match result {
            EngineResult::Rows(rows) => {
                let names: Vec<_> = rows
                    .into_iter()
                    .map(|r| match &r[0] {
                        projector::ProjectedValue::Name(n) => n.clone(),
                        other => panic!("expected Name, got {other:?}"),
                    })
                    .collect();
                assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn hop_range_traversal_collects_budget_nodes_across_depths() {
        let mut graph = FakeGraph::default();
        let company = graph.insert("Company");
        let eng = graph.insert("Eng");
        let fin = graph.insert("Fin");
        let budget = graph.insert("Budget2025");
        let reports = graph.insert("Reports");
        let q1 = graph.insert("Q1Budget");
        graph.link(company, Relation::Child, eng);
        graph.link(company, Relation::Child, fin);
        graph.link(fin, Relation::Child, budget);
        graph.link(fin, Relation::Child, reports);
        graph.link(budget, Relation::Child, q1);

        let engine = Engine::default();
        let opts = ExecuteOptions { confirm: false, active_graph_id: 0 };
        let result = engine
            .execute(
                r#"MATCH (root {name: "Company"})-[:CHILD*1..3]->(d) WHERE d.name CONTAINS "Budget" RETURN d.name"#,
                &mut graph,
                opts,
            )
            .unwrap();
        match result {
            EngineResult::Rows(rows) => {
                let names: Vec<_> = rows
                    .into_iter()
                    .map(|r| match &r[0] {
                        projector::ProjectedValue::Name(n) => n.clone(),
                        other => panic!("expected Name, got {other:?}"),
                    })
                    .collect();
                assert_eq!(names, vec!["Budget2025".to_string(), "Q1Budget".to_string()]);
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn set_batch_over_cap_is_refused_not_partially_applied() {
        let mut graph = FakeGraph::default();
        for i in 0..11 {
            graph.insert(&format!("N{i}"));
        }
        let engine = Engine::default();
        let opts = ExecuteOptions { confirm: false, active_graph_id: 0 };

        let err = engine
            .execute(
                r#"MATCH (n) WHERE n.name CONTAINS "N" SET n.label = "x" RETURN n.id"#,
                &mut graph,
                opts,
            )
            .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { cap: Cap::SetBatch, .. }));
    }
}
