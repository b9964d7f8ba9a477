use crate::error::Result;
use crate::types::{Neighbor, NewNode, NodeId, NodeProperty, NodeRecord, PropertyValue, Relation, TypeRecord};

/// The read half of the abstract graph service (§6): exact lookup,
/// full-text search, type enumeration, and single-node neighborhoods.
/// Implementations may be backed by an HTTP client, an embedded store,
/// or (in tests) a plain in-memory map — the engine never downcasts to
/// find out which.
pub trait GraphService {
    /// Exact name match within the active graph. At most one record;
    /// `None` is not an error (§7, `NotFound`).
    fn get_by_name(&self, name: &str, active_graph_id: NodeId) -> Result<Option<NodeRecord>>;

    /// Full-text search, capped at the service's default page (§5). The
    /// engine performs no pagination of its own at this layer.
    fn search(&self, query_text: &str, active_graph_id: NodeId) -> Result<Vec<NodeRecord>>;

    /// All type nodes, for `:T`-only patterns (§4.4) and for resolving
    /// a type label to its id for the resolver's type filter (§4.5).
    fn list_types(&self, active_graph_id: NodeId) -> Result<Vec<TypeRecord>>;

    /// Edges leaving `node_id` whose relation is in `relations` (already
    /// expanded from the pattern's relation-set by the traversal
    /// executor — §4.6). An empty `relations` slice matches every
    /// relation. May return stale edges (deleted links still present)
    /// or omit fresh ones; the traversal executor tolerates both.
    fn neighborhood(&self, node_id: NodeId, relations: &[Relation]) -> Result<Vec<Neighbor>>;
}

/// The write half of the abstract graph service (§6), consumed by the
/// mutation executor (§4.8). One call per logical mutation; the engine
/// issues no transaction-control calls of its own — that is the graph
/// service's concern.
pub trait WriteableGraph {
    fn create_node(&mut self, node: NewNode) -> Result<NodeId>;

    fn create_edge(&mut self, source_id: NodeId, relation: Relation, target_id: NodeId) -> Result<NodeId>;

    /// `value: None` clears the property (§3, SET item semantics).
    fn update_node(&mut self, node_id: NodeId, property: NodeProperty, value: Option<PropertyValue>) -> Result<()>;

    fn update_type(&mut self, node_id: NodeId, type_id: NodeId) -> Result<()>;

    fn delete_node(&mut self, node_id: NodeId) -> Result<()>;

    fn delete_edge(&mut self, edge_id: NodeId) -> Result<()>;
}
