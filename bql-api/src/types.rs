use serde::{Deserialize, Serialize};

/// Identifier of a node (thought) in the graph service. Stable across
/// a single query; never reused across invocations by the engine.
pub type NodeId = u64;

/// The four relation primitives, each with the stable integer code §3
/// assigns it. Direction is carried by the code itself, not by edge
/// reversal: a `Parent` edge is a distinct relation from `Child`, not
/// a `Child` edge read backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    Child = 1,
    Parent = 2,
    Jump = 3,
    Sibling = 4,
}

impl Relation {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Relation::Child),
            2 => Some(Relation::Parent),
            3 => Some(Relation::Jump),
            4 => Some(Relation::Sibling),
            _ => None,
        }
    }

    /// The relations a wildcard relationship pattern expands to.
    /// `Parent` is never included: personal graphs have hub parents
    /// with enormous fan-out, and a wildcard must never surface one.
    pub const FORWARD: [Relation; 3] = [Relation::Child, Relation::Jump, Relation::Sibling];
}

/// A scalar property value as stored by the graph service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Null,
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s.as_str()),
            PropertyValue::Null => None,
        }
    }
}

/// The settable node properties named in §3 (`id`, `typeId`, `kind` are
/// never assignable via property syntax and are therefore absent here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeProperty {
    Name,
    Label,
    ForegroundColor,
    BackgroundColor,
}

impl NodeProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeProperty::Name => "name",
            NodeProperty::Label => "label",
            NodeProperty::ForegroundColor => "foregroundColor",
            NodeProperty::BackgroundColor => "backgroundColor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name" => Some(NodeProperty::Name),
            "label" => Some(NodeProperty::Label),
            "foregroundColor" => Some(NodeProperty::ForegroundColor),
            "backgroundColor" => Some(NodeProperty::BackgroundColor),
            _ => None,
        }
    }
}

/// A node record as returned by the graph service. `name`, `id`, and
/// `kind` are never null (§4.7); the rest are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub type_id: Option<NodeId>,
    pub label: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub kind: String,
}

/// A type node, as returned by `list-types`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub id: NodeId,
    pub name: String,
}

/// One edge out of a `neighborhood` call: the traversed relation and
/// the node record sitting at the other end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub relation: Relation,
    pub edge_id: Option<NodeId>,
    pub node: NodeRecord,
}

/// Inputs to `create-node`: name is mandatory, the rest are optional
/// per §6.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    pub type_id: Option<NodeId>,
    pub label: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
}
