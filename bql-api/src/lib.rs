//! BrainQuery public API – the abstract graph-service surface.
//!
//! This crate has no knowledge of BQL syntax. It defines the node/edge
//! value types and the two traits ([`GraphService`], [`WriteableGraph`])
//! that `bql-engine` consumes. The concrete graph service (an on-disk
//! store, an HTTP-backed associative graph, or an in-memory fake for
//! tests) lives entirely behind these traits.

mod error;
mod traits;
mod types;

pub use error::{Error, Result};
pub use traits::{GraphService, WriteableGraph};
pub use types::{NewNode, NodeId, NodeProperty, NodeRecord, Neighbor, PropertyValue, Relation, TypeRecord};
