//! Core graph data structures

mod edge;
mod engine;
mod node;

#[cfg(test)]
mod tests;

pub use edge::{relationship, Edge, EdgeId};
pub use engine::{
    BatchReport, ContentGraph, EdgeSpec, GraphError, GraphResult, GraphStats, NodeSpec,
};
pub use node::{parse_metadata, ContentType, Metadata, MetadataValue, Node, NodeId};
