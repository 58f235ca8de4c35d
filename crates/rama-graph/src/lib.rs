//! Ownership graph reconstruction from the PSC and company registries.
//!
//! The pipeline runs in four steps:
//! 1. [`resolve`] assigns one integer id per real-world participant.
//! 2. [`edge_list`] turns resolved links into `(owner, owned)` pairs.
//! 3. [`ownership_graph`] assembles a petgraph `DiGraph` with node and edge
//!    attributes.
//! 4. [`cluster`] describes and classifies weakly-connected components.
//!
//! [`pipeline`] wires the steps together from raw tables.

pub mod cluster;
pub mod edge_list;
pub mod ownership_graph;
pub mod pipeline;
pub mod resolve;

pub use cluster::{
    classify, classify_components, describe_cluster, weakly_connected_components,
    ClassifiedCluster, ClusterClass, ClusterDescriptor,
};
pub use edge_list::EdgeList;
pub use ownership_graph::{Node, OwnershipEdge, OwnershipGraph, Reconciled};
pub use pipeline::{process_database, PipelineConfig, ProcessedDatabase};
pub use resolve::{resolve_links, NodeId, ResolvedLinks};
