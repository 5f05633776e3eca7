//! Graph store abstraction.
//!
//! The ranking engine only ever reads the knowledge graph through this
//! trait. Backends (property graph database, in-memory adjacency map,
//! remote service) own their own connection handling and must tolerate
//! concurrent calls.

use async_trait::async_trait;
use helicon_common::{Direction, Edge, EdgeType, EvidencePath, NodeRef, Result};

/// Read-only knowledge graph access.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Typed edges touching `node` in the given direction.
    ///
    /// Fails with `NotFound` if the node does not exist; returns an empty
    /// vec if it exists but has no such edges.
    async fn get_direct_edges(
        &self,
        node: &NodeRef,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Edge>>;

    /// Nodes one outgoing `via_edge_type` hop away from `node`.
    async fn get_neighbors_of_type(
        &self,
        node: &NodeRef,
        via_edge_type: EdgeType,
    ) -> Result<Vec<NodeRef>> {
        let edges = self.get_direct_edges(node, via_edge_type, Direction::Out).await?;
        Ok(edges.into_iter().map(|e| e.to).collect())
    }

    /// At most `max_paths` unscored simple paths of 1..=`max_hops` edges
    /// between `from` and `to`, in discovery order.
    ///
    /// Fails with `NoPath` when nothing connects the two within the bound,
    /// and with `NotFound` when either endpoint is unknown.
    async fn find_bounded_paths(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Vec<EvidencePath>>;
}
