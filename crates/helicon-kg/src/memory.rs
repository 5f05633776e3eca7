//! In-memory adjacency store.
//!
//! Immutable once built: the builder methods consume `self`, and queries only
//! take `&self`, so a built store can be shared across tasks behind an `Arc`.
//! Edge lists keep insertion order, which makes path discovery deterministic.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use helicon_common::{
    Direction, Edge, EdgeType, EvidencePath, HeliconError, NodeRef, Result,
};

use crate::store::GraphStore;

/// Serialized graph: explicit nodes plus edges. Nodes named only by an
/// edge are registered implicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRef>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    nodes: HashSet<NodeRef>,
    edges: Vec<Edge>,
    /// node -> indices into `edges` where node is `from`
    outgoing: HashMap<NodeRef, Vec<usize>>,
    /// node -> indices into `edges` where node is `to`
    incoming: HashMap<NodeRef, Vec<usize>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with no edges.
    pub fn with_node(mut self, node: NodeRef) -> Self {
        self.nodes.insert(node);
        self
    }

    /// Add an edge; weight is resolved from score properties when absent.
    pub fn with_edge(mut self, mut edge: Edge) -> Self {
        edge.resolve_weight();
        let idx = self.edges.len();
        self.nodes.insert(edge.from.clone());
        self.nodes.insert(edge.to.clone());
        self.outgoing.entry(edge.from.clone()).or_default().push(idx);
        self.incoming.entry(edge.to.clone()).or_default().push(idx);
        self.edges.push(edge);
        self
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = snapshot
            .nodes
            .into_iter()
            .fold(Self::new(), |s, n| s.with_node(n));
        snapshot.edges.into_iter().fold(store, |s, e| s.with_edge(e))
    }

    /// Load a JSON snapshot file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let snapshot: GraphSnapshot = serde_json::from_str(&content)?;
        let store = Self::from_snapshot(snapshot);
        info!(
            path = %path.display(),
            nodes = store.node_count(),
            edges = store.edge_count(),
            "Loaded graph snapshot"
        );
        Ok(store)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.nodes.contains(node)
    }

    fn require(&self, node: &NodeRef) -> Result<()> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(HeliconError::NotFound(node.to_string()))
        }
    }

    fn edge_indices(&self, node: &NodeRef, direction: Direction) -> &[usize] {
        let index = match direction {
            Direction::Out => &self.outgoing,
            Direction::In => &self.incoming,
        };
        index.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Undirected steps from `node`: outgoing edges first, then incoming.
    fn steps<'a>(&'a self, node: &'a NodeRef) -> impl Iterator<Item = (usize, &'a NodeRef)> + 'a {
        let out = self
            .edge_indices(node, Direction::Out)
            .iter()
            .map(move |&i| (i, &self.edges[i].to));
        let inc = self
            .edge_indices(node, Direction::In)
            .iter()
            .map(move |&i| (i, &self.edges[i].from));
        out.chain(inc)
    }

    /// Collect simple paths of exactly `depth` edges ending at `target`.
    fn collect_paths(
        &self,
        target: &NodeRef,
        depth: usize,
        node_stack: &mut Vec<NodeRef>,
        edge_stack: &mut Vec<usize>,
        found: &mut Vec<EvidencePath>,
        max_paths: usize,
    ) {
        if found.len() >= max_paths {
            return;
        }
        let Some(current) = node_stack.last().cloned() else {
            return;
        };
        if edge_stack.len() == depth {
            if &current == target {
                let edges = edge_stack.iter().map(|&i| self.edges[i].clone()).collect();
                found.push(EvidencePath::unscored(node_stack.clone(), edges));
            }
            return;
        }
        // The target may only appear as the final node.
        if &current == target && !edge_stack.is_empty() {
            return;
        }
        for (idx, next) in self.steps(&current) {
            if node_stack.contains(next) {
                continue;
            }
            node_stack.push(next.clone());
            edge_stack.push(idx);
            self.collect_paths(target, depth, node_stack, edge_stack, found, max_paths);
            edge_stack.pop();
            node_stack.pop();
            if found.len() >= max_paths {
                return;
            }
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn get_direct_edges(
        &self,
        node: &NodeRef,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Edge>> {
        self.require(node)?;
        Ok(self
            .edge_indices(node, direction)
            .iter()
            .map(|&i| &self.edges[i])
            .filter(|e| e.edge_type == edge_type)
            .cloned()
            .collect())
    }

    async fn find_bounded_paths(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Vec<EvidencePath>> {
        if max_hops == 0 || max_paths == 0 {
            return Err(HeliconError::InvalidRequest(
                "max_hops and max_paths must be at least 1".to_string(),
            ));
        }
        self.require(from)?;
        self.require(to)?;

        // Iterative deepening: shorter paths are discovered first.
        let mut found = Vec::new();
        for depth in 1..=max_hops {
            let mut node_stack = vec![from.clone()];
            let mut edge_stack = Vec::with_capacity(depth);
            self.collect_paths(to, depth, &mut node_stack, &mut edge_stack, &mut found, max_paths);
            if found.len() >= max_paths {
                break;
            }
        }

        if found.is_empty() {
            return Err(HeliconError::NoPath {
                from: from.to_string(),
                to: to.to_string(),
                max_hops,
            });
        }
        Ok(found)
    }
}
