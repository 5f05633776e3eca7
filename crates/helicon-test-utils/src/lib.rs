//! Shared fixtures for Helicon tests: small graphs, a deliberately slow
//! store wrapper and synthetic training data.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::prelude::*;

use helicon_common::{Direction, Edge, EdgeType, EvidencePath, NodeRef, Result};
use helicon_kg::{GraphSnapshot, GraphStore, InMemoryGraphStore};

pub fn edge(edge_type: EdgeType, from: NodeRef, to: NodeRef, weight: f64) -> Edge {
    Edge::new(edge_type, from, to, Some(weight))
}

/// P1 -ASSOCIATED_WITH(0.8)-> D1, P1 -SIMILAR_TO(0.6)-> P2,
/// P2 -ASSOCIATED_WITH(0.5)-> D1.
///
/// Default weights give D1 direct 0.8, propagated 0.3, final 0.65.
pub fn scenario_store() -> InMemoryGraphStore {
    InMemoryGraphStore::new()
        .with_edge(edge(EdgeType::AssociatedWith, NodeRef::protein("P1"), NodeRef::disease("D1"), 0.8))
        .with_edge(edge(EdgeType::SimilarTo, NodeRef::protein("P1"), NodeRef::protein("P2"), 0.6))
        .with_edge(edge(EdgeType::AssociatedWith, NodeRef::protein("P2"), NodeRef::disease("D1"), 0.5))
}

/// Source P1 with three therapeutics:
/// T1 targets P1 directly, T2 binds P1 and P3, T3 only modulates P3,
/// and P1 -SIMILAR_TO(0.5)-> P3. T2 is also USED_FOR D1.
pub fn therapeutic_store() -> InMemoryGraphStore {
    InMemoryGraphStore::new()
        .with_edge(edge(EdgeType::Targets, NodeRef::therapeutic("T1"), NodeRef::protein("P1"), 0.9))
        .with_edge(edge(EdgeType::BindsTo, NodeRef::therapeutic("T2"), NodeRef::protein("P1"), 0.4))
        .with_edge(edge(EdgeType::BindsTo, NodeRef::therapeutic("T2"), NodeRef::protein("P3"), 0.8))
        .with_edge(edge(EdgeType::Modulates, NodeRef::therapeutic("T3"), NodeRef::protein("P3"), 0.6))
        .with_edge(edge(EdgeType::SimilarTo, NodeRef::protein("P1"), NodeRef::protein("P3"), 0.5))
        .with_edge(edge(EdgeType::UsedFor, NodeRef::therapeutic("T2"), NodeRef::disease("D1"), 1.0))
}

/// P1 linked to D1 twice (0.4 and 0.9) and to D2 once (0.6).
pub fn duplicate_edge_store() -> InMemoryGraphStore {
    InMemoryGraphStore::new()
        .with_edge(edge(EdgeType::AssociatedWith, NodeRef::protein("P1"), NodeRef::disease("D1"), 0.4))
        .with_edge(edge(EdgeType::AssociatedWith, NodeRef::protein("P1"), NodeRef::disease("D1"), 0.9))
        .with_edge(edge(EdgeType::AssociatedWith, NodeRef::protein("P1"), NodeRef::disease("D2"), 0.6))
}

/// Build a store from snapshot JSON.
pub fn store_from_json(json: &str) -> anyhow::Result<InMemoryGraphStore> {
    let snapshot: GraphSnapshot =
        serde_json::from_str(json).context("Failed to parse graph snapshot fixture")?;
    Ok(InMemoryGraphStore::from_snapshot(snapshot))
}

/// Wraps a store and sleeps before answering for selected nodes.
pub struct SlowStore<S> {
    inner: S,
    slow: HashSet<NodeRef>,
    delay: Duration,
    calls: AtomicUsize,
}

impl<S: GraphStore> SlowStore<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, slow: HashSet::new(), delay, calls: AtomicUsize::new(0) }
    }

    /// Delay every call that starts at `node`.
    pub fn slow_on(mut self, node: NodeRef) -> Self {
        self.slow.insert(node);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pace(&self, node: &NodeRef) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow.contains(node) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for SlowStore<S> {
    async fn get_direct_edges(
        &self,
        node: &NodeRef,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Edge>> {
        self.pace(node).await;
        self.inner.get_direct_edges(node, edge_type, direction).await
    }

    async fn find_bounded_paths(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Vec<EvidencePath>> {
        self.pace(from).await;
        self.inner.find_bounded_paths(from, to, max_hops, max_paths).await
    }
}

/// `n` (direct, propagated, label) triples with label = `direct_w * d +
/// propagated_w * p + bias`, features drawn uniformly from [0, 1).
pub fn linear_samples(
    n: usize,
    direct_w: f64,
    propagated_w: f64,
    bias: f64,
    seed: u64,
) -> Vec<(f64, f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let d: f64 = rng.gen();
            let p: f64 = rng.gen();
            (d, p, direct_w * d + propagated_w * p + bias)
        })
        .collect()
}
