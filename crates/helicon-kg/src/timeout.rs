//! Per-call timeout with a single retry.
//!
//! Wraps any `GraphStore`. A call that exceeds the timeout is retried once
//! after a fixed backoff; a second timeout surfaces as `StoreTimeout`, which
//! the ranker degrades to "no evidence". Other errors pass through untouched.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use helicon_common::{
    Direction, Edge, EdgeType, EvidencePath, GraphConfig, HeliconError, NodeRef, Result,
};

use crate::store::GraphStore;

pub struct TimeoutGraphStore<S> {
    inner: S,
    timeout: Duration,
    backoff: Duration,
}

impl<S: GraphStore> TimeoutGraphStore<S> {
    pub fn new(inner: S, timeout: Duration, backoff: Duration) -> Self {
        Self { inner, timeout, backoff }
    }

    pub fn from_config(inner: S, config: &GraphConfig) -> Self {
        Self::new(
            inner,
            Duration::from_millis(config.call_timeout_ms),
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// First attempt. `None` means it timed out and should be retried.
    async fn attempt<T>(&self, call: impl Future<Output = Result<T>>) -> Option<Result<T>> {
        tokio::time::timeout(self.timeout, call).await.ok()
    }

    async fn before_retry(&self, op: &str, node: &NodeRef) {
        warn!(
            op,
            node = %node,
            timeout_ms = self.timeout.as_millis() as u64,
            "Graph store call timed out, retrying once"
        );
        tokio::time::sleep(self.backoff).await;
    }

    async fn last_attempt<T>(
        &self,
        op: &str,
        node: &NodeRef,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(HeliconError::StoreTimeout(format!(
                "{op}({node}) exceeded {} ms twice",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for TimeoutGraphStore<S> {
    async fn get_direct_edges(
        &self,
        node: &NodeRef,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Edge>> {
        if let Some(result) = self
            .attempt(self.inner.get_direct_edges(node, edge_type, direction))
            .await
        {
            return result;
        }
        self.before_retry("get_direct_edges", node).await;
        self.last_attempt(
            "get_direct_edges",
            node,
            self.inner.get_direct_edges(node, edge_type, direction),
        )
        .await
    }

    async fn get_neighbors_of_type(
        &self,
        node: &NodeRef,
        via_edge_type: EdgeType,
    ) -> Result<Vec<NodeRef>> {
        if let Some(result) = self
            .attempt(self.inner.get_neighbors_of_type(node, via_edge_type))
            .await
        {
            return result;
        }
        self.before_retry("get_neighbors_of_type", node).await;
        self.last_attempt(
            "get_neighbors_of_type",
            node,
            self.inner.get_neighbors_of_type(node, via_edge_type),
        )
        .await
    }

    async fn find_bounded_paths(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Vec<EvidencePath>> {
        if let Some(result) = self
            .attempt(self.inner.find_bounded_paths(from, to, max_hops, max_paths))
            .await
        {
            return result;
        }
        self.before_retry("find_bounded_paths", from).await;
        self.last_attempt(
            "find_bounded_paths",
            from,
            self.inner.find_bounded_paths(from, to, max_hops, max_paths),
        )
        .await
    }
}
