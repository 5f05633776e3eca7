//! Evidence path scoring.
//!
//! A path's strength is the sum of per-relation contributions, damped by
//! `1 / (1 + edges)` so that shorter chains of evidence rank higher.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use helicon_common::{
    Direction, Edge, EdgeType, EvidencePath, HeliconError, NodeRef, PathScoringConfig, Result,
};
use helicon_kg::GraphStore;

use crate::normalise::z_scores;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathRequest {
    pub source_key: String,
    pub target: NodeRef,
    pub max_hops: usize,
    pub max_paths: usize,
}

/// Scored paths to one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathSearch {
    pub target: NodeRef,
    pub paths: Vec<EvidencePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl PathSearch {
    fn empty(target: NodeRef, warning: Option<String>) -> Self {
        Self { target, paths: Vec::new(), warning }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathScorer {
    config: PathScoringConfig,
}

impl PathScorer {
    pub fn new(config: PathScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PathScoringConfig {
        &self.config
    }

    /// Strength one edge adds to a path. Missing weights count as 1.0.
    pub fn edge_contribution(&self, edge: &Edge) -> f64 {
        let c = &self.config;
        match edge.edge_type {
            EdgeType::AssociatedWith => c.direct * edge.weight_or(1.0),
            EdgeType::SimilarTo => c.similarity * edge.weight_or(1.0),
            EdgeType::Targets | EdgeType::BindsTo | EdgeType::Modulates => {
                c.therapeutic * edge.weight_or(1.0)
            }
            EdgeType::UsedFor => c.therapeutic * c.used_for_discount,
        }
    }

    pub fn hop_penalty(edge_count: usize) -> f64 {
        1.0 / (1.0 + edge_count as f64)
    }

    /// Fill the strength, penalty and final score of one path.
    pub fn score_path(&self, mut path: EvidencePath) -> EvidencePath {
        path.raw_strength = path.edges.iter().map(|e| self.edge_contribution(e)).sum();
        path.hop_penalty = Self::hop_penalty(path.hop_count());
        path.final_score = path.raw_strength * path.hop_penalty;
        path
    }

    /// Score, normalise and order raw store paths. Paths longer than
    /// `max_hops` are dropped before normalisation.
    pub fn rank_paths(
        &self,
        paths: Vec<EvidencePath>,
        max_hops: usize,
        max_paths: usize,
    ) -> Vec<EvidencePath> {
        let mut scored: Vec<EvidencePath> = paths
            .into_iter()
            .filter(|p| p.hop_count() <= max_hops)
            .map(|p| self.score_path(p))
            .collect();
        let finals: Vec<f64> = scored.iter().map(|p| p.final_score).collect();
        for (p, z) in scored.iter_mut().zip(z_scores(&finals)) {
            p.z_score = z;
        }
        scored.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
        scored.truncate(max_paths);
        scored
    }

    /// Validate caller bounds and cap hops at the configured limit.
    pub fn resolve_bounds(&self, max_hops: usize, max_paths: usize) -> Result<(usize, usize)> {
        if max_hops == 0 || max_paths == 0 {
            return Err(HeliconError::InvalidRequest(format!(
                "max_hops and max_paths must be at least 1 (got {max_hops}, {max_paths})"
            )));
        }
        Ok((max_hops.min(self.config.max_hops_limit), max_paths))
    }
}

fn unknown_entity(err: HeliconError) -> HeliconError {
    match err {
        HeliconError::NotFound(node) => HeliconError::UnknownEntity(node),
        other => other,
    }
}

/// Scored evidence paths from a protein to `request.target`.
///
/// No connecting path within the bound gives an empty list; a store timeout
/// gives an empty list with a warning.
pub async fn evidence_paths(
    store: &dyn GraphStore,
    scorer: &PathScorer,
    request: &PathRequest,
) -> Result<PathSearch> {
    let (max_hops, max_paths) = scorer.resolve_bounds(request.max_hops, request.max_paths)?;
    let source = NodeRef::protein(request.source_key.clone());
    let target = request.target.clone();

    let raw = match store.find_bounded_paths(&source, &target, max_hops, max_paths).await {
        Ok(paths) => paths,
        Err(HeliconError::NoPath { .. }) => {
            debug!(source = %source, target = %target, max_hops, "No evidence path");
            return Ok(PathSearch::empty(target, None));
        }
        Err(e) if e.is_transient() => {
            warn!(source = %source, target = %target, error = %e, "Path search timed out");
            let msg = format!("paths to {target}: {e}");
            return Ok(PathSearch::empty(target, Some(msg)));
        }
        Err(e) => return Err(unknown_entity(e)),
    };

    let paths = scorer.rank_paths(raw, max_hops, max_paths);
    debug!(source = %source, target = %target, paths = paths.len(), "Scored evidence paths");
    Ok(PathSearch { target, paths, warning: None })
}

/// Path searches for several targets, at most `parallelism` in flight.
/// Results keep target order. An unknown source fails the batch; any
/// per-target failure, unknown targets included, becomes an empty result
/// with a warning.
pub async fn score_many(
    store: &dyn GraphStore,
    scorer: &PathScorer,
    source_key: &str,
    targets: &[NodeRef],
    max_hops: usize,
    max_paths: usize,
    parallelism: usize,
) -> Result<Vec<PathSearch>> {
    scorer.resolve_bounds(max_hops, max_paths)?;

    // Resolve the source once so a bad target cannot be mistaken for it.
    let source = NodeRef::protein(source_key);
    match store.get_direct_edges(&source, EdgeType::SimilarTo, Direction::Out).await {
        Ok(_) => {}
        Err(HeliconError::NotFound(_)) => {
            return Err(HeliconError::UnknownEntity(source.to_string()));
        }
        Err(e) if e.is_transient() => {
            warn!(source = %source, error = %e, "Source check timed out, searching anyway");
        }
        Err(e) => return Err(e),
    }

    let requests: Vec<PathRequest> = targets
        .iter()
        .map(|t| PathRequest {
            source_key: source_key.to_string(),
            target: t.clone(),
            max_hops,
            max_paths,
        })
        .collect();

    let results: Vec<Result<PathSearch>> = stream::iter(
        requests.iter().map(|r| evidence_paths(store, scorer, r)),
    )
    .buffered(parallelism.max(1))
    .collect()
    .await;

    let mut out = Vec::with_capacity(results.len());
    for (request, result) in requests.into_iter().zip(results) {
        match result {
            Ok(search) => out.push(search),
            Err(e) => {
                warn!(target = %request.target, error = %e, "Path search failed");
                let msg = format!("paths to {}: {e}", request.target);
                out.push(PathSearch::empty(request.target, Some(msg)));
            }
        }
    }
    Ok(out)
}
