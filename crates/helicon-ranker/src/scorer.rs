//! Candidate ranking for a source protein.
//!
//! Two evidence sources are combined per candidate:
//!
//! * direct: the task relation from the source itself, `max(edge weight)`;
//! * propagated: one `SIMILAR_TO` hop to a support protein, then the task
//!   relation from there, `max(similarity * edge weight)`.
//!
//! The blended score is z-normalised across the candidate set and ranked.

use std::collections::HashMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use helicon_common::{
    CandidateScore, Direction, Edge, EdgeType, HeliconError, NodeKind, NodeRef, Result, Task,
};
use helicon_kg::GraphStore;

use crate::normalise::z_scores;
use crate::weights::WeightModel;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingRequest {
    pub source_key: String,
    pub task: Task,
    pub top_k: usize,
    /// Clip reported `final_score` to [0, 1] after normalisation.
    #[serde(default)]
    pub clamp_scores: bool,
}

impl RankingRequest {
    pub fn new(source_key: impl Into<String>, task: Task, top_k: usize) -> Self {
        Self { source_key: source_key.into(), task, top_k, clamp_scores: false }
    }

    pub fn clamped(mut self) -> Self {
        self.clamp_scores = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingResponse {
    pub task: Task,
    pub source: NodeRef,
    pub candidates: Vec<CandidateScore>,
    /// Partial failures that were treated as "no evidence".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarProtein {
    pub node: NodeRef,
    pub similarity: f64,
}

/// Evidence gathered for one candidate, before blending.
#[derive(Debug, Default)]
struct Evidence {
    direct: Option<f64>,
    propagated: Option<f64>,
    support: Vec<NodeRef>,
}

/// Candidates keyed by node, remembering first-discovery order.
#[derive(Debug, Default)]
struct Tally {
    order: Vec<NodeRef>,
    by_node: HashMap<NodeRef, Evidence>,
}

impl Tally {
    fn entry(&mut self, node: &NodeRef) -> &mut Evidence {
        if !self.by_node.contains_key(node) {
            self.order.push(node.clone());
        }
        self.by_node.entry(node.clone()).or_default()
    }

    fn add_direct(&mut self, node: &NodeRef, weight: f64) {
        let e = self.entry(node);
        e.direct = Some(e.direct.map_or(weight, |d| d.max(weight)));
    }

    fn add_propagated(&mut self, node: &NodeRef, via: &NodeRef, strength: f64) {
        let e = self.entry(node);
        e.propagated = Some(e.propagated.map_or(strength, |p| p.max(strength)));
        if !e.support.contains(via) {
            e.support.push(via.clone());
        }
    }

    fn into_scores(self, model: &WeightModel) -> Vec<CandidateScore> {
        let Tally { order, mut by_node } = self;
        order
            .into_iter()
            .filter_map(|node| {
                let ev = by_node.remove(&node)?;
                let direct = ev.direct.unwrap_or(0.0);
                let propagated = ev.propagated.unwrap_or(0.0);
                Some(CandidateScore {
                    final_score: model.combine(direct, propagated),
                    node,
                    direct_score: direct,
                    propagated_score: propagated,
                    z_score: 0.0,
                    support_nodes: ev.support,
                    indications: Vec::new(),
                })
            })
            .collect()
    }
}

/// Store errors about the source become `UnknownEntity`; transient ones are
/// recorded as warnings and treated as empty; the rest propagate.
fn degrade(
    result: Result<Vec<Edge>>,
    context: &str,
    warnings: &mut Vec<String>,
) -> Result<Vec<Edge>> {
    match result {
        Ok(edges) => Ok(edges),
        Err(e) if e.is_transient() => {
            warn!(error = %e, context, "Treating timed-out store call as no evidence");
            warnings.push(format!("{context}: {e}"));
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn unknown_source(err: HeliconError, source: &NodeRef) -> HeliconError {
    match err {
        HeliconError::NotFound(_) => HeliconError::UnknownEntity(source.to_string()),
        other => other,
    }
}

/// Task-relation edges from `node`, all relation types queried concurrently.
async fn relation_edges(
    store: &dyn GraphStore,
    node: &NodeRef,
    task: Task,
) -> Vec<Result<Vec<Edge>>> {
    let (types, direction) = task.relation();
    join_all(
        types
            .iter()
            .map(|t| store.get_direct_edges(node, *t, direction)),
    )
    .await
}

fn is_candidate(node: &NodeRef, task: Task, source: &NodeRef) -> bool {
    node.kind == task.candidate_kind() && node != source
}

async fn collect_direct(
    store: &dyn GraphStore,
    source: &NodeRef,
    task: Task,
) -> Result<(Vec<Edge>, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut edges = Vec::new();
    for result in relation_edges(store, source, task).await {
        edges.extend(degrade(result, "direct evidence", &mut warnings)?);
    }
    Ok((edges, warnings))
}

/// Support protein with the similarity weights of every edge reaching it.
struct Support {
    node: NodeRef,
    similarities: Vec<f64>,
}

async fn collect_propagated(
    store: &dyn GraphStore,
    source: &NodeRef,
    task: Task,
) -> Result<(Vec<(Support, Vec<Edge>)>, Vec<String>)> {
    let mut warnings = Vec::new();
    let similar = degrade(
        store.get_direct_edges(source, EdgeType::SimilarTo, Direction::Out).await,
        "similarity lookup",
        &mut warnings,
    )?;

    let mut supports: Vec<Support> = Vec::new();
    for edge in similar {
        if edge.to == *source {
            continue;
        }
        // coalesce(sim_score, 0.0)
        let sim = edge.weight_or(0.0);
        match supports.iter_mut().find(|s| s.node == edge.to) {
            Some(s) => s.similarities.push(sim),
            None => supports.push(Support { node: edge.to, similarities: vec![sim] }),
        }
    }

    let hops = join_all(supports.iter().map(|s| relation_edges(store, &s.node, task))).await;

    let mut out = Vec::with_capacity(supports.len());
    for (support, results) in supports.into_iter().zip(hops) {
        let mut edges = Vec::new();
        for result in results {
            match result {
                Ok(found) => edges.extend(found),
                Err(e) => {
                    warn!(support = %support.node, error = %e, "Skipping support protein");
                    warnings.push(format!("support {}: {e}", support.node));
                }
            }
        }
        out.push((support, edges));
    }
    Ok((out, warnings))
}

/// Fill each therapeutic's `USED_FOR` diseases. Lookup failures only warn.
async fn attach_indications(
    store: &dyn GraphStore,
    candidates: &mut [CandidateScore],
    warnings: &mut Vec<String>,
) {
    let lookups = join_all(
        candidates
            .iter()
            .map(|c| store.get_direct_edges(&c.node, EdgeType::UsedFor, Direction::Out)),
    )
    .await;
    for (candidate, result) in candidates.iter_mut().zip(lookups) {
        match result {
            Ok(edges) => {
                for edge in edges {
                    let known = candidate.indications.contains(&edge.to);
                    if edge.to.kind == NodeKind::Disease && !known {
                        candidate.indications.push(edge.to);
                    }
                }
            }
            Err(e) => {
                warn!(candidate = %candidate.node, error = %e, "Skipping indication lookup");
                warnings.push(format!("indications {}: {e}", candidate.node));
            }
        }
    }
}

/// Rank candidate diseases or therapeutics for `request.source_key`.
pub async fn rank_candidates(
    store: &dyn GraphStore,
    model: &WeightModel,
    request: &RankingRequest,
) -> Result<RankingResponse> {
    if request.top_k == 0 {
        return Err(HeliconError::InvalidRequest("top_k must be at least 1".to_string()));
    }
    let task = request.task;
    let source = NodeRef::protein(request.source_key.clone());
    let (_, direction) = task.relation();

    let (direct, propagated) = tokio::join!(
        collect_direct(store, &source, task),
        collect_propagated(store, &source, task),
    );
    let (direct_edges, mut warnings) = direct.map_err(|e| unknown_source(e, &source))?;
    let (support_edges, more) = propagated.map_err(|e| unknown_source(e, &source))?;
    warnings.extend(more);

    let mut tally = Tally::default();
    for edge in &direct_edges {
        let candidate = edge.other_end(direction);
        if is_candidate(candidate, task, &source) {
            // coalesce(score, 0.0)
            tally.add_direct(candidate, edge.weight_or(0.0));
        }
    }
    for (support, edges) in &support_edges {
        for edge in edges {
            let candidate = edge.other_end(direction);
            if !is_candidate(candidate, task, &source) {
                continue;
            }
            // coalesce(second_score, 1.0)
            let second = edge.weight_or(1.0);
            for sim in &support.similarities {
                tally.add_propagated(candidate, &support.node, sim * second);
            }
        }
    }

    let mut candidates = tally.into_scores(model);
    let finals: Vec<f64> = candidates.iter().map(|c| c.final_score).collect();
    for (c, z) in candidates.iter_mut().zip(z_scores(&finals)) {
        c.z_score = z;
    }
    // Stable: ties keep discovery order.
    candidates.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
    let total = candidates.len();
    candidates.truncate(request.top_k);
    if task == Task::TherapeuticRecommendation {
        attach_indications(store, &mut candidates, &mut warnings).await;
    }
    if request.clamp_scores {
        for c in &mut candidates {
            c.final_score = WeightModel::clamp_unit(c.final_score);
        }
    }

    info!(
        task = %task,
        source = %source,
        candidates = total,
        returned = candidates.len(),
        warnings = warnings.len(),
        "Ranked candidates"
    );
    Ok(RankingResponse { task, source, candidates, warnings })
}

/// `SIMILAR_TO` neighbours of a protein, most similar first.
pub async fn similar_proteins(
    store: &dyn GraphStore,
    source_key: &str,
    top_k: usize,
) -> Result<Vec<SimilarProtein>> {
    let source = NodeRef::protein(source_key);
    let edges = store
        .get_direct_edges(&source, EdgeType::SimilarTo, Direction::Out)
        .await
        .map_err(|e| unknown_source(e, &source))?;

    let mut similar: Vec<SimilarProtein> = Vec::new();
    for edge in edges {
        if edge.to == source {
            continue;
        }
        let similarity = edge.weight_or(0.0);
        match similar.iter_mut().find(|s| s.node == edge.to) {
            Some(s) => s.similarity = s.similarity.max(similarity),
            None => similar.push(SimilarProtein { node: edge.to, similarity }),
        }
    }
    similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    similar.truncate(top_k);
    debug!(source = %source, found = similar.len(), "Similar proteins");
    Ok(similar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helicon_kg::InMemoryGraphStore;
    use pretty_assertions::assert_eq;

    fn assoc(p: &str, d: &str, w: Option<f64>) -> Edge {
        Edge::new(EdgeType::AssociatedWith, NodeRef::protein(p), NodeRef::disease(d), w)
    }

    fn sim(a: &str, b: &str, w: Option<f64>) -> Edge {
        Edge::new(EdgeType::SimilarTo, NodeRef::protein(a), NodeRef::protein(b), w)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn test_direct_and_propagated_blend() {
        let store = InMemoryGraphStore::new()
            .with_edge(assoc("P1", "D1", Some(0.8)))
            .with_edge(sim("P1", "P2", Some(0.6)))
            .with_edge(assoc("P2", "D1", Some(0.5)));
        let resp = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("P1", Task::DiseasePrediction, 10),
        )
        .await
        .unwrap();

        assert_eq!(resp.candidates.len(), 1);
        let c = &resp.candidates[0];
        assert_eq!(c.node, NodeRef::disease("D1"));
        assert!(close(c.direct_score, 0.8));
        assert!(close(c.propagated_score, 0.3));
        assert!(close(c.final_score, 0.65));
        assert_eq!(c.z_score, 0.0);
        assert_eq!(c.support_nodes, vec![NodeRef::protein("P2")]);
        assert!(resp.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_direct_edges_take_max() {
        let store = InMemoryGraphStore::new()
            .with_edge(assoc("P1", "D1", Some(0.4)))
            .with_edge(assoc("P1", "D1", Some(0.9)));
        let resp = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("P1", Task::DiseasePrediction, 5),
        )
        .await
        .unwrap();
        assert!(close(resp.candidates[0].direct_score, 0.9));
    }

    #[tokio::test]
    async fn test_missing_weights_use_coalesce_defaults() {
        // Direct weight missing -> 0.0; second hop missing -> 1.0.
        let store = InMemoryGraphStore::new()
            .with_edge(assoc("P1", "D1", None))
            .with_edge(sim("P1", "P2", Some(0.4)))
            .with_edge(assoc("P2", "D2", None))
            .with_edge(sim("P1", "P3", None))
            .with_edge(assoc("P3", "D3", Some(0.9)));
        let resp = rank_candidates(
            &store,
            &WeightModel::new(1.0, 1.0, 0.0),
            &RankingRequest::new("P1", Task::DiseasePrediction, 10),
        )
        .await
        .unwrap();
        let by_key: HashMap<_, _> = resp
            .candidates
            .iter()
            .map(|c| (c.node.key.as_str(), c))
            .collect();
        assert_eq!(by_key["D1"].direct_score, 0.0);
        assert!(close(by_key["D2"].propagated_score, 0.4));
        assert_eq!(by_key["D3"].propagated_score, 0.0);
    }

    #[tokio::test]
    async fn test_ordering_ties_and_truncation() {
        let store = InMemoryGraphStore::new()
            .with_edge(assoc("P1", "D1", Some(0.2)))
            .with_edge(assoc("P1", "D2", Some(0.9)))
            .with_edge(assoc("P1", "D3", Some(0.2)))
            .with_edge(assoc("P1", "D4", Some(0.5)));
        let resp = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("P1", Task::DiseasePrediction, 3),
        )
        .await
        .unwrap();
        let keys: Vec<_> = resp.candidates.iter().map(|c| c.node.key.clone()).collect();
        assert_eq!(keys, vec!["D2", "D4", "D1"]);
        assert!(resp.candidates.windows(2).all(|w| w[0].z_score >= w[1].z_score));
    }

    #[tokio::test]
    async fn test_therapeutic_task_reads_incoming_edges() {
        let store = InMemoryGraphStore::new()
            .with_edge(Edge::new(
                EdgeType::Targets,
                NodeRef::therapeutic("T1"),
                NodeRef::protein("P1"),
                Some(0.7),
            ))
            .with_edge(Edge::new(
                EdgeType::Modulates,
                NodeRef::therapeutic("T2"),
                NodeRef::protein("P1"),
                Some(0.3),
            ))
            .with_edge(assoc("P1", "D1", Some(0.9)));
        let resp = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("P1", Task::TherapeuticRecommendation, 10),
        )
        .await
        .unwrap();
        let nodes: Vec<_> = resp.candidates.iter().map(|c| c.node.clone()).collect();
        assert_eq!(nodes, vec![NodeRef::therapeutic("T1"), NodeRef::therapeutic("T2")]);
    }

    #[tokio::test]
    async fn test_therapeutic_candidates_carry_indications() {
        let used_for = |t: &str, d: &str| {
            Edge::new(EdgeType::UsedFor, NodeRef::therapeutic(t), NodeRef::disease(d), None)
        };
        let store = InMemoryGraphStore::new()
            .with_edge(Edge::new(
                EdgeType::Targets,
                NodeRef::therapeutic("T1"),
                NodeRef::protein("P1"),
                Some(0.7),
            ))
            .with_edge(Edge::new(
                EdgeType::BindsTo,
                NodeRef::therapeutic("T2"),
                NodeRef::protein("P1"),
                Some(0.3),
            ))
            .with_edge(used_for("T1", "D2"))
            .with_edge(used_for("T1", "D1"))
            .with_edge(used_for("T1", "D2"));
        let resp = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("P1", Task::TherapeuticRecommendation, 10),
        )
        .await
        .unwrap();
        assert_eq!(
            resp.candidates[0].indications,
            vec![NodeRef::disease("D2"), NodeRef::disease("D1")]
        );
        assert!(resp.candidates[1].indications.is_empty());
        assert!(resp.warnings.is_empty());

        let json = serde_json::to_value(&resp.candidates[1]).unwrap();
        assert!(json.get("indications").is_none());
    }

    #[tokio::test]
    async fn test_clamp_applies_after_normalisation() {
        let store = InMemoryGraphStore::new()
            .with_edge(assoc("P1", "D1", Some(3.0)))
            .with_edge(assoc("P1", "D2", Some(-1.0)));
        let req = RankingRequest::new("P1", Task::DiseasePrediction, 10).clamped();
        let resp = rank_candidates(&store, &WeightModel::new(1.0, 0.0, 0.0), &req)
            .await
            .unwrap();
        assert_eq!(resp.candidates[0].final_score, 1.0);
        assert_eq!(resp.candidates[1].final_score, 0.0);
        assert!(close(resp.candidates[0].z_score, 1.0));
        assert!(close(resp.candidates[1].z_score, -1.0));
    }

    #[tokio::test]
    async fn test_unknown_source_and_empty_results() {
        let store = InMemoryGraphStore::new().with_node(NodeRef::protein("ALONE"));
        let err = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("MISSING", Task::DiseasePrediction, 5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HeliconError::UnknownEntity(_)));

        let resp = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("ALONE", Task::DiseasePrediction, 5),
        )
        .await
        .unwrap();
        assert!(resp.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_zero_top_k_is_invalid() {
        let store = InMemoryGraphStore::new().with_node(NodeRef::protein("P1"));
        let err = rank_candidates(
            &store,
            &WeightModel::default(),
            &RankingRequest::new("P1", Task::DiseasePrediction, 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HeliconError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_similar_proteins_sorted_and_deduplicated() {
        let store = InMemoryGraphStore::new()
            .with_edge(sim("P1", "P2", Some(0.3)))
            .with_edge(sim("P1", "P3", Some(0.8)))
            .with_edge(sim("P1", "P2", Some(0.5)))
            .with_edge(sim("P1", "P4", Some(0.1)));
        let found = similar_proteins(&store, "P1", 2).await.unwrap();
        assert_eq!(
            found,
            vec![
                SimilarProtein { node: NodeRef::protein("P3"), similarity: 0.8 },
                SimilarProtein { node: NodeRef::protein("P2"), similarity: 0.5 },
            ]
        );
        assert!(matches!(
            similar_proteins(&store, "NOPE", 2).await,
            Err(HeliconError::UnknownEntity(_))
        ));
    }
}
