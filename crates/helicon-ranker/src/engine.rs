//! `EvidenceEngine`: one handle over graph access, weights and scoring.
//!
//! Owns the injected store and the active weights; nothing here is global.
//! Every call reads a weights snapshot up front, so a concurrent `retrain`
//! never mixes two models within one request.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use helicon_common::{
    EngineConfig, LearningConfig, NodeRef, PathScoringConfig, RankingConfig, Result,
};
use helicon_kg::GraphStore;

use crate::learner::{FitReport, WeightLearner};
use crate::paths::{self, PathRequest, PathScorer, PathSearch};
use crate::scorer::{self, RankingRequest, RankingResponse, SimilarProtein};
use crate::training::TrainingExample;
use crate::weights::{WeightSet, WeightStore};

/// Ranking plus the evidence paths behind its top candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub ranking: RankingResponse,
    pub top: Option<PathSearch>,
}

pub struct EvidenceEngine {
    store: Arc<dyn GraphStore>,
    weights: WeightStore,
    path_scorer: PathScorer,
    ranking: RankingConfig,
    learning: LearningConfig,
}

impl EvidenceEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        weights: WeightSet,
        path_scoring: PathScoringConfig,
        ranking: RankingConfig,
        learning: LearningConfig,
    ) -> Self {
        Self {
            store,
            weights: WeightStore::new(weights),
            path_scorer: PathScorer::new(path_scoring),
            ranking,
            learning,
        }
    }

    /// Build from configuration, loading persisted weights if present.
    pub fn from_config(store: Arc<dyn GraphStore>, config: &EngineConfig) -> Self {
        let weights = WeightSet::load_or_default(&config.weights.path);
        Self::new(
            store,
            weights,
            config.path_scoring.clone(),
            config.ranking.clone(),
            config.learning.clone(),
        )
    }

    pub fn path_scorer(&self) -> &PathScorer {
        &self.path_scorer
    }

    pub fn ranking_config(&self) -> &RankingConfig {
        &self.ranking
    }

    pub async fn rank(&self, request: &RankingRequest) -> Result<RankingResponse> {
        let weights = self.weights.snapshot().await;
        scorer::rank_candidates(self.store.as_ref(), weights.get(request.task), request).await
    }

    pub async fn similar_proteins(&self, source_key: &str, top_k: usize) -> Result<Vec<SimilarProtein>> {
        scorer::similar_proteins(self.store.as_ref(), source_key, top_k).await
    }

    pub async fn evidence_paths(&self, request: &PathRequest) -> Result<PathSearch> {
        paths::evidence_paths(self.store.as_ref(), &self.path_scorer, request).await
    }

    pub async fn score_many(
        &self,
        source_key: &str,
        targets: &[NodeRef],
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Vec<PathSearch>> {
        paths::score_many(
            self.store.as_ref(),
            &self.path_scorer,
            source_key,
            targets,
            max_hops,
            max_paths,
            self.ranking.path_parallelism,
        )
        .await
    }

    /// Rank, then fetch evidence paths for the top-ranked candidate.
    pub async fn explain_top(
        &self,
        request: &RankingRequest,
        max_hops: usize,
        max_paths: usize,
    ) -> Result<Explanation> {
        self.path_scorer.resolve_bounds(max_hops, max_paths)?;
        let ranking = self.rank(request).await?;
        let top = match ranking.candidates.first() {
            Some(best) => {
                let req = PathRequest {
                    source_key: request.source_key.clone(),
                    target: best.node.clone(),
                    max_hops,
                    max_paths,
                };
                Some(self.evidence_paths(&req).await?)
            }
            None => None,
        };
        Ok(Explanation { ranking, top })
    }

    pub async fn weights(&self) -> Arc<WeightSet> {
        self.weights.snapshot().await
    }

    pub async fn replace_weights(&self, set: WeightSet) {
        self.weights.replace(set).await;
        info!("Relation weights replaced");
    }

    /// Fit new weights, persist them, then make them active.
    /// Nothing is swapped if persisting fails.
    pub async fn retrain(
        &self,
        examples: &[TrainingExample],
        path: impl AsRef<Path>,
    ) -> Result<Vec<FitReport>> {
        let prior = self.weights.snapshot().await;
        let learner = WeightLearner::new((*prior).clone(), self.learning.clone());
        let (set, reports) = learner.fit_and_persist(examples, path)?;
        self.replace_weights(set).await;
        Ok(reports)
    }
}
