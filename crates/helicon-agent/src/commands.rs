//! Subcommand handlers. Each returns the JSON document printed on stdout.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use helicon_common::{EngineConfig, NodeRef};
use helicon_ranker::{load_training_examples, EvidenceEngine, PathRequest, RankingRequest};

use crate::Commands;

pub(crate) async fn run(engine: &EvidenceEngine, config: &EngineConfig, command: Commands) -> Result<Value> {
    let top_k_default = config.ranking.default_top_k;
    let hops_default = config.path_scoring.default_max_hops;
    let paths_default = config.path_scoring.default_max_paths;

    let value = match command {
        Commands::Rank { source, task, top_k, clamp } => {
            let mut request = RankingRequest::new(source, task, top_k.unwrap_or(top_k_default));
            request.clamp_scores = clamp;
            serde_json::to_value(engine.rank(&request).await?)?
        }

        Commands::Similar { source, top_k } => {
            let similar = engine
                .similar_proteins(&source, top_k.unwrap_or(top_k_default))
                .await?;
            json!({ "source": source, "similar": similar })
        }

        Commands::Paths { source, target, target_kind, max_hops, max_paths } => {
            let request = PathRequest {
                source_key: source,
                target: NodeRef::new(target_kind, target),
                max_hops: max_hops.unwrap_or(hops_default),
                max_paths: max_paths.unwrap_or(paths_default),
            };
            serde_json::to_value(engine.evidence_paths(&request).await?)?
        }

        Commands::Explain { source, task, top_k, max_hops, max_paths } => {
            let request = RankingRequest::new(source, task, top_k.unwrap_or(top_k_default));
            let explained = engine
                .explain_top(
                    &request,
                    max_hops.unwrap_or(hops_default),
                    max_paths.unwrap_or(paths_default),
                )
                .await?;
            serde_json::to_value(explained)?
        }

        Commands::Train { examples, weights_path } => {
            let training = load_training_examples(&examples)
                .with_context(|| format!("Failed to read training data {}", examples.display()))?;
            let path = weights_path.unwrap_or_else(|| config.weights.path.clone());
            let reports = engine
                .retrain(&training, &path)
                .await
                .with_context(|| format!("Failed to persist weights to {}", path.display()))?;
            info!(path = %path.display(), examples = training.len(), "Training complete");
            json!({ "weights_path": path, "reports": reports })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use helicon_common::{Task, NodeKind};
    use helicon_test_utils::scenario_store;

    fn engine() -> EvidenceEngine {
        EvidenceEngine::from_config(Arc::new(scenario_store()), &EngineConfig::default())
    }

    #[tokio::test]
    async fn test_rank_outputs_candidates() {
        let out = run(
            &engine(),
            &EngineConfig::default(),
            Commands::Rank { source: "P1".into(), task: Task::DiseasePrediction, top_k: None, clamp: false },
        )
        .await
        .unwrap();
        assert_eq!(out["task"], "disease_prediction");
        assert_eq!(out["candidates"][0]["node"]["key"], "D1");
    }

    #[tokio::test]
    async fn test_paths_uses_configured_bounds() {
        let out = run(
            &engine(),
            &EngineConfig::default(),
            Commands::Paths {
                source: "P1".into(),
                target: "D1".into(),
                target_kind: NodeKind::Disease,
                max_hops: None,
                max_paths: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(out["paths"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_train_writes_weights() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("train.jsonl");
        std::fs::write(
            &data,
            "{\"task\":\"disease_prediction\",\"direct_score\":1.0,\"propagated_score\":0.0,\"label\":1.0}\n\
             {\"task\":\"disease_prediction\",\"direct_score\":0.0,\"propagated_score\":1.0,\"label\":0.0}\n",
        )
        .unwrap();
        let weights = dir.path().join("weights.json");
        let out = run(
            &engine(),
            &EngineConfig::default(),
            Commands::Train { examples: data, weights_path: Some(weights.clone()) },
        )
        .await
        .unwrap();
        assert!(weights.exists());
        assert_eq!(out["reports"].as_array().unwrap().len(), 2);
    }
}
