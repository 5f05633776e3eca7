//! Relation weights for blending direct and propagated evidence.
//!
//! One `WeightModel` per task. The `WeightSet` holding both is the unit of
//! persistence and of replacement: learning runs build a new set and swap
//! it in whole, so readers never see a half-updated model.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use helicon_common::{HeliconError, Result, Task};

/// Linear blend: `direct * d + propagated * p + bias`.
/// No sign or range invariant; regression may produce negative coefficients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeightModel {
    #[serde(alias = "w_direct")]
    pub direct: f64,
    #[serde(alias = "w_propagated")]
    pub propagated: f64,
    pub bias: f64,
}

impl Default for WeightModel {
    /// Expert prior: direct evidence dominates similarity-propagated evidence.
    fn default() -> Self {
        Self {
            direct:     0.7,
            propagated: 0.3,
            bias:       0.0,
        }
    }
}

impl WeightModel {
    pub fn new(direct: f64, propagated: f64, bias: f64) -> Self {
        Self { direct, propagated, bias }
    }

    pub fn combine(&self, direct_score: f64, propagated_score: f64) -> f64 {
        self.direct * direct_score + self.propagated * propagated_score + self.bias
    }

    /// Clip to [0, 1] for user-facing probabilities. Ranking uses the raw value.
    pub fn clamp_unit(score: f64) -> f64 {
        score.clamp(0.0, 1.0)
    }

    pub fn is_finite(&self) -> bool {
        self.direct.is_finite() && self.propagated.is_finite() && self.bias.is_finite()
    }
}

/// Per-task weights, serialized as
/// `{"disease_prediction": {...}, "therapeutic_recommendation": {...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeightSet {
    #[serde(default)]
    pub disease_prediction: WeightModel,
    #[serde(default, alias = "drug_recommendation")]
    pub therapeutic_recommendation: WeightModel,
}

impl WeightSet {
    pub fn get(&self, task: Task) -> &WeightModel {
        match task {
            Task::DiseasePrediction         => &self.disease_prediction,
            Task::TherapeuticRecommendation => &self.therapeutic_recommendation,
        }
    }

    pub fn set(&mut self, task: Task, model: WeightModel) {
        match task {
            Task::DiseasePrediction         => self.disease_prediction = model,
            Task::TherapeuticRecommendation => self.therapeutic_recommendation = model,
        }
    }

    pub fn with(mut self, task: Task, model: WeightModel) -> Self {
        self.set(task, model);
        self
    }

    /// Read a weights file. `Ok(None)` when it does not exist.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let malformed = |reason: String| HeliconError::MalformedWeightsFile {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let set: WeightSet =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        if !set.disease_prediction.is_finite() || !set.therapeutic_recommendation.is_finite() {
            return Err(malformed("non-finite coefficient".to_string()));
        }
        Ok(Some(set))
    }

    /// Load persisted weights, falling back to defaults when the file is
    /// missing or unreadable. Never fails start-up.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(Some(set)) => {
                info!(path = %path.display(), "Loaded relation weights");
                set
            }
            Ok(None) => {
                info!(path = %path.display(), "No relation weights file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "Falling back to default relation weights");
                Self::default()
            }
        }
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(self)?;
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), "Relation weights saved");
        Ok(())
    }
}

/// Shared, read-mostly holder of the active `WeightSet`.
#[derive(Debug, Default)]
pub struct WeightStore {
    current: RwLock<Arc<WeightSet>>,
}

impl WeightStore {
    pub fn new(set: WeightSet) -> Self {
        Self { current: RwLock::new(Arc::new(set)) }
    }

    /// Cheap snapshot; stays consistent even if a swap happens meanwhile.
    pub async fn snapshot(&self) -> Arc<WeightSet> {
        self.current.read().await.clone()
    }

    /// Replace the whole set, returning the previous one.
    pub async fn replace(&self, set: WeightSet) -> Arc<WeightSet> {
        let mut guard = self.current.write().await;
        std::mem::replace(&mut *guard, Arc::new(set))
    }
}
