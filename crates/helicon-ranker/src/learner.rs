//! Weight learning from labelled examples.
//!
//! Per task, fits `label ~ direct * d + propagated * p + bias` by ridge
//! regression (L2 on the coefficients only, intercept unpenalised). A seeded
//! holdout gives a validation error for diagnostics; the returned model is
//! always fitted on every example of the task.

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use helicon_common::{HeliconError, LearningConfig, Result, Task};

use crate::training::TrainingExample;
use crate::weights::{WeightModel, WeightSet};

/// Outcome of one task's fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitReport {
    pub task: Task,
    pub weights: WeightModel,
    pub examples_used: usize,
    pub validation_size: usize,
    /// Mean squared error on the holdout, when one could be formed.
    pub validation_mse: Option<f64>,
    /// True when the prior model was kept.
    pub fallback: bool,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeFit {
    pub coef: [f64; 2],
    pub intercept: f64,
}

impl RidgeFit {
    pub fn predict(&self, x: [f64; 2]) -> f64 {
        self.coef[0] * x[0] + self.coef[1] * x[1] + self.intercept
    }
}

/// Ridge regression on two features via the centred normal equations.
///
/// Returns `None` for an empty input or a singular system (possible only
/// when `alpha` is zero).
pub fn ridge_fit(x: &[[f64; 2]], y: &[f64], alpha: f64) -> Option<RidgeFit> {
    let n = x.len();
    if n == 0 || n != y.len() {
        return None;
    }
    let nf = n as f64;
    let mean_x = [
        x.iter().map(|r| r[0]).sum::<f64>() / nf,
        x.iter().map(|r| r[1]).sum::<f64>() / nf,
    ];
    let mean_y = y.iter().sum::<f64>() / nf;

    let (mut s00, mut s01, mut s11, mut t0, mut t1) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (row, &target) in x.iter().zip(y) {
        let a = row[0] - mean_x[0];
        let b = row[1] - mean_x[1];
        let c = target - mean_y;
        s00 += a * a;
        s01 += a * b;
        s11 += b * b;
        t0 += a * c;
        t1 += b * c;
    }
    s00 += alpha;
    s11 += alpha;

    let det = s00 * s11 - s01 * s01;
    if det.abs() < 1e-12 {
        return None;
    }
    let coef = [(s11 * t0 - s01 * t1) / det, (s00 * t1 - s01 * t0) / det];
    let intercept = mean_y - coef[0] * mean_x[0] - coef[1] * mean_x[1];
    Some(RidgeFit { coef, intercept })
}

pub struct WeightLearner {
    prior: WeightSet,
    config: LearningConfig,
}

impl WeightLearner {
    pub fn new(prior: WeightSet, config: LearningConfig) -> Self {
        Self { prior, config }
    }

    /// Holdout size for `n` examples; always leaves at least one for training.
    fn validation_size(&self, n: usize) -> usize {
        if n < 2 {
            return 0;
        }
        let wanted = (n as f64 * self.config.validation_fraction).ceil() as usize;
        wanted.min(n - 1)
    }

    fn features(examples: &[&TrainingExample]) -> (Vec<[f64; 2]>, Vec<f64>) {
        examples
            .iter()
            .map(|e| ([e.direct_score, e.propagated_score], e.label))
            .unzip()
    }

    /// Fit on the shuffled training split and score the holdout.
    fn holdout_mse(&self, examples: &[&TrainingExample], n_val: usize) -> Option<f64> {
        if n_val == 0 {
            return None;
        }
        let mut shuffled = examples.to_vec();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        shuffled.shuffle(&mut rng);
        let (val, train) = shuffled.split_at(n_val);

        let (x, y) = Self::features(train);
        let fit = ridge_fit(&x, &y, self.config.alpha)?;
        let sse: f64 = val
            .iter()
            .map(|e| (fit.predict([e.direct_score, e.propagated_score]) - e.label).powi(2))
            .sum();
        Some(sse / val.len() as f64)
    }

    fn fallback_report(&self, task: Task, examples_used: usize) -> FitReport {
        FitReport {
            task,
            weights: *self.prior.get(task),
            examples_used,
            validation_size: 0,
            validation_mse: None,
            fallback: true,
            trained_at: Utc::now(),
        }
    }

    pub fn fit_task_report(&self, task: Task, examples: &[TrainingExample]) -> FitReport {
        let matching: Vec<&TrainingExample> = examples.iter().filter(|e| e.task == task).collect();
        if matching.is_empty() {
            let err = HeliconError::InsufficientTrainingData(task.to_string());
            warn!(task = %task, error = %err, "Keeping prior weights");
            return self.fallback_report(task, 0);
        }

        let (x, y) = Self::features(&matching);
        let Some(fit) = ridge_fit(&x, &y, self.config.alpha) else {
            warn!(task = %task, examples = matching.len(), "Singular ridge system, keeping prior weights");
            return self.fallback_report(task, matching.len());
        };

        let validation_size = self.validation_size(matching.len());
        let validation_mse = self.holdout_mse(&matching, validation_size);
        let weights = WeightModel::new(fit.coef[0], fit.coef[1], fit.intercept);

        info!(
            task = %task,
            examples = matching.len(),
            validation_size,
            validation_mse = validation_mse.unwrap_or(f64::NAN),
            direct = weights.direct,
            propagated = weights.propagated,
            bias = weights.bias,
            "Fitted relation weights"
        );
        FitReport {
            task,
            weights,
            examples_used: matching.len(),
            validation_size,
            validation_mse,
            fallback: false,
            trained_at: Utc::now(),
        }
    }

    pub fn fit_task(&self, task: Task, examples: &[TrainingExample]) -> WeightModel {
        self.fit_task_report(task, examples).weights
    }

    pub fn fit_all_report(&self, examples: &[TrainingExample]) -> (WeightSet, Vec<FitReport>) {
        let reports: Vec<FitReport> = Task::ALL
            .iter()
            .map(|&task| self.fit_task_report(task, examples))
            .collect();
        let set = reports
            .iter()
            .fold(self.prior.clone(), |set, r| set.with(r.task, r.weights));
        (set, reports)
    }

    pub fn fit_all(&self, examples: &[TrainingExample]) -> WeightSet {
        self.fit_all_report(examples).0
    }

    /// Fit every task and write the result atomically to `path`.
    pub fn fit_and_persist(
        &self,
        examples: &[TrainingExample],
        path: impl AsRef<Path>,
    ) -> Result<(WeightSet, Vec<FitReport>)> {
        let (set, reports) = self.fit_all_report(examples);
        set.save(path)?;
        Ok((set, reports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn learner() -> WeightLearner {
        WeightLearner::new(WeightSet::default(), LearningConfig::default())
    }

    #[test]
    fn test_ridge_closed_form() {
        let x = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        let y = [0.0, 1.0, 2.0];
        let fit = ridge_fit(&x, &y, 0.1).unwrap();
        assert!((fit.coef[0] - 2.0 / 2.1).abs() < 1e-9);
        assert!(fit.coef[1].abs() < 1e-12);
        assert!((fit.intercept - (1.0 - 2.0 / 2.1)).abs() < 1e-9);
    }

    #[test]
    fn test_ridge_singular_without_penalty() {
        let x = [[1.0, 1.0], [1.0, 1.0]];
        assert!(ridge_fit(&x, &[0.0, 1.0], 0.0).is_none());
        assert!(ridge_fit(&[], &[], 0.1).is_none());
    }

    #[test]
    fn test_no_matching_examples_keeps_prior() {
        let prior = WeightSet::default()
            .with(Task::TherapeuticRecommendation, WeightModel::new(0.1, 0.2, 0.3));
        let learner = WeightLearner::new(prior, LearningConfig::default());
        let examples = vec![TrainingExample::new(Task::DiseasePrediction, 0.5, 0.5, 1.0)];
        let report = learner.fit_task_report(Task::TherapeuticRecommendation, &examples);
        assert!(report.fallback);
        assert_eq!(report.weights, WeightModel::new(0.1, 0.2, 0.3));
        assert_eq!(report.examples_used, 0);
    }

    #[test]
    fn test_validation_size() {
        let l = learner();
        assert_eq!(l.validation_size(0), 0);
        assert_eq!(l.validation_size(1), 0);
        assert_eq!(l.validation_size(2), 1);
        assert_eq!(l.validation_size(10), 2);
        assert_eq!(l.validation_size(11), 3);
    }

    #[test]
    fn test_final_fit_uses_every_example() {
        let examples: Vec<_> = (0..3)
            .map(|i| TrainingExample::new(Task::DiseasePrediction, i as f64, 0.0, i as f64))
            .collect();
        let report = learner().fit_task_report(Task::DiseasePrediction, &examples);
        assert!(!report.fallback);
        assert_eq!(report.examples_used, 3);
        assert_eq!(report.validation_size, 1);
        assert!(report.validation_mse.is_some());
        assert!((report.weights.direct - 0.952381).abs() < 1e-6);
        assert!((report.weights.bias - 0.047619).abs() < 1e-6);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let examples: Vec<_> = (0..20)
            .map(|i| {
                let d = (i % 5) as f64 / 4.0;
                let p = (i % 3) as f64 / 2.0;
                TrainingExample::new(Task::DiseasePrediction, d, p, if i % 2 == 0 { 1.0 } else { 0.0 })
            })
            .collect();
        let a = learner().fit_task_report(Task::DiseasePrediction, &examples);
        let b = learner().fit_task_report(Task::DiseasePrediction, &examples);
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.validation_mse, b.validation_mse);
    }

    #[test]
    fn test_fit_all_covers_every_task() {
        let examples = vec![
            TrainingExample::new(Task::DiseasePrediction, 1.0, 0.0, 1.0),
            TrainingExample::new(Task::DiseasePrediction, 0.0, 1.0, 0.0),
        ];
        let (set, reports) = learner().fit_all_report(&examples);
        assert_eq!(reports.len(), Task::ALL.len());
        assert_eq!(set.therapeutic_recommendation, WeightModel::default());
        assert_ne!(set.disease_prediction, WeightModel::default());
    }
}
