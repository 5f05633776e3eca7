//! helicon-ranker — Evidence ranking: candidate scoring, path scoring and weight learning.

pub mod normalise;
pub mod weights;
pub mod scorer;
pub mod paths;
pub mod training;
pub mod learner;
pub mod engine;

pub use engine::{EvidenceEngine, Explanation};
pub use learner::{FitReport, WeightLearner};
pub use paths::{PathRequest, PathScorer, PathSearch};
pub use scorer::{RankingRequest, RankingResponse, SimilarProtein};
pub use training::{load_training_examples, TrainingExample};
pub use weights::{WeightModel, WeightSet, WeightStore};
