//! helicon-common — Shared types, errors, and configuration used across all Helicon crates.

pub mod error;
pub mod entities;
pub mod engine_config;

// Re-export commonly used types
pub use error::{HeliconError, Result};
pub use entities::{
    CandidateScore, Direction, Edge, EdgeType, EvidencePath, NodeKind, NodeRef, Task,
};
pub use engine_config::{
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, EngineConfig, GraphConfig, LearningConfig, PathScoringConfig, RankingConfig, WeightsConfig,
};
