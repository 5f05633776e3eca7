/// Core record types mirroring the protein knowledge graph schema.
/// Graph rows arrive from a `GraphStore`; scored records are built per request.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HeliconError;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Protein,
    Disease,
    Therapeutic,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Protein     => "protein",
            NodeKind::Disease     => "disease",
            NodeKind::Therapeutic => "therapeutic",
        }
    }
}

impl FromStr for NodeKind {
    type Err = HeliconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "protein"                          => Ok(NodeKind::Protein),
            "disease"                          => Ok(NodeKind::Disease),
            "therapeutic" | "therapeutic_protein" | "drug" => Ok(NodeKind::Therapeutic),
            other => Err(HeliconError::InvalidRequest(format!("unknown node kind '{other}'"))),
        }
    }
}

/// A node identified by its domain key (UniProt accession, disease id, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeRef {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self { kind, key: key.into() }
    }

    pub fn protein(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Protein, key)
    }

    pub fn disease(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Disease, key)
    }

    pub fn therapeutic(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Therapeutic, key)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    AssociatedWith,
    SimilarTo,
    Targets,
    BindsTo,
    Modulates,
    UsedFor,
}

impl EdgeType {
    /// Relationship name as stored in the graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::AssociatedWith => "ASSOCIATED_WITH",
            EdgeType::SimilarTo      => "SIMILAR_TO",
            EdgeType::Targets        => "TARGETS",
            EdgeType::BindsTo        => "BINDS_TO",
            EdgeType::Modulates      => "MODULATES",
            EdgeType::UsedFor        => "USED_FOR",
        }
    }

    /// Therapeutic → protein interaction relations.
    pub fn is_therapeutic_interaction(&self) -> bool {
        matches!(self, EdgeType::Targets | EdgeType::BindsTo | EdgeType::Modulates)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge direction relative to the node being queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

/// Score properties used by the loaders, in lookup order.
pub const WEIGHT_PROPERTY_KEYS: [&str; 3] = ["sim_score", "score", "evidence_score"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub from: NodeRef,
    pub to: NodeRef,
    /// Raw score carried by the relationship (sim_score / score / evidence_score).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(edge_type: EdgeType, from: NodeRef, to: NodeRef, weight: Option<f64>) -> Self {
        Self { edge_type, from, to, weight, properties: HashMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Edge weight, or `default` when the relationship carries no score.
    pub fn weight_or(&self, default: f64) -> f64 {
        self.weight.unwrap_or(default)
    }

    /// Fill `weight` from the score properties when it was not given explicitly.
    pub fn resolve_weight(&mut self) {
        if self.weight.is_some() {
            return;
        }
        self.weight = WEIGHT_PROPERTY_KEYS
            .iter()
            .find_map(|k| self.properties.get(*k).and_then(|v| v.as_f64()));
    }

    /// The endpoint that is not `node` when seen from `direction`.
    pub fn other_end(&self, direction: Direction) -> &NodeRef {
        match direction {
            Direction::Out => &self.to,
            Direction::In  => &self.from,
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    DiseasePrediction,
    #[serde(alias = "drug_recommendation")]
    TherapeuticRecommendation,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::DiseasePrediction, Task::TherapeuticRecommendation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::DiseasePrediction         => "disease_prediction",
            Task::TherapeuticRecommendation => "therapeutic_recommendation",
        }
    }

    /// Kind of node ranked as a candidate for this task.
    pub fn candidate_kind(&self) -> NodeKind {
        match self {
            Task::DiseasePrediction         => NodeKind::Disease,
            Task::TherapeuticRecommendation => NodeKind::Therapeutic,
        }
    }

    /// Relations linking a protein to candidates, and the direction seen from the protein.
    pub fn relation(&self) -> (&'static [EdgeType], Direction) {
        match self {
            Task::DiseasePrediction => (&[EdgeType::AssociatedWith], Direction::Out),
            Task::TherapeuticRecommendation => (
                &[EdgeType::Targets, EdgeType::BindsTo, EdgeType::Modulates],
                Direction::In,
            ),
        }
    }
}

impl FromStr for Task {
    type Err = HeliconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disease_prediction"                                  => Ok(Task::DiseasePrediction),
            "therapeutic_recommendation" | "drug_recommendation"  => Ok(Task::TherapeuticRecommendation),
            other => Err(HeliconError::UnknownTask(other.to_string())),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Scored results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateScore {
    pub node: NodeRef,
    pub direct_score: f64,
    pub propagated_score: f64,
    pub final_score: f64,
    pub z_score: f64,
    /// Similar proteins through which propagated evidence reached the candidate.
    pub support_nodes: Vec<NodeRef>,
    /// Diseases a therapeutic candidate is already used for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indications: Vec<NodeRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidencePath {
    pub nodes: Vec<NodeRef>,
    pub edges: Vec<Edge>,
    pub raw_strength: f64,
    pub hop_penalty: f64,
    pub final_score: f64,
    pub z_score: f64,
}

impl EvidencePath {
    /// A path as returned by a graph store, before scoring.
    pub fn unscored(nodes: Vec<NodeRef>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            raw_strength: 0.0,
            hop_penalty: 0.0,
            final_score: 0.0,
            z_score: 0.0,
        }
    }

    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_uses_graph_relationship_names() {
        let json = serde_json::to_string(&EdgeType::AssociatedWith).unwrap();
        assert_eq!(json, "\"ASSOCIATED_WITH\"");
        let parsed: EdgeType = serde_json::from_str("\"BINDS_TO\"").unwrap();
        assert_eq!(parsed, EdgeType::BindsTo);
    }

    #[test]
    fn test_task_accepts_legacy_drug_alias() {
        let t: Task = serde_json::from_str("\"drug_recommendation\"").unwrap();
        assert_eq!(t, Task::TherapeuticRecommendation);
        assert_eq!("drug_recommendation".parse::<Task>().unwrap(), Task::TherapeuticRecommendation);
        assert!(matches!("protein_folding".parse::<Task>(), Err(HeliconError::UnknownTask(_))));
    }

    #[test]
    fn test_resolve_weight_from_score_properties() {
        let mut e = Edge::new(
            EdgeType::SimilarTo,
            NodeRef::protein("P1"),
            NodeRef::protein("P2"),
            None,
        )
        .with_property("sim_score", serde_json::json!(0.82));
        e.resolve_weight();
        assert_eq!(e.weight, Some(0.82));

        let mut explicit = e.clone();
        explicit.weight = Some(0.1);
        explicit.resolve_weight();
        assert_eq!(explicit.weight, Some(0.1));
    }

    #[test]
    fn test_other_end_follows_direction() {
        let e = Edge::new(
            EdgeType::Targets,
            NodeRef::therapeutic("T1"),
            NodeRef::protein("P1"),
            Some(0.9),
        );
        assert_eq!(e.other_end(Direction::In), &NodeRef::therapeutic("T1"));
        assert_eq!(e.other_end(Direction::Out), &NodeRef::protein("P1"));
    }
}
