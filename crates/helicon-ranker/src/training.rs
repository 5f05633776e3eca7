//! Labelled training examples for the weight learner (JSON lines).

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use helicon_common::{Result, Task};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrainingExample {
    pub task: Task,
    pub direct_score: f64,
    pub propagated_score: f64,
    /// Usually 0/1, any real value accepted.
    pub label: f64,
}

impl TrainingExample {
    pub fn new(task: Task, direct_score: f64, propagated_score: f64, label: f64) -> Self {
        Self { task, direct_score, propagated_score, label }
    }
}

/// Parse examples, one JSON object per line. Blank lines are ignored;
/// malformed lines are skipped with a warning naming the line.
pub fn parse_training_examples(reader: impl BufRead) -> Result<Vec<TrainingExample>> {
    let mut examples = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let Ok(text) = std::str::from_utf8(&line) else {
            skipped += 1;
            warn!(line = idx + 1, "Skipping training example that is not valid UTF-8");
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<TrainingExample>(trimmed) {
            Ok(ex) if ex.direct_score.is_finite()
                && ex.propagated_score.is_finite()
                && ex.label.is_finite() =>
            {
                examples.push(ex)
            }
            Ok(_) => {
                skipped += 1;
                warn!(line = idx + 1, "Skipping training example with non-finite values");
            }
            Err(e) => {
                skipped += 1;
                warn!(line = idx + 1, error = %e, "Skipping malformed training example");
            }
        }
    }
    if skipped > 0 {
        info!(kept = examples.len(), skipped, "Parsed training examples");
    }
    Ok(examples)
}

pub fn load_training_examples(path: impl AsRef<Path>) -> Result<Vec<TrainingExample>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let examples = parse_training_examples(std::io::BufReader::new(file))?;
    info!(path = %path.display(), examples = examples.len(), "Loaded training examples");
    Ok(examples)
}
