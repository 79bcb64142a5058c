//! Set-similarity scores and training history

use std::collections::HashSet;
use std::time::Duration;
use serde::{Serialize, Deserialize};

/// Similarity of a predicted community to a reference community
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    /// |P ∩ T| / |P|
    pub precision: f64,
    /// |P ∩ T| / |T|
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// |P ∩ T| / |P ∪ T|
    pub jaccard: f64,
}

impl Scores {
    /// Score `predicted` against `truth`; duplicates count once
    pub fn evaluate(predicted: &[usize], truth: &[usize]) -> Self {
        let p: HashSet<usize> = predicted.iter().copied().collect();
        let t: HashSet<usize> = truth.iter().copied().collect();
        let inter = p.intersection(&t).count() as f64;
        let union = (p.len() + t.len()) as f64 - inter;

        let precision = if p.is_empty() { 0.0 } else { inter / p.len() as f64 };
        let recall = if t.is_empty() { 0.0 } else { inter / t.len() as f64 };
        let f1 = 2.0 * precision * recall / (precision + recall + 1e-9);
        let jaccard = if union == 0.0 { 0.0 } else { inter / union };

        Scores { precision, recall, f1, jaccard }
    }

    /// Round every score to `digits` decimals
    pub fn rounded(&self, digits: i32) -> Self {
        let scale = 10f64.powi(digits);
        let round = |v: f64| (v * scale).round() / scale;
        Scores {
            precision: round(self.precision),
            recall: round(self.recall),
            f1: round(self.f1),
            jaccard: round(self.jaccard),
        }
    }
}

/// Per-epoch training losses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Imitation (masked mean negative log-likelihood) loss per epoch
    pub imitation_loss: Vec<f32>,
    /// Policy-gradient loss per epoch
    pub reinforce_loss: Vec<f32>,
    /// Wall time spent training
    pub total_time: Duration,
}

impl TrainingMetrics {
    /// Create new metrics tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one epoch
    pub fn update_epoch(&mut self, imitation_loss: f32, reinforce_loss: f32, elapsed: Duration) {
        self.imitation_loss.push(imitation_loss);
        self.reinforce_loss.push(reinforce_loss);
        self.total_time += elapsed;
    }

    /// Number of recorded epochs
    pub fn epochs(&self) -> usize {
        self.imitation_loss.len()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Epochs: {}\nTotal training time: {:.2}s\nFinal imitation loss: {:.4}\nFinal policy-gradient loss: {:.4}",
            self.epochs(),
            self.total_time.as_secs_f32(),
            self.imitation_loss.last().unwrap_or(&0.0),
            self.reinforce_loss.last().unwrap_or(&0.0)
        )
    }
}
