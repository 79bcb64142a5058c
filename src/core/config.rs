//! Configuration for expansion, curriculum selection and detection runs

use std::path::PathBuf;
use serde::{Serialize, Deserialize};
use crate::detect::ClusteringBackend;
use crate::{Result, SeedGrowError};

/// Policy, diffusion and training settings of an [`crate::Expander`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderConfig {
    /// Trajectory size cap
    pub max_size: usize,
    /// Diffusion hops
    pub diffusion_depth: usize,
    /// Per-hop diffusion decay
    pub alpha: f32,
    /// Reward discount
    pub gamma: f32,
    /// Policy hidden width
    pub hidden_size: usize,
    /// Adam step size
    pub learning_rate: f32,
    /// Added to every probability before a categorical draw
    pub sampling_epsilon: f32,
    /// Hops pulled from the parent graph when generation reaches unseen nodes
    pub extension_depth: usize,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        ExpanderConfig {
            max_size: 25,
            diffusion_depth: 3,
            alpha: 0.85,
            gamma: 0.99,
            hidden_size: 64,
            learning_rate: 1e-2,
            sampling_epsilon: 1e-8,
            extension_depth: 3,
        }
    }
}

impl ExpanderConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size < 2 {
            return Err(config_error("max_size must allow at least one step"));
        }
        if self.hidden_size == 0 {
            return Err(config_error("hidden_size must be positive"));
        }
        if self.learning_rate <= 0.0 {
            return Err(config_error("learning_rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(config_error("gamma must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(config_error("alpha must lie in [0, 1]"));
        }
        if self.sampling_epsilon < 0.0 {
            return Err(config_error("sampling_epsilon must not be negative"));
        }
        Ok(())
    }
}

/// Training-set re-selection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumConfig {
    /// Number of clusters
    pub n_clusters: usize,
    /// Clustering algorithm
    pub backend: ClusteringBackend,
    /// Seed for clustering initialisation
    pub seed: u64,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        CurriculumConfig {
            n_clusters: 2,
            backend: ClusteringBackend::default(),
            seed: 0,
        }
    }
}

impl CurriculumConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(config_error("n_clusters must be positive"));
        }
        Ok(())
    }
}

/// One detection run over a dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Dataset name, e.g. `amazon`
    pub dataset: String,
    /// Directory holding one sub-directory per dataset
    pub root: PathBuf,
    /// Directory receiving result files
    pub output: PathBuf,
    /// RNG seed
    pub seed: u64,
    /// Number of trailing communities used as training data
    pub train_size: usize,
    /// Ego depth of the working graph
    pub ego_depth: usize,
    /// Episodes per update
    pub batch_size: usize,
    /// Training epochs per outer iteration
    pub epochs: usize,
    /// Outer iterations; every one after the first re-selects the training set
    pub outer_iterations: usize,
    /// Return the first-pass prediction without curriculum re-selection
    pub ablation: bool,
    /// Drop known communities whose induced subgraph is disconnected
    pub drop_disconnected: bool,
    /// Expander settings
    pub expander: ExpanderConfig,
    /// Curriculum settings
    pub curriculum: CurriculumConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            dataset: "amazon".to_string(),
            root: PathBuf::from("datasets"),
            output: PathBuf::from("res"),
            seed: 0,
            train_size: 100,
            ego_depth: 3,
            batch_size: 32,
            epochs: 100,
            outer_iterations: 2,
            ablation: false,
            drop_disconnected: false,
            expander: ExpanderConfig::default(),
            curriculum: CurriculumConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Small settings for quick runs and tests
    pub fn quick() -> Self {
        DetectorConfig {
            train_size: 10,
            ego_depth: 2,
            batch_size: 4,
            epochs: 5,
            expander: ExpanderConfig {
                hidden_size: 8,
                ..ExpanderConfig::default()
            },
            ..DetectorConfig::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dataset.is_empty() {
            return Err(config_error("dataset name must not be empty"));
        }
        if self.train_size == 0 {
            return Err(config_error("train_size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(config_error("batch_size must be positive"));
        }
        if self.outer_iterations == 0 {
            return Err(config_error("outer_iterations must be positive"));
        }
        self.expander.validate()?;
        self.curriculum.validate()
    }
}

fn config_error(msg: &str) -> SeedGrowError {
    SeedGrowError::Config(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = DetectorConfig::default();
        assert!(config.validate().is_ok());

        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 32;
        config.expander.learning_rate = -0.001;
        assert!(config.validate().is_err());

        config.expander.learning_rate = 0.01;
        config.curriculum.n_clusters = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_match_reference_settings() {
        let config = DetectorConfig::default();
        assert_eq!(config.expander.max_size, 25);
        assert_eq!(config.expander.diffusion_depth, 3);
        assert_eq!(config.expander.hidden_size, 64);
        assert_eq!(config.curriculum.n_clusters, 2);
        assert!(DetectorConfig::quick().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"dataset": "dblp", "expander": {"hidden_size": 16}}"#).unwrap();
        assert_eq!(config.dataset, "dblp");
        assert_eq!(config.expander.hidden_size, 16);
        assert_eq!(config.expander.max_size, 25);
        assert_eq!(config.epochs, 100);
    }
}
