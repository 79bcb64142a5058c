//! End-to-end detection for one query seed
//!
//! The detector carves a working graph out of the dataset graph (the ego network of
//! the seed and of every known community), trains an [`Expander`] on the known
//! communities, grows a first prediction from the seed, then alternates curriculum
//! re-selection and retraining for the remaining outer iterations.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::core::{DetectorConfig, Expander, Scores};
use crate::graph::{Graph, NodeRegistry};
use crate::utils::timing::Timer;
use crate::{Result, SeedGrowError};

use super::curriculum::CurriculumSelector;

/// Outcome of one detection run, in dataset ids
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Query seed
    pub seed: usize,
    /// Index of the reference community in the dataset's community list
    pub com_index: usize,
    /// Prediction after the first outer iteration
    pub first_pass: Vec<usize>,
    /// Final prediction
    pub community: Vec<usize>,
    /// Final prediction scored against the reference community, when it exists
    pub scores: Option<Scores>,
}

/// Training and generation state for one query seed
pub struct Detector {
    config: DetectorConfig,
    registry: NodeRegistry,
    expander: Expander,
    selector: CurriculumSelector,
    /// Known communities in working ids
    known: Vec<Vec<usize>>,
    /// Current training set in working ids
    train: Vec<Vec<usize>>,
    seed: usize,
    dataset_seed: usize,
    com_index: usize,
    truth: Option<Vec<usize>>,
    rng: StdRng,
}

impl Detector {
    /// Build the working graph and a fresh expander around `seed`
    ///
    /// The last `train_size` entries of `communities` are the known communities.
    pub fn new(
        graph: Arc<Graph>,
        communities: &[Vec<usize>],
        seed: usize,
        com_index: usize,
        config: DetectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !graph.contains(seed) {
            return Err(SeedGrowError::Precondition(format!("seed {} is not in the graph", seed)));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);

        let tail = &communities[communities.len().saturating_sub(config.train_size)..];
        let anchor: BTreeSet<usize> = tail
            .iter()
            .flatten()
            .copied()
            .chain(std::iter::once(seed))
            .collect();

        let mut known_old: Vec<Vec<usize>> = tail.iter().filter(|c| !c.is_empty()).cloned().collect();
        if config.drop_disconnected {
            let before = known_old.len();
            known_old.retain(|c| graph.is_connected_within(c));
            info!(dropped = before - known_old.len(), kept = known_old.len(), "dropped disconnected communities");
        }
        if known_old.is_empty() {
            return Err(SeedGrowError::Precondition("no known communities to train on".to_string()));
        }

        let (mut working, forward) = graph.extract_relabeled_subgraph(&anchor, config.ego_depth);
        working.set_parent(Arc::clone(&graph));
        let registry = NodeRegistry::from_forward(forward)?;

        let known = known_old
            .iter()
            .map(|c| registry.map_to_new(c))
            .collect::<Result<Vec<_>>>()?;
        let working_seed = registry
            .to_new(seed)
            .ok_or_else(|| SeedGrowError::Registry(format!("seed {} missing from working graph", seed)))?;

        let max_size = known.iter().map(Vec::len).max().unwrap_or(0).max(2);
        let mut expander_config = config.expander.clone();
        expander_config.max_size = max_size;

        info!(
            dataset = %config.dataset,
            seed,
            com_index,
            nodes = working.n_nodes(),
            edges = working.n_edges(),
            known = known.len(),
            max_size,
            "working graph ready"
        );

        let expander = Expander::new(working, expander_config, &mut rng)?;
        let selector = CurriculumSelector::new(config.curriculum.clone());
        let truth = communities.get(com_index).cloned();

        Ok(Detector {
            config,
            registry,
            expander,
            selector,
            train: known.clone(),
            known,
            seed: working_seed,
            dataset_seed: seed,
            com_index,
            truth,
            rng,
        })
    }

    /// Swap the default curriculum selector
    pub fn with_selector(mut self, selector: CurriculumSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The expander and its working graph
    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    /// Dataset-to-working id mapping
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Current training set in working ids
    pub fn training_set(&self) -> &[Vec<usize>] {
        &self.train
    }

    /// Train, generate and refine; returns the prediction in dataset ids
    pub fn detect(&mut self) -> Result<Detection> {
        let _timer = Timer::new("detection");
        let mut prediction: Vec<usize> = Vec::new();
        let mut first_pass: Vec<usize> = Vec::new();

        for iteration in 0..self.config.outer_iterations {
            if iteration > 0 {
                self.train = self
                    .selector
                    .select(self.expander.graph(), &prediction, &self.known, &self.train)?;
            }

            self.expander
                .train(&self.train, self.config.epochs, self.config.batch_size, &mut self.rng)?;
            prediction = self
                .expander
                .generate(&[vec![self.seed]], Some(&mut self.registry), &mut self.rng)?
                .pop()
                .ok_or_else(|| SeedGrowError::Precondition("generation returned no community".to_string()))?;

            info!(
                iteration,
                size = prediction.len(),
                train = self.train.len(),
                nodes = self.expander.graph().n_nodes(),
                "generated community"
            );

            if iteration == 0 {
                first_pass = prediction.clone();
                if self.config.ablation {
                    break;
                }
            }
        }

        let community = self.registry.map_to_old(&prediction)?;
        let first_pass = self.registry.map_to_old(&first_pass)?;
        let scores = self.truth.as_ref().map(|truth| Scores::evaluate(&community, truth).rounded(4));
        if let Some(s) = &scores {
            info!(
                seed = self.dataset_seed,
                precision = s.precision,
                recall = s.recall,
                f1 = s.f1,
                jaccard = s.jaccard,
                "detection scores"
            );
        }

        Ok(Detection {
            seed: self.dataset_seed,
            com_index: self.com_index,
            first_pass,
            community,
            scores,
        })
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("seed", &self.dataset_seed)
            .field("com_index", &self.com_index)
            .field("known", &self.known.len())
            .field("train", &self.train.len())
            .field("expander", &self.expander)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExpanderConfig;

    /// Ring of 4-cliques, each joined to the next by one edge
    fn ring_of_cliques(cliques: usize) -> (Graph, Vec<Vec<usize>>) {
        let mut edges = Vec::new();
        let mut communities = Vec::new();
        for c in 0..cliques {
            let base = 4 * c;
            let members: Vec<usize> = (base..base + 4).collect();
            for (i, &u) in members.iter().enumerate() {
                for &v in &members[i + 1..] {
                    edges.push((u, v));
                }
            }
            edges.push((base + 3, (base + 4) % (4 * cliques)));
            communities.push(members);
        }
        (Graph::from_edges(&edges).unwrap(), communities)
    }

    fn config() -> DetectorConfig {
        DetectorConfig {
            train_size: 4,
            ego_depth: 1,
            batch_size: 4,
            epochs: 3,
            expander: ExpanderConfig {
                hidden_size: 8,
                extension_depth: 1,
                ..ExpanderConfig::default()
            },
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_working_graph_and_known_set() {
        let (graph, communities) = ring_of_cliques(8);
        let detector = Detector::new(Arc::new(graph), &communities, 1, 0, config()).unwrap();

        // Known: cliques 4..8; anchor adds the seed
        assert_eq!(detector.training_set().len(), 4);
        assert_eq!(detector.expander().config().max_size, 4);
        for community in detector.training_set() {
            assert_eq!(community.len(), 4);
            let old = detector.registry().map_to_old(community).unwrap();
            assert_eq!(old[0] % 4, 0);
        }
        assert!(detector.registry().contains_old(1));
        assert!(detector.expander().graph().parent().is_some());
    }

    #[test]
    fn test_detect_returns_dataset_ids() {
        let (graph, communities) = ring_of_cliques(8);
        let graph = Arc::new(graph);
        let mut detector = Detector::new(Arc::clone(&graph), &communities, 1, 0, config()).unwrap();
        let detection = detector.detect().unwrap();

        assert_eq!(detection.seed, 1);
        assert_eq!(detection.com_index, 0);
        assert_eq!(detection.community[0], 1);
        assert!(detection.community.len() <= 4);
        assert!(detection.community.iter().all(|&v| graph.contains(v)));
        assert!(graph.is_connected_within(&detection.community));
        assert!(detection.scores.is_some());
    }

    #[test]
    fn test_ablation_returns_first_pass() {
        let (graph, communities) = ring_of_cliques(6);
        let mut config = config();
        config.ablation = true;
        let mut detector = Detector::new(Arc::new(graph), &communities, 0, 0, config).unwrap();
        let detection = detector.detect().unwrap();
        assert_eq!(detection.community, detection.first_pass);
    }

    #[test]
    fn test_same_seed_same_prediction() {
        let (graph, communities) = ring_of_cliques(6);
        let graph = Arc::new(graph);
        let run = || {
            Detector::new(Arc::clone(&graph), &communities, 2, 0, config())
                .unwrap()
                .detect()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_invalid_inputs() {
        let (graph, communities) = ring_of_cliques(4);
        let graph = Arc::new(graph);
        assert!(Detector::new(Arc::clone(&graph), &communities, 99, 0, config()).is_err());
        assert!(Detector::new(Arc::clone(&graph), &[], 0, 0, config()).is_err());

        let mut bad = config();
        bad.batch_size = 0;
        assert!(Detector::new(graph, &communities, 0, 0, bad).is_err());
    }
}
