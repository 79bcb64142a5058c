//! Rollouts, training and generation over the expansion environment
//!
//! Every mode runs the same lockstep loop: accumulate the diffusion of the nodes added
//! last step, score the boundary of every active episode, pick one action each and
//! step the environment. Training keeps the scored inputs of every step and replays
//! them through [`Agent::backward`] once the batch is finished.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use ndarray::Array1;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::graph::{Graph, NodeRegistry};
use crate::nn::{Adam, Agent, DiffusedFeatures, DiffusionEncoder, PolicyInput, Segment};
use crate::{Result, SeedGrowError};
use super::config::ExpanderConfig;
use super::env::{Action, ExpansionEnv, Trajectory};
use super::metrics::{Scores, TrainingMetrics};

/// How actions are chosen during a rollout
enum Mode<'a> {
    /// Categorical draw from the policy
    Sample,
    /// Most likely node of the reference community not yet taken, else STOP
    Imitate(&'a [HashSet<usize>]),
}

/// Policy input of one step with the action index chosen per segment
struct StepRecord {
    input: PolicyInput,
    episodes: Vec<usize>,
    choices: Vec<usize>,
}

struct Rollout {
    trajectories: Vec<Trajectory>,
    steps: Vec<StepRecord>,
    /// Log-probability of every chosen action, per episode
    log_probs: Vec<Vec<f32>>,
    /// Chosen actions, per episode
    actions: Vec<Vec<Action>>,
}

/// Owner of the working graph, the diffusion encoder and the policy
pub struct Expander {
    graph: Graph,
    encoder: DiffusionEncoder,
    agent: Agent,
    optimizer: Adam,
    config: ExpanderConfig,
    metrics: TrainingMetrics,
}

impl Expander {
    /// Fresh policy over `graph`
    pub fn new<R: Rng + ?Sized>(graph: Graph, config: ExpanderConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let encoder = DiffusionEncoder::new(&graph, config.diffusion_depth, config.alpha);
        let agent = Agent::new(config.hidden_size, rng);
        let optimizer = Adam::new(config.learning_rate);
        Ok(Expander {
            graph,
            encoder,
            agent,
            optimizer,
            config,
            metrics: TrainingMetrics::new(),
        })
    }

    /// Working graph, including nodes added by generation
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Settings
    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    /// Loss history
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Policy network
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Change the trajectory size cap
    pub fn set_max_size(&mut self, max_size: usize) -> Result<()> {
        let mut config = self.config.clone();
        config.max_size = max_size;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Grow one community per seed set until every episode is done
    ///
    /// With a registry, nodes reached by the policy pull their neighbourhood in from
    /// the parent graph before the next step. Returned communities exclude STOP.
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        seeds: &[Vec<usize>],
        registry: Option<&mut NodeRegistry>,
        rng: &mut R,
    ) -> Result<Vec<Vec<usize>>> {
        let mut env = ExpansionEnv::new(seeds.to_vec(), self.config.max_size);
        let rollout = self.rollout(&mut env, Mode::Sample, registry, rng)?;
        Ok(rollout.trajectories.into_iter().map(Trajectory::into_nodes).collect())
    }

    /// One imitation update on reference orderings
    ///
    /// Each episode starts from the first node of its reference. Returns the mean
    /// negative log-likelihood over all non-STOP steps.
    pub fn train_from_sets<R: Rng + ?Sized>(&mut self, references: &[Vec<usize>], rng: &mut R) -> Result<f32> {
        let seeds = references
            .iter()
            .map(|r| {
                r.first()
                    .map(|&s| vec![s])
                    .ok_or_else(|| SeedGrowError::Precondition("empty reference community".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let targets: Vec<HashSet<usize>> = references.iter().map(|r| r.iter().copied().collect()).collect();

        let mut env = ExpansionEnv::new(seeds, self.config.max_size);
        let rollout = self.rollout(&mut env, Mode::Imitate(&targets), None, rng)?;

        let n_steps = rollout
            .actions
            .iter()
            .flatten()
            .filter(|a| matches!(a, Action::Node(_)))
            .count();
        if n_steps == 0 {
            return Ok(0.0);
        }
        let weight = 1.0 / n_steps as f32;

        let mut loss = 0.0;
        let coefficients: Vec<Vec<f32>> = rollout
            .actions
            .iter()
            .zip(&rollout.log_probs)
            .map(|(actions, log_probs)| {
                actions
                    .iter()
                    .zip(log_probs)
                    .map(|(action, &lp)| match action {
                        Action::Node(_) => {
                            loss -= lp * weight;
                            -weight
                        }
                        Action::Stop => 0.0,
                    })
                    .collect()
            })
            .collect();

        self.apply_gradients(&rollout.steps, &coefficients)?;
        Ok(loss)
    }

    /// One REINFORCE update from free rollouts
    ///
    /// The reward of a step is the F1 gain of the node it added; each log-probability
    /// is weighted by its discounted reward-to-go.
    pub fn train_reward<R: Rng + ?Sized>(&mut self, seeds: &[usize], truths: &[Vec<usize>], rng: &mut R) -> Result<f32> {
        if seeds.len() != truths.len() {
            return Err(SeedGrowError::Precondition(format!(
                "{} seeds for {} reference communities",
                seeds.len(),
                truths.len()
            )));
        }

        let mut env = ExpansionEnv::new(seeds.iter().map(|&s| vec![s]).collect(), self.config.max_size);
        let rollout = self.rollout(&mut env, Mode::Sample, None, rng)?;

        let mut loss = 0.0;
        let mut coefficients: Vec<Vec<f32>> = Vec::with_capacity(seeds.len());
        for ((trajectory, truth), log_probs) in rollout.trajectories.iter().zip(truths).zip(&rollout.log_probs) {
            let truth: HashSet<usize> = truth.iter().copied().collect();
            let returns = reward_to_go(&marginal_rewards(trajectory.nodes(), &truth), self.config.gamma);
            loss -= returns.iter().zip(log_probs).map(|(g, lp)| g * lp).sum::<f32>();
            coefficients.push(returns.iter().map(|g| -g).collect());
        }

        self.apply_gradients(&rollout.steps, &coefficients)?;
        Ok(loss)
    }

    /// One policy-gradient batch followed by one imitation batch
    ///
    /// Both batches draw `batch_size` communities with replacement. Policy-gradient
    /// episodes start from a random member; imitation references are random walk
    /// orderings of their community.
    pub fn train_epoch<R: Rng + ?Sized>(
        &mut self,
        communities: &[Vec<usize>],
        batch_size: usize,
        rng: &mut R,
    ) -> Result<(f32, f32)> {
        if communities.is_empty() {
            return Err(SeedGrowError::Precondition("no training communities".to_string()));
        }
        let start = Instant::now();

        let truths: Vec<Vec<usize>> = (0..batch_size)
            .map(|_| communities[rng.gen_range(0..communities.len())].clone())
            .collect();
        let seeds = truths
            .iter()
            .map(|c| {
                c.choose(rng)
                    .copied()
                    .ok_or_else(|| SeedGrowError::Precondition("empty training community".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let reinforce_loss = self.train_reward(&seeds, &truths, rng)?;

        let mut references = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let community = &communities[rng.gen_range(0..communities.len())];
            references.push(self.graph.sample_walk_through_community(community, None, rng)?.order);
        }
        let imitation_loss = self.train_from_sets(&references, rng)?;

        self.metrics.update_epoch(imitation_loss, reinforce_loss, start.elapsed());
        Ok((imitation_loss, reinforce_loss))
    }

    /// Run `epochs` training epochs
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        communities: &[Vec<usize>],
        epochs: usize,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<()> {
        for epoch in 1..=epochs {
            let (imitation_loss, reinforce_loss) = self.train_epoch(communities, batch_size, rng)?;
            if epoch % 10 == 0 || epoch == epochs {
                info!(epoch, epochs, imitation_loss, reinforce_loss, "training");
            } else {
                debug!(epoch, imitation_loss, reinforce_loss, "training");
            }
        }
        Ok(())
    }

    /// Boundary of `trajectory` and the policy's log-probabilities over it
    ///
    /// Index `candidates.len()` of the returned vector is STOP.
    pub fn action_log_probs(&self, trajectory: &[usize]) -> Result<(Vec<usize>, Array1<f32>)> {
        let mut env = ExpansionEnv::new(vec![trajectory.to_vec()], usize::MAX);
        let (x_seeds, x_nodes) = env.reset(&self.graph)?;
        let z_seeds = self.encoder.encode(&x_seeds)?;
        let z_nodes = self.encoder.encode(&x_nodes)?;
        let (input, mut candidates) = self.prepare_inputs(&env, &[0], &z_seeds, &z_nodes)?;
        let mut outputs = self.agent.forward(&input)?;
        match (candidates.pop(), outputs.pop()) {
            (Some(c), Some(lp)) => Ok((c, lp)),
            _ => Err(SeedGrowError::Precondition("policy produced no output".to_string())),
        }
    }

    fn rollout<R: Rng + ?Sized>(
        &mut self,
        env: &mut ExpansionEnv,
        mode: Mode<'_>,
        mut registry: Option<&mut NodeRegistry>,
        rng: &mut R,
    ) -> Result<Rollout> {
        let batch_size = env.batch_size();
        let (x_seeds, mut delta) = env.reset(&self.graph)?;
        let mut z_seeds = self.encoder.encode(&x_seeds)?;
        let mut z_nodes = self.encoder.zeros(batch_size);

        let mut steps = Vec::new();
        let mut log_probs = vec![Vec::new(); batch_size];
        let mut taken = vec![Vec::new(); batch_size];

        while !env.is_done() {
            self.encoder.accumulate(&mut z_nodes, &delta)?;
            let valid = env.valid_index();
            let (input, candidates) = self.prepare_inputs(env, &valid, &z_seeds, &z_nodes)?;
            let outputs = self.agent.forward(&input)?;

            let mut choices = Vec::with_capacity(valid.len());
            let mut actions = Vec::with_capacity(valid.len());
            for ((&episode, lp), nodes) in valid.iter().zip(&outputs).zip(&candidates) {
                let choice = match &mode {
                    Mode::Sample => self.sample_action(lp, rng)?,
                    Mode::Imitate(targets) => imitation_action(lp, nodes, &targets[episode]),
                };
                let action = nodes.get(choice).map_or(Action::Stop, |&v| Action::Node(v));
                log_probs[episode].push(lp[choice]);
                taken[episode].push(action);
                choices.push(choice);
                actions.push(action);
            }

            if let Some(registry) = registry.as_deref_mut() {
                let accepted: Vec<usize> = actions
                    .iter()
                    .filter_map(|a| match a {
                        Action::Node(v) => Some(*v),
                        Action::Stop => None,
                    })
                    .collect();
                if self.extend_around(&accepted, registry)? {
                    self.encoder.update_graph(&self.graph);
                    self.encoder.resize(&mut z_nodes)?;
                    z_seeds = self.encoder.encode(&env.seed_indicators())?;
                }
            }

            delta = env.step(&self.graph, &actions, &valid)?;
            steps.push(StepRecord { input, episodes: valid, choices });
        }

        Ok(Rollout {
            trajectories: env.trajectories().to_vec(),
            steps,
            log_probs,
            actions: taken,
        })
    }

    /// Flatten the boundary and community of every listed episode into one input
    fn prepare_inputs(
        &self,
        env: &ExpansionEnv,
        valid: &[usize],
        z_seeds: &DiffusedFeatures,
        z_nodes: &DiffusedFeatures,
    ) -> Result<(PolicyInput, Vec<Vec<usize>>)> {
        let mut input = PolicyInput::default();
        let mut batch_candidates = Vec::with_capacity(valid.len());
        for &i in valid {
            let members = env.trajectories()[i].nodes();
            let candidates: Vec<usize> = self.graph.outer_boundary(members).into_iter().collect();
            let start = input.n_rows();
            for &v in candidates.iter().chain(members) {
                input.seed_feats.push(z_seeds.get(v, i));
                input.node_feats.push(z_nodes.get(v, i));
            }
            input.segments.push(Segment::new(start, start + candidates.len(), input.n_rows())?);
            batch_candidates.push(candidates);
        }
        Ok((input, batch_candidates))
    }

    /// Categorical draw with every probability raised by the sampling epsilon
    fn sample_action<R: Rng + ?Sized>(&self, log_probs: &Array1<f32>, rng: &mut R) -> Result<usize> {
        let eps = self.config.sampling_epsilon;
        let dist = WeightedIndex::new(log_probs.iter().map(|&lp| lp.exp() + eps))
            .map_err(|e| SeedGrowError::Sampling(format!("{} for log-probabilities {:?}", e, log_probs)))?;
        Ok(dist.sample(rng))
    }

    /// Replay the recorded steps with `∂loss/∂log p = coefficients[episode][step]`
    fn apply_gradients(&mut self, steps: &[StepRecord], coefficients: &[Vec<f32>]) -> Result<()> {
        self.agent.zero_grad();
        let mut counters = vec![0usize; coefficients.len()];

        for record in steps {
            let mut any = false;
            let grads: Vec<Array1<f32>> = record
                .input
                .segments
                .iter()
                .zip(record.episodes.iter().zip(&record.choices))
                .map(|(seg, (&episode, &choice))| {
                    let t = counters[episode];
                    counters[episode] += 1;
                    let mut grad = Array1::zeros(seg.n_actions());
                    grad[choice] = coefficients[episode].get(t).copied().unwrap_or(0.0);
                    any |= grad[choice] != 0.0;
                    grad
                })
                .collect();
            if any {
                self.agent.backward(&record.input, &grads)?;
            }
        }

        self.optimizer.step(self.agent.params_mut());
        Ok(())
    }

    /// Pull the neighbourhood of `nodes` in from the parent graph
    ///
    /// Unseen parent nodes within `extension_depth` hops get the next working ids and
    /// are linked to every registered parent neighbour. Returns whether the graph grew.
    fn extend_around(&mut self, nodes: &[usize], registry: &mut NodeRegistry) -> Result<bool> {
        let Some(&first) = nodes.first() else {
            return Ok(false);
        };
        let parent = self
            .graph
            .parent()
            .map(Arc::clone)
            .ok_or(SeedGrowError::MissingParent(first))?;
        if registry.len() != self.graph.n_nodes() {
            return Err(SeedGrowError::Registry(format!(
                "registry holds {} ids but the working graph has {} nodes",
                registry.len(),
                self.graph.n_nodes()
            )));
        }

        let mut added: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for &node in nodes {
            let old = registry
                .to_old(node)
                .ok_or_else(|| SeedGrowError::Registry(format!("working node {} has no dataset id", node)))?;
            for &reached in &parent.k_ego(&[old], self.config.extension_depth) {
                if !registry.contains_old(reached) {
                    added.insert(registry.register(reached), BTreeSet::new());
                }
            }
        }
        if added.is_empty() {
            return Ok(false);
        }

        for (&new, neighbors) in added.iter_mut() {
            let old = registry
                .to_old(new)
                .ok_or_else(|| SeedGrowError::Registry(format!("working node {} has no dataset id", new)))?;
            neighbors.extend(parent.neighbors(old).iter().filter_map(|&nb| registry.to_new(nb)));
        }
        self.graph.add_nodes_with_neighbors(&added)?;
        debug!(added = added.len(), n_nodes = self.graph.n_nodes(), "extended working graph");
        Ok(true)
    }
}

/// Most likely candidate still missing from `target`, or STOP when none is
fn imitation_action(log_probs: &Array1<f32>, candidates: &[usize], target: &HashSet<usize>) -> usize {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, v)| target.contains(*v))
        .max_by(|(a, _), (b, _)| log_probs[*a].total_cmp(&log_probs[*b]))
        .map_or(candidates.len(), |(i, _)| i)
}

/// F1 gain of each node after the first
pub fn marginal_rewards(nodes: &[usize], truth: &HashSet<usize>) -> Vec<f32> {
    let Some((&first, rest)) = nodes.split_first() else {
        return Vec::new();
    };
    let truth: Vec<usize> = truth.iter().copied().collect();
    let mut prefix = vec![first];
    let mut before = Scores::evaluate(&prefix, &truth).f1;

    rest.iter()
        .map(|&v| {
            prefix.push(v);
            let after = Scores::evaluate(&prefix, &truth).f1;
            let gain = (after - before) as f32;
            before = after;
            gain
        })
        .collect()
}

/// `G_t = r_t + γ G_{t+1}`
pub fn reward_to_go(rewards: &[f32], gamma: f32) -> Vec<f32> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for (t, &r) in rewards.iter().enumerate().rev() {
        running = r + gamma * running;
        returns[t] = running;
    }
    returns
}

impl std::fmt::Debug for Expander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expander")
            .field("n_nodes", &self.graph.n_nodes())
            .field("graph_version", &self.graph.version())
            .field("parameters", &self.agent.num_parameters())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn path_graph(n: usize) -> Graph {
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        Graph::from_edges(&edges).unwrap()
    }

    fn small_config(max_size: usize) -> ExpanderConfig {
        ExpanderConfig {
            max_size,
            hidden_size: 8,
            ..ExpanderConfig::default()
        }
    }

    #[test]
    fn test_reward_to_go() {
        let returns = reward_to_go(&[1.0, 0.0, 1.0], 0.5);
        assert_eq!(returns, vec![1.25, 0.5, 1.0]);
        assert!(reward_to_go(&[], 0.9).is_empty());
    }

    #[test]
    fn test_marginal_rewards() {
        let truth: HashSet<usize> = [1, 2, 3].into_iter().collect();
        let rewards = marginal_rewards(&[1, 2, 3, 9], &truth);
        assert_eq!(rewards.len(), 3);
        assert!((rewards[0] - 0.3).abs() < 1e-6);
        assert!((rewards[1] - 0.2).abs() < 1e-6);
        assert!(rewards[2] < 0.0);
    }

    #[test]
    fn test_imitation_action_restricts_to_target() {
        let lp = Array1::from(vec![-0.1f32, -3.0, -2.0, -1.0]);
        let target: HashSet<usize> = [20, 30].into_iter().collect();
        assert_eq!(imitation_action(&lp, &[10, 20, 30], &target), 2);
        assert_eq!(imitation_action(&lp, &[10, 40, 50], &target), 3);
    }

    #[test]
    fn test_imitation_prefers_true_neighbour_on_path() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut expander = Expander::new(path_graph(6), small_config(25), &mut rng).unwrap();

        let (candidates, before) = expander.action_log_probs(&[0]).unwrap();
        // Only node 1 touches node 0, so node 5 is never offered
        assert_eq!(candidates, vec![1]);

        for _ in 0..20 {
            expander.train_from_sets(&[vec![0, 1, 2]], &mut rng).unwrap();
        }

        let (candidates, after) = expander.action_log_probs(&[0]).unwrap();
        assert_eq!(candidates, vec![1]);
        assert!(after[0] > before[0]);
        assert!(after[0] > after[1], "node 1 should beat STOP: {:?}", after);
    }

    #[test]
    fn test_episodes_respect_size_cap() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut expander = Expander::new(path_graph(10), small_config(3), &mut rng).unwrap();
        let communities = expander
            .generate(&[vec![5], vec![0], vec![9]], None, &mut rng)
            .unwrap();
        assert_eq!(communities.len(), 3);
        for (community, seed) in communities.iter().zip([5, 0, 9]) {
            assert_eq!(community[0], seed);
            assert!(community.len() <= 3);
        }
    }

    #[test]
    fn test_train_epoch_records_metrics() {
        let mut rng = StdRng::seed_from_u64(8);
        let graph = Graph::from_edges(&[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 5), (5, 3)]).unwrap();
        let mut expander = Expander::new(graph, small_config(4), &mut rng).unwrap();
        let communities = vec![vec![0, 1, 2], vec![3, 4, 5]];

        expander.train(&communities, 3, 4, &mut rng).unwrap();
        assert_eq!(expander.metrics().epochs(), 3);
        assert!(expander.metrics().imitation_loss.iter().all(|l| l.is_finite() && *l >= 0.0));
        assert_eq!(expander.metrics().reinforce_loss.len(), 3);
        assert!(expander.metrics().reinforce_loss.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_reward_training_favours_true_neighbour() {
        // From seed 0, node 1 leads into {1, 3, 4}; node 2 only leads to 5
        let graph = Graph::from_edges(&[(0, 1), (0, 2), (1, 3), (1, 4), (3, 4), (2, 5)]).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let mut expander = Expander::new(graph, small_config(4), &mut rng).unwrap();

        let (candidates, before) = expander.action_log_probs(&[0]).unwrap();
        assert_eq!(candidates, vec![1, 2]);

        let truths = vec![vec![0, 1, 3, 4]; 8];
        for _ in 0..60 {
            let loss = expander.train_reward(&[0; 8], &truths, &mut rng).unwrap();
            assert!(loss.is_finite());
        }

        let (_, after) = expander.action_log_probs(&[0]).unwrap();
        assert!(after[0] > before[0], "{:?} -> {:?}", before, after);
        assert!(after[0] > after[1], "node 1 should beat node 2: {:?}", after);
        assert!(expander.train_reward(&[0], &[], &mut rng).is_err());
    }

    #[test]
    fn test_extension_from_parent() {
        let parent = Arc::new(path_graph(10));
        let (mut working, mapping) = parent.extract_relabeled_subgraph(&[0], 1);
        working.set_parent(Arc::clone(&parent));
        let mut registry = NodeRegistry::from_forward(mapping).unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let mut expander = Expander::new(working, small_config(6), &mut rng).unwrap();
        assert_eq!(expander.graph().n_nodes(), 2);

        let node = registry.to_new(1).unwrap();
        assert!(expander.extend_around(&[node], &mut registry).unwrap());

        // Dataset nodes 2, 3, 4 are within three hops of node 1
        assert_eq!(expander.graph().n_nodes(), 5);
        assert_eq!(registry.len(), 5);
        let two = registry.to_new(2).unwrap();
        assert!(expander.graph().neighbors(node).contains(&two));
        assert!(expander.graph().neighbors(two).contains(&node));
        assert!(!expander.graph().neighbors(two).contains(&two));

        // Nothing new to pull in the second time
        assert!(!expander.extend_around(&[node], &mut registry).unwrap());
    }

    #[test]
    fn test_generation_grows_into_parent() {
        let parent = Arc::new(path_graph(30));
        for seed in 0..5 {
            let (mut working, mapping) = parent.extract_relabeled_subgraph(&[10], 1);
            working.set_parent(Arc::clone(&parent));
            let mut registry = NodeRegistry::from_forward(mapping).unwrap();
            let start = registry.to_new(10).unwrap();

            let mut rng = StdRng::seed_from_u64(seed);
            let mut expander = Expander::new(working, small_config(8), &mut rng).unwrap();
            let community = expander.generate(&[vec![start]], Some(&mut registry), &mut rng).unwrap().remove(0);

            assert_eq!(registry.len(), expander.graph().n_nodes());
            let dataset_ids = registry.map_to_old(&community).unwrap();
            assert_eq!(dataset_ids[0], 10);
            assert!(parent.is_connected_within(&dataset_ids));
        }
    }

    #[test]
    fn test_extension_without_parent_fails() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut expander = Expander::new(path_graph(4), small_config(4), &mut rng).unwrap();
        let mut registry = NodeRegistry::from_forward((0..4).map(|i| (i, i)).collect()).unwrap();
        let err = expander.extend_around(&[1], &mut registry);
        assert!(matches!(err, Err(SeedGrowError::MissingParent(1))));
    }
}
