//! Batched expansion environment
//!
//! One episode per community under construction. All active episodes advance together
//! on each [`ExpansionEnv::step`]; an episode is done once it chose STOP, reached the
//! size cap, or ran out of boundary nodes, and it never becomes active again.

use crate::graph::Graph;
use crate::nn::NodeIndicators;
use crate::{Result, SeedGrowError};

/// Move of one episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Absorb a boundary node
    Node(usize),
    /// End the episode
    Stop,
}

/// Community under construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trajectory {
    nodes: Vec<usize>,
    stopped: bool,
}

impl Trajectory {
    fn new(nodes: Vec<usize>) -> Self {
        Trajectory { nodes, stopped: false }
    }

    /// Members in insertion order
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Whether the policy chose STOP
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Number of members, excluding the STOP marker
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no members
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Members, without the STOP marker
    pub fn into_nodes(self) -> Vec<usize> {
        self.nodes
    }
}

/// Lockstep batch of expansion episodes
#[derive(Debug, Clone)]
pub struct ExpansionEnv {
    seeds: Vec<Vec<usize>>,
    trajectories: Vec<Trajectory>,
    done: Vec<bool>,
    max_size: usize,
}

impl ExpansionEnv {
    /// One episode per seed set
    pub fn new(seeds: Vec<Vec<usize>>, max_size: usize) -> Self {
        ExpansionEnv {
            seeds,
            trajectories: Vec::new(),
            done: Vec::new(),
            max_size,
        }
    }

    /// Number of episodes
    pub fn batch_size(&self) -> usize {
        self.seeds.len()
    }

    /// Trajectory size cap
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Start every episode from its seed set
    ///
    /// Returns the one-hot seed encoding (first seed node per episode) and the
    /// encoding of all seed nodes. Fails unless every episode has a legal move.
    pub fn reset(&mut self, graph: &Graph) -> Result<(NodeIndicators, NodeIndicators)> {
        for (i, seed) in self.seeds.iter().enumerate() {
            if seed.is_empty() {
                return Err(SeedGrowError::Precondition(format!("episode {} has an empty seed set", i)));
            }
            if let Some(&v) = seed.iter().find(|&&v| !graph.contains(v)) {
                return Err(SeedGrowError::Precondition(format!(
                    "seed node {} of episode {} is not in the graph",
                    v, i
                )));
            }
            if seed.len() >= self.max_size {
                return Err(SeedGrowError::Precondition(format!(
                    "episode {} starts at {} nodes with a cap of {}",
                    i,
                    seed.len(),
                    self.max_size
                )));
            }
            if graph.outer_boundary(seed).is_empty() {
                return Err(SeedGrowError::Precondition(format!(
                    "episode {} starts with an empty boundary",
                    i
                )));
            }
        }

        self.trajectories = self.seeds.iter().cloned().map(Trajectory::new).collect();
        self.done = vec![false; self.seeds.len()];
        Ok((self.seed_indicators(), NodeIndicators::new(self.seeds.clone())))
    }

    /// Apply one action to each listed active episode
    ///
    /// Returns one-hot encodings of the accepted nodes of episodes that stay active.
    pub fn step(&mut self, graph: &Graph, actions: &[Action], index: &[usize]) -> Result<NodeIndicators> {
        if actions.len() != index.len() {
            return Err(SeedGrowError::Precondition(format!(
                "{} actions for {} episodes",
                actions.len(),
                index.len()
            )));
        }
        if self.trajectories.len() != self.seeds.len() {
            return Err(SeedGrowError::Precondition("environment stepped before reset".to_string()));
        }

        let mut encoded: Vec<Option<usize>> = vec![None; self.batch_size()];
        for (&i, &action) in index.iter().zip(actions) {
            match self.done.get(i) {
                Some(false) => {}
                Some(true) => {
                    return Err(SeedGrowError::Precondition(format!("episode {} is already done", i)));
                }
                None => {
                    return Err(SeedGrowError::Precondition(format!("no episode {}", i)));
                }
            }

            let trajectory = &mut self.trajectories[i];
            match action {
                Action::Stop => {
                    trajectory.stopped = true;
                    self.done[i] = true;
                }
                Action::Node(v) => {
                    if !graph.contains(v) {
                        return Err(SeedGrowError::Precondition(format!(
                            "node {} proposed for episode {} is not in the graph",
                            v, i
                        )));
                    }
                    if trajectory.nodes.contains(&v) {
                        return Err(SeedGrowError::Precondition(format!(
                            "node {} is already a member of episode {}",
                            v, i
                        )));
                    }
                    if !graph.outer_boundary(&trajectory.nodes).contains(&v) {
                        return Err(SeedGrowError::Precondition(format!(
                            "node {} is not on the boundary of episode {}",
                            v, i
                        )));
                    }
                    trajectory.nodes.push(v);
                    if trajectory.len() >= self.max_size || graph.outer_boundary(&trajectory.nodes).is_empty() {
                        self.done[i] = true;
                    } else {
                        encoded[i] = Some(v);
                    }
                }
            }
        }

        Ok(NodeIndicators::from_optional(&encoded))
    }

    /// One-hot encoding of each episode's first seed node
    pub fn seed_indicators(&self) -> NodeIndicators {
        NodeIndicators::new(self.seeds.iter().map(|s| s.iter().take(1).copied().collect()).collect())
    }

    /// Trajectory lengths excluding STOP
    pub fn lengths(&self) -> Vec<usize> {
        self.trajectories.iter().map(Trajectory::len).collect()
    }

    /// Whether every episode is done
    pub fn is_done(&self) -> bool {
        self.done.iter().all(|&d| d)
    }

    /// Indices of active episodes
    pub fn valid_index(&self) -> Vec<usize> {
        self.done
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| (!d).then_some(i))
            .collect()
    }

    /// Current trajectories
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Consume the environment, keeping its trajectories
    pub fn into_trajectories(self) -> Vec<Trajectory> {
        self.trajectories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(n: usize) -> Graph {
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        Graph::from_edges(&edges).unwrap()
    }

    #[test]
    fn test_reset_encodings() {
        let graph = path_graph(6);
        let mut env = ExpansionEnv::new(vec![vec![2, 3], vec![0]], 5);
        let (seeds, nodes) = env.reset(&graph).unwrap();
        assert_eq!(seeds.columns(), &[vec![2], vec![0]]);
        assert_eq!(nodes.columns(), &[vec![2, 3], vec![0]]);
        assert_eq!(env.valid_index(), vec![0, 1]);
    }

    #[test]
    fn test_reset_preconditions() {
        let graph = Graph::from_edges(&[(0, 1), (2, 3)]).unwrap();
        assert!(ExpansionEnv::new(vec![vec![0, 1]], 5).reset(&graph).is_err());
        assert!(ExpansionEnv::new(vec![vec![0]], 1).reset(&graph).is_err());
        assert!(ExpansionEnv::new(vec![vec![]], 5).reset(&graph).is_err());
        assert!(ExpansionEnv::new(vec![vec![9]], 5).reset(&graph).is_err());
    }

    #[test]
    fn test_size_cap_ends_episode() {
        let graph = path_graph(10);
        let mut env = ExpansionEnv::new(vec![vec![4]], 3);
        env.reset(&graph).unwrap();

        let delta = env.step(&graph, &[Action::Node(5)], &[0]).unwrap();
        assert_eq!(delta.columns(), &[vec![5]]);
        assert!(!env.is_done());

        let delta = env.step(&graph, &[Action::Node(6)], &[0]).unwrap();
        assert!(delta.is_empty());
        assert!(env.is_done());
        assert_eq!(env.lengths(), vec![3]);
        assert!(env.step(&graph, &[Action::Node(7)], &[0]).is_err());
    }

    #[test]
    fn test_stop_and_exhausted_boundary() {
        let graph = path_graph(3);
        let mut env = ExpansionEnv::new(vec![vec![0], vec![1]], 10);
        env.reset(&graph).unwrap();

        env.step(&graph, &[Action::Stop, Action::Node(0)], &[0, 1]).unwrap();
        assert_eq!(env.valid_index(), vec![1]);
        assert!(env.trajectories()[0].is_stopped());
        assert_eq!(env.lengths(), vec![1, 2]);

        // {1, 0, 2} covers the whole path
        env.step(&graph, &[Action::Node(2)], &[1]).unwrap();
        assert!(env.is_done());
        assert!(!env.trajectories()[1].is_stopped());
    }

    #[test]
    fn test_step_rejects_members_and_distant_nodes() {
        let graph = path_graph(6);
        let mut env = ExpansionEnv::new(vec![vec![2]], 5);
        env.reset(&graph).unwrap();

        let err = env.step(&graph, &[Action::Node(2)], &[0]);
        assert!(matches!(err, Err(SeedGrowError::Precondition(_))));
        let err = env.step(&graph, &[Action::Node(5)], &[0]);
        assert!(matches!(err, Err(SeedGrowError::Precondition(_))));
        assert_eq!(env.lengths(), vec![1]);

        env.step(&graph, &[Action::Node(3)], &[0]).unwrap();
        assert!(env.step(&graph, &[Action::Node(3)], &[0]).is_err());
        assert_eq!(env.trajectories()[0].nodes(), &[2, 3]);
    }
}
